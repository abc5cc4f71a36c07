use super::*;

#[test]
fn naming_pads_to_six_digits_and_grows() {
    let n = FrameNaming::for_count(450);
    assert_eq!(n.digits(), 6);
    assert_eq!(n.file_name(FrameIndex(42)), "frame_000042.png");
    assert_eq!(n.pattern(), "frame_%06d.png");

    let wide = FrameNaming::for_count(10_000_001);
    assert_eq!(wide.digits(), 8);
    assert_eq!(wide.file_name(FrameIndex(7)), "frame_00000007.png");
    assert_eq!(wide.pattern(), "frame_%08d.png");
}

#[test]
fn naming_parses_only_its_own_names() {
    let n = FrameNaming::for_count(30);
    assert_eq!(n.parse("frame_000029.png"), Some(FrameIndex(29)));
    assert_eq!(n.parse("frame_29.png"), None);
    assert_eq!(n.parse("frame_00002x.png"), None);
    assert_eq!(n.parse("frame_000029.jpg"), None);
    assert_eq!(n.parse("other.png"), None);
}

#[test]
fn staged_frames_are_listed_in_index_order() {
    let root = tempfile::tempdir().unwrap();
    let area = StagingArea::create(root.path(), 3).unwrap();
    assert!(area.path().starts_with(root.path()));
    assert!(
        area.path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(STAGING_PREFIX)
    );

    let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([1, 2, 3, 255]));
    for i in [2, 0, 1] {
        area.write_frame(FrameIndex(i), &img).unwrap();
    }
    std::fs::write(area.path().join("notes.txt"), "ignored").unwrap();

    assert_eq!(
        area.staged_indices().unwrap(),
        vec![FrameIndex(0), FrameIndex(1), FrameIndex(2)]
    );
    let back = image::open(area.frame_path(FrameIndex(1))).unwrap().to_rgba8();
    assert_eq!(back, img);
}

#[test]
fn purge_removes_directory_once() {
    let root = tempfile::tempdir().unwrap();
    let mut area = StagingArea::create(root.path(), 1).unwrap();
    let img = image::RgbaImage::new(1, 1);
    area.write_frame(FrameIndex(0), &img).unwrap();
    let path = area.path().to_path_buf();

    assert!(area.purge().is_none());
    assert!(area.is_purged());
    assert!(!path.exists());
    assert!(area.purge().is_none());
    assert!(area.write_frame(FrameIndex(0), &img).is_err());
}

#[test]
fn drop_purges_unpurged_area() {
    let root = tempfile::tempdir().unwrap();
    let path = {
        let area = StagingArea::create(root.path(), 1).unwrap();
        area.path().to_path_buf()
    };
    assert!(!path.exists());
}

#[test]
fn concurrent_areas_are_distinct() {
    let root = tempfile::tempdir().unwrap();
    let a = StagingArea::create(root.path(), 1).unwrap();
    let b = StagingArea::create(root.path(), 1).unwrap();
    assert_ne!(a.path(), b.path());
}

#[test]
fn sweep_removes_only_old_staging_dirs() {
    let root = tempfile::tempdir().unwrap();
    let orphan = root.path().join(format!("{STAGING_PREFIX}orphan"));
    std::fs::create_dir(&orphan).unwrap();
    std::fs::write(orphan.join("frame_000000.png"), b"x").unwrap();
    let unrelated = root.path().join("keep-me");
    std::fs::create_dir(&unrelated).unwrap();

    let report = sweep_orphaned_staging(root.path(), Duration::ZERO).unwrap();
    assert_eq!(report.removed, vec![orphan.clone()]);
    assert!(report.failed.is_empty());
    assert!(!orphan.exists());
    assert!(unrelated.exists());
}

#[test]
fn sweep_skips_recent_dirs() {
    let root = tempfile::tempdir().unwrap();
    let live = StagingArea::create(root.path(), 1).unwrap();

    let report = sweep_orphaned_staging(root.path(), Duration::from_secs(3600)).unwrap();
    assert!(report.removed.is_empty());
    assert_eq!(report.skipped_recent, vec![live.path().to_path_buf()]);
    assert!(live.path().exists());
}

#[test]
fn sweep_of_missing_root_is_empty() {
    let root = tempfile::tempdir().unwrap();
    let report = sweep_orphaned_staging(&root.path().join("absent"), Duration::ZERO).unwrap();
    assert_eq!(report, SweepReport::default());
}

#[test]
fn purge_failure_is_reported_once_as_a_warning() {
    let root = tempfile::tempdir().unwrap();
    let mut area = StagingArea::create(root.path(), 1).unwrap();
    std::fs::remove_dir_all(area.path()).unwrap();

    let warning = area.purge().expect("warning for an unremovable area");
    assert_eq!(warning.dir, area.path());
    assert!(warning.to_string().contains("staging cleanup warning"), "{warning}");
    assert!(area.is_purged());
    assert!(area.purge().is_none(), "second purge is a no-op");
}

#[test]
fn sweep_also_reclaims_abandoned_browser_work_dirs() {
    let root = tempfile::tempdir().unwrap();
    let profile = root.path().join(format!("{BROWSER_WORK_PREFIX}abc123"));
    std::fs::create_dir_all(profile.join("profile")).unwrap();

    let report = sweep_orphaned_staging(root.path(), Duration::ZERO).unwrap();
    assert_eq!(report.removed, vec![profile.clone()]);
    assert!(!profile.exists());
}
