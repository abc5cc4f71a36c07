use super::*;
use crate::foundation::core::FrameIndex;

fn job(dir: &std::path::Path, count: u64) -> AssemblyJob {
    AssemblyJob {
        frames_dir: dir.to_path_buf(),
        naming: FrameNaming::for_count(count),
        frame_count: count,
        shape: AssemblyShape {
            width: 4,
            height: 4,
            frame_rate: 30.0,
        },
        output: dir.join("out.mp4"),
    }
}

fn touch(dir: &std::path::Path, naming: FrameNaming, idx: u64) {
    std::fs::write(dir.join(naming.file_name(FrameIndex(idx))), b"png").unwrap();
}

#[test]
fn contiguous_sequence_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let j = job(dir.path(), 3);
    for i in 0..3 {
        touch(dir.path(), j.naming, i);
    }
    j.verify_sequence().unwrap();
}

#[test]
fn gaps_and_missing_frames_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let j = job(dir.path(), 3);
    touch(dir.path(), j.naming, 0);
    touch(dir.path(), j.naming, 2);
    let err = j.verify_sequence().unwrap_err();
    assert!(matches!(err, FramecastError::EncodingFailed { .. }));

    touch(dir.path(), j.naming, 3);
    let err = j.verify_sequence().unwrap_err();
    assert!(err.to_string().contains("gap"), "{err}");
}

#[test]
fn duration_follows_frame_count() {
    let dir = tempfile::tempdir().unwrap();
    let mut j = job(dir.path(), 450);
    assert!((j.duration_secs() - 15.0).abs() < 1e-9);
    j.shape.frame_rate = 24.0;
    j.frame_count = 12;
    assert!((j.duration_secs() - 0.5).abs() < 1e-9);
}
