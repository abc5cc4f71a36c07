use super::*;
use crate::foundation::core::DocumentSource;

#[cfg(unix)]
fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt as _;
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A stand-in browser that copies a fixture PNG to the `--screenshot=` target and logs its
/// arguments, one invocation per line.
#[cfg(unix)]
fn fake_chrome(dir: &Path, fixture_w: u32, fixture_h: u32) -> (PathBuf, PathBuf) {
    let fixture = dir.join("fixture.png");
    image::RgbaImage::from_pixel(fixture_w, fixture_h, image::Rgba([0, 200, 0, 255]))
        .save(&fixture)
        .unwrap();
    let log = dir.join("args.log");
    let script = format!(
        "#!/bin/sh\necho \"$@\" >> '{log}'\nfor a in \"$@\"; do\n  case \"$a\" in\n    --screenshot=*) cp '{fixture}' \"${{a#--screenshot=}}\" ;;\n  esac\ndone\n",
        log = log.display(),
        fixture = fixture.display(),
    );
    (write_script(dir, "fake-chrome", &script), log)
}

fn doc(dir: &Path) -> PathBuf {
    let p = dir.join("doc.html");
    std::fs::write(&p, "<html><body>hi</body></html>").unwrap();
    p
}

fn spec(path: &Path) -> SurfaceSpec {
    SurfaceSpec {
        source: DocumentSource::File(path.to_path_buf()),
        width: 6,
        height: 4,
        device_scale_factor: 2.0,
    }
}

fn engine(binary: PathBuf) -> ChromeEngine {
    ChromeEngine::new(ChromeConfig {
        binary: Some(binary),
        capture_timeout_ms: 10_000,
        extra_args: vec!["--lang=en-US".to_string()],
    })
    .unwrap()
}

#[cfg(unix)]
#[test]
fn capture_passes_geometry_and_virtual_time() {
    let dir = tempfile::tempdir().unwrap();
    let (bin, log) = fake_chrome(dir.path(), 12, 8);
    let surface = engine(bin)
        .open_surface(&spec(&doc(dir.path())), Duration::from_secs(10))
        .unwrap();

    surface.advance_to(CaptureLane(0), 500.4).unwrap();
    let img = surface.capture_still(CaptureLane(0)).unwrap();
    assert_eq!(img.dimensions(), (6, 4));
    assert!((195..=205).contains(&img.get_pixel(3, 2)[1]));

    let log = std::fs::read_to_string(log).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 2, "probe load + one capture");
    assert!(!lines[0].contains("--virtual-time-budget"));
    assert!(lines[1].contains("--virtual-time-budget=500"));
    for line in &lines {
        assert!(line.contains("--window-size=6,4"));
        assert!(line.contains("--force-device-scale-factor=2"));
        assert!(line.contains("--headless=new"));
        assert!(line.contains("--lang=en-US"));
        assert!(line.contains("file://"));
    }
}

#[cfg(unix)]
#[test]
fn slow_probe_load_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let bin = write_script(dir.path(), "slow-chrome", "#!/bin/sh\nsleep 5\n");
    let err = engine(bin)
        .open_surface(&spec(&doc(dir.path())), Duration::from_millis(200))
        .err()
        .unwrap();
    assert!(matches!(err, FramecastError::DocumentLoadTimeout { .. }));
}

#[cfg(unix)]
#[test]
fn failing_browser_reports_load_failure_with_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let bin = write_script(
        dir.path(),
        "broken-chrome",
        "#!/bin/sh\necho 'net::ERR_FILE_NOT_FOUND' >&2\nexit 3\n",
    );
    let err = engine(bin)
        .open_surface(&spec(&doc(dir.path())), Duration::from_secs(10))
        .err()
        .unwrap();
    match err {
        FramecastError::DocumentLoadFailed { reason, .. } => {
            assert!(reason.contains("ERR_FILE_NOT_FOUND"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_document_fails_before_spawning() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path().join("never-run"));
    let err = engine
        .open_surface(&spec(&dir.path().join("nope.html")), Duration::from_secs(1))
        .err()
        .unwrap();
    assert!(matches!(err, FramecastError::DocumentLoadFailed { .. }));
}

#[test]
fn zero_capture_timeout_is_rejected() {
    assert!(
        ChromeEngine::new(ChromeConfig {
            binary: Some(PathBuf::from("chromium")),
            capture_timeout_ms: 0,
            extra_args: vec![],
        })
        .is_err()
    );
}

#[cfg(unix)]
#[test]
fn work_directories_live_under_the_work_root_and_are_removed() {
    let dir = tempfile::tempdir().unwrap();
    let (bin, log) = fake_chrome(dir.path(), 12, 8);
    let work_root = dir.path().join("staging");
    let engine = engine(bin).with_work_root(&work_root);
    assert_eq!(engine.work_root(), work_root);

    let surface = engine
        .open_surface(&spec(&doc(dir.path())), Duration::from_secs(10))
        .unwrap();
    surface.advance_to(CaptureLane(0), 40.0).unwrap();
    surface.capture_still(CaptureLane(0)).unwrap();

    let log = std::fs::read_to_string(log).unwrap();
    let profile = format!(
        "--user-data-dir={}",
        work_root.join(BROWSER_WORK_PREFIX).display()
    );
    assert!(log.lines().all(|l| l.contains(&profile)), "{log}");
    assert_eq!(std::fs::read_dir(&work_root).unwrap().count(), 0);
}
