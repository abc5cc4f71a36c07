use super::*;
use crate::foundation::core::DocumentSource;
use crate::surface::engine::LaneClock;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
struct Counters {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

struct FlatEngine {
    counters: Arc<Counters>,
    wrong_size: bool,
}

struct FlatSurface {
    counters: Arc<Counters>,
    clock: LaneClock,
    size: (u32, u32),
}

impl RenderEngine for FlatEngine {
    fn name(&self) -> &str {
        "flat"
    }

    fn open_surface(
        &self,
        spec: &SurfaceSpec,
        _load_timeout: Duration,
    ) -> FramecastResult<Box<dyn Surface>> {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        let size = if self.wrong_size {
            (spec.width + 1, spec.height)
        } else {
            (spec.width, spec.height)
        };
        Ok(Box::new(FlatSurface {
            counters: self.counters.clone(),
            clock: LaneClock::new(),
            size,
        }))
    }
}

impl Surface for FlatSurface {
    fn max_concurrent_captures(&self) -> usize {
        0
    }

    fn advance_to(&self, lane: CaptureLane, timestamp_ms: f64) -> FramecastResult<()> {
        self.clock.set(lane, timestamp_ms)
    }

    fn capture_still(&self, lane: CaptureLane) -> FramecastResult<image::RgbaImage> {
        let t = self.clock.get(lane)?;
        let shade = (t as u32 % 256) as u8;
        Ok(image::RgbaImage::from_pixel(
            self.size.0,
            self.size.1,
            image::Rgba([shade, shade, shade, 255]),
        ))
    }

    fn close(&mut self) -> FramecastResult<()> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn spec() -> SurfaceSpec {
    SurfaceSpec {
        source: DocumentSource::File(PathBuf::from("doc.svg")),
        width: 4,
        height: 2,
        device_scale_factor: 2.0,
    }
}

#[test]
fn close_is_idempotent_and_drop_does_not_double_close() {
    let counters = Arc::new(Counters::default());
    let engine = FlatEngine {
        counters: counters.clone(),
        wrong_size: false,
    };
    let mut session = SurfaceSession::open(&engine, spec(), Duration::from_secs(1)).unwrap();
    assert!(session.is_open());
    session.close().unwrap();
    session.close().unwrap();
    assert!(!session.is_open());
    drop(session);
    assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
    assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
}

#[test]
fn drop_closes_open_session() {
    let counters = Arc::new(Counters::default());
    let engine = FlatEngine {
        counters: counters.clone(),
        wrong_size: false,
    };
    {
        let _session = SurfaceSession::open(&engine, spec(), Duration::from_secs(1)).unwrap();
    }
    assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
}

#[test]
fn capture_reflects_advanced_time_per_lane() {
    let engine = FlatEngine {
        counters: Arc::new(Counters::default()),
        wrong_size: false,
    };
    let session = SurfaceSession::open(&engine, spec(), Duration::from_secs(1)).unwrap();
    session.advance_to(CaptureLane(0), 10.0).unwrap();
    session.advance_to(CaptureLane(1), 20.0).unwrap();
    assert_eq!(session.capture_still(CaptureLane(1)).unwrap().get_pixel(0, 0)[0], 20);
    assert_eq!(session.capture_still(CaptureLane(0)).unwrap().get_pixel(0, 0)[0], 10);
}

#[test]
fn zero_concurrency_is_clamped_to_one() {
    let engine = FlatEngine {
        counters: Arc::new(Counters::default()),
        wrong_size: false,
    };
    let session = SurfaceSession::open(&engine, spec(), Duration::from_secs(1)).unwrap();
    assert_eq!(session.max_concurrent_captures(), 1);
}

#[test]
fn wrong_capture_size_is_rejected() {
    let engine = FlatEngine {
        counters: Arc::new(Counters::default()),
        wrong_size: true,
    };
    let session = SurfaceSession::open(&engine, spec(), Duration::from_secs(1)).unwrap();
    session.advance_to(CaptureLane(0), 0.0).unwrap();
    assert!(session.capture_still(CaptureLane(0)).is_err());
}

#[test]
fn closed_session_refuses_captures() {
    let engine = FlatEngine {
        counters: Arc::new(Counters::default()),
        wrong_size: false,
    };
    let mut session = SurfaceSession::open(&engine, spec(), Duration::from_secs(1)).unwrap();
    session.close().unwrap();
    assert!(session.advance_to(CaptureLane(0), 0.0).is_err());
}

#[test]
fn invalid_spec_never_reaches_engine() {
    let counters = Arc::new(Counters::default());
    let engine = FlatEngine {
        counters: counters.clone(),
        wrong_size: false,
    };
    let mut bad = spec();
    bad.width = 0;
    assert!(SurfaceSession::open(&engine, bad, Duration::from_secs(1)).is_err());
    assert!(SurfaceSession::open(&engine, spec(), Duration::ZERO).is_err());
    assert_eq!(counters.opened.load(Ordering::SeqCst), 0);
}
