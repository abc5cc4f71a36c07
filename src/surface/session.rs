use crate::foundation::error::{FramecastError, FramecastResult};
use crate::surface::engine::{CaptureLane, RenderEngine, Surface, SurfaceSpec};
use std::time::{Duration, Instant};

/// One rendering surface, owned by exactly one generation request.
///
/// The session is opened once, closed once: [`SurfaceSession::close`] is idempotent and `Drop`
/// closes a session the caller forgot about.
pub struct SurfaceSession {
    spec: SurfaceSpec,
    engine_name: String,
    surface: Option<Box<dyn Surface>>,
}

impl SurfaceSession {
    /// Open `spec` on `engine` and wait (bounded by `load_timeout`) for the document to load.
    pub fn open(
        engine: &dyn RenderEngine,
        spec: SurfaceSpec,
        load_timeout: Duration,
    ) -> FramecastResult<Self> {
        spec.validate()?;
        if load_timeout.is_zero() {
            return Err(FramecastError::validation("load timeout must be non-zero"));
        }

        let started = Instant::now();
        let surface = engine.open_surface(&spec, load_timeout)?;
        tracing::debug!(
            engine = engine.name(),
            document = %spec.source,
            width = spec.width,
            height = spec.height,
            scale = spec.device_scale_factor,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "surface session opened"
        );

        Ok(Self {
            spec,
            engine_name: engine.name().to_string(),
            surface: Some(surface),
        })
    }

    /// Geometry this session was opened with.
    pub fn spec(&self) -> &SurfaceSpec {
        &self.spec
    }

    /// Return `true` until [`SurfaceSession::close`] ran.
    pub fn is_open(&self) -> bool {
        self.surface.is_some()
    }

    /// Upper bound on concurrent captures (engines without concurrent capture report 1).
    pub fn max_concurrent_captures(&self) -> usize {
        self.surface
            .as_ref()
            .map(|s| s.max_concurrent_captures().max(1))
            .unwrap_or(1)
    }

    /// Pin simulated document time for the next capture on `lane`.
    pub fn advance_to(&self, lane: CaptureLane, timestamp_ms: f64) -> FramecastResult<()> {
        self.live()?.advance_to(lane, timestamp_ms)
    }

    /// Capture the viewport at the lane's simulated time.
    pub fn capture_still(&self, lane: CaptureLane) -> FramecastResult<image::RgbaImage> {
        let img = self.live()?.capture_still(lane)?;
        if img.width() != self.spec.width || img.height() != self.spec.height {
            return Err(FramecastError::validation(format!(
                "engine returned a {}x{} capture for a {}x{} viewport",
                img.width(),
                img.height(),
                self.spec.width,
                self.spec.height
            )));
        }
        Ok(img)
    }

    /// Close the surface. Safe to call more than once.
    pub fn close(&mut self) -> FramecastResult<()> {
        let Some(mut surface) = self.surface.take() else {
            return Ok(());
        };
        surface.close()?;
        tracing::debug!(engine = %self.engine_name, document = %self.spec.source, "surface session closed");
        Ok(())
    }

    fn live(&self) -> FramecastResult<&dyn Surface> {
        self.surface
            .as_deref()
            .ok_or_else(|| FramecastError::validation("surface session is already closed"))
    }
}

impl Drop for SurfaceSession {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "failed to close surface session");
        }
    }
}

impl std::fmt::Debug for SurfaceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceSession")
            .field("engine", &self.engine_name)
            .field("spec", &self.spec)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/surface/session.rs"]
mod tests;
