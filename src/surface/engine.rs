use crate::foundation::core::DocumentSource;
use crate::foundation::error::{FramecastError, FramecastResult};
use std::sync::Mutex;
use std::time::Duration;

/// Geometry and document of one rendering surface.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceSpec {
    /// Document to load.
    pub source: DocumentSource,
    /// Viewport width in CSS pixels; also the width of every capture.
    pub width: u32,
    /// Viewport height in CSS pixels; also the height of every capture.
    pub height: u32,
    /// Internal sampling multiplier relative to `width`/`height`.
    pub device_scale_factor: f64,
}

impl SurfaceSpec {
    /// Reject zero-sized or non-finite geometry.
    pub fn validate(&self) -> FramecastResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(FramecastError::validation(
                "surface width/height must be non-zero",
            ));
        }
        if !self.device_scale_factor.is_finite() || self.device_scale_factor <= 0.0 {
            return Err(FramecastError::validation(format!(
                "device scale factor must be a finite number > 0 (got {})",
                self.device_scale_factor
            )));
        }
        Ok(())
    }

    /// Pixel size of the scaled surface the engine samples from.
    pub fn scaled_size(&self) -> (u32, u32) {
        let sw = ((self.width as f64) * self.device_scale_factor).round().max(1.0) as u32;
        let sh = ((self.height as f64) * self.device_scale_factor).round().max(1.0) as u32;
        (sw, sh)
    }
}

/// One concurrency slot within a capture batch.
///
/// Captures issued on different lanes never observe each other's simulated time. A lane is reused
/// only after the batch that used it has fully drained.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CaptureLane(pub usize);

/// External rendering engine: turns a document reference into a live [`Surface`].
///
/// Engines are explicitly owned handles; each generation request opens its own surface so
/// concurrent requests stay isolated.
pub trait RenderEngine: Send + Sync {
    /// Short engine name used in logs.
    fn name(&self) -> &str;

    /// Load `spec.source` into a surface of `spec.width x spec.height`, blocking until the
    /// document reports itself loaded or `load_timeout` elapses.
    fn open_surface(
        &self,
        spec: &SurfaceSpec,
        load_timeout: Duration,
    ) -> FramecastResult<Box<dyn Surface>>;
}

/// A loaded document that can be driven through simulated time and captured.
///
/// Ordering contract: for a given lane, `advance_to` is called before the `capture_still` it
/// applies to, and both run on the same thread.
pub trait Surface: Send + Sync {
    /// Upper bound on captures this surface can run at once. `1` serializes capture batches.
    fn max_concurrent_captures(&self) -> usize {
        usize::MAX
    }

    /// Treat document-relative time as `timestamp_ms` for the next capture on `lane`.
    fn advance_to(&self, lane: CaptureLane, timestamp_ms: f64) -> FramecastResult<()>;

    /// Snapshot exactly `(0,0)-(width,height)` at the lane's current simulated time.
    ///
    /// The returned image is straight-alpha RGBA8 sized to the nominal (unscaled) viewport.
    fn capture_still(&self, lane: CaptureLane) -> FramecastResult<image::RgbaImage>;

    /// Release engine resources. Called at most once by [`crate::SurfaceSession`].
    fn close(&mut self) -> FramecastResult<()>;
}

/// Per-lane simulated clock shared by engine implementations.
#[derive(Debug, Default)]
pub struct LaneClock {
    lanes: Mutex<Vec<Option<f64>>>,
}

impl LaneClock {
    /// Create an empty clock; lanes are allocated on first use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `timestamp_ms` as the lane's current time.
    pub fn set(&self, lane: CaptureLane, timestamp_ms: f64) -> FramecastResult<()> {
        if !timestamp_ms.is_finite() || timestamp_ms < 0.0 {
            return Err(FramecastError::validation(format!(
                "simulated timestamp must be finite and >= 0 (got {timestamp_ms})"
            )));
        }
        let mut lanes = self.lanes.lock().map_err(|_| poisoned())?;
        if lanes.len() <= lane.0 {
            lanes.resize(lane.0 + 1, None);
        }
        lanes[lane.0] = Some(timestamp_ms);
        Ok(())
    }

    /// Current time of `lane`; fails when the lane was never advanced.
    pub fn get(&self, lane: CaptureLane) -> FramecastResult<f64> {
        let lanes = self.lanes.lock().map_err(|_| poisoned())?;
        lanes.get(lane.0).copied().flatten().ok_or_else(|| {
            FramecastError::validation(format!(
                "capture on lane {} before any advance_to",
                lane.0
            ))
        })
    }
}

fn poisoned() -> FramecastError {
    FramecastError::Other(anyhow::anyhow!("lane clock mutex poisoned"))
}

/// Crop `(0,0)-(scaled w,h)` out of an engine capture and downsample it to the nominal viewport.
pub fn fit_to_viewport(
    img: image::RgbaImage,
    spec: &SurfaceSpec,
) -> FramecastResult<image::RgbaImage> {
    let (sw, sh) = spec.scaled_size();
    if img.width() < sw || img.height() < sh {
        return Err(FramecastError::validation(format!(
            "engine capture {}x{} is smaller than the scaled viewport {sw}x{sh}",
            img.width(),
            img.height()
        )));
    }

    let cropped = if img.width() == sw && img.height() == sh {
        img
    } else {
        image::imageops::crop_imm(&img, 0, 0, sw, sh).to_image()
    };

    if sw == spec.width && sh == spec.height {
        return Ok(cropped);
    }
    Ok(image::imageops::resize(
        &cropped,
        spec.width,
        spec.height,
        image::imageops::FilterType::Lanczos3,
    ))
}

#[cfg(test)]
#[path = "../../tests/unit/surface/engine.rs"]
mod tests;
