use crate::encode::assembler::AssemblyShape;
use crate::foundation::core::DocumentSource;
use crate::foundation::error::{FramecastError, FramecastResult};
use crate::schedule::FrameSchedule;
use crate::surface::engine::SurfaceSpec;
use std::path::Path;

/// Default internal sampling multiplier.
pub const DEFAULT_DEVICE_SCALE_FACTOR: f64 = 2.0;

fn default_device_scale_factor() -> f64 {
    DEFAULT_DEVICE_SCALE_FACTOR
}

/// One document-to-video request.
///
/// ```json
/// { "source": "site/index.html", "width": 1080, "height": 1920,
///   "duration_ms": 15000, "frame_rate": 30 }
/// ```
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationRequest {
    /// Document to render: a filesystem path or a URL.
    pub source: DocumentSource,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Length of document time to capture.
    pub duration_ms: u64,
    /// Frames per second.
    pub frame_rate: f64,
    /// Internal sampling multiplier; captures are downsampled to `width x height`.
    #[serde(default = "default_device_scale_factor")]
    pub device_scale_factor: f64,
}

impl GenerationRequest {
    /// Request with the default device scale factor.
    pub fn new(
        source: DocumentSource,
        width: u32,
        height: u32,
        duration_ms: u64,
        frame_rate: f64,
    ) -> Self {
        Self {
            source,
            width,
            height,
            duration_ms,
            frame_rate,
            device_scale_factor: DEFAULT_DEVICE_SCALE_FACTOR,
        }
    }

    /// Override the device scale factor.
    pub fn with_device_scale_factor(mut self, device_scale_factor: f64) -> Self {
        self.device_scale_factor = device_scale_factor;
        self
    }

    /// Read a request from a JSON file.
    pub fn from_json_file(path: &Path) -> FramecastResult<Self> {
        use anyhow::Context as _;
        let f = std::fs::File::open(path)
            .with_context(|| format!("open request '{}'", path.display()))?;
        let req = serde_json::from_reader(std::io::BufReader::new(f))
            .with_context(|| format!("parse request '{}'", path.display()))?;
        Ok(req)
    }

    /// Check geometry; timing is checked by [`GenerationRequest::schedule`].
    pub fn validate(&self) -> FramecastResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(FramecastError::validation(format!(
                "output width/height must be non-zero (got {}x{})",
                self.width, self.height
            )));
        }
        self.surface_spec().validate()
    }

    /// Capture timestamps for this request.
    pub fn schedule(&self) -> FramecastResult<FrameSchedule> {
        FrameSchedule::new(self.duration_ms, self.frame_rate)
    }

    /// Surface geometry for this request.
    pub fn surface_spec(&self) -> SurfaceSpec {
        SurfaceSpec {
            source: self.source.clone(),
            width: self.width,
            height: self.height,
            device_scale_factor: self.device_scale_factor,
        }
    }

    /// Output geometry handed to the assembler.
    pub fn assembly_shape(&self) -> AssemblyShape {
        AssemblyShape {
            width: self.width,
            height: self.height,
            frame_rate: self.frame_rate,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/request.rs"]
mod tests;
