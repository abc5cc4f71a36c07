use crate::capture::staging::{FrameNaming, staged_indices_in};
use crate::foundation::core::CancelToken;
use crate::foundation::error::{FramecastError, FramecastResult};
use crate::pipeline::events::GenerationObserver;
use std::path::PathBuf;

/// Output geometry an assembler is asked to accept before any capture work starts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AssemblyShape {
    /// Video width in pixels.
    pub width: u32,
    /// Video height in pixels.
    pub height: u32,
    /// Frames per second.
    pub frame_rate: f64,
}

/// A complete staged frame sequence ready to be encoded.
#[derive(Clone, Debug, PartialEq)]
pub struct AssemblyJob {
    /// Directory holding the staged frames.
    pub frames_dir: PathBuf,
    /// File naming of the staged frames.
    pub naming: FrameNaming,
    /// Number of frames; the sequence is `0..frame_count`.
    pub frame_count: u64,
    /// Geometry and rate.
    pub shape: AssemblyShape,
    /// Where the encoded artifact is written.
    pub output: PathBuf,
}

impl AssemblyJob {
    /// Fail unless the staged files are exactly indices `0..frame_count`.
    pub fn verify_sequence(&self) -> FramecastResult<()> {
        let staged = staged_indices_in(&self.frames_dir, self.naming)?;
        if staged.len() as u64 != self.frame_count {
            return Err(FramecastError::encoding(format!(
                "expected {} staged frames in '{}', found {}",
                self.frame_count,
                self.frames_dir.display(),
                staged.len()
            )));
        }
        if let Some((expected, found)) = staged
            .iter()
            .enumerate()
            .find(|(i, idx)| idx.0 != *i as u64)
        {
            return Err(FramecastError::encoding(format!(
                "staged frame sequence has a gap: expected index {expected}, found {found}"
            )));
        }
        Ok(())
    }

    /// Length of the encoded video in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.frame_count as f64 / self.shape.frame_rate
    }
}

/// Turns a staged frame sequence into a single video artifact.
pub trait Assembler: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    /// Reject outputs this assembler cannot produce. Runs before any surface is opened.
    fn check(&self, shape: &AssemblyShape) -> FramecastResult<()>;

    /// Encode `job`, reporting `EncodingStarted` and best-effort `EncodingProgress` events.
    fn assemble(
        &self,
        job: &AssemblyJob,
        observer: &dyn GenerationObserver,
        cancel: &CancelToken,
    ) -> FramecastResult<()>;
}

#[cfg(test)]
#[path = "../../tests/unit/encode/assembler.rs"]
mod tests;
