use crate::foundation::core::FrameIndex;
use crate::foundation::error::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;

/// Lifecycle event of one generation request.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GenerationEvent {
    /// Request validated and scheduled; the surface is about to open.
    GenerationStarted {
        /// Document identifier.
        document: String,
        /// Output width in pixels.
        width: u32,
        /// Output height in pixels.
        height: u32,
        /// Scheduled frame count.
        frame_count: u64,
        /// Frames per second.
        frame_rate: f64,
    },
    /// A frame was captured and persisted to the staging area.
    FrameCaptured {
        /// Schedule index.
        index: FrameIndex,
        /// Simulated document time of the frame.
        timestamp_ms: f64,
    },
    /// The encoder process is starting.
    EncodingStarted {
        /// Resolved encoder command line.
        command: String,
    },
    /// Best-effort encode progress in `0.0..=100.0`; non-decreasing within one encode.
    EncodingProgress {
        /// Percent complete.
        percent: f64,
    },
    /// The artifact is in place at its final path.
    GenerationCompleted {
        /// Final artifact path.
        artifact: PathBuf,
        /// Encoded frame count.
        frame_count: u64,
    },
    /// The request failed; no artifact was produced.
    GenerationFailed {
        /// Error category.
        kind: ErrorKind,
        /// Rendered error message.
        detail: String,
    },
    /// The staging directory could not be fully removed. Never fails the request.
    StagingCleanupWarning {
        /// Staging directory.
        dir: PathBuf,
        /// What went wrong.
        detail: String,
    },
}

/// Receiver of [`GenerationEvent`]s.
///
/// Events for one request are delivered from the orchestrator thread and from capture workers,
/// so implementations must be thread-safe. Observers must not block for long: captures wait on
/// them.
pub trait GenerationObserver: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: &GenerationEvent);
}

impl<F> GenerationObserver for F
where
    F: Fn(&GenerationEvent) + Send + Sync,
{
    fn on_event(&self, event: &GenerationEvent) {
        self(event)
    }
}

/// Observer that discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullObserver;

impl GenerationObserver for NullObserver {
    fn on_event(&self, _event: &GenerationEvent) {}
}

/// Observer that forwards events to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl GenerationObserver for TracingObserver {
    fn on_event(&self, event: &GenerationEvent) {
        match event {
            GenerationEvent::GenerationStarted {
                document,
                width,
                height,
                frame_count,
                frame_rate,
            } => tracing::info!(
                %document,
                width,
                height,
                frame_count,
                frame_rate,
                "generation started"
            ),
            GenerationEvent::FrameCaptured {
                index,
                timestamp_ms,
            } => tracing::trace!(index = index.0, timestamp_ms, "frame captured"),
            GenerationEvent::EncodingStarted { command } => {
                tracing::info!(%command, "encoding started")
            }
            GenerationEvent::EncodingProgress { percent } => {
                tracing::debug!(percent = format_args!("{percent:.1}"), "encoding")
            }
            GenerationEvent::GenerationCompleted {
                artifact,
                frame_count,
            } => tracing::info!(
                artifact = %artifact.display(),
                frame_count,
                "generation completed"
            ),
            GenerationEvent::GenerationFailed { kind, detail } => {
                tracing::error!(?kind, %detail, "generation failed")
            }
            GenerationEvent::StagingCleanupWarning { dir, detail } => {
                tracing::warn!(dir = %dir.display(), %detail, "staging cleanup warning")
            }
        }
    }
}

/// Observer that keeps every event in memory, in delivery order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<GenerationEvent>>,
}

impl RecordingObserver {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events.
    pub fn events(&self) -> Vec<GenerationEvent> {
        match self.events.lock() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl GenerationObserver for RecordingObserver {
    fn on_event(&self, event: &GenerationEvent) {
        let mut g = match self.events.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        g.push(event.clone());
    }
}

/// Fan events out to several observers in order.
pub struct Tee<'a>(pub &'a [&'a dyn GenerationObserver]);

impl GenerationObserver for Tee<'_> {
    fn on_event(&self, event: &GenerationEvent) {
        for o in self.0 {
            o.on_event(event);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/events.rs"]
mod tests;
