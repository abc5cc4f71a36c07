use crate::capture::staging::StagingArea;
use crate::config::CaptureConfig;
use crate::foundation::core::{CancelToken, FrameIndex};
use crate::foundation::error::{FramecastError, FramecastResult};
use crate::pipeline::events::{GenerationEvent, GenerationObserver};
use crate::schedule::FrameSchedule;
use crate::surface::engine::CaptureLane;
use crate::surface::session::SurfaceSession;
use rayon::prelude::*;
use std::path::PathBuf;
use std::time::Duration;

/// One staged frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameRecord {
    /// Schedule index.
    pub index: FrameIndex,
    /// Simulated document time the frame was captured at.
    pub timestamp_ms: f64,
    /// Location of the persisted PNG.
    pub path: PathBuf,
}

/// Drives a [`SurfaceSession`] through a [`FrameSchedule`] and stages every frame.
pub struct CaptureCoordinator<'a> {
    session: &'a SurfaceSession,
    staging: &'a StagingArea,
    config: &'a CaptureConfig,
    observer: &'a dyn GenerationObserver,
    cancel: &'a CancelToken,
}

impl<'a> CaptureCoordinator<'a> {
    /// Bind a coordinator to one request's session and staging area.
    pub fn new(
        session: &'a SurfaceSession,
        staging: &'a StagingArea,
        config: &'a CaptureConfig,
        observer: &'a dyn GenerationObserver,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            session,
            staging,
            config,
            observer,
            cancel,
        }
    }

    /// Captures in flight per batch: the configured batch size capped by the surface.
    pub fn effective_batch_size(&self) -> usize {
        self.config
            .batch_size
            .max(1)
            .min(self.session.max_concurrent_captures())
    }

    /// Capture every scheduled frame, batch by batch.
    ///
    /// Returns the records in schedule order. The first failing index of a batch fails the
    /// whole run; frames already staged stay in the staging area for the caller to purge.
    pub fn capture_all(&self, schedule: &FrameSchedule) -> FramecastResult<Vec<FrameRecord>> {
        self.config.validate()?;
        let batch = self.effective_batch_size();
        let total = schedule.len();
        let pool = build_thread_pool(pool_size(batch, total))?;
        let settle = self.config.settle();

        tracing::debug!(
            frames = total,
            batch,
            threads = pool.current_num_threads(),
            settle_ms = self.config.settle_ms,
            "capture started"
        );

        let entries: Vec<(FrameIndex, f64)> = schedule.iter().collect();
        let mut records = Vec::with_capacity(entries.len());
        for chunk in entries.chunks(batch) {
            self.cancel.check()?;

            let results = pool.install(|| {
                chunk
                    .par_iter()
                    .enumerate()
                    .map(|(slot, &(idx, t))| self.capture_one(CaptureLane(slot), idx, t, settle))
                    .collect::<Vec<_>>()
            });

            // Results are in schedule order, so the first error is the lowest failing index.
            for item in results {
                records.push(item?);
            }
            tracing::info!("captured {}/{}", records.len(), total);
        }

        verify_contiguous(&records, total)?;
        Ok(records)
    }

    fn capture_one(
        &self,
        lane: CaptureLane,
        idx: FrameIndex,
        timestamp_ms: f64,
        settle: Duration,
    ) -> FramecastResult<FrameRecord> {
        self.cancel.check()?;
        let fail = |e: FramecastError| FramecastError::capture(idx.0, e.to_string());

        self.session.advance_to(lane, timestamp_ms).map_err(fail)?;
        if !settle.is_zero() {
            std::thread::sleep(settle);
        }
        let img = self.session.capture_still(lane).map_err(fail)?;
        let path = self.staging.write_frame(idx, &img).map_err(fail)?;
        drop(img);

        self.observer.on_event(&GenerationEvent::FrameCaptured {
            index: idx,
            timestamp_ms,
        });
        Ok(FrameRecord {
            index: idx,
            timestamp_ms,
            path,
        })
    }
}

/// Check that `records` cover `[0, expected)` in order with no gaps or duplicates.
pub fn verify_contiguous(records: &[FrameRecord], expected: u64) -> FramecastResult<()> {
    if records.len() as u64 != expected {
        return Err(FramecastError::Other(anyhow::anyhow!(
            "internal error: {} frame records for a schedule of {expected}",
            records.len()
        )));
    }
    for (i, r) in records.iter().enumerate() {
        if r.index.0 != i as u64 {
            return Err(FramecastError::Other(anyhow::anyhow!(
                "internal error: frame record {i} carries index {}",
                r.index
            )));
        }
    }
    Ok(())
}

/// Workers needed for `frames` captures in batches of `batch`.
fn pool_size(batch: usize, frames: u64) -> usize {
    let frames = usize::try_from(frames).unwrap_or(usize::MAX);
    batch.min(frames).max(1)
}

fn build_thread_pool(threads: usize) -> FramecastResult<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("framecast-capture-{i}"))
        .build()
        .map_err(|e| {
            FramecastError::Other(anyhow::anyhow!("failed to build capture thread pool: {e}"))
        })
}

#[cfg(test)]
#[path = "../../tests/unit/capture/coordinator.rs"]
mod tests;
