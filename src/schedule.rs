use crate::foundation::core::FrameIndex;
use crate::foundation::error::{FramecastError, FramecastResult};

/// Largest schedule a single request may ask for (about 3.8 days at 30 fps).
pub const MAX_FRAMES: u64 = 10_000_000;

/// Ordered capture timestamps for one `(duration, frame rate)` pair.
///
/// `timestamp[i] = i * 1000 / frame_rate` milliseconds, `len = ceil(duration * frame_rate / 1000)`.
/// Construction is pure: identical inputs always yield an identical schedule.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct FrameSchedule {
    duration_ms: u64,
    frame_rate: f64,
    timestamps_ms: Vec<f64>,
}

impl FrameSchedule {
    /// Compute the schedule, rejecting non-positive inputs.
    pub fn new(duration_ms: u64, frame_rate: f64) -> FramecastResult<Self> {
        if duration_ms == 0 {
            return Err(FramecastError::schedule("duration must be > 0 ms"));
        }
        if !frame_rate.is_finite() || frame_rate <= 0.0 {
            return Err(FramecastError::schedule(format!(
                "frame rate must be a finite number > 0 (got {frame_rate})"
            )));
        }

        let count = frame_count(duration_ms, frame_rate).ok_or_else(|| {
            FramecastError::schedule(format!(
                "{duration_ms}ms at {frame_rate} fps exceeds the maximum of {MAX_FRAMES} frames"
            ))
        })?;
        if count == 0 {
            return Err(FramecastError::schedule(
                "duration and frame rate produce an empty schedule",
            ));
        }

        let timestamps_ms = (0..count)
            .map(|i| (i as f64) * 1000.0 / frame_rate)
            .collect();
        Ok(Self {
            duration_ms,
            frame_rate,
            timestamps_ms,
        })
    }

    /// Number of frames.
    pub fn len(&self) -> u64 {
        self.timestamps_ms.len() as u64
    }

    /// Always `false`: construction rejects empty schedules.
    pub fn is_empty(&self) -> bool {
        self.timestamps_ms.is_empty()
    }

    /// Requested duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Frames per second.
    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    /// Spacing between consecutive timestamps.
    pub fn interval_ms(&self) -> f64 {
        1000.0 / self.frame_rate
    }

    /// Length of the encoded video: `len / frame_rate` seconds.
    pub fn duration_secs(&self) -> f64 {
        self.len() as f64 / self.frame_rate
    }

    /// Timestamp of frame `idx`, if it is part of the schedule.
    pub fn timestamp(&self, idx: FrameIndex) -> Option<f64> {
        usize::try_from(idx.0)
            .ok()
            .and_then(|i| self.timestamps_ms.get(i).copied())
    }

    /// All timestamps in schedule order.
    pub fn timestamps_ms(&self) -> &[f64] {
        &self.timestamps_ms
    }

    /// Iterate `(index, timestamp)` pairs in schedule order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (FrameIndex, f64)> + '_ {
        self.timestamps_ms
            .iter()
            .enumerate()
            .map(|(i, &t)| (FrameIndex(i as u64), t))
    }
}

/// `None` when the count is not finite or above [`MAX_FRAMES`].
fn frame_count(duration_ms: u64, frame_rate: f64) -> Option<u64> {
    let exact = (duration_ms as f64) * frame_rate / 1000.0;
    if !exact.is_finite() || exact > MAX_FRAMES as f64 {
        return None;
    }
    // Float noise on an exact product must not add a frame.
    let nearest = exact.round();
    let count = if (exact - nearest).abs() < 1e-9 {
        nearest
    } else {
        exact.ceil()
    };
    Some(count as u64)
}

#[cfg(test)]
#[path = "../tests/unit/schedule.rs"]
mod tests;
