use std::time::Duration;

/// Result alias used across the crate.
pub type FramecastResult<T> = Result<T, FramecastError>;

/// Errors that abort a single generation request.
///
/// A failure never leaks into other requests: every variant describes the request it was raised
/// for, and the orchestrator releases that request's resources before surfacing it.
#[derive(thiserror::Error, Debug)]
pub enum FramecastError {
    /// Duration or frame rate rejected by the frame scheduler.
    #[error("invalid schedule parameters: {0}")]
    InvalidScheduleParameters(String),

    /// Any other request or configuration value that fails validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// The document did not report itself loaded within the bounded wait.
    #[error("document '{document}' did not finish loading within {}ms", .timeout.as_millis())]
    DocumentLoadTimeout {
        /// Document identifier as given by the caller.
        document: String,
        /// The wait that elapsed.
        timeout: Duration,
    },

    /// The document could not be loaded at all (missing file, parse error, engine crash).
    #[error("document '{document}' failed to load: {reason}")]
    DocumentLoadFailed {
        /// Document identifier as given by the caller.
        document: String,
        /// Engine diagnostic.
        reason: String,
    },

    /// Capturing or persisting the frame at `index` failed.
    #[error("frame capture failed at index {index}: {reason}")]
    FrameCaptureFailed {
        /// Schedule index of the failed frame.
        index: u64,
        /// Engine or I/O diagnostic.
        reason: String,
    },

    /// The encoder exited unsuccessfully; `diagnostic` carries its raw stderr.
    #[error("encoding failed: {diagnostic}")]
    EncodingFailed {
        /// Raw encoder diagnostic output.
        diagnostic: String,
    },

    /// The caller cancelled the request.
    #[error("generation cancelled")]
    Cancelled,

    /// I/O and other plumbing errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse error classification reported in lifecycle events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`FramecastError::InvalidScheduleParameters`].
    InvalidScheduleParameters,
    /// See [`FramecastError::Validation`].
    Validation,
    /// See [`FramecastError::DocumentLoadTimeout`].
    DocumentLoadTimeout,
    /// See [`FramecastError::DocumentLoadFailed`].
    DocumentLoadFailed,
    /// See [`FramecastError::FrameCaptureFailed`].
    FrameCaptureFailed,
    /// See [`FramecastError::EncodingFailed`].
    EncodingFailed,
    /// See [`FramecastError::Cancelled`].
    Cancelled,
    /// See [`FramecastError::Other`].
    Other,
}

impl FramecastError {
    /// Build an [`FramecastError::InvalidScheduleParameters`].
    pub fn schedule(msg: impl Into<String>) -> Self {
        Self::InvalidScheduleParameters(msg.into())
    }

    /// Build a [`FramecastError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`FramecastError::DocumentLoadFailed`].
    pub fn load_failed(document: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DocumentLoadFailed {
            document: document.into(),
            reason: reason.into(),
        }
    }

    /// Build a [`FramecastError::FrameCaptureFailed`].
    pub fn capture(index: u64, reason: impl Into<String>) -> Self {
        Self::FrameCaptureFailed {
            index,
            reason: reason.into(),
        }
    }

    /// Build a [`FramecastError::EncodingFailed`].
    pub fn encoding(diagnostic: impl Into<String>) -> Self {
        Self::EncodingFailed {
            diagnostic: diagnostic.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidScheduleParameters(_) => ErrorKind::InvalidScheduleParameters,
            Self::Validation(_) => ErrorKind::Validation,
            Self::DocumentLoadTimeout { .. } => ErrorKind::DocumentLoadTimeout,
            Self::DocumentLoadFailed { .. } => ErrorKind::DocumentLoadFailed,
            Self::FrameCaptureFailed { .. } => ErrorKind::FrameCaptureFailed,
            Self::EncodingFailed { .. } => ErrorKind::EncodingFailed,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Other(_) => ErrorKind::Other,
        }
    }
}

/// Best-effort staging cleanup failure.
///
/// Logged and reported, never escalated: the artifact may already exist when cleanup fails.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("staging cleanup warning for '{}': {detail}", .dir.display())]
pub struct StagingCleanupWarning {
    /// Staging directory that could not be fully removed.
    pub dir: std::path::PathBuf,
    /// I/O diagnostic.
    pub detail: String,
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
