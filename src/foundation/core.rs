use crate::foundation::error::{FramecastError, FramecastResult};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Absolute 0-based frame index in schedule order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

impl fmt::Display for FrameIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a document is loaded from.
///
/// Parsed from a caller-supplied identifier: anything with a `scheme://` prefix is a URL, all
/// other identifiers are filesystem paths.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DocumentSource {
    /// Local file (relative paths resolve against the current directory).
    File(PathBuf),
    /// Absolute URL understood by the rendering engine.
    Url(String),
}

impl DocumentSource {
    /// Parse a document identifier.
    pub fn parse(id: &str) -> FramecastResult<Self> {
        let id = id.trim();
        if id.is_empty() {
            return Err(FramecastError::validation(
                "document identifier must be non-empty",
            ));
        }

        if let Some((scheme, _)) = id.split_once("://")
            && !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        {
            let url = url::Url::parse(id).map_err(|e| {
                FramecastError::validation(format!("invalid document url '{id}': {e}"))
            })?;
            if url.scheme() == "file" {
                let path = url.to_file_path().map_err(|_| {
                    FramecastError::validation(format!("file url '{id}' has no local path"))
                })?;
                return Ok(Self::File(path));
            }
            return Ok(Self::Url(url.into()));
        }

        Ok(Self::File(PathBuf::from(id)))
    }

    /// Local path backing this source, if any.
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            Self::File(p) => Some(p),
            Self::Url(_) => None,
        }
    }

    /// Resolve to a URL a browser-like engine can navigate to.
    pub fn to_url(&self) -> FramecastResult<url::Url> {
        match self {
            Self::File(p) => {
                let abs = std::path::absolute(p).map_err(|e| {
                    FramecastError::load_failed(
                        p.display().to_string(),
                        format!("cannot resolve absolute path: {e}"),
                    )
                })?;
                url::Url::from_file_path(&abs).map_err(|_| {
                    FramecastError::load_failed(
                        abs.display().to_string(),
                        "path cannot be expressed as a file:// url",
                    )
                })
            }
            Self::Url(u) => url::Url::parse(u)
                .map_err(|e| FramecastError::validation(format!("invalid document url: {e}"))),
        }
    }
}

impl fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(p) => write!(f, "{}", p.display()),
            Self::Url(u) => f.write_str(u),
        }
    }
}

impl std::str::FromStr for DocumentSource {
    type Err = FramecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DocumentSource {
    type Error = FramecastError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DocumentSource> for String {
    fn from(value: DocumentSource) -> Self {
        value.to_string()
    }
}

/// Cooperative cancellation flag shared between a caller and one generation request.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Outstanding captures finish, nothing new starts.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Return `true` once [`CancelToken::cancel`] was called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fail with [`FramecastError::Cancelled`] when cancelled.
    pub fn check(&self) -> FramecastResult<()> {
        if self.is_cancelled() {
            return Err(FramecastError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
