use crate::foundation::core::FrameIndex;
use crate::foundation::error::{FramecastError, FramecastResult, StagingCleanupWarning};
use anyhow::Context as _;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Name prefix of every staging directory; [`sweep_orphaned_staging`] only touches these.
pub const STAGING_PREFIX: &str = "framecast-staging-";

/// Name prefix of per-capture browser work directories, also removed by the sweep.
pub const BROWSER_WORK_PREFIX: &str = "framecast-chrome-";

const SWEPT_PREFIXES: &[&str] = &[STAGING_PREFIX, BROWSER_WORK_PREFIX];

const MIN_INDEX_DIGITS: usize = 6;

/// Zero-padded frame file naming for one request.
///
/// The pad width is at least 6 digits and grows with the frame count, so lexical and numeric
/// order of staged files always coincide.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameNaming {
    digits: usize,
}

impl FrameNaming {
    /// Naming wide enough for indices `0..frame_count`.
    pub fn for_count(frame_count: u64) -> Self {
        let max_index = frame_count.saturating_sub(1);
        let digits = max_index.to_string().len().max(MIN_INDEX_DIGITS);
        Self { digits }
    }

    /// Pad width in digits.
    pub fn digits(self) -> usize {
        self.digits
    }

    /// File name of frame `idx`, e.g. `frame_000042.png`.
    pub fn file_name(self, idx: FrameIndex) -> String {
        format!("frame_{:0width$}.png", idx.0, width = self.digits)
    }

    /// printf-style input pattern matching [`FrameNaming::file_name`], e.g. `frame_%06d.png`.
    pub fn pattern(self) -> String {
        format!("frame_%0{}d.png", self.digits)
    }

    /// Parse an index back out of a staged file name.
    pub fn parse(self, name: &str) -> Option<FrameIndex> {
        let digits = name.strip_prefix("frame_")?.strip_suffix(".png")?;
        if digits.len() != self.digits || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(FrameIndex)
    }
}

/// Transient directory holding one request's staged frames.
///
/// Created once, purged once. [`StagingArea::purge`] reports cleanup problems as a warning;
/// `Drop` purges an area that was never purged explicitly.
#[derive(Debug)]
pub struct StagingArea {
    dir: Option<tempfile::TempDir>,
    path: PathBuf,
    naming: FrameNaming,
}

impl StagingArea {
    /// Create a fresh, uniquely named staging directory under `root`.
    pub fn create(root: &Path, frame_count: u64) -> FramecastResult<Self> {
        std::fs::create_dir_all(root)
            .with_context(|| format!("create staging root '{}'", root.display()))?;
        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(root)
            .with_context(|| format!("create staging directory in '{}'", root.display()))?;
        let path = dir.path().to_path_buf();
        tracing::debug!(dir = %path.display(), "staging area created");
        Ok(Self {
            dir: Some(dir),
            path,
            naming: FrameNaming::for_count(frame_count),
        })
    }

    /// Directory path (stays valid as a value after purge, but no longer exists on disk).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frame naming used by this area.
    pub fn naming(&self) -> FrameNaming {
        self.naming
    }

    /// Location of frame `idx`.
    pub fn frame_path(&self, idx: FrameIndex) -> PathBuf {
        self.path.join(self.naming.file_name(idx))
    }

    /// Persist `img` as the lossless still for frame `idx`.
    pub fn write_frame(&self, idx: FrameIndex, img: &image::RgbaImage) -> FramecastResult<PathBuf> {
        if self.dir.is_none() {
            return Err(FramecastError::validation("staging area was already purged"));
        }
        let path = self.frame_path(idx);
        image::save_buffer_with_format(
            &path,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .with_context(|| format!("write frame png '{}'", path.display()))?;
        Ok(path)
    }

    /// Sorted indices of every frame currently staged.
    pub fn staged_indices(&self) -> FramecastResult<Vec<FrameIndex>> {
        staged_indices_in(&self.path, self.naming)
    }

    /// Return `true` once the directory was removed (or removal was attempted).
    pub fn is_purged(&self) -> bool {
        self.dir.is_none()
    }

    /// Remove the directory and every staged frame.
    ///
    /// Returns a warning instead of failing: cleanup problems never fail a request. Calling
    /// this again after the first purge is a no-op.
    pub fn purge(&mut self) -> Option<StagingCleanupWarning> {
        let dir = self.dir.take()?;
        match dir.close() {
            Ok(()) => {
                tracing::debug!(dir = %self.path.display(), "staging area purged");
                None
            }
            Err(e) => {
                let warning = StagingCleanupWarning {
                    dir: self.path.clone(),
                    detail: e.to_string(),
                };
                tracing::warn!(%warning, "staging cleanup incomplete");
                Some(warning)
            }
        }
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        let _ = self.purge();
    }
}

/// Sorted indices of every file in `dir` named by `naming`.
pub fn staged_indices_in(dir: &Path, naming: FrameNaming) -> FramecastResult<Vec<FrameIndex>> {
    let rd = std::fs::read_dir(dir)
        .with_context(|| format!("list staging directory '{}'", dir.display()))?;
    let mut out = Vec::new();
    for entry in rd {
        let entry = entry.context("read staging directory entry")?;
        if let Some(idx) = entry.file_name().to_str().and_then(|n| naming.parse(n)) {
            out.push(idx);
        }
    }
    out.sort_unstable();
    Ok(out)
}

/// Outcome of [`sweep_orphaned_staging`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Staging directories removed.
    pub removed: Vec<PathBuf>,
    /// Staging directories left alone because they were modified within `min_age`.
    pub skipped_recent: Vec<PathBuf>,
    /// Directories that could not be removed.
    pub failed: Vec<StagingCleanupWarning>,
}

/// Remove staging directories under `root` left behind by an abnormal termination.
///
/// Only directories named with [`STAGING_PREFIX`] or [`BROWSER_WORK_PREFIX`] and not modified
/// for at least `min_age` are removed, so areas belonging to requests still running are left
/// alone. A missing `root` is an empty sweep.
pub fn sweep_orphaned_staging(root: &Path, min_age: Duration) -> FramecastResult<SweepReport> {
    let mut report = SweepReport::default();
    let rd = match std::fs::read_dir(root) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
        Err(e) => {
            return Err(anyhow::Error::new(e)
                .context(format!("list staging root '{}'", root.display()))
                .into());
        }
    };

    let now = SystemTime::now();
    for entry in rd.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !SWEPT_PREFIXES.iter().any(|p| name.starts_with(p)) {
            continue;
        }
        let path = entry.path();
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if !meta.is_dir() {
            continue;
        }

        let age = meta
            .modified()
            .ok()
            .and_then(|m| now.duration_since(m).ok())
            .unwrap_or(Duration::ZERO);
        if age < min_age {
            report.skipped_recent.push(path);
            continue;
        }

        match std::fs::remove_dir_all(&path) {
            Ok(()) => {
                tracing::info!(dir = %path.display(), age_secs = age.as_secs(), "removed orphaned staging directory");
                report.removed.push(path);
            }
            Err(e) => {
                let warning = StagingCleanupWarning {
                    dir: path,
                    detail: e.to_string(),
                };
                tracing::warn!(%warning, "failed to remove orphaned staging directory");
                report.failed.push(warning);
            }
        }
    }

    report.removed.sort();
    report.skipped_recent.sort();
    Ok(report)
}

#[cfg(test)]
#[path = "../../tests/unit/capture/staging.rs"]
mod tests;
