use crate::foundation::error::{FramecastError, FramecastResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default number of captures in flight per batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Pipeline configuration shared by every request a [`crate::Generator`] runs.
///
/// Every field has a default, so a JSON config file only needs the keys it changes.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Capture batching and paint-settle tuning.
    pub capture: CaptureConfig,
    /// Bounded wait for a document to report itself loaded.
    pub load_timeout_ms: u64,
    /// Parent directory for per-request staging directories (system temp dir when unset).
    pub staging_root: Option<PathBuf>,
    /// Encoder invocation settings.
    pub encoder: EncoderConfig,
    /// Headless Chrome engine settings.
    pub chrome: ChromeConfig,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            load_timeout_ms: 30_000,
            staging_root: None,
            encoder: EncoderConfig::default(),
            chrome: ChromeConfig::default(),
        }
    }
}

impl GeneratorConfig {
    /// Read a JSON config file.
    pub fn from_json_file(path: &Path) -> FramecastResult<Self> {
        use anyhow::Context as _;
        let f = std::fs::File::open(path)
            .with_context(|| format!("open config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_reader(std::io::BufReader::new(f))
            .with_context(|| format!("parse config '{}'", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> FramecastResult<()> {
        self.capture.validate()?;
        if self.load_timeout_ms == 0 {
            return Err(FramecastError::validation("load_timeout_ms must be >= 1"));
        }
        self.encoder.validate()?;
        self.chrome.validate()?;
        Ok(())
    }

    /// [`GeneratorConfig::load_timeout_ms`] as a [`Duration`].
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    /// Directory staging areas are created in.
    pub fn staging_root(&self) -> PathBuf {
        self.staging_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

/// Capture batching configuration.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureConfig {
    /// Captures in flight per batch; each batch drains before the next starts. Must be >= 1.
    pub batch_size: usize,
    /// Real-time wait between advancing simulated time and capturing, letting the engine finish
    /// a paint pass. Does not affect which simulated time a frame shows.
    pub settle_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            settle_ms: 0,
        }
    }
}

impl CaptureConfig {
    /// Reject a zero batch size.
    pub fn validate(&self) -> FramecastResult<()> {
        if self.batch_size == 0 {
            return Err(FramecastError::validation("capture batch_size must be >= 1"));
        }
        Ok(())
    }

    /// [`CaptureConfig::settle_ms`] as a [`Duration`].
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// `ffmpeg` invocation settings.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncoderConfig {
    /// `ffmpeg` executable (name looked up on `PATH`, or a path).
    pub ffmpeg_path: PathBuf,
    /// Video codec (`-c:v`).
    pub codec: String,
    /// Output pixel format (`-pix_fmt`).
    pub pix_fmt: String,
    /// Constant rate factor (`-crf`), 0..=51.
    pub crf: u8,
    /// Compression effort preset (`-preset`).
    pub preset: String,
    /// Move container metadata to the front for progressive download (`-movflags +faststart`).
    pub faststart: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            codec: "libx264".to_string(),
            pix_fmt: "yuv420p".to_string(),
            crf: 18,
            preset: "slow".to_string(),
            faststart: true,
        }
    }
}

impl EncoderConfig {
    /// Reject out-of-range or empty settings.
    pub fn validate(&self) -> FramecastResult<()> {
        if self.codec.trim().is_empty() {
            return Err(FramecastError::validation("encoder codec must be non-empty"));
        }
        if self.pix_fmt.trim().is_empty() {
            return Err(FramecastError::validation(
                "encoder pix_fmt must be non-empty",
            ));
        }
        if self.preset.trim().is_empty() {
            return Err(FramecastError::validation("encoder preset must be non-empty"));
        }
        if self.crf > 51 {
            return Err(FramecastError::validation(format!(
                "encoder crf must be within 0..=51 (got {})",
                self.crf
            )));
        }
        Ok(())
    }

    /// `true` when the pixel format uses 4:2:0 chroma subsampling (needs even dimensions).
    pub fn is_chroma_subsampled_420(&self) -> bool {
        self.pix_fmt.contains("420")
    }
}

/// Headless Chrome engine settings.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChromeConfig {
    /// Browser executable; searched on `PATH` when unset.
    pub binary: Option<PathBuf>,
    /// Upper bound on one capture process.
    pub capture_timeout_ms: u64,
    /// Extra command-line switches appended to every invocation.
    pub extra_args: Vec<String>,
}

impl Default for ChromeConfig {
    fn default() -> Self {
        Self {
            binary: None,
            capture_timeout_ms: 60_000,
            extra_args: Vec::new(),
        }
    }
}

impl ChromeConfig {
    /// Reject a zero capture timeout.
    pub fn validate(&self) -> FramecastResult<()> {
        if self.capture_timeout_ms == 0 {
            return Err(FramecastError::validation(
                "chrome capture_timeout_ms must be >= 1",
            ));
        }
        Ok(())
    }

    /// [`ChromeConfig::capture_timeout_ms`] as a [`Duration`].
    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
