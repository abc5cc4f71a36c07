use crate::capture::staging::BROWSER_WORK_PREFIX;
use crate::config::ChromeConfig;
use crate::foundation::error::{FramecastError, FramecastResult};
use crate::surface::engine::{
    CaptureLane, LaneClock, RenderEngine, Surface, SurfaceSpec, fit_to_viewport,
};
use anyhow::Context as _;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt as _;

const BINARY_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
    "chrome-headless-shell",
];

// Headless baseline: containers commonly lack a usable sandbox, GPU and a large /dev/shm.
const BASE_ARGS: &[&str] = &[
    "--headless=new",
    "--no-sandbox",
    "--disable-gpu",
    "--disable-dev-shm-usage",
    "--hide-scrollbars",
    "--mute-audio",
    "--no-first-run",
    "--no-default-browser-check",
    "--run-all-compositor-stages-before-draw",
];

/// Engine backed by a system headless Chrome/Chromium binary.
///
/// Every capture runs one isolated browser process with its own profile directory, so captures
/// on different lanes can run concurrently. Simulated time is applied through Chrome's virtual
/// time budget: the page is loaded, then its timers and animations run for exactly
/// `timestamp` virtual milliseconds before the screenshot is taken.
#[derive(Clone, Debug)]
pub struct ChromeEngine {
    binary: PathBuf,
    config: ChromeConfig,
    work_root: PathBuf,
}

impl ChromeEngine {
    /// Resolve the browser binary from `config.binary` or `PATH`.
    pub fn new(config: ChromeConfig) -> FramecastResult<Self> {
        config.validate()?;
        let binary = match config.binary.clone() {
            Some(b) => b,
            None => locate_chrome().ok_or_else(|| {
                FramecastError::validation(format!(
                    "no headless Chrome/Chromium found on PATH (tried {}); set chrome.binary",
                    BINARY_CANDIDATES.join(", ")
                ))
            })?,
        };
        Ok(Self {
            binary,
            config,
            work_root: std::env::temp_dir(),
        })
    }

    /// Create per-capture work directories under `root` instead of the system temp dir.
    ///
    /// Pointing this at the staging root lets [`crate::sweep_orphaned_staging`] reclaim profiles
    /// left behind by a killed process.
    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = root.into();
        self
    }

    /// Browser executable used for captures.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Parent directory of per-capture work directories.
    pub fn work_root(&self) -> &Path {
        &self.work_root
    }
}

impl RenderEngine for ChromeEngine {
    fn name(&self) -> &str {
        "chrome"
    }

    fn open_surface(
        &self,
        spec: &SurfaceSpec,
        load_timeout: Duration,
    ) -> FramecastResult<Box<dyn Surface>> {
        let document = spec.source.to_string();
        if let Some(path) = spec.source.local_path()
            && !path.is_file()
        {
            return Err(FramecastError::load_failed(
                document,
                format!("'{}' is not a readable file", path.display()),
            ));
        }
        let url = spec.source.to_url()?;

        std::fs::create_dir_all(&self.work_root).with_context(|| {
            format!("create chrome work root '{}'", self.work_root.display())
        })?;
        let surface = ChromeSurface {
            binary: self.binary.clone(),
            config: self.config.clone(),
            work_root: self.work_root.clone(),
            url,
            spec: spec.clone(),
            clock: LaneClock::new(),
        };

        // Probe load: the document must render once at t=0 within the load timeout.
        match surface.screenshot(0.0, load_timeout) {
            Ok(_) => {}
            Err(ShotError::TimedOut) => {
                return Err(FramecastError::DocumentLoadTimeout {
                    document,
                    timeout: load_timeout,
                });
            }
            Err(ShotError::Failed(reason)) => {
                return Err(FramecastError::load_failed(document, reason));
            }
        }
        tracing::debug!(binary = %self.binary.display(), url = %surface.url, "chrome surface ready");

        Ok(Box::new(surface))
    }
}

struct ChromeSurface {
    binary: PathBuf,
    config: ChromeConfig,
    work_root: PathBuf,
    url: url::Url,
    spec: SurfaceSpec,
    clock: LaneClock,
}

#[derive(Debug)]
enum ShotError {
    TimedOut,
    Failed(String),
}

impl ChromeSurface {
    fn screenshot(
        &self,
        timestamp_ms: f64,
        timeout: Duration,
    ) -> Result<image::RgbaImage, ShotError> {
        let work = tempfile::Builder::new()
            .prefix(BROWSER_WORK_PREFIX)
            .tempdir_in(&self.work_root)
            .map_err(|e| ShotError::Failed(format!("create chrome work dir: {e}")))?;
        let shot = work.path().join("shot.png");

        let mut cmd = Command::new(&self.binary);
        cmd.args(BASE_ARGS)
            .arg(format!(
                "--user-data-dir={}",
                work.path().join("profile").display()
            ))
            .arg(format!("--window-size={},{}", self.spec.width, self.spec.height))
            .arg(format!(
                "--force-device-scale-factor={}",
                self.spec.device_scale_factor
            ))
            .arg(format!("--screenshot={}", shot.display()));
        let budget = timestamp_ms.round() as u64;
        if budget > 0 {
            cmd.arg(format!("--virtual-time-budget={budget}"));
        }
        cmd.args(&self.config.extra_args)
            .arg(self.url.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            ShotError::Failed(format!(
                "failed to spawn '{}': {e}",
                self.binary.display()
            ))
        })?;

        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ShotError::Failed("failed to open chrome stderr (unexpected)".into()))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            let _ = stderr.read_to_end(&mut bytes);
            bytes
        });

        let status = match child.wait_timeout(timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                // Browser helper processes may still hold stderr open; leave the drain detached.
                drop(stderr_drain);
                return Err(ShotError::TimedOut);
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ShotError::Failed(format!("failed to wait for chrome: {e}")));
            }
        };
        let stderr_bytes = stderr_drain.join().unwrap_or_default();

        if !status.success() {
            return Err(ShotError::Failed(format!(
                "chrome exited with status {status}: {}",
                String::from_utf8_lossy(&stderr_bytes).trim()
            )));
        }

        let img = image::open(&shot)
            .with_context(|| format!("read chrome screenshot '{}'", shot.display()))
            .map_err(|e| ShotError::Failed(format!("{e:#}")))?
            .to_rgba8();
        fit_to_viewport(img, &self.spec).map_err(|e| ShotError::Failed(e.to_string()))
    }
}

impl Surface for ChromeSurface {
    fn advance_to(&self, lane: CaptureLane, timestamp_ms: f64) -> FramecastResult<()> {
        self.clock.set(lane, timestamp_ms)
    }

    fn capture_still(&self, lane: CaptureLane) -> FramecastResult<image::RgbaImage> {
        let t = self.clock.get(lane)?;
        self.screenshot(t, self.config.capture_timeout())
            .map_err(|e| match e {
                ShotError::TimedOut => FramecastError::Other(anyhow::anyhow!(
                    "chrome capture at {t:.1}ms timed out after {}ms",
                    self.config.capture_timeout_ms
                )),
                ShotError::Failed(reason) => FramecastError::Other(anyhow::anyhow!(reason)),
            })
    }

    fn close(&mut self) -> FramecastResult<()> {
        // Capture processes and their profiles are torn down per capture.
        Ok(())
    }
}

/// Find the first known Chrome/Chromium executable on `PATH`.
pub fn locate_chrome() -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        for name in BINARY_CANDIDATES {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

#[cfg(test)]
#[path = "../../tests/unit/surface/chrome.rs"]
mod tests;
