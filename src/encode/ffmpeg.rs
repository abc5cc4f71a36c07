use crate::config::EncoderConfig;
use crate::encode::assembler::{Assembler, AssemblyJob, AssemblyShape};
use crate::foundation::core::CancelToken;
use crate::foundation::error::{FramecastError, FramecastResult};
use crate::pipeline::events::{GenerationEvent, GenerationObserver};
use std::ffi::OsString;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};

/// Assembler backed by the system `ffmpeg` binary.
///
/// Reads the staged PNG sequence with the image2 demuxer and encodes it with the configured codec.
/// The system binary is used rather than linking libav, so there are no native build requirements.
#[derive(Clone, Debug)]
pub struct FfmpegAssembler {
    config: EncoderConfig,
}

impl FfmpegAssembler {
    /// Build an assembler from validated encoder settings.
    pub fn new(config: EncoderConfig) -> FramecastResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Encoder settings.
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Full argument list (without the program name) for `job`.
    pub fn command_args(&self, job: &AssemblyJob) -> Vec<OsString> {
        let c = &self.config;
        let mut args: Vec<OsString> = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-nostdin",
            "-y",
            "-framerate",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push(format_rate(job.shape.frame_rate).into());
        args.push("-start_number".into());
        args.push("0".into());
        args.push("-i".into());
        args.push(job.frames_dir.join(job.naming.pattern()).into_os_string());
        args.push("-frames:v".into());
        args.push(job.frame_count.to_string().into());
        args.push("-c:v".into());
        args.push(c.codec.clone().into());
        args.push("-pix_fmt".into());
        args.push(c.pix_fmt.clone().into());
        args.push("-crf".into());
        args.push(c.crf.to_string().into());
        args.push("-preset".into());
        args.push(c.preset.clone().into());
        if c.faststart {
            args.push("-movflags".into());
            args.push("+faststart".into());
        }
        args.push("-progress".into());
        args.push("pipe:1".into());
        args.push("-nostats".into());
        args.push(job.output.clone().into_os_string());
        args
    }

    /// Human-readable command line for logs and `EncodingStarted`.
    pub fn command_line(&self, job: &AssemblyJob) -> String {
        std::iter::once(self.config.ffmpeg_path.as_os_str().to_os_string())
            .chain(self.command_args(job))
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Assembler for FfmpegAssembler {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn check(&self, shape: &AssemblyShape) -> FramecastResult<()> {
        if shape.width == 0 || shape.height == 0 {
            return Err(FramecastError::validation(
                "encode width/height must be non-zero",
            ));
        }
        if !shape.frame_rate.is_finite() || shape.frame_rate <= 0.0 {
            return Err(FramecastError::validation(
                "encode frame rate must be finite and > 0",
            ));
        }
        if self.config.is_chroma_subsampled_420()
            && (!shape.width.is_multiple_of(2) || !shape.height.is_multiple_of(2))
        {
            return Err(FramecastError::validation(format!(
                "encode width/height must be even for {} output (got {}x{})",
                self.config.pix_fmt, shape.width, shape.height
            )));
        }
        if !is_ffmpeg_available(&self.config.ffmpeg_path) {
            return Err(FramecastError::validation(format!(
                "ffmpeg is required for encoding, but '{}' could not be run",
                self.config.ffmpeg_path.display()
            )));
        }
        Ok(())
    }

    fn assemble(
        &self,
        job: &AssemblyJob,
        observer: &dyn GenerationObserver,
        cancel: &CancelToken,
    ) -> FramecastResult<()> {
        job.verify_sequence()?;
        ensure_parent_dir(&job.output)?;
        cancel.check()?;

        let command = self.command_line(job);
        tracing::debug!(%command, frames = job.frame_count, "spawning ffmpeg");
        observer.on_event(&GenerationEvent::EncodingStarted {
            command: command.clone(),
        });

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(self.command_args(job))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                FramecastError::encoding(format!(
                    "failed to spawn '{}' (is it installed and on PATH?): {e}",
                    self.config.ffmpeg_path.display()
                ))
            })?;

        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| FramecastError::encoding("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            let _ = stderr.read_to_end(&mut bytes);
            bytes
        });

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FramecastError::encoding("failed to open ffmpeg stdout (unexpected)"))?;
        let mut progress = ProgressTracker::new(job.frame_count, job.duration_secs());
        let mut cancelled = false;
        for line in BufReader::new(stdout).lines() {
            let Ok(line) = line else {
                break;
            };
            if let Some(percent) = progress.feed(&line) {
                observer.on_event(&GenerationEvent::EncodingProgress { percent });
            }
            if cancel.is_cancelled() {
                cancelled = true;
                let _ = child.kill();
                break;
            }
        }

        let status = child
            .wait()
            .map_err(|e| FramecastError::encoding(format!("failed to wait for ffmpeg: {e}")))?;
        let stderr_bytes = stderr_drain.join().unwrap_or_default();

        if cancelled {
            return Err(FramecastError::Cancelled);
        }
        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            let stderr = stderr.trim();
            return Err(FramecastError::encoding(if stderr.is_empty() {
                format!("ffmpeg exited with status {status}")
            } else {
                format!("ffmpeg exited with status {status}: {stderr}")
            }));
        }

        let written = std::fs::metadata(&job.output).map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(FramecastError::encoding(format!(
                "ffmpeg reported success but '{}' is missing or empty",
                job.output.display()
            )));
        }
        if let Some(percent) = progress.finish() {
            observer.on_event(&GenerationEvent::EncodingProgress { percent });
        }
        tracing::debug!(output = %job.output.display(), bytes = written, "ffmpeg finished");
        Ok(())
    }
}

/// Turns ffmpeg `-progress` key/value lines into a non-decreasing percentage.
#[derive(Clone, Debug)]
pub struct ProgressTracker {
    total_frames: u64,
    duration_us: f64,
    last: Option<f64>,
}

impl ProgressTracker {
    /// Tracker for an encode of `total_frames` frames lasting `duration_secs`.
    pub fn new(total_frames: u64, duration_secs: f64) -> Self {
        Self {
            total_frames,
            duration_us: duration_secs * 1_000_000.0,
            last: None,
        }
    }

    /// Feed one line; returns a new percentage when progress moved forward.
    pub fn feed(&mut self, line: &str) -> Option<f64> {
        let (key, value) = line.trim().split_once('=')?;
        let percent = match key {
            "frame" if self.total_frames > 0 => {
                value.trim().parse::<u64>().ok()? as f64 / self.total_frames as f64 * 100.0
            }
            "out_time_us" | "out_time_ms" if self.duration_us > 0.0 => {
                // ffmpeg reports microseconds under both keys.
                value.trim().parse::<i64>().ok()?.max(0) as f64 / self.duration_us * 100.0
            }
            "progress" if value.trim() == "end" => 100.0,
            _ => return None,
        };
        self.advance(percent)
    }

    /// Mark the encode finished; returns `Some(100.0)` unless 100 was already reported.
    pub fn finish(&mut self) -> Option<f64> {
        self.advance(100.0)
    }

    fn advance(&mut self, percent: f64) -> Option<f64> {
        let percent = percent.clamp(0.0, 100.0);
        match self.last {
            Some(last) if percent <= last => None,
            _ => {
                self.last = Some(percent);
                Some(percent)
            }
        }
    }
}

fn format_rate(frame_rate: f64) -> String {
    if frame_rate.fract() == 0.0 {
        format!("{}", frame_rate as u64)
    } else {
        format!("{frame_rate}")
    }
}

/// Return `true` when `ffmpeg -version` runs successfully.
pub fn is_ffmpeg_available(ffmpeg: &Path) -> bool {
    Command::new(ffmpeg)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Return `true` when `ffmpeg` on `PATH` runs.
pub fn is_ffmpeg_on_path() -> bool {
    is_ffmpeg_available(Path::new("ffmpeg"))
}

/// Create `path`'s parent directory if it does not exist.
pub fn ensure_parent_dir(path: &Path) -> FramecastResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
