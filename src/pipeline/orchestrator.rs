use crate::capture::coordinator::CaptureCoordinator;
use crate::capture::staging::StagingArea;
use crate::config::GeneratorConfig;
use crate::encode::assembler::{Assembler, AssemblyJob, AssemblyShape};
use crate::encode::ffmpeg::{FfmpegAssembler, ensure_parent_dir};
use crate::foundation::core::CancelToken;
use crate::foundation::error::{FramecastError, FramecastResult, StagingCleanupWarning};
use crate::pipeline::events::{GenerationEvent, GenerationObserver, Tee, TracingObserver};
use crate::pipeline::request::GenerationRequest;
use crate::schedule::FrameSchedule;
use crate::surface::engine::{CaptureLane, RenderEngine, SurfaceSpec};
use crate::surface::session::SurfaceSession;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lifecycle state of one generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Validating and scheduling.
    Idle,
    /// Surface open, nothing captured yet.
    SessionOpen,
    /// Frames are being captured and staged.
    Capturing,
    /// The encoder is running.
    Encoding,
    /// Artifact in place.
    Done,
    /// Terminated with an error.
    Failed,
}

impl PipelineState {
    /// Return `true` when `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Idle, SessionOpen)
                | (SessionOpen, Capturing)
                | (Capturing, Encoding)
                | (Encoding, Done)
                | (Idle | SessionOpen | Capturing | Encoding, Failed)
        )
    }

    /// Return `true` for `Done` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }
}

#[derive(Debug)]
struct StateTracker {
    history: Vec<PipelineState>,
}

impl StateTracker {
    fn new() -> Self {
        Self {
            history: vec![PipelineState::Idle],
        }
    }

    fn current(&self) -> PipelineState {
        self.history
            .last()
            .copied()
            .unwrap_or(PipelineState::Idle)
    }

    fn advance(&mut self, next: PipelineState) -> FramecastResult<()> {
        let current = self.current();
        if !current.can_transition_to(next) {
            return Err(FramecastError::Other(anyhow::anyhow!(
                "internal error: illegal pipeline transition {current:?} -> {next:?}"
            )));
        }
        tracing::trace!(from = ?current, to = ?next, "pipeline transition");
        self.history.push(next);
        Ok(())
    }

    fn fail(&mut self) {
        if !self.current().is_terminal() {
            self.history.push(PipelineState::Failed);
        }
    }
}

/// Outcome of a successful generation.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationReport {
    /// Final artifact path.
    pub artifact: PathBuf,
    /// Frames encoded.
    pub frame_count: u64,
    /// Capture timestamps in schedule order.
    pub timestamps_ms: Vec<f64>,
    /// States visited, starting with `Idle` and ending with `Done`.
    pub states: Vec<PipelineState>,
    /// Set when the staging directory could not be fully removed.
    pub cleanup_warning: Option<StagingCleanupWarning>,
    /// Wall-clock time of the whole request.
    pub elapsed: Duration,
}

/// Runs generation requests: document in, single video artifact out.
///
/// A `Generator` holds no per-request state, so one instance may serve requests from several
/// threads at once; each request gets its own surface session, staging area and capture pool.
pub struct Generator {
    engine: Arc<dyn RenderEngine>,
    assembler: Box<dyn Assembler>,
    config: GeneratorConfig,
}

impl Generator {
    /// Build a generator from an engine, an assembler and validated configuration.
    pub fn new(
        engine: Arc<dyn RenderEngine>,
        assembler: Box<dyn Assembler>,
        config: GeneratorConfig,
    ) -> FramecastResult<Self> {
        config.validate()?;
        Ok(Self {
            engine,
            assembler,
            config,
        })
    }

    /// Generator that encodes with the system `ffmpeg` configured in `config.encoder`.
    pub fn with_ffmpeg(
        engine: Arc<dyn RenderEngine>,
        config: GeneratorConfig,
    ) -> FramecastResult<Self> {
        let assembler = FfmpegAssembler::new(config.encoder.clone())?;
        Self::new(engine, Box::new(assembler), config)
    }

    /// Configuration in effect.
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Engine used for every request.
    pub fn engine(&self) -> &Arc<dyn RenderEngine> {
        &self.engine
    }

    /// Render `request` into a video at `out_path`.
    ///
    /// Parameters are validated and the schedule computed before any surface is opened. The
    /// artifact is encoded to a temporary sibling of `out_path` and renamed into place only on
    /// success, so a failed request never leaves a partial file at `out_path`. The surface
    /// session is closed and the staging directory purged on every path.
    #[tracing::instrument(
        name = "generate",
        skip_all,
        fields(document = %request.source, out = %out_path.display())
    )]
    pub fn generate(
        &self,
        request: &GenerationRequest,
        out_path: &Path,
        observer: &dyn GenerationObserver,
        cancel: &CancelToken,
    ) -> FramecastResult<GenerationReport> {
        let started = Instant::now();
        let fan_out: [&dyn GenerationObserver; 2] = [&TracingObserver, observer];
        let observer = Tee(&fan_out);
        let mut states = StateTracker::new();

        match self.run(request, out_path, &observer, cancel, &mut states) {
            Ok((schedule, cleanup_warning)) => {
                states.advance(PipelineState::Done)?;
                observer.on_event(&GenerationEvent::GenerationCompleted {
                    artifact: out_path.to_path_buf(),
                    frame_count: schedule.len(),
                });
                Ok(GenerationReport {
                    artifact: out_path.to_path_buf(),
                    frame_count: schedule.len(),
                    timestamps_ms: schedule.timestamps_ms().to_vec(),
                    states: states.history,
                    cleanup_warning,
                    elapsed: started.elapsed(),
                })
            }
            Err(e) => {
                states.fail();
                tracing::debug!(states = ?states.history, "generation aborted");
                observer.on_event(&GenerationEvent::GenerationFailed {
                    kind: e.kind(),
                    detail: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn run(
        &self,
        request: &GenerationRequest,
        out_path: &Path,
        observer: &dyn GenerationObserver,
        cancel: &CancelToken,
        states: &mut StateTracker,
    ) -> FramecastResult<(FrameSchedule, Option<StagingCleanupWarning>)> {
        let schedule = request.schedule()?;
        request.validate()?;
        validate_output_path(out_path)?;
        let shape = request.assembly_shape();
        self.assembler.check(&shape)?;
        cancel.check()?;

        observer.on_event(&GenerationEvent::GenerationStarted {
            document: request.source.to_string(),
            width: request.width,
            height: request.height,
            frame_count: schedule.len(),
            frame_rate: schedule.frame_rate(),
        });

        let mut session = SurfaceSession::open(
            self.engine.as_ref(),
            request.surface_spec(),
            self.config.load_timeout(),
        )?;
        states.advance(PipelineState::SessionOpen)?;
        let mut staging = StagingArea::create(&self.config.staging_root(), schedule.len())?;

        let captured = states.advance(PipelineState::Capturing).and_then(|()| {
            CaptureCoordinator::new(
                &session,
                &staging,
                &self.config.capture,
                observer,
                cancel,
            )
            .capture_all(&schedule)
        });
        if let Err(e) = session.close() {
            tracing::warn!(error = %e, "surface session close failed");
        }

        let encoded = captured.and_then(|records| {
            states.advance(PipelineState::Encoding)?;
            self.encode(&staging, records.len() as u64, shape, out_path, observer, cancel)
        });

        let cleanup_warning = staging.purge();
        if let Some(w) = &cleanup_warning {
            observer.on_event(&GenerationEvent::StagingCleanupWarning {
                dir: w.dir.clone(),
                detail: w.detail.clone(),
            });
        }

        encoded?;
        Ok((schedule, cleanup_warning))
    }

    fn encode(
        &self,
        staging: &StagingArea,
        frame_count: u64,
        shape: AssemblyShape,
        out_path: &Path,
        observer: &dyn GenerationObserver,
        cancel: &CancelToken,
    ) -> FramecastResult<()> {
        ensure_parent_dir(out_path)?;
        let partial = partial_artifact_path(out_path)?;
        let job = AssemblyJob {
            frames_dir: staging.path().to_path_buf(),
            naming: staging.naming(),
            frame_count,
            shape,
            output: partial.to_path_buf(),
        };
        tracing::debug!(
            assembler = self.assembler.name(),
            partial = %partial.display(),
            "encoding staged frames"
        );
        self.assembler.assemble(&job, observer, cancel)?;
        cancel.check()?;

        partial.persist(out_path).map_err(|e| {
            anyhow::Error::new(e.error).context(format!(
                "move encoded artifact into place at '{}'",
                out_path.display()
            ))
        })?;
        Ok(())
    }
}

impl std::fmt::Debug for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("engine", &self.engine.name())
            .field("assembler", &self.assembler.name())
            .field("config", &self.config)
            .finish()
    }
}

fn validate_output_path(out_path: &Path) -> FramecastResult<()> {
    if out_path.file_name().is_none() {
        return Err(FramecastError::validation(format!(
            "output path '{}' has no file name",
            out_path.display()
        )));
    }
    if out_path.is_dir() {
        return Err(FramecastError::validation(format!(
            "output path '{}' is a directory",
            out_path.display()
        )));
    }
    Ok(())
}

/// Reserve a hidden sibling of `out_path` that keeps its extension, so the encoder still infers
/// the container from the name. Removed on drop unless persisted.
fn partial_artifact_path(out_path: &Path) -> FramecastResult<tempfile::TempPath> {
    use anyhow::Context as _;
    let parent = match out_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let name = out_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = out_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let file = tempfile::Builder::new()
        .prefix(&format!(".{name}.partial-"))
        .suffix(&suffix)
        .tempfile_in(&parent)
        .with_context(|| format!("reserve temporary artifact in '{}'", parent.display()))?;
    Ok(file.into_temp_path())
}

/// Load `spec` on `engine` and capture a single still at `at_ms`.
pub fn capture_single_frame(
    engine: &dyn RenderEngine,
    spec: SurfaceSpec,
    load_timeout: Duration,
    at_ms: f64,
) -> FramecastResult<image::RgbaImage> {
    let mut session = SurfaceSession::open(engine, spec, load_timeout)?;
    session.advance_to(CaptureLane(0), at_ms)?;
    let img = session.capture_still(CaptureLane(0));
    session.close()?;
    img
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/orchestrator.rs"]
mod tests;
