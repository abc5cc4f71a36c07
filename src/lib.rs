//! framecast turns a web document into a fixed-length video.
//!
//! A [`Generator`] loads the document once on a [`RenderEngine`] surface, steps the document's
//! clock through a fixed [`FrameSchedule`], captures one lossless still per timestamp and hands
//! the ordered sequence to an [`Assembler`] (system `ffmpeg` by default):
//!
//! - Build a [`GenerationRequest`] (document, size, duration, frame rate)
//! - Pick an engine ([`ChromeEngine`] for HTML, [`SvgEngine`] for static SVG)
//! - Call [`Generator::generate`] and observe progress through [`GenerationEvent`]s
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Frame capture and staging.
pub mod capture;
/// Pipeline configuration.
pub mod config;
/// Video assembly.
pub mod encode;
/// Request orchestration.
pub mod pipeline;
/// Frame timestamp scheduling.
pub mod schedule;
/// Rendering engines and surfaces.
pub mod surface;

pub use crate::foundation::core::{CancelToken, DocumentSource, FrameIndex};
pub use crate::foundation::error::{
    ErrorKind, FramecastError, FramecastResult, StagingCleanupWarning,
};

pub use crate::capture::coordinator::{CaptureCoordinator, FrameRecord};
pub use crate::capture::staging::{
    BROWSER_WORK_PREFIX, FrameNaming, STAGING_PREFIX, StagingArea, SweepReport,
    sweep_orphaned_staging,
};
pub use crate::config::{CaptureConfig, ChromeConfig, EncoderConfig, GeneratorConfig};
pub use crate::encode::assembler::{Assembler, AssemblyJob, AssemblyShape};
pub use crate::encode::ffmpeg::{FfmpegAssembler, is_ffmpeg_on_path};
pub use crate::pipeline::events::{
    GenerationEvent, GenerationObserver, NullObserver, RecordingObserver, TracingObserver,
};
pub use crate::pipeline::orchestrator::{
    GenerationReport, Generator, PipelineState, capture_single_frame,
};
pub use crate::pipeline::request::GenerationRequest;
pub use crate::schedule::{FrameSchedule, MAX_FRAMES};
pub use crate::surface::chrome::{ChromeEngine, locate_chrome};
pub use crate::surface::engine::{CaptureLane, LaneClock, RenderEngine, Surface, SurfaceSpec};
pub use crate::surface::session::SurfaceSession;
pub use crate::surface::svg::SvgEngine;
