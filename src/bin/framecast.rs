use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};
use framecast::{
    CancelToken, ChromeEngine, DocumentSource, FrameSchedule, GenerationRequest, Generator,
    GeneratorConfig, NullObserver, RenderEngine, SvgEngine,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "framecast", version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a document into a video (requires `ffmpeg` on PATH).
    Render(RenderArgs),
    /// Capture a single still as a PNG.
    Frame(FrameArgs),
    /// Print the capture schedule for a duration and frame rate as JSON.
    Schedule(ScheduleArgs),
    /// Remove staging directories left behind by interrupted runs.
    Sweep(SweepArgs),
}

#[derive(Args, Debug)]
struct SurfaceArgs {
    /// Document path or URL.
    #[arg(long)]
    doc: Option<String>,

    /// Output width in pixels.
    #[arg(long, default_value_t = 1080)]
    width: u32,

    /// Output height in pixels.
    #[arg(long, default_value_t = 1920)]
    height: u32,

    /// Internal sampling multiplier.
    #[arg(long, default_value_t = framecast::pipeline::request::DEFAULT_DEVICE_SCALE_FACTOR)]
    scale: f64,

    /// Rendering engine.
    #[arg(long, value_enum, default_value_t = EngineChoice::Chrome)]
    engine: EngineChoice,

    /// Pipeline configuration JSON.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    #[command(flatten)]
    surface: SurfaceArgs,

    /// Output video path.
    #[arg(long)]
    out: PathBuf,

    /// Captured document time in milliseconds.
    #[arg(long, default_value_t = 15_000)]
    duration_ms: u64,

    /// Frames per second.
    #[arg(long, default_value_t = 30.0)]
    fps: f64,

    /// Request JSON; replaces --doc, --width, --height, --scale, --duration-ms and --fps.
    #[arg(long)]
    request: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    #[command(flatten)]
    surface: SurfaceArgs,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Document time of the capture in milliseconds.
    #[arg(long, default_value_t = 0.0)]
    at_ms: f64,
}

#[derive(Parser, Debug)]
struct ScheduleArgs {
    /// Captured document time in milliseconds.
    #[arg(long)]
    duration_ms: u64,

    /// Frames per second.
    #[arg(long)]
    fps: f64,
}

#[derive(Parser, Debug)]
struct SweepArgs {
    /// Directory holding staging directories (defaults to the configured or system temp dir).
    #[arg(long)]
    staging_root: Option<PathBuf>,

    /// Only remove staging directories untouched for at least this many seconds.
    #[arg(long, default_value_t = 3600)]
    min_age_secs: u64,

    /// Pipeline configuration JSON.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EngineChoice {
    /// Headless Chrome/Chromium (HTML, animated).
    Chrome,
    /// In-process SVG renderer (static documents).
    Svg,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Schedule(args) => cmd_schedule(args),
        Command::Sweep(args) => cmd_sweep(args),
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<GeneratorConfig> {
    match path {
        Some(p) => Ok(GeneratorConfig::from_json_file(p)?),
        None => Ok(GeneratorConfig::default()),
    }
}

fn make_engine(
    choice: EngineChoice,
    config: &GeneratorConfig,
) -> anyhow::Result<Arc<dyn RenderEngine>> {
    let engine: Arc<dyn RenderEngine> = match choice {
        EngineChoice::Chrome => Arc::new(
            ChromeEngine::new(config.chrome.clone())?.with_work_root(config.staging_root()),
        ),
        EngineChoice::Svg => Arc::new(SvgEngine::new()),
    };
    Ok(engine)
}

fn parse_doc(doc: Option<&str>) -> anyhow::Result<DocumentSource> {
    let doc = doc.context("--doc is required")?;
    Ok(DocumentSource::parse(doc)?)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let config = load_config(args.surface.config.as_deref())?;
    let request = match &args.request {
        Some(path) => GenerationRequest::from_json_file(path)?,
        None => GenerationRequest::new(
            parse_doc(args.surface.doc.as_deref())?,
            args.surface.width,
            args.surface.height,
            args.duration_ms,
            args.fps,
        )
        .with_device_scale_factor(args.surface.scale),
    };

    let engine = make_engine(args.surface.engine, &config)?;
    let generator = Generator::with_ffmpeg(engine, config)?;
    let report = generator.generate(&request, &args.out, &NullObserver, &CancelToken::new())?;

    if let Some(w) = &report.cleanup_warning {
        eprintln!("warning: {w}");
    }
    eprintln!(
        "wrote {} ({} frames, {:.2}s video) in {:.1}s",
        report.artifact.display(),
        report.frame_count,
        report.frame_count as f64 / request.frame_rate,
        report.elapsed.as_secs_f64()
    );
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let config = load_config(args.surface.config.as_deref())?;
    let request = GenerationRequest::new(
        parse_doc(args.surface.doc.as_deref())?,
        args.surface.width,
        args.surface.height,
        1,
        1.0,
    )
    .with_device_scale_factor(args.surface.scale);
    request.validate()?;

    let engine = make_engine(args.surface.engine, &config)?;
    let img = framecast::capture_single_frame(
        engine.as_ref(),
        request.surface_spec(),
        config.load_timeout(),
        args.at_ms,
    )?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        img.as_raw(),
        img.width(),
        img.height(),
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_schedule(args: ScheduleArgs) -> anyhow::Result<()> {
    let schedule = FrameSchedule::new(args.duration_ms, args.fps)?;
    println!("{}", serde_json::to_string_pretty(&schedule)?);
    Ok(())
}

fn cmd_sweep(args: SweepArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let root = args
        .staging_root
        .unwrap_or_else(|| config.staging_root());
    let report =
        framecast::sweep_orphaned_staging(&root, Duration::from_secs(args.min_age_secs))?;

    for dir in &report.removed {
        println!("removed {}", dir.display());
    }
    for w in &report.failed {
        eprintln!("warning: {w}");
    }
    eprintln!(
        "swept '{}': {} removed, {} still in use, {} failed",
        root.display(),
        report.removed.len(),
        report.skipped_recent.len(),
        report.failed.len()
    );
    Ok(())
}
