use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "framelab", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process a single frame and write it as a PNG.
    Frame(FrameArgs),
    /// Process a frame range into an MP4 (requires `ffmpeg` on PATH) or a PNG sequence.
    Export(ExportArgs),
    /// Track corners across the input and write the tracks as CSV or JSON.
    Track(TrackArgs),
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input video file or directory of PNG frames.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Project configuration JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Frame index (0-based).
    #[arg(long, required_unless_present = "marker", conflicts_with = "marker")]
    frame: Option<u64>,

    /// Name of a project marker whose frame is rendered.
    #[arg(long)]
    marker: Option<String>,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Write the frame at preview scale instead of full resolution.
    #[arg(long)]
    preview: bool,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Input video file or directory of PNG frames.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Project configuration JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output path: `.mp4` encodes a video, anything else is a PNG sequence directory.
    #[arg(long)]
    out: PathBuf,

    /// Replace an existing MP4.
    #[arg(long)]
    overwrite: bool,
}

#[derive(Parser, Debug)]
struct TrackArgs {
    /// Input video file or directory of PNG frames.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Project configuration JSON (tracker settings and range).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output path.
    #[arg(long)]
    out: PathBuf,

    /// Output format.
    #[arg(long, value_enum, default_value_t = TrackFormat::Csv)]
    format: TrackFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TrackFormat {
    Csv,
    Json,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Export(args) => cmd_export(args),
        Command::Track(args) => cmd_track(args),
    }
}

fn read_config(path: Option<&Path>) -> anyhow::Result<framelab::ProjectConfig> {
    match path {
        Some(p) => framelab::ProjectConfig::load(p)
            .with_context(|| format!("load project config '{}'", p.display())),
        None => Ok(framelab::ProjectConfig::default()),
    }
}

fn open_source(path: &Path) -> anyhow::Result<Box<dyn framelab::FrameSource>> {
    let source: Box<dyn framelab::FrameSource> = if path.is_dir() {
        Box::new(framelab::ImageSequenceSource::open(path)?)
    } else {
        Box::new(framelab::FfmpegSource::open(path)?)
    };
    let info = source.info();
    tracing::info!(
        frames = info.frame_count,
        width = info.width,
        height = info.height,
        fps = info.fps.as_f64(),
        "opened {}",
        path.display()
    );
    Ok(source)
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let config = read_config(args.config.as_deref())?;
    let idx = match (&args.marker, args.frame) {
        (Some(name), _) => {
            let marker = config.find_marker(name).with_context(|| {
                let known: Vec<String> = config
                    .markers_by_frame()
                    .iter()
                    .map(|m| format!("{} ({})", m.name, m.frame))
                    .collect();
                format!("no marker named '{name}'; markers: [{}]", known.join(", "))
            })?;
            marker.frame
        }
        (None, Some(frame)) => framelab::FrameIndex(frame),
        (None, None) => anyhow::bail!("either --frame or --marker is required"),
    };
    let cache = Arc::new(framelab::FrameCache::new(config.cache_budget_bytes));
    let source = open_source(&args.in_path)?;
    let mut session = framelab::PreviewSession::new(source, config, cache)?;

    if args.preview {
        let preview = session.render(idx)?;
        if let Some(parent) = args.out.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create output dir '{}'", parent.display()))?;
        }
        image::save_buffer_with_format(
            &args.out,
            &preview.frame.to_rgba8(),
            preview.frame.width(),
            preview.frame.height(),
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .with_context(|| format!("write png '{}'", args.out.display()))?;
        for d in &preview.diagnostics {
            eprintln!("warning: {d}");
        }
    } else {
        session.snapshot(idx, &args.out)?;
    }

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let config = read_config(args.config.as_deref())?;
    let source = open_source(&args.in_path)?;

    let destination = if args
        .out
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("mp4"))
    {
        framelab::Destination::Mp4 {
            path: args.out.clone(),
            overwrite: args.overwrite,
        }
    } else {
        framelab::Destination::ImageSequence {
            dir: args.out.clone(),
        }
    };

    let cache = Arc::new(framelab::FrameCache::new(config.cache_budget_bytes));
    let controller = framelab::ExportController::new(framelab::Pipeline::new(), cache);
    let events = controller.subscribe();
    let handle = controller.submit(config.job(framelab::JobId(1), destination), source)?;

    for event in events.iter() {
        eprint!("\r{:>6.1}% {}", event.fraction * 100.0, event.status);
        if event.job == handle.id() && event.status.is_terminal() {
            break;
        }
    }
    eprintln!();

    let snap = controller.wait(&handle);
    if let Some(report) = snap.output() {
        println!("{}", serde_json::to_string_pretty(report)?);
    }
    if let Some(failure) = snap.failure {
        anyhow::bail!("export {}: {failure}", snap.status);
    }

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_track(args: TrackArgs) -> anyhow::Result<()> {
    let config = read_config(args.config.as_deref())?;
    let mut source = open_source(&args.in_path)?;
    let info = source.info();
    let range = match config.range {
        Some(r) => r,
        None => framelab::FrameRange::first(info.frame_count),
    };

    let mut tracker = framelab::PointTracker::new(config.tracker)?;
    let mut log = framelab::TrackLog::new();
    for idx in range.iter() {
        let frame = match source.read(idx) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!("skipping frame: {e}");
                continue;
            }
        };
        tracker.update(&frame);
        log.record(idx, tracker.points());
    }

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    match args.format {
        TrackFormat::Csv => {
            let f = File::create(&args.out)
                .with_context(|| format!("create '{}'", args.out.display()))?;
            log.write_csv(BufWriter::new(f))?;
        }
        TrackFormat::Json => {
            std::fs::write(&args.out, log.to_json()?)
                .with_context(|| format!("write '{}'", args.out.display()))?;
        }
    }

    eprintln!("wrote {} track records to {}", log.len(), args.out.display());
    Ok(())
}
