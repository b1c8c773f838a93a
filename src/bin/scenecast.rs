use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use scenecast::{
    CaptionRenderer, CommandSynthesizer, EngineConfig, FrameCompositor, MusicCatalog, Project,
    ProgressUpdate, RenderOrchestrator, RoutingImageSource, StyleTag, Studio, TokioClock,
    VoiceType, parse_script, write_png,
};

#[derive(Parser, Debug)]
#[command(name = "scenecast", version)]
struct Cli {
    /// Engine configuration JSON (all fields optional).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split a narration script into scenes and write a project JSON.
    Parse(ParseArgs),
    /// Render one scene as a PNG.
    Frame(FrameArgs),
    /// Render a project to MP4 (requires `ffmpeg` on PATH).
    Render(RenderArgs),
    /// Speak through the project's scenes in real time. Ctrl-C stops.
    Preview(PreviewArgs),
}

#[derive(Parser, Debug)]
struct ParseArgs {
    /// Script text file; paragraphs become scenes.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output project JSON path.
    #[arg(long)]
    out: PathBuf,

    /// Project title (defaults to the script file stem).
    #[arg(long)]
    title: Option<String>,

    #[arg(long, default_value = "cinematic")]
    style: String,

    #[arg(long, default_value = "neutral")]
    voice: VoiceType,

    /// Background music track id.
    #[arg(long)]
    music: Option<String>,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Scene index (0-based).
    #[arg(long)]
    scene: usize,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output directory (overrides `output_dir` from the config).
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Write the project back with its new status and video reference.
    #[arg(long)]
    save: bool,
}

#[derive(Parser, Debug)]
struct PreviewArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    match cli.cmd {
        Command::Parse(args) => cmd_parse(args),
        Command::Frame(args) => cmd_frame(&cfg, args),
        Command::Render(args) => cmd_render(cfg, args).await,
        Command::Preview(args) => cmd_preview(cfg, args).await,
    }
}

fn read_project(path: &Path) -> anyhow::Result<Project> {
    let bytes = std::fs::read(path).with_context(|| format!("read project '{}'", path.display()))?;
    Project::from_json(&bytes).with_context(|| format!("parse project '{}'", path.display()))
}

fn write_project(project: &Project, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(path, project.to_json_pretty()?)
        .with_context(|| format!("write project '{}'", path.display()))?;
    Ok(())
}

fn assets_root(project_path: &Path) -> PathBuf {
    project_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf()
}

fn orchestrator(cfg: EngineConfig, project_path: &Path) -> anyhow::Result<RenderOrchestrator> {
    cfg.validate()?;
    let compositor = FrameCompositor::new(
        cfg.resolution()?,
        cfg.caption_font_size_px,
        Arc::new(CaptionRenderer::with_system_fonts()),
    );
    let images = Arc::new(RoutingImageSource::with_defaults(assets_root(project_path)));
    let music = MusicCatalog::new(cfg.music_dir.clone());
    Ok(RenderOrchestrator::new(cfg, compositor, images, music))
}

fn cmd_parse(args: ParseArgs) -> anyhow::Result<()> {
    let script = std::fs::read_to_string(&args.in_path)
        .with_context(|| format!("read script '{}'", args.in_path.display()))?;
    let title = args.title.unwrap_or_else(|| {
        args.in_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("untitled")
            .to_string()
    });
    if let Some(id) = &args.music {
        MusicCatalog::track(id)?;
    }

    let drafts = parse_script(&script);
    let mut project = Project::new(title);
    project.script = Some(script);
    project.style = StyleTag::new(args.style);
    project.voice_type = args.voice;
    project.music_track = args.music;
    let count = drafts.len();
    project.replace_scenes_from_drafts(drafts)?;

    write_project(&project, &args.out)?;
    eprintln!("wrote {} ({count} scenes)", args.out.display());
    Ok(())
}

fn cmd_frame(cfg: &EngineConfig, args: FrameArgs) -> anyhow::Result<()> {
    let project = read_project(&args.in_path)?;
    let snapshot = project.snapshot();
    let scene = snapshot.scenes.get(args.scene).with_context(|| {
        format!(
            "scene {} out of range (project has {})",
            args.scene,
            snapshot.scenes.len()
        )
    })?;

    let orchestrator = orchestrator(cfg.clone(), &args.in_path)?;
    let compositor = orchestrator.compositor();
    let image = match &scene.image_url {
        Some(url) => {
            let path = assets_root(&args.in_path).join(url.strip_prefix("file://").unwrap_or(url));
            match std::fs::read(&path).map_err(anyhow::Error::from).and_then(|bytes| {
                compositor
                    .prepare_background(&bytes)
                    .map_err(anyhow::Error::from)
            }) {
                Ok(img) => Some(img),
                Err(err) => {
                    tracing::warn!(url, error = %err, "scene image unavailable; using placeholder");
                    None
                }
            }
        }
        None => None,
    };
    let frame = compositor
        .compose(scene, &snapshot.style, image.as_ref())
        .unwrap_or_else(|err| {
            tracing::warn!(error = %err, "compositing failed; using placeholder frame");
            compositor.placeholder(scene, &snapshot.style)
        });

    write_png(&frame, &args.out)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

async fn cmd_render(mut cfg: EngineConfig, args: RenderArgs) -> anyhow::Result<()> {
    if let Some(dir) = args.out_dir {
        cfg.output_dir = dir;
    }
    let project = read_project(&args.in_path)?;
    let orchestrator = orchestrator(cfg.clone(), &args.in_path)?;
    let narrator = Arc::new(CommandSynthesizer::detect(cfg.speech.clone()).await);
    let studio = Studio::new(project, narrator, Arc::new(TokioClock), orchestrator);

    let mut on_progress = |u: ProgressUpdate| {
        tracing::info!(percent = u.percent, phase = %u.phase, "render progress");
    };
    let render = studio.render(&mut on_progress);
    tokio::pin!(render);
    let rendered = loop {
        tokio::select! {
            r = &mut render => break r?,
            _ = tokio::signal::ctrl_c() => {
                studio.cancel_render();
            }
        }
    };

    match rendered {
        Some(artifact) => {
            if args.save {
                let project = studio.current().read(Project::clone);
                write_project(&project, &args.in_path)?;
            }
            eprintln!(
                "wrote {} ({:.1}s, {} frames)",
                artifact.location.display(),
                artifact.duration.as_secs_f64(),
                artifact.frame_count
            );
        }
        None => eprintln!("render cancelled"),
    }
    Ok(())
}

async fn cmd_preview(cfg: EngineConfig, args: PreviewArgs) -> anyhow::Result<()> {
    let project = read_project(&args.in_path)?;
    let orchestrator = orchestrator(cfg.clone(), &args.in_path)?;
    let narrator = Arc::new(CommandSynthesizer::detect(cfg.speech.clone()).await);
    let studio = Studio::new(project, narrator, Arc::new(TokioClock), orchestrator);

    let (mut task, mut events) = studio.start_preview_with_events()?;
    let report = loop {
        tokio::select! {
            r = &mut task => break r.context("preview task panicked")??,
            Some(ev) = events.recv() => eprintln!("{ev:?}"),
            _ = tokio::signal::ctrl_c() => {
                studio.stop_preview();
            }
        }
    };
    eprintln!(
        "preview {:?} after {:.1}s",
        report.outcome,
        report.total().as_secs_f64()
    );
    Ok(())
}
