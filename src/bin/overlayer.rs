use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use overlayer::{
    AssemblyMode, ClipId, ClipReport, EngineConfig, LayoutPlanner, OverlayEngine, PlanStore, Size,
    clip_rng,
};

#[derive(Parser, Debug)]
#[command(name = "overlayer", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render one preview PNG per avatar clip and save the committed layout plans.
    Preview(PreviewArgs),
    /// Render the final videos from saved layout plans (requires `ffmpeg` on PATH).
    Generate(GenerateArgs),
    /// Draw one layout plan and print it as JSON, without touching any media.
    Plan(PlanArgs),
}

#[derive(Parser, Debug)]
struct PreviewArgs {
    /// Main video.
    #[arg(long)]
    main: PathBuf,

    /// Avatar (green-screen) clips; repeat the flag or pass several paths.
    #[arg(long = "avatar", required = true, num_args = 1..)]
    avatars: Vec<PathBuf>,

    /// Engine configuration JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Plan store to reuse and update (default: `<preview_dir>/plans.json`).
    #[arg(long)]
    plans: Option<PathBuf>,

    /// Ignore previously saved plans and draw new layouts.
    #[arg(long)]
    fresh: bool,
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    /// Main video.
    #[arg(long)]
    main: PathBuf,

    /// Avatar clips, each of which must have a saved plan.
    #[arg(long = "avatar", required = true, num_args = 1..)]
    avatars: Vec<PathBuf>,

    /// Plan store written by `preview`.
    #[arg(long)]
    plans: PathBuf,

    /// Temporal assembly of main and avatar.
    #[arg(long, value_enum)]
    mode: ModeChoice,

    /// Engine configuration JSON.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct PlanArgs {
    /// Main video size as WxH.
    #[arg(long)]
    main_size: Size,

    /// Avatar width / height.
    #[arg(long)]
    avatar_aspect: f64,

    /// Clip name the plan is drawn for.
    #[arg(long)]
    clip: String,

    /// Batch seed (overrides the config seed).
    #[arg(long)]
    seed: Option<u64>,

    /// Engine configuration JSON.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeChoice {
    Parallel,
    Sequential,
}

impl From<ModeChoice> for AssemblyMode {
    fn from(m: ModeChoice) -> Self {
        match m {
            ModeChoice::Parallel => AssemblyMode::Parallel,
            ModeChoice::Sequential => AssemblyMode::Sequential,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "overlayer=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Preview(args) => cmd_preview(args),
        Command::Generate(args) => cmd_generate(args),
        Command::Plan(args) => cmd_plan(args),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(p) => EngineConfig::from_path(p).context("load config"),
        None => Ok(EngineConfig::default()),
    }
}

fn cmd_preview(args: PreviewArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let plans_path = args
        .plans
        .unwrap_or_else(|| config.preview_dir.join("plans.json"));
    let mut engine = OverlayEngine::new(config).context("create engine")?;

    if !args.fresh && plans_path.is_file() {
        let store = PlanStore::load(&plans_path).context("load plans")?;
        engine.load_plans(store);
    }

    let reports = engine
        .generate_previews(&args.main, &args.avatars)
        .context("generate previews")?;
    let ok = print_reports(&reports, |out| out.image_path.clone());

    engine.plans().save(&plans_path).context("save plans")?;
    eprintln!("wrote {}", plans_path.display());

    if ok == 0 {
        anyhow::bail!("no preview could be generated");
    }
    Ok(())
}

fn cmd_generate(args: GenerateArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let engine = OverlayEngine::new(config).context("create engine")?;
    let store = PlanStore::load(&args.plans).context("load plans")?;

    let reports = engine
        .generate_from_store(&args.main, &args.avatars, &store, args.mode.into())
        .context("generate videos")?;
    let ok = print_reports(&reports, PathBuf::clone);

    if ok == 0 {
        anyhow::bail!("every clip failed");
    }
    Ok(())
}

fn cmd_plan(args: PlanArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let planner = LayoutPlanner::new(config.layout).context("layout policy")?;
    let clip = ClipId::new(args.clip).context("clip name")?;
    let mut rng = clip_rng(args.seed.or(config.seed), &clip);
    let plan = planner
        .plan(&mut rng, args.main_size, args.avatar_aspect)
        .context("draw plan")?;
    println!(
        "{}",
        serde_json::to_string_pretty(&plan).context("serialize plan")?
    );
    Ok(())
}

/// Print one line per clip; returns the number of successes.
fn print_reports<T>(reports: &[ClipReport<T>], path_of: impl Fn(&T) -> PathBuf) -> usize {
    let mut ok = 0;
    for report in reports {
        match &report.result {
            Ok(out) => {
                ok += 1;
                eprintln!("wrote {}", path_of(out).display());
            }
            Err(e) => eprintln!("failed {}: {e}", report.avatar.display()),
        }
    }
    ok
}
