use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use reel_compositor::{
    composition::{
        default_compilation_name, default_recut_name, default_shorts_name, load_cues, AssemblyOptions,
        CompositionEngine,
    },
    config::Config,
    diagnostics::{diagnose_all, repair_path, DiagnosticSummary},
    selection::TrimOffset,
    transitions::TransitionPolicy,
    video::{pool::is_supported, ClipPool, FfmpegBackend},
    CompilationResult, CompositorError,
};

#[derive(Parser)]
#[command(
    name = "reel-compositor",
    version,
    about = "Assemble compilations and multi-clip Shorts from short video clips",
    long_about = "Reel-Compositor validates a pool of short clips, trims them to fit a duration budget, joins them with transitions and encodes one vertical video plus a JSON record of what went in."
)]
struct Cli {
    /// Configuration file (optional)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble a long-form compilation
    Compile {
        #[command(flatten)]
        run: RunArgs,

        /// Target duration in seconds
        #[arg(short, long)]
        duration: Option<f64>,
    },

    /// Pack a multi-clip Short (60 seconds at most)
    Shorts {
        #[command(flatten)]
        run: RunArgs,

        /// Hard cap in seconds
        #[arg(long)]
        cap: Option<f64>,
    },

    /// Cut the opening of a finished compilation into a branded Short
    CompilationShort {
        /// The finished video
        input: PathBuf,

        /// Output video file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Title used in the default file name
        #[arg(short, long)]
        title: Option<String>,

        #[command(flatten)]
        branding: BrandingArgs,
    },

    /// Cut one branded Short from each clip
    ClipShorts {
        /// Directory of clips
        #[arg(short, long, conflicts_with = "manifest", required_unless_present = "manifest")]
        input: Option<PathBuf>,

        /// JSON manifest of clips with author/title attribution
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Where the Shorts are written
        #[arg(short, long, default_value = "data/shorts")]
        output_dir: PathBuf,

        #[command(flatten)]
        branding: BrandingArgs,
    },

    /// Inspect clips without changing them
    Diagnose {
        /// Video files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Print the reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-encode a clip at an explicit frame rate
    Repair {
        input: PathBuf,

        /// Defaults to <stem>_repaired.<ext> next to the input
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Directory of clips (numbered names like 01_clip.mp4 keep their order)
    #[arg(short, long, conflicts_with = "manifest", required_unless_present = "manifest")]
    input: Option<PathBuf>,

    /// JSON manifest of clips with author/title attribution
    #[arg(short, long)]
    manifest: Option<PathBuf>,

    /// Output video file path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Title shown on the opening card
    #[arg(short, long)]
    title: Option<String>,

    /// JSON caption cues burned into the output
    #[arg(long)]
    captions: Option<PathBuf>,

    /// Transition policy: random, none, or a transition name
    #[arg(long)]
    transition: Option<TransitionPolicy>,

    /// Seed for random transitions
    #[arg(long)]
    seed: Option<u64>,

    /// Where each segment starts in its clip: start, midpoint, lead-in
    #[arg(long)]
    trim: Option<TrimOffset>,

    /// Skip intro, outro, title card and attribution overlays
    #[arg(long)]
    no_titles: bool,
}

#[derive(Args)]
struct BrandingArgs {
    /// Hard cap in seconds (59 at most)
    #[arg(long)]
    cap: Option<f64>,

    /// Skip the creator credit and call-to-action banner
    #[arg(long)]
    no_branding: bool,
}

impl BrandingArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(cap) = self.cap {
            config.shorts.hard_cap_seconds = cap;
        }
        if self.no_branding {
            config.shorts.branding = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("reel_compositor={default_level},warn")));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    info!("Starting Reel-Compositor v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };

    let outcome = match cli.command {
        Command::Compile { run, duration } => {
            let mut config = config;
            if let Some(duration) = duration {
                config.compilation.target_duration = duration;
            }
            if let Some(trim) = run.trim {
                config.compilation.trim_offset = trim;
            }
            compose(config, run, false).await
        }
        Command::Shorts { run, cap } => {
            let mut config = config;
            if let Some(cap) = cap {
                config.shorts.hard_cap_seconds = cap;
            }
            if let Some(trim) = run.trim {
                config.shorts.trim_offset = trim;
            }
            compose(config, run, true).await
        }
        Command::CompilationShort {
            input,
            output,
            title,
            branding,
        } => {
            let mut config = config;
            branding.apply(&mut config);
            let output = output.unwrap_or_else(|| PathBuf::from(default_recut_name(title.as_deref(), Utc::now())));

            let engine = CompositionEngine::new(config, FfmpegBackend::new()?)?.with_cancellation(cancel_on_ctrl_c());
            engine
                .short_from_video(&input, &output, title.as_deref())
                .await
                .map(|short| println!("{}", short.output_path.display()))
                .map_err(anyhow::Error::from)
        }
        Command::ClipShorts {
            input,
            manifest,
            output_dir,
            branding,
        } => {
            let mut config = config;
            branding.apply(&mut config);
            let pool = load_pool(input.as_ref(), manifest.as_ref())?;

            let engine = CompositionEngine::new(config, FfmpegBackend::new()?)?.with_cancellation(cancel_on_ctrl_c());
            match engine.shorts_per_clip(pool, &output_dir).await {
                Ok(outcome) => {
                    for short in &outcome.shorts {
                        println!("{}", short.output_path.display());
                    }
                    if !outcome.dropped.is_empty() {
                        println!("skipped: {}", outcome.dropped.len());
                    }
                    Ok(())
                }
                Err(e) => Err(anyhow::Error::from(e)),
            }
        }
        Command::Diagnose { paths, json } => diagnose(&paths, json).await,
        Command::Repair { input, output } => {
            let backend = FfmpegBackend::new()?;
            let repaired = repair_path(&backend, &input, output.as_deref()).await?;
            println!("{}", repaired.display());
            Ok(())
        }
    };

    if let Err(e) = &outcome {
        if let Some(compositor) = e.downcast_ref::<CompositorError>() {
            error!("{}", compositor.user_message());
        }
    }
    outcome
}

async fn compose(mut config: Config, run: RunArgs, shorts: bool) -> Result<()> {
    if let Some(policy) = run.transition {
        config.transitions.transition_type = policy;
    }
    if run.seed.is_some() {
        config.transitions.seed = run.seed;
    }
    if run.no_titles {
        config.assets.include_titles = false;
        config.assets.use_intro = false;
        config.assets.use_outro = false;
    }

    let pool = load_pool(run.input.as_ref(), run.manifest.as_ref())?;

    let captions = match &run.captions {
        Some(path) => load_cues(path)?,
        None => Vec::new(),
    };

    let now = Utc::now();
    let output = run.output.clone().unwrap_or_else(|| {
        PathBuf::from(if shorts {
            default_shorts_name(run.title.as_deref(), now)
        } else {
            default_compilation_name(now)
        })
    });

    let engine = CompositionEngine::new(config, FfmpegBackend::new()?)?.with_cancellation(cancel_on_ctrl_c());
    let options = AssemblyOptions {
        title: run.title,
        captions,
    };

    let result = if shorts {
        engine.shorts(pool, &output, &options).await?
    } else {
        engine.compile(pool, &output, &options).await?
    };

    print_summary(&result);
    Ok(())
}

fn load_pool(input: Option<&PathBuf>, manifest: Option<&PathBuf>) -> Result<ClipPool> {
    let pool = match (input, manifest) {
        (_, Some(manifest)) => ClipPool::from_manifest(manifest)?,
        (Some(input), None) => ClipPool::from_directory(input)?,
        (None, None) => bail!("either --input or --manifest is required"),
    };
    if pool.is_empty() {
        bail!("no video clips found");
    }
    Ok(pool)
}

/// Flips to true on the first Ctrl-C
fn cancel_on_ctrl_c() -> watch::Receiver<bool> {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, stopping after the current step");
            let _ = cancel_tx.send(true);
        }
    });
    cancel_rx
}

fn print_summary(result: &CompilationResult) {
    println!("{}", result.output_path.display());
    println!(
        "{} clips, {:.2}s of {:.2}s",
        result.clips.len(),
        result.total_duration,
        result.budget
    );
    for line in result.attribution_lines() {
        println!("  {}", line);
    }
    if !result.dropped.is_empty() {
        println!("dropped: {}", result.dropped.len());
    }
}

async fn diagnose(paths: &[PathBuf], json: bool) -> Result<()> {
    let files = expand_paths(paths)?;
    let backend = FfmpegBackend::new()?;
    let reports = diagnose_all(&backend, &files).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        let summary = DiagnosticSummary::from_reports(&reports);
        println!(
            "{} clips: {} ok, {} repairable, {} unusable ({} with warnings)",
            summary.total, summary.passed, summary.repairable, summary.failed, summary.with_warnings
        );
    }
    Ok(())
}

/// Files as given, directories expanded to their supported videos
fn expand_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(path)
                .with_context(|| format!("reading {}", path.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_supported(p))
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(path.to_path_buf());
        }
    }
    if files.is_empty() {
        bail!("no video files to diagnose");
    }
    Ok(files)
}
