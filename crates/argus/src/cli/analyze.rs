//! The `argus analyze` command: run a prompt set over one date's images.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use argus_core::config::PromptMode;
use argus_core::{
    BatchOrchestrator, Config, ObjectStore, OutputFormat, OutputWriter, PromptSet, RunEvent,
    RunMetadata, RunSummary, TaskDiscovery, VisionProvider, VisionProviderFactory,
};
use clap::{Args, ValueEnum};

/// Result output formats.
#[derive(Clone, Copy, Debug, ValueEnum, Default)]
pub enum FormatArg {
    /// One JSON array written when the run ends
    Json,
    /// One JSON object per line, streamed as images complete
    #[default]
    Jsonl,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Jsonl => OutputFormat::JsonLines,
        }
    }
}

/// Arguments for the `analyze` command.
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Date folder to analyze (e.g. 2025-11-26 or 2025-11-26_chittoor)
    #[arg(long)]
    pub date: String,

    /// Only analyze this camera type (ANALYTICS, FIXED, PTZ, ...)
    #[arg(long)]
    pub camera_type: Option<String>,

    /// Prompt set file (.toml or .json)
    #[arg(long)]
    pub prompts: PathBuf,

    /// Object store root (defaults to [store].root)
    #[arg(long, env = "ARGUS_STORE")]
    pub store: Option<String>,

    /// Images analyzed concurrently per group (defaults to [batch].group_size)
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "jsonl")]
    pub format: FormatArg,

    /// Vision model (defaults to [provider].model)
    #[arg(long)]
    pub model: Option<String>,

    /// Run an image's prompts one after another instead of in parallel
    #[arg(long)]
    pub sequential: bool,

    /// HTTP base the store root is served under (defaults to [store].public_base_url)
    #[arg(long, env = "ARGUS_PUBLIC_URL")]
    pub public_url: Option<String>,
}

/// Execute the analyze command.
pub async fn execute(args: AnalyzeArgs, mut config: Config) -> anyhow::Result<()> {
    apply_overrides(&mut config, &args)?;
    require_public_url(&config)?;

    let prompts = PromptSet::load_from(&args.prompts)?;
    let store: Arc<dyn ObjectStore> = Arc::new(super::open_store(&config, args.store.as_deref()));

    let discovery = TaskDiscovery::new(store.clone(), &config.store.image_prefix);
    let tasks = discovery
        .discover(&args.date, args.camera_type.as_deref())
        .await?;
    if tasks.is_empty() {
        tracing::warn!(
            "No images found for date {} (camera type: {})",
            args.date,
            args.camera_type.as_deref().unwrap_or("all")
        );
        let dates = discovery.dates().await?;
        if !dates.is_empty() {
            eprintln!("Dates with images: {}", dates.join(", "));
        }
        return Ok(());
    }
    tracing::info!(
        "Found {} image(s), {} prompt(s) from {:?}",
        tasks.len(),
        prompts.len(),
        args.prompts
    );

    let provider: Arc<dyn VisionProvider> =
        VisionProviderFactory::create(&config.provider, args.model.as_deref())?.into();
    let orchestrator = Arc::new(BatchOrchestrator::from_config(&config, provider, store));

    let metadata = RunMetadata::new(
        args.date.clone(),
        args.camera_type
            .as_deref()
            .map(str::to_uppercase)
            .unwrap_or_else(|| "ALL".to_string()),
    );

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(std::io::stdout().lock()),
    };
    let mut writer = OutputWriter::new(sink, args.format.into());

    let total = tasks.len() as u64;
    let progress = create_progress_bar(total);
    let start = Instant::now();
    let mut summary = None;
    let mut failure = None;

    let mut run = orchestrator.submit(tasks, prompts.into_inner(), metadata);
    while let Some(event) = run.events.recv().await {
        match event {
            RunEvent::Start { run_id, .. } => {
                tracing::info!("Run id: {run_id}");
            }
            RunEvent::Progress {
                current, matched, ..
            } => {
                progress.set_position(current as u64);
                progress.set_message(format!("{matched} matched"));
            }
            RunEvent::ImageCompleted { result } => {
                if let Some(error) = &result.error {
                    tracing::warn!("{}: {error}", result.image_path);
                }
                writer.write(&result)?;
            }
            RunEvent::CheckpointSaved { path } => {
                tracing::debug!("Checkpoint saved: {path}");
            }
            RunEvent::Error { message, checkpoint } => {
                progress.abandon_with_message("failed");
                failure = Some((message, checkpoint));
            }
            RunEvent::Complete {
                final_path,
                summary: run_summary,
            } => {
                progress.finish_with_message("done");
                summary = Some((run_summary, final_path));
            }
        }
    }

    let outcome = run.finish().await;
    writer.finish()?;
    if let Some(path) = &args.output {
        tracing::info!("Output written to {:?}", path);
    }

    if let Some((message, checkpoint)) = failure {
        eprintln!("Run failed: {message}");
        if let Some(path) = checkpoint {
            eprintln!("Partial results saved to {path}");
        }
    }
    if let Some((run_summary, final_path)) = &summary {
        print_summary(run_summary, final_path.as_deref(), start.elapsed());
    }

    outcome?;
    Ok(())
}

/// Fold CLI flags into the loaded configuration.
fn apply_overrides(config: &mut Config, args: &AnalyzeArgs) -> anyhow::Result<()> {
    if let Some(concurrency) = args.concurrency {
        anyhow::ensure!(concurrency > 0, "--concurrency must be at least 1");
        config.batch.group_size = concurrency;
    }
    if args.sequential {
        config.batch.prompt_mode = PromptMode::Sequential;
    }
    if let Some(url) = &args.public_url {
        config.store.public_base_url = Some(url.clone());
    }
    Ok(())
}

/// The provider downloads images itself, so signed URLs must be reachable over HTTP.
fn require_public_url(config: &Config) -> anyhow::Result<()> {
    match config.store.public_base_url.as_deref().map(str::trim) {
        Some(url) if url.starts_with("http://") || url.starts_with("https://") => Ok(()),
        Some(url) => anyhow::bail!(
            "store.public_base_url must be an http(s) URL the vision provider can fetch, got {url:?}"
        ),
        None => anyhow::bail!(
            "No public URL for the image store: the vision provider cannot read local files.\n  \
             Serve {} over HTTP and set [store].public_base_url or pass --public-url.",
            config.store_root().display()
        ),
    }
}

fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
    pb.set_style(style);
    pb.set_message("starting...");
    pb
}

/// Print a formatted summary table after the run.
fn print_summary(summary: &RunSummary, checkpoint: Option<&str>, elapsed: std::time::Duration) {
    let rate = if elapsed.as_secs_f64() > 0.0 {
        summary.total as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Succeeded:    {:>8}", summary.successful);
    if summary.failed > 0 {
        eprintln!("    Failed:       {:>8}", summary.failed);
    }
    eprintln!("    Matched:      {:>8}", summary.matched);
    eprintln!("  ------------------------------------");
    eprintln!("    Total:        {:>8}", summary.total);
    eprintln!("    Duration:     {:>7.1}s", elapsed.as_secs_f64());
    eprintln!("    Rate:         {:>7.2} img/sec", rate);
    if let Some(path) = checkpoint {
        eprintln!("    Checkpoint:   {path}");
    }
    eprintln!("  ====================================");
}
