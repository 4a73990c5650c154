//! Argus CLI - batch image analysis against vision LLMs.
//!
//! Argus applies a prompt set to every camera image of a date, staying under
//! the provider's rate limits and checkpointing results as it goes.
//!
//! # Usage
//!
//! ```bash
//! # Analyze all PTZ images captured on a date
//! argus analyze --date 2025-11-26 --camera-type PTZ --prompts prompts.toml
//!
//! # Stream results to a file
//! argus analyze --date 2025-11-26 --prompts prompts.toml --output results.jsonl
//!
//! # Copy a local capture folder into the store first
//! argus upload --date-dir ./2025-11-26
//!
//! # List checkpointed runs
//! argus runs
//!
//! # View configuration
//! argus config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Argus - rate-limited, checkpointed batch image analysis.
#[derive(Parser, Debug)]
#[command(name = "argus")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a date's images against a prompt set
    Analyze(cli::analyze::AnalyzeArgs),

    /// List checkpointed runs
    Runs(cli::runs::RunsArgs),

    /// Upload a local date folder of images into the store
    Upload(cli::upload::UploadArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match argus_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `argus config path`."
            );
            argus_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Argus v{}", argus_core::VERSION);

    match cli.command {
        Commands::Analyze(args) => cli::analyze::execute(args, config).await,
        Commands::Runs(args) => cli::runs::execute(args, config).await,
        Commands::Upload(args) => cli::upload::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
