//! The `argus runs` command: list checkpointed runs from their tags.

use argus_core::analysis::{list_checkpoints, read_checkpoint, CheckpointInfo};
use argus_core::Config;
use clap::Args;

/// Arguments for the `runs` command.
#[derive(Args, Debug)]
pub struct RunsArgs {
    /// Object store root (defaults to [store].root)
    #[arg(long, env = "ARGUS_STORE")]
    pub store: Option<String>,

    /// Only list runs for this date
    #[arg(long)]
    pub date: Option<String>,

    /// Print the full checkpoint document for this key instead of listing
    #[arg(long)]
    pub show: Option<String>,

    /// Print one JSON object per run
    #[arg(long)]
    pub json: bool,
}

/// Execute the runs command.
pub async fn execute(args: RunsArgs, config: Config) -> anyhow::Result<()> {
    let store = super::open_store(&config, args.store.as_deref());

    if let Some(key) = &args.show {
        let document = read_checkpoint(&store, key).await?;
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(());
    }

    let mut runs = list_checkpoints(&store, &config.batch.checkpoint_prefix).await?;
    if let Some(date) = &args.date {
        runs.retain(|run| &run.date == date);
    }
    if runs.is_empty() {
        eprintln!("No runs found under {}", config.batch.checkpoint_prefix);
        return Ok(());
    }

    for run in &runs {
        if args.json {
            println!("{}", serde_json::to_string(run)?);
        } else {
            println!("{}", format_row(run));
        }
    }
    Ok(())
}

fn format_row(run: &CheckpointInfo) -> String {
    let state = if run.is_partial { "partial" } else { "complete" };
    format!(
        "{:<60} {:<22} {:<10} {:>5}/{:<5} ok={:<5} err={:<5} {state}",
        run.key,
        run.date,
        run.camera_type,
        run.processed_images,
        run.total_images,
        run.successful,
        run.failed,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_shows_progress_and_state() {
        let info = CheckpointInfo {
            key: "analysis_results/analysis_2025-11-26_PTZ_x.json".to_string(),
            date: "2025-11-26".to_string(),
            camera_type: "PTZ".to_string(),
            total_images: 40,
            processed_images: 12,
            successful: 11,
            failed: 1,
            is_partial: true,
        };
        let row = format_row(&info);
        assert!(row.contains("12/40"));
        assert!(row.contains("ok=11"));
        assert!(row.ends_with("partial"));
    }
}
