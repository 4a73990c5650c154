//! The `argus upload` command: copy a local capture folder into the store.

use std::path::PathBuf;
use std::sync::Arc;

use argus_core::{Config, ImageUploader, ObjectStore, UploadSummary};
use clap::Args;

/// Arguments for the `upload` command.
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Local date folder holding camera-type subfolders (e.g. ./2025-11-26_chittoor)
    #[arg(long)]
    pub date_dir: PathBuf,

    /// Date folder name in the store (defaults to the local folder's name)
    #[arg(long)]
    pub date: Option<String>,

    /// Object store root (defaults to [store].root)
    #[arg(long, env = "ARGUS_STORE")]
    pub store: Option<String>,
}

/// Execute the upload command.
pub async fn execute(args: UploadArgs, config: Config) -> anyhow::Result<()> {
    anyhow::ensure!(
        args.date_dir.is_dir(),
        "Local images directory not found: {}",
        args.date_dir.display()
    );

    let store: Arc<dyn ObjectStore> = Arc::new(super::open_store(&config, args.store.as_deref()));
    let uploader = ImageUploader::new(store, &config.store.image_prefix);

    let items = uploader.plan(&args.date_dir, args.date.as_deref());
    if items.is_empty() {
        eprintln!("No image files found under {}", args.date_dir.display());
        return Ok(());
    }
    tracing::info!("Found {} image file(s) to upload", items.len());

    let progress = create_progress_bar(items.len() as u64);
    let mut summary = UploadSummary::default();
    for item in &items {
        let outcome = uploader.upload(item).await;
        if let Err(e) = &outcome {
            progress.suspend(|| tracing::error!("Error uploading {:?}: {e}", item.path));
        }
        summary.record(&outcome);
        progress.inc(1);
    }
    progress.finish_and_clear();

    print_summary(&summary);
    anyhow::ensure!(summary.failed == 0, "{} file(s) failed to upload", summary.failed);
    Ok(())
}

fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} Uploading [{bar:40.cyan/blue}] {pos}/{len} files")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
    pb.set_style(style);
    pb
}

fn print_summary(summary: &UploadSummary) {
    eprintln!();
    eprintln!("  ====================================");
    eprintln!("            Upload Summary");
    eprintln!("  ====================================");
    eprintln!("    Total files:  {:>8}", summary.total);
    eprintln!("    Uploaded:     {:>8}", summary.uploaded);
    eprintln!("    Skipped:      {:>8}", summary.skipped);
    if summary.failed > 0 {
        eprintln!("    Failed:       {:>8}", summary.failed);
    }
    eprintln!("  ====================================");
}
