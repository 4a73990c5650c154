//! Argus Core - rate-limited, checkpointed batch image analysis.
//!
//! Argus applies a set of analysis prompts to every image of a batch using a
//! vision-capable LLM, while staying under the provider's request and token
//! rate limits and checkpointing completed work as it goes.
//!
//! # Architecture
//!
//! ```text
//! BatchOrchestrator → ImageAnalyzer (per image) → PromptEvaluator (per prompt)
//!                   → RateLimiter → VisionProvider
//! ```
//!
//! Images live in an [`ObjectStore`]; checkpoints are written back to it.
//!
//! # Usage
//!
//! ```rust,ignore
//! use argus_core::{BatchOrchestrator, Config, LocalStore, PromptSet, RunMetadata, TaskDiscovery};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> argus_core::Result<()> {
//!     let config = Config::load()?;
//!     let store = Arc::new(LocalStore::new(config.store_root()));
//!     let provider = argus_core::VisionProviderFactory::create(&config.provider, None)?;
//!
//!     let tasks = TaskDiscovery::new(store.clone(), &config.store.image_prefix)
//!         .discover("2025-11-26", Some("PTZ"))
//!         .await?;
//!     let prompts = PromptSet::load_from("prompts.toml".as_ref())?;
//!
//!     let orchestrator = Arc::new(BatchOrchestrator::from_config(&config, provider.into(), store));
//!     let mut run = orchestrator.submit(tasks, prompts.into_inner(), RunMetadata::new("2025-11-26", "PTZ"));
//!     while let Some(event) = run.events.recv().await {
//!         println!("{event:?}");
//!     }
//!     run.finish().await?;
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod config;
pub mod discovery;
pub mod error;
pub mod output;
pub mod prompts;
pub mod provider;
pub mod store;
pub mod types;
pub mod upload;

pub use analysis::{
    BatchOptions, BatchOrchestrator, CheckpointDocument, CheckpointInfo, ImageAnalyzer,
    PromptEvaluator, RateLimiter, RunEvent, RunHandle, RunMetadata,
};
pub use config::Config;
pub use discovery::TaskDiscovery;
pub use error::{ArgusError, ConfigError, ProviderError, Result, StoreError};
pub use output::{OutputFormat, OutputWriter};
pub use prompts::PromptSet;
pub use provider::{VisionProvider, VisionProviderFactory};
pub use store::{LocalStore, MemoryStore, ObjectStore};
pub use types::{
    AnalysisResult, Confidence, ImageAnalysisResult, ImageStatus, ImageTask, PromptSpec,
    RunSummary,
};
pub use upload::{ImageUploader, UploadItem, UploadOutcome, UploadSummary};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
