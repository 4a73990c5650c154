//! Rate-limited, checkpointed batch analysis.
//!
//! Layered leaves first: [`RateLimiter`] gates every provider call,
//! [`PromptEvaluator`] turns one (image, prompt) pair into an
//! [`AnalysisResult`](crate::types::AnalysisResult), [`ImageAnalyzer`] applies
//! a prompt set to one image, and [`BatchOrchestrator`] drives the whole run.

pub mod analyzer;
pub mod checkpoint;
pub mod evaluator;
pub mod limiter;
pub mod normalize;
pub mod orchestrator;
pub mod retry;

#[cfg(test)]
pub(crate) mod mock;

pub use analyzer::ImageAnalyzer;
pub use checkpoint::{
    list_checkpoints, read_checkpoint, CheckpointDocument, CheckpointInfo, CheckpointWriter,
    RunMetadata,
};
pub use evaluator::{EvaluatorOptions, PromptEvaluator, SignedImage};
pub use limiter::{Admission, RateLimiter, WindowUsage};
pub use orchestrator::{BatchOptions, BatchOrchestrator, RunEvent, RunHandle};
