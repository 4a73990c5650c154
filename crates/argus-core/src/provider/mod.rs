//! Vision provider integration.
//!
//! Provides the provider abstraction the evaluator calls through, the request
//! and response shapes, and an OpenAI-compatible Chat Completions backend.

pub(crate) mod openai;
pub(crate) mod vision;

pub use openai::OpenAiProvider;
pub use vision::{
    resolve_env_var, Detail, ImageInput, ImageReference, TokenUsage, VisionProvider,
    VisionProviderFactory, VisionRequest, VisionResponse,
};
