//! Error types for the Argus batch analysis pipeline.
//!
//! Errors are organized by collaborator (config, object store, vision provider)
//! so that each layer can decide how locally a failure is recovered: per prompt,
//! per image, or for the whole run.

use std::time::Duration;
use thiserror::Error;

/// Top-level error type for Argus operations.
#[derive(Error, Debug)]
pub enum ArgusError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Object store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Vision provider errors
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Prompt set is unusable (empty, duplicate ids, unparseable)
    #[error("Prompt set error: {0}")]
    Prompt(String),

    /// The orchestration loop itself failed
    #[error("Run {run_id} failed after {completed} image(s): {message}")]
    Run {
        run_id: String,
        completed: usize,
        message: String,
    },

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Object store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No object exists under the key
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Key is empty or escapes the store root
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    /// Underlying I/O failure for a specific key
    #[error("IO error for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Tag sidecar or document could not be (de)serialized
    #[error("Serialization error for {key}: {message}")]
    Serialization { key: String, message: String },
}

/// Failure conditions surfaced by a vision provider call.
///
/// The three variants are the only distinctions the evaluator acts on:
/// rate-limit rejections are retried with backoff, image-fetch timeouts
/// trigger the inline-bytes fallback, everything else is terminal for the call.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// The provider rejected the call because a rate limit was hit
    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    /// The provider could not download the remote image reference in time
    #[error("Image fetch timed out: {message}")]
    ImageFetchTimeout { message: String },

    /// Any other failure (auth, bad request, transport, malformed response)
    #[error("{message}")]
    Other {
        message: String,
        status_code: Option<u16>,
    },
}

impl ProviderError {
    /// Shorthand for an unclassified error without an HTTP status.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
            status_code: None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    pub fn is_image_fetch_timeout(&self) -> bool {
        matches!(self, Self::ImageFetchTimeout { .. })
    }
}

/// Convenience type alias for Argus results.
pub type Result<T> = std::result::Result<T, ArgusError>;

/// Convenience type alias for object store results.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
