//! Sub-configuration structs with defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Provider rate limits and the headroom kept below them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Advertised requests-per-minute ceiling of the provider
    pub requests_per_minute: u32,

    /// Advertised tokens-per-minute ceiling of the provider
    pub tokens_per_minute: u64,

    /// Fraction of the request ceiling actually used
    pub request_headroom: f64,

    /// Fraction of the token ceiling actually used
    pub token_headroom: f64,

    /// Length of the trailing window in seconds
    pub window_secs: u64,

    /// Placeholder token estimate reserved at admission time
    pub estimated_tokens_per_call: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 500,
            tokens_per_minute: 30_000,
            request_headroom: 0.96,
            token_headroom: 0.93,
            window_secs: 60,
            estimated_tokens_per_call: 1000,
        }
    }
}

impl LimitsConfig {
    /// Effective call ceiling after headroom (at least 1).
    pub fn max_calls(&self) -> usize {
        ((self.requests_per_minute as f64 * self.request_headroom).round() as usize).max(1)
    }

    /// Effective token ceiling after headroom (at least 1).
    pub fn max_tokens(&self) -> u64 {
        ((self.tokens_per_minute as f64 * self.token_headroom).round() as u64).max(1)
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Retry policy for rate-limit rejections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per provider call, including the first
    pub max_attempts: u32,

    /// Backoff unit in milliseconds when the provider gives no hint
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1000,
        }
    }
}

/// How prompts for a single image are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PromptMode {
    /// All prompts for an image run concurrently
    #[default]
    Parallel,
    /// Prompts run one after another
    Sequential,
}

/// Batch orchestration and checkpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Images analyzed concurrently per group
    pub group_size: usize,

    /// Flush a checkpoint every N completed images
    pub checkpoint_every: usize,

    /// Flush a checkpoint when this many seconds passed since the last one
    pub checkpoint_interval_secs: u64,

    /// Object-store prefix under which checkpoint documents are written
    pub checkpoint_prefix: String,

    /// Prompt scheduling within one image
    pub prompt_mode: PromptMode,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            group_size: 4,
            checkpoint_every: 10,
            checkpoint_interval_secs: 30,
            checkpoint_prefix: "analysis_results".to_string(),
            prompt_mode: PromptMode::Parallel,
        }
    }
}

/// Vision provider settings (OpenAI-compatible Chat Completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API key or `${ENV_VAR}` reference
    pub api_key: String,

    /// Model identifier
    pub model: String,

    /// Chat Completions endpoint
    pub endpoint: String,

    /// Image detail level: "low", "high" or "auto"
    pub detail: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum completion tokens
    pub max_tokens: u32,

    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: "${OPENAI_API_KEY}".to_string(),
            model: "gpt-4o".to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            detail: "high".to_string(),
            temperature: 0.1,
            max_tokens: 800,
            timeout_ms: 60_000,
        }
    }
}

/// Object store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Local directory backing the object store
    pub root: String,

    /// Prefix under which captured images live
    pub image_prefix: String,

    /// Lifetime of signed read URLs in seconds
    pub url_ttl_secs: u64,

    /// HTTP base the store root is published under, used for signed URLs
    pub public_base_url: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: "~/.argus/store".to_string(),
            image_prefix: "images".to_string(),
            url_ttl_secs: 3600,
            public_base_url: None,
        }
    }
}

impl StoreConfig {
    pub fn url_ttl(&self) -> Duration {
        Duration::from_secs(self.url_ttl_secs)
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
