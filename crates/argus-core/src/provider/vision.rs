//! Vision provider trait and request/response types.
//!
//! Defines the interface that every vision backend implements, plus the
//! factory that builds the configured provider.

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Base64-encoded image bytes sent inline with a request.
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// Base64-encoded image bytes
    pub data: String,
    /// MIME type (e.g., "image/jpeg", "image/png")
    pub media_type: String,
}

impl ImageInput {
    /// Create an `ImageInput` from raw bytes, sniffing the format from the
    /// magic bytes and falling back to the key's extension.
    pub fn from_bytes(bytes: &[u8], key: &str) -> Self {
        let media_type = match image::guess_format(bytes) {
            Ok(format) => format.to_mime_type(),
            Err(_) => media_type_for_key(key),
        };

        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            media_type: media_type.to_string(),
        }
    }

    /// Return a data URL suitable for OpenAI-style APIs.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

fn media_type_for_key(key: &str) -> &'static str {
    let ext = key.rsplit('.').next().unwrap_or("").to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        other => {
            tracing::warn!("Unknown image extension '{other}', defaulting to image/jpeg");
            "image/jpeg"
        }
    }
}

/// How the provider obtains the image.
#[derive(Debug, Clone)]
pub enum ImageReference {
    /// Time-limited URL the provider downloads itself
    Url(String),
    /// Bytes carried inside the request
    Inline(ImageInput),
}

impl ImageReference {
    /// URL form accepted by OpenAI-style `image_url` content blocks.
    pub fn as_url(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Inline(input) => input.data_url(),
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Inline(_))
    }
}

/// Image detail level requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Detail {
    Low,
    #[default]
    High,
    Auto,
}

impl Detail {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "high" => Some(Self::High),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }
}

/// One structured-judgement request: an instruction plus one image.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    /// Natural-language instruction
    pub instruction: String,
    /// The image to judge
    pub image: ImageReference,
    /// Requested image detail level
    pub detail: Detail,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum completion tokens
    pub max_tokens: u32,
}

/// Token usage reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub total_tokens: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// The response from a vision call.
#[derive(Debug, Clone)]
pub struct VisionResponse {
    /// Parsed JSON judgement
    pub judgement: serde_json::Value,
    /// Token usage, when reported
    pub usage: Option<TokenUsage>,
    /// Model identifier used
    pub model: String,
    /// Round-trip latency in milliseconds
    pub latency_ms: u64,
}

/// Trait that all vision providers implement.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (we need `Arc<dyn VisionProvider>` for dynamic dispatch).
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Provider name for logging (e.g., "openai").
    fn name(&self) -> &str;

    /// Request a structured judgement for one image.
    async fn analyze(&self, request: &VisionRequest) -> Result<VisionResponse, ProviderError>;

    /// Per-request timeout for this provider.
    fn timeout(&self) -> Duration;
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Factory that creates the configured provider.
pub struct VisionProviderFactory;

impl VisionProviderFactory {
    /// Create the OpenAI-compatible provider from config, with optional model override.
    pub fn create(
        config: &ProviderConfig,
        model_override: Option<&str>,
    ) -> Result<Box<dyn VisionProvider>, ProviderError> {
        let api_key = resolve_env_var(&config.api_key).ok_or_else(|| {
            ProviderError::other(format!(
                "Provider API key not set (config value '{}'). Set OPENAI_API_KEY env var.",
                config.api_key
            ))
        })?;
        let model = model_override.unwrap_or(&config.model);
        Ok(Box::new(super::openai::OpenAiProvider::with_endpoint(
            &api_key,
            model,
            &config.endpoint,
            Duration::from_millis(config.timeout_ms),
        )))
    }
}
