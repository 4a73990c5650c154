//! Prompt evaluation: one provider judgement for one (image, prompt) pair.
//!
//! Delivery is two-tier. The provider first gets the signed URL and fetches
//! the image itself; only when that fetch times out are the bytes read from
//! the object store and sent inline, exactly once. Every provider call passes
//! through the rate limiter and reports its real token usage afterwards.

use super::limiter::RateLimiter;
use super::normalize::normalize_judgement;
use super::retry;
use crate::config::Config;
use crate::error::{ArgusError, ProviderError};
use crate::provider::{Detail, ImageInput, ImageReference, VisionProvider, VisionRequest, VisionResponse};
use crate::store::ObjectStore;
use crate::types::{AnalysisResult, PromptSpec};
use std::sync::Arc;

/// An image with the signed URL shared by all of its prompts.
#[derive(Debug, Clone)]
pub struct SignedImage {
    /// Object-store key, used for the inline fallback
    pub key: String,
    /// Time-limited read URL
    pub url: String,
}

/// Configuration for prompt evaluation.
#[derive(Debug, Clone)]
pub struct EvaluatorOptions {
    pub detail: Detail,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Token estimate reserved with the limiter before each call
    pub estimated_tokens: u64,
    /// Attempts per call when the provider rate-limits, including the first
    pub max_attempts: u32,
    /// Backoff unit when no retry hint is given
    pub retry_delay_ms: u64,
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        Self {
            detail: Detail::High,
            temperature: 0.1,
            max_tokens: 800,
            estimated_tokens: 1000,
            max_attempts: 5,
            retry_delay_ms: 1000,
        }
    }
}

impl EvaluatorOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            detail: Detail::parse(&config.provider.detail).unwrap_or_default(),
            temperature: config.provider.temperature,
            max_tokens: config.provider.max_tokens,
            estimated_tokens: config.limits.estimated_tokens_per_call,
            max_attempts: config.retry.max_attempts,
            retry_delay_ms: config.retry.base_delay_ms,
        }
    }
}

/// Issues rate-limited provider calls and normalizes their judgements.
pub struct PromptEvaluator {
    provider: Arc<dyn VisionProvider>,
    store: Arc<dyn ObjectStore>,
    limiter: Arc<RateLimiter>,
    options: EvaluatorOptions,
}

impl PromptEvaluator {
    pub fn new(
        provider: Arc<dyn VisionProvider>,
        store: Arc<dyn ObjectStore>,
        limiter: Arc<RateLimiter>,
        options: EvaluatorOptions,
    ) -> Self {
        Self {
            provider,
            store,
            limiter,
            options,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Evaluate `prompt` against `image`.
    ///
    /// Image-fetch timeouts are handled here by retrying once with inline
    /// bytes. Any other failure is returned for the caller to record.
    pub async fn evaluate(
        &self,
        image: &SignedImage,
        prompt: &PromptSpec,
    ) -> Result<AnalysisResult, ArgusError> {
        let request = self.request(prompt, ImageReference::Url(image.url.clone()));

        let response = match self.call_with_retry(&request).await {
            Ok(response) => response,
            Err(e) if e.is_image_fetch_timeout() => {
                tracing::warn!(
                    "Provider could not fetch {} for '{}', retrying with inline bytes",
                    image.key,
                    prompt.id
                );
                let bytes = self.store.read(&image.key).await?;
                let inline = ImageReference::Inline(ImageInput::from_bytes(&bytes, &image.key));
                self.call_with_retry(&self.request(prompt, inline)).await?
            }
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(
            "Evaluated '{}' on {} via {} ({}ms)",
            prompt.id,
            image.key,
            response.model,
            response.latency_ms
        );
        Ok(normalize_judgement(prompt, &response.judgement))
    }

    fn request(&self, prompt: &PromptSpec, image: ImageReference) -> VisionRequest {
        VisionRequest {
            instruction: prompt.instruction(),
            image,
            detail: self.options.detail,
            temperature: self.options.temperature,
            max_tokens: self.options.max_tokens,
        }
    }

    /// One logical provider call: admitted by the limiter, retried on rate-limit rejections.
    async fn call_with_retry(&self, request: &VisionRequest) -> Result<VisionResponse, ProviderError> {
        let mut attempt = 1;
        loop {
            let admission = self.limiter.admit(self.options.estimated_tokens).await;

            match self.call_once(request).await {
                Ok(response) => {
                    let used = response
                        .usage
                        .map(|u| u.total_tokens)
                        .unwrap_or(admission.estimated_tokens());
                    self.limiter.record_tokens(&admission, used).await;
                    return Ok(response);
                }
                Err(e) if retry::is_retryable(&e) && attempt < self.options.max_attempts => {
                    let hint = match &e {
                        ProviderError::RateLimited { retry_after, .. } => *retry_after,
                        _ => None,
                    };
                    let delay = retry::rate_limit_delay(hint, attempt, self.options.retry_delay_ms);
                    tracing::debug!(
                        "Rate limited (attempt {attempt}/{}), retrying in {delay:?}",
                        self.options.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn call_once(&self, request: &VisionRequest) -> Result<VisionResponse, ProviderError> {
        let timeout = self.provider.timeout();
        match tokio::time::timeout(timeout, self.provider.analyze(request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::other(format!(
                "{} call timed out after {}ms",
                self.provider.name(),
                timeout.as_millis()
            ))),
        }
    }
}
