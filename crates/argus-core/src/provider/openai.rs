//! OpenAI vision provider using the Chat Completions API.
//!
//! Sends the image as an `image_url` content block (remote URL or data URL)
//! and asks for a JSON object response. HTTP failures are classified into the
//! three provider error conditions the evaluator distinguishes.

use super::vision::{Detail, TokenUsage, VisionProvider, VisionRequest, VisionResponse};
use crate::analysis::retry;
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// OpenAI provider using Chat Completions API.
pub struct OpenAiProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self::with_endpoint(
            api_key,
            model,
            "https://api.openai.com/v1/chat/completions",
            Duration::from_secs(60),
        )
    }

    /// Create with a custom endpoint (Azure, proxies, compatible gateways).
    pub fn with_endpoint(api_key: &str, model: &str, endpoint: &str, timeout: Duration) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            timeout,
        }
    }
}

// --- Request types ---

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ChatContent>,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ChatContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
    detail: Detail,
}

// --- Response types ---

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    model: String,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: u64,
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Classify a non-success HTTP response into a provider error.
pub(crate) fn classify_failure(status: u16, headers: &HeaderMap, body: &str) -> ProviderError {
    let message = format!("OpenAI HTTP {status}: {body}");

    if status == 429 {
        return ProviderError::RateLimited {
            retry_after: retry_after_from_headers(headers).or_else(|| retry::parse_retry_after(body)),
            message,
        };
    }

    let lower = body.to_lowercase();
    if lower.contains("timeout while downloading") || lower.contains("timed out while downloading")
    {
        return ProviderError::ImageFetchTimeout { message };
    }

    ProviderError::Other {
        message,
        status_code: Some(status),
    }
}

/// Read `retry-after-ms` (milliseconds) or `retry-after` (seconds) headers.
fn retry_after_from_headers(headers: &HeaderMap) -> Option<Duration> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0)
    };
    if let Some(ms) = header("retry-after-ms") {
        return Some(Duration::from_millis(ms.ceil() as u64));
    }
    header("retry-after").map(|secs| Duration::from_millis((secs * 1000.0).ceil() as u64))
}

#[async_trait]
impl VisionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn analyze(&self, request: &VisionRequest) -> Result<VisionResponse, ProviderError> {
        let start = Instant::now();

        let body = ChatRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: ResponseFormat {
                format_type: "json_object".to_string(),
            },
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ChatContent::Text {
                        text: request.instruction.clone(),
                    },
                    ChatContent::ImageUrl {
                        image_url: ImageUrl {
                            url: request.image.as_url(),
                            detail: request.detail,
                        },
                    },
                ],
            }],
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .timeout(self.timeout())
            .send()
            .await
            .map_err(|e| ProviderError::other(format!("OpenAI request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let headers = resp.headers().clone();
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_failure(status.as_u16(), &headers, &text));
        }

        let chat_resp: ChatResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::other(format!("Failed to parse OpenAI response: {e}")))?;

        let content = chat_resp
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| {
                ProviderError::other("OpenAI returned empty choices array, no content generated")
            })?;

        let judgement = parse_judgement(&content)?;

        Ok(VisionResponse {
            judgement,
            usage: chat_resp.usage.map(|u| TokenUsage {
                total_tokens: u.total_tokens,
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            }),
            model: chat_resp.model,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Parse the message content as JSON, tolerating a surrounding code fence.
fn parse_judgement(content: &str) -> Result<serde_json::Value, ProviderError> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str(unfenced)
        .map_err(|e| ProviderError::other(format!("Provider returned non-JSON judgement: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_classify_429_with_ms_header() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after-ms", HeaderValue::from_static("250"));
        let err = classify_failure(429, &headers, "Rate limit reached");
        match err {
            ProviderError::RateLimited { retry_after, .. } => {
                assert_eq!(retry_after, Some(Duration::from_millis(250)));
            }
            other => panic!("expected rate limit, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_429_with_seconds_header() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("2"));
        let err = classify_failure(429, &headers, "slow down");
        assert!(matches!(
            err,
            ProviderError::RateLimited { retry_after: Some(d), .. } if d == Duration::from_secs(2)
        ));
    }

    #[test]
    fn test_classify_429_hint_from_body() {
        let err = classify_failure(
            429,
            &HeaderMap::new(),
            "Rate limit reached for gpt-4o on tokens per min. Please try again in 1.5s.",
        );
        assert!(matches!(
            err,
            ProviderError::RateLimited { retry_after: Some(d), .. } if d == Duration::from_millis(1500)
        ));
    }

    #[test]
    fn test_classify_image_download_timeout() {
        let body = r#"{"error":{"message":"Timeout while downloading https://storage.example/a.jpg.","code":"invalid_image_url"}}"#;
        let err = classify_failure(400, &HeaderMap::new(), body);
        assert!(err.is_image_fetch_timeout());
    }

    #[test]
    fn test_classify_other_keeps_status() {
        let err = classify_failure(401, &HeaderMap::new(), "unauthorized");
        assert!(matches!(
            err,
            ProviderError::Other { status_code: Some(401), .. }
        ));
        assert!(!err.is_rate_limited());
    }

    #[test]
    fn test_parse_judgement_plain_and_fenced() {
        let plain = parse_judgement(r#"{"match": true}"#).unwrap();
        assert_eq!(plain["match"], true);

        let fenced = parse_judgement("```json\n{\"count\": 3}\n```").unwrap();
        assert_eq!(fenced["count"], 3);

        assert!(parse_judgement("not json").is_err());
    }

    #[test]
    fn test_request_serializes_detail_and_json_mode() {
        let body = ChatRequest {
            model: "gpt-4o".to_string(),
            max_tokens: 10,
            temperature: 0.1,
            response_format: ResponseFormat {
                format_type: "json_object".to_string(),
            },
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![ChatContent::ImageUrl {
                    image_url: ImageUrl {
                        url: "https://x/a.jpg".to_string(),
                        detail: Detail::Low,
                    },
                }],
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["content"][0]["type"], "image_url");
        assert_eq!(json["messages"][0]["content"][0]["image_url"]["detail"], "low");
    }
}
