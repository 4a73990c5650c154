//! Per-image analysis across a prompt set.
//!
//! The signed URL is derived once per image and shared by every prompt, so
//! signing cost does not grow with the prompt set. A failing prompt becomes a
//! low-confidence negative result and never blocks the other prompts.

use super::evaluator::{PromptEvaluator, SignedImage};
use crate::config::PromptMode;
use crate::store::ObjectStore;
use crate::types::{AnalysisResult, ImageAnalysisResult, ImageTask, PromptSpec};
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;

/// Runs the prompt evaluator over every prompt for one image.
pub struct ImageAnalyzer {
    evaluator: Arc<PromptEvaluator>,
    store: Arc<dyn ObjectStore>,
    url_ttl: Duration,
    mode: PromptMode,
}

impl ImageAnalyzer {
    pub fn new(
        evaluator: Arc<PromptEvaluator>,
        store: Arc<dyn ObjectStore>,
        url_ttl: Duration,
        mode: PromptMode,
    ) -> Self {
        Self {
            evaluator,
            store,
            url_ttl,
            mode,
        }
    }

    /// Analyze one image against the whole prompt set.
    ///
    /// Returns `status=error` with no results only when the image reference
    /// itself cannot be obtained.
    pub async fn analyze(&self, task: &ImageTask, prompts: &[PromptSpec]) -> ImageAnalysisResult {
        let url = match self.store.signed_read_url(&task.path, self.url_ttl).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Could not sign {}: {e}", task.path);
                return ImageAnalysisResult::error(task, e.to_string());
            }
        };
        let image = SignedImage {
            key: task.path.clone(),
            url,
        };

        let results = match self.mode {
            PromptMode::Parallel => {
                join_all(prompts.iter().map(|prompt| self.evaluate_prompt(&image, prompt))).await
            }
            PromptMode::Sequential => {
                let mut results = Vec::with_capacity(prompts.len());
                for prompt in prompts {
                    results.push(self.evaluate_prompt(&image, prompt).await);
                }
                results
            }
        };

        ImageAnalysisResult::success(task, results)
    }

    async fn evaluate_prompt(&self, image: &SignedImage, prompt: &PromptSpec) -> AnalysisResult {
        match self.evaluator.evaluate(image, prompt).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Prompt '{}' failed on {}: {e}", prompt.id, image.key);
                AnalysisResult::failed(prompt, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::evaluator::EvaluatorOptions;
    use crate::analysis::limiter::RateLimiter;
    use crate::analysis::mock::{MockProvider, MockReply};
    use crate::error::StoreResult;
    use crate::store::{MemoryStore, ObjectTags};
    use crate::types::{Confidence, ImageStatus};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Memory store that counts URL signings.
    struct CountingStore {
        inner: MemoryStore,
        signs: AtomicU32,
    }

    #[async_trait]
    impl ObjectStore for CountingStore {
        fn name(&self) -> &str {
            "counting"
        }
        async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
            self.inner.list(prefix).await
        }
        async fn read(&self, key: &str) -> StoreResult<Vec<u8>> {
            self.inner.read(key).await
        }
        async fn size(&self, key: &str) -> StoreResult<Option<u64>> {
            self.inner.size(key).await
        }
        async fn write(
            &self,
            key: &str,
            bytes: Vec<u8>,
            content_type: &str,
            tags: ObjectTags,
        ) -> StoreResult<()> {
            self.inner.write(key, bytes, content_type, tags).await
        }
        async fn tags(&self, key: &str) -> StoreResult<ObjectTags> {
            self.inner.tags(key).await
        }
        async fn signed_read_url(&self, key: &str, ttl: Duration) -> StoreResult<String> {
            self.signs.fetch_add(1, Ordering::SeqCst);
            self.inner.signed_read_url(key, ttl).await
        }
    }

    fn prompts(n: usize) -> Vec<PromptSpec> {
        (0..n)
            .map(|i| PromptSpec {
                id: format!("p{i}"),
                name: format!("Prompt {i}"),
                objective: format!("Objective {i}"),
                looking_for: "anything".to_string(),
                criteria: "always".to_string(),
            })
            .collect()
    }

    fn task() -> ImageTask {
        ImageTask::new("images/2025-11-26/FIXED/gate.jpg", "2025-11-26", "FIXED")
    }

    fn analyzer(provider: Arc<MockProvider>, store: Arc<CountingStore>, mode: PromptMode) -> ImageAnalyzer {
        let evaluator = PromptEvaluator::new(
            provider,
            store.clone(),
            Arc::new(RateLimiter::new(100, 1_000_000, Duration::from_secs(60))),
            EvaluatorOptions::default(),
        );
        ImageAnalyzer::new(Arc::new(evaluator), store, Duration::from_secs(300), mode)
    }

    fn store_with_image() -> Arc<CountingStore> {
        let inner = MemoryStore::new();
        inner.insert("images/2025-11-26/FIXED/gate.jpg", vec![0xFF, 0xD8, 0xFF], "image/jpeg");
        Arc::new(CountingStore {
            inner,
            signs: AtomicU32::new(0),
        })
    }

    #[tokio::test]
    async fn test_one_signing_for_all_prompts() {
        let provider = Arc::new(MockProvider::replying(json!({"match": true, "count": 1})));
        let store = store_with_image();
        let result = analyzer(provider.clone(), store.clone(), PromptMode::Parallel)
            .analyze(&task(), &prompts(5))
            .await;

        assert_eq!(result.status, ImageStatus::Success);
        assert_eq!(store.signs.load(Ordering::SeqCst), 1);
        assert_eq!(provider.calls(), 5);
        let urls: HashSet<String> = provider.requests().iter().map(|r| r.image.as_url()).collect();
        assert_eq!(urls.len(), 1);
    }

    #[tokio::test]
    async fn test_results_cover_prompt_set_exactly() {
        let provider = Arc::new(MockProvider::replying(json!({"match": false})));
        let set = prompts(3);
        let result = analyzer(provider, store_with_image(), PromptMode::Sequential)
            .analyze(&task(), &set)
            .await;

        assert_eq!(result.results.len(), set.len());
        let ids: Vec<&str> = result.results.iter().map(|r| r.prompt_id.as_str()).collect();
        assert_eq!(ids, vec!["p0", "p1", "p2"]);
    }

    #[tokio::test]
    async fn test_failed_prompt_does_not_block_others() {
        let provider = Arc::new(MockProvider::responder(|request| {
            if request.instruction.contains("Objective 1") {
                MockReply::Fail(400, "content policy".to_string())
            } else {
                MockReply::judgement(json!({"match": true, "confidence": "high"}))
            }
        }));
        let result = analyzer(provider, store_with_image(), PromptMode::Parallel)
            .analyze(&task(), &prompts(3))
            .await;

        assert_eq!(result.status, ImageStatus::Success);
        assert_eq!(result.results.len(), 3);
        let failed = &result.results[1];
        assert!(!failed.matched);
        assert_eq!(failed.confidence, Confidence::Low);
        assert!(failed.details.contains("content policy"));
        assert!(result.results[0].matched);
        assert!(result.results[2].matched);
    }

    #[tokio::test]
    async fn test_signing_failure_marks_image_error() {
        let provider = Arc::new(MockProvider::replying(json!({"match": true})));
        let store = Arc::new(CountingStore {
            inner: MemoryStore::new(),
            signs: AtomicU32::new(0),
        });
        let result = analyzer(provider.clone(), store, PromptMode::Parallel)
            .analyze(&task(), &prompts(2))
            .await;

        assert_eq!(result.status, ImageStatus::Error);
        assert!(result.results.is_empty());
        assert!(result.error.unwrap().contains("not found"));
        assert_eq!(provider.calls(), 0);
    }
}
