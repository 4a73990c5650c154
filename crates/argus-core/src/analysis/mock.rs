//! Configurable mock vision provider for analysis tests.

use crate::error::ProviderError;
use crate::provider::{TokenUsage, VisionProvider, VisionRequest, VisionResponse};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted provider outcome.
#[derive(Debug, Clone)]
pub enum MockReply {
    Judgement(Value),
    RateLimited(Option<Duration>),
    FetchTimeout,
    Fail(u16, String),
}

impl MockReply {
    pub fn judgement(value: Value) -> Self {
        Self::Judgement(value)
    }
}

type Responder = Box<dyn Fn(&VisionRequest) -> MockReply + Send + Sync>;

enum Mode {
    /// Replies consumed in order; an exhausted script fails with HTTP 500
    Script(Mutex<VecDeque<MockReply>>),
    /// Reply computed from the request
    Responder(Responder),
}

pub struct MockProvider {
    mode: Mode,
    calls: AtomicU32,
    requests: Mutex<Vec<VisionRequest>>,
    tokens: Option<u64>,
    delay: Option<Duration>,
    /// (in flight now, max observed)
    in_flight: Arc<(AtomicU32, AtomicU32)>,
}

impl MockProvider {
    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
            tokens: Some(42),
            delay: None,
            in_flight: Arc::new((AtomicU32::new(0), AtomicU32::new(0))),
        }
    }

    /// Always answer with `judgement`.
    pub fn replying(judgement: Value) -> Self {
        Self::with_mode(Mode::Responder(Box::new(move |_| {
            MockReply::Judgement(judgement.clone())
        })))
    }

    pub fn scripted(replies: Vec<MockReply>) -> Self {
        Self::with_mode(Mode::Script(Mutex::new(replies.into())))
    }

    pub fn responder<F>(f: F) -> Self
    where
        F: Fn(&VisionRequest) -> MockReply + Send + Sync + 'static,
    {
        Self::with_mode(Mode::Responder(Box::new(f)))
    }

    pub fn with_tokens(mut self, tokens: Option<u64>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<VisionRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Highest number of simultaneous `analyze` calls observed.
    pub fn max_in_flight(&self) -> u32 {
        self.in_flight.1.load(Ordering::SeqCst)
    }

    fn next_reply(&self, request: &VisionRequest) -> MockReply {
        match &self.mode {
            Mode::Script(replies) => replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| MockReply::Fail(500, "mock script exhausted".to_string())),
            Mode::Responder(f) => f(request),
        }
    }
}

#[async_trait]
impl VisionProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn analyze(&self, request: &VisionRequest) -> Result<VisionResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let (in_flight, max) = &*self.in_flight;
        let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(current, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let reply = self.next_reply(request);
        in_flight.fetch_sub(1, Ordering::SeqCst);

        match reply {
            MockReply::Judgement(judgement) => Ok(VisionResponse {
                judgement,
                usage: self.tokens.map(|total| TokenUsage {
                    total_tokens: total,
                    prompt_tokens: total,
                    completion_tokens: 0,
                }),
                model: "mock-vision-1".to_string(),
                latency_ms: 5,
            }),
            MockReply::RateLimited(retry_after) => Err(ProviderError::RateLimited {
                message: "HTTP 429: rate limited".to_string(),
                retry_after,
            }),
            MockReply::FetchTimeout => Err(ProviderError::ImageFetchTimeout {
                message: "Timeout while downloading image".to_string(),
            }),
            MockReply::Fail(status, message) => Err(ProviderError::Other {
                message,
                status_code: Some(status),
            }),
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(60)
    }
}
