//! Dual sliding-window rate limiter.
//!
//! Two independent logs cover the same trailing window: one timestamp per
//! admitted call, and one `(timestamp, tokens)` record per call. Expired
//! entries are purged lazily before every admission decision. A call is only
//! admitted when it fits under both ceilings; otherwise the caller sleeps
//! until the oldest blocking entry leaves the window and tries again.
//!
//! Token records start as the caller's estimate and are replaced with the
//! provider-reported usage once the response arrives.

use crate::config::LimitsConfig;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Proof of admission, used to report real token usage afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    id: u64,
    estimated_tokens: u64,
}

impl Admission {
    pub fn estimated_tokens(&self) -> u64 {
        self.estimated_tokens
    }
}

/// Current contents of both windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowUsage {
    pub calls: usize,
    pub tokens: u64,
}

#[derive(Debug)]
struct TokenRecord {
    id: u64,
    at: Instant,
    tokens: u64,
}

#[derive(Debug, Default)]
struct Windows {
    calls: VecDeque<Instant>,
    tokens: VecDeque<TokenRecord>,
}

impl Windows {
    fn purge(&mut self, now: Instant, window: Duration) {
        while self
            .calls
            .front()
            .is_some_and(|at| now.duration_since(*at) >= window)
        {
            self.calls.pop_front();
        }
        while self
            .tokens
            .front()
            .is_some_and(|r| now.duration_since(r.at) >= window)
        {
            self.tokens.pop_front();
        }
    }

    fn token_sum(&self) -> u64 {
        self.tokens.iter().map(|r| r.tokens).sum()
    }
}

/// Gate in front of every outbound provider call.
///
/// Shared by all concurrent evaluations of a run (`Arc<RateLimiter>`); the
/// windows are guarded by one async mutex so read-purge-append is atomic.
#[derive(Debug)]
pub struct RateLimiter {
    max_calls: usize,
    max_tokens: u64,
    window: Duration,
    windows: Mutex<Windows>,
    next_id: AtomicU64,
}

impl RateLimiter {
    /// Create a limiter with explicit ceilings (already including headroom).
    pub fn new(max_calls: usize, max_tokens: u64, window: Duration) -> Self {
        Self {
            max_calls: max_calls.max(1),
            max_tokens: max_tokens.max(1),
            window,
            windows: Mutex::new(Windows::default()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Create a limiter from the `[limits]` config section.
    pub fn from_config(config: &LimitsConfig) -> Self {
        Self::new(config.max_calls(), config.max_tokens(), config.window())
    }

    /// Wait until a call estimated at `estimated_tokens` fits in both windows,
    /// then reserve its call slot and token estimate.
    ///
    /// An estimate larger than the whole token ceiling is admitted once the
    /// token window is empty, otherwise it could never run.
    pub async fn admit(&self, estimated_tokens: u64) -> Admission {
        loop {
            let wait = {
                let mut windows = self.windows.lock().await;
                let now = Instant::now();
                windows.purge(now, self.window);

                if windows.calls.len() >= self.max_calls {
                    let oldest = windows.calls[0];
                    (oldest + self.window).saturating_duration_since(now)
                } else if !windows.tokens.is_empty()
                    && windows.token_sum() + estimated_tokens > self.max_tokens
                {
                    let oldest = windows.tokens[0].at;
                    (oldest + self.window).saturating_duration_since(now)
                } else {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    windows.calls.push_back(now);
                    windows.tokens.push_back(TokenRecord {
                        id,
                        at: now,
                        tokens: estimated_tokens,
                    });
                    return Admission {
                        id,
                        estimated_tokens,
                    };
                }
            };

            tracing::debug!("Rate limiter full, waiting {wait:?}");
            tokio::time::sleep(wait).await;
        }
    }

    /// Replace the admission's token estimate with the provider-reported usage.
    ///
    /// No-op if the record already left the window.
    pub async fn record_tokens(&self, admission: &Admission, actual_tokens: u64) {
        let mut windows = self.windows.lock().await;
        if let Some(record) = windows.tokens.iter_mut().find(|r| r.id == admission.id) {
            record.tokens = actual_tokens;
        }
    }

    /// Snapshot of both windows after purging expired entries.
    pub async fn usage(&self) -> WindowUsage {
        let mut windows = self.windows.lock().await;
        windows.purge(Instant::now(), self.window);
        WindowUsage {
            calls: windows.calls.len(),
            tokens: windows.token_sum(),
        }
    }
}
