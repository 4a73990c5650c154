//! Retry utilities for provider rate-limit rejections.
//!
//! Only rate-limit rejections are retried at the call site. The delay comes
//! from the provider's hint when it sends one, otherwise from a linear
//! backoff (`base × attempt`).

use crate::error::ProviderError;
use std::time::Duration;

/// Upper bound on any single backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Determine whether a provider error is worth retrying at the call site.
pub fn is_retryable(error: &ProviderError) -> bool {
    error.is_rate_limited()
}

/// Linear backoff for a 1-based attempt number, capped at 60 seconds.
pub fn backoff_duration(attempt: u32, base_delay_ms: u64) -> Duration {
    let delay = base_delay_ms.saturating_mul(u64::from(attempt.max(1)));
    Duration::from_millis(delay).min(MAX_BACKOFF)
}

/// Delay before the next attempt after a rate-limit rejection.
pub fn rate_limit_delay(hint: Option<Duration>, attempt: u32, base_delay_ms: u64) -> Duration {
    match hint {
        Some(hint) => hint.min(MAX_BACKOFF),
        None => backoff_duration(attempt, base_delay_ms),
    }
}

/// Extract a "try again in 1.5s" / "try again in 250ms" hint from an error message.
pub fn parse_retry_after(text: &str) -> Option<Duration> {
    let lower = text.to_lowercase();
    let start = lower.find("try again in")? + "try again in".len();
    let rest = lower[start..].trim_start();

    let number_len = rest
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    let value: f64 = rest[..number_len].trim_end_matches('.').parse().ok()?;
    let unit = rest[number_len..].trim_start();

    let millis = if unit.starts_with("ms") {
        value
    } else if unit.starts_with('s') {
        value * 1000.0
    } else if unit.starts_with('m') {
        value * 60_000.0
    } else {
        return None;
    };
    Some(Duration::from_millis(millis.ceil() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_is_retryable() {
        let err = ProviderError::RateLimited {
            message: "429".to_string(),
            retry_after: None,
        };
        assert!(is_retryable(&err));
    }

    #[test]
    fn test_fetch_timeout_not_retryable_here() {
        let err = ProviderError::ImageFetchTimeout {
            message: "Timeout while downloading".to_string(),
        };
        assert!(!is_retryable(&err));
    }

    #[test]
    fn test_server_error_not_retryable_here() {
        let err = ProviderError::Other {
            message: "HTTP 503".to_string(),
            status_code: Some(503),
        };
        assert!(!is_retryable(&err));
    }

    #[test]
    fn test_backoff_linear() {
        assert_eq!(backoff_duration(1, 1000), Duration::from_millis(1000));
        assert_eq!(backoff_duration(2, 1000), Duration::from_millis(2000));
        assert_eq!(backoff_duration(3, 1000), Duration::from_millis(3000));
    }

    #[test]
    fn test_backoff_capped() {
        assert_eq!(backoff_duration(500, 1000), Duration::from_secs(60));
    }

    #[test]
    fn test_hint_wins_over_backoff() {
        let delay = rate_limit_delay(Some(Duration::from_millis(300)), 4, 1000);
        assert_eq!(delay, Duration::from_millis(300));
        let delay = rate_limit_delay(None, 4, 1000);
        assert_eq!(delay, Duration::from_millis(4000));
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        let text = "Rate limit reached for gpt-4o. Please try again in 1.5s. Visit ...";
        assert_eq!(parse_retry_after(text), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_parse_retry_after_millis() {
        assert_eq!(
            parse_retry_after("Please try again in 250ms."),
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_parse_retry_after_absent() {
        assert_eq!(parse_retry_after("rate limited"), None);
        assert_eq!(parse_retry_after("try again in a moment"), None);
    }
}
