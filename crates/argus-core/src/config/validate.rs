//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.requests_per_minute == 0 {
            return Err(ConfigError::ValidationError(
                "limits.requests_per_minute must be > 0".into(),
            ));
        }
        if self.limits.tokens_per_minute == 0 {
            return Err(ConfigError::ValidationError(
                "limits.tokens_per_minute must be > 0".into(),
            ));
        }
        if !(self.limits.request_headroom > 0.0 && self.limits.request_headroom <= 1.0) {
            return Err(ConfigError::ValidationError(
                "limits.request_headroom must be in (0.0, 1.0]".into(),
            ));
        }
        if !(self.limits.token_headroom > 0.0 && self.limits.token_headroom <= 1.0) {
            return Err(ConfigError::ValidationError(
                "limits.token_headroom must be in (0.0, 1.0]".into(),
            ));
        }
        if self.limits.window_secs == 0 {
            return Err(ConfigError::ValidationError(
                "limits.window_secs must be > 0".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be > 0".into(),
            ));
        }
        if self.batch.group_size == 0 {
            return Err(ConfigError::ValidationError(
                "batch.group_size must be > 0".into(),
            ));
        }
        if self.batch.checkpoint_every == 0 {
            return Err(ConfigError::ValidationError(
                "batch.checkpoint_every must be > 0".into(),
            ));
        }
        if self.batch.checkpoint_prefix.trim_matches('/').is_empty() {
            return Err(ConfigError::ValidationError(
                "batch.checkpoint_prefix must not be empty".into(),
            ));
        }
        if self.provider.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "provider.timeout_ms must be > 0".into(),
            ));
        }
        if !matches!(self.provider.detail.as_str(), "low" | "high" | "auto") {
            return Err(ConfigError::ValidationError(
                "provider.detail must be one of \"low\", \"high\", \"auto\"".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_group_size() {
        let mut config = Config::default();
        config.batch.group_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("group_size"));
    }

    #[test]
    fn test_validate_rejects_headroom_out_of_range() {
        let mut config = Config::default();
        config.limits.token_headroom = 1.2;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("token_headroom"));

        config.limits.token_headroom = 0.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("token_headroom"));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = Config::default();
        config.retry.max_attempts = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn test_validate_rejects_unknown_detail() {
        let mut config = Config::default();
        config.provider.detail = "ultra".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("provider.detail"));
    }
}
