//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `port` is 0
    /// - `thumbnail_size` is 0 or exceeds 4096
    /// - `thumbnail_quality` is outside 1..=100
    /// - either TTL is 0, or the negative TTL exceeds the positive one
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(invalid("port", "must be greater than 0"));
        }

        if self.thumbnail_size == 0 {
            return Err(invalid("thumbnail_size", "must be greater than 0"));
        }
        if self.thumbnail_size > 4096 {
            return Err(invalid("thumbnail_size", "must not exceed 4096"));
        }

        if !(1..=100).contains(&self.thumbnail_quality) {
            return Err(invalid("thumbnail_quality", "must be between 1 and 100"));
        }

        if self.cache_ttl_secs == 0 {
            return Err(invalid("cache_ttl_secs", "must be greater than 0"));
        }
        if self.negative_ttl_secs == 0 {
            return Err(invalid("negative_ttl_secs", "must be greater than 0"));
        }
        if self.negative_ttl_secs > self.cache_ttl_secs {
            return Err(invalid("negative_ttl_secs", "must not exceed cache_ttl_secs"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.allow_private_networks {
            tracing::warn!("allow_private_networks is set; loopback and private addresses can be fetched");
        }

        Ok(())
    }
}
