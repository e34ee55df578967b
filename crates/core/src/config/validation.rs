//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use std::net::SocketAddr;

use crate::config::{AppConfig, CacheBackend};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `ttl_secs` is 0
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `max_redirects` exceeds 20
    /// - `user_agent` is empty
    /// - `bind_addr` is not a socket address
    /// - `fallback_url` or `index_redirect` is not an http(s) URL
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.ttl_secs == 0 {
            return Err(ConfigError::Invalid { field: "ttl_secs".into(), reason: "must be greater than 0".into() });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.max_redirects > 20 {
            return Err(ConfigError::Invalid { field: "max_redirects".into(), reason: "must not exceed 20".into() });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.bind_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Invalid {
                field: "bind_addr".into(),
                reason: format!("{} is not a socket address", self.bind_addr),
            });
        }

        validate_http_url("fallback_url", &self.fallback_url)?;
        if let Some(index) = &self.index_redirect {
            validate_http_url("index_redirect", index)?;
        }

        if self.cache_backend == CacheBackend::Memory {
            tracing::warn!("cache_backend is memory; resolved avatars are lost on restart");
        }

        Ok(())
    }
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    match url::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        Ok(url) => Err(ConfigError::Invalid {
            field: field.into(),
            reason: format!("unsupported scheme: {}", url.scheme()),
        }),
        Err(e) => Err(ConfigError::Invalid { field: field.into(), reason: e.to_string() }),
    }
}
