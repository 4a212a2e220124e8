//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use std::net::SocketAddr;

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

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `bind_addr` is not a socket address
    /// - `catalog_base_url` is not an http(s) URL
    /// - a timeout is outside its allowed range
    /// - `timezone` or `cutover_hour` cannot be interpreted
    /// - `user_agent` or `volatile_path` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Invalid { field: "bind_addr".into(), reason: "must be host:port".into() });
        }

        match url::Url::parse(&self.catalog_base_url) {
            Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
            Ok(u) => {
                return Err(ConfigError::Invalid {
                    field: "catalog_base_url".into(),
                    reason: format!("unsupported scheme: {}", u.scheme()),
                });
            }
            Err(e) => return Err(ConfigError::Invalid { field: "catalog_base_url".into(), reason: e.to_string() }),
        }

        if self.connect_timeout_ms < 100 || self.connect_timeout_ms > 10_000 {
            return Err(ConfigError::Invalid {
                field: "connect_timeout_ms".into(),
                reason: "must be between 100ms and 10s".into(),
            });
        }
        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 60_000 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must not exceed 60s".into() });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if !self.volatile_path.starts_with('/') {
            return Err(ConfigError::Invalid { field: "volatile_path".into(), reason: "must start with '/'".into() });
        }

        self.tz()?;
        self.cutover()?;

        if self.evict_clears_index {
            tracing::info!("cache eviction will also clear the fingerprint index");
        }

        Ok(())
    }
}
