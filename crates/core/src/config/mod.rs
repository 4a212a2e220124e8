//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (PRICETAG_*)
//! 2. TOML config file (if PRICETAG_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (PRICETAG_*)
/// 2. TOML config file (if PRICETAG_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite product database.
    ///
    /// Set via PRICETAG_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Address the HTTP server binds to.
    ///
    /// Set via PRICETAG_BIND_ADDR environment variable.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Base URL of the external catalog application.
    ///
    /// Set via PRICETAG_CATALOG_BASE_URL environment variable.
    #[serde(default = "default_catalog_base_url")]
    pub catalog_base_url: String,

    /// User-Agent string for catalog requests.
    ///
    /// Set via PRICETAG_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Connect timeout for catalog requests in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Overall timeout for a single catalog request in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// IANA time zone in which the daily price cutover happens.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Local hour at which prices roll over.
    #[serde(default = "default_cutover_hour")]
    pub cutover_hour: u32,

    /// Request paths containing this fragment are treated as volatile price data.
    #[serde(default = "default_volatile_path")]
    pub volatile_path: String,

    /// Whether evicting the product cache also forgets indexed fingerprints.
    #[serde(default)]
    pub evict_clears_index: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./pricetag.sqlite")
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".into()
}

fn default_catalog_base_url() -> String {
    "https://consulta.example.com/apex".into()
}

fn default_user_agent() -> String {
    "pricetag/0.1".into()
}

fn default_connect_timeout_ms() -> u64 {
    3_000
}

fn default_timeout_ms() -> u64 {
    8_000
}

fn default_timezone() -> String {
    "America/Sao_Paulo".into()
}

fn default_cutover_hour() -> u32 {
    5
}

fn default_volatile_path() -> String {
    "/api/prices".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            bind_addr: default_bind_addr(),
            catalog_base_url: default_catalog_base_url(),
            user_agent: default_user_agent(),
            connect_timeout_ms: default_connect_timeout_ms(),
            timeout_ms: default_timeout_ms(),
            timezone: default_timezone(),
            cutover_hour: default_cutover_hour(),
            volatile_path: default_volatile_path(),
            evict_clears_index: false,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// The configured time zone.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `timezone` is not a known IANA zone.
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone.parse::<Tz>().map_err(|e| ConfigError::Invalid { field: "timezone".into(), reason: e.to_string() })
    }

    /// Local time of the daily price cutover.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `cutover_hour` is not a valid hour.
    pub fn cutover(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::from_hms_opt(self.cutover_hour, 0, 0).ok_or_else(|| ConfigError::Invalid {
            field: "cutover_hour".into(),
            reason: "must be between 0 and 23".into(),
        })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `PRICETAG_`
    /// 2. TOML file from `PRICETAG_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("PRICETAG_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("PRICETAG_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./pricetag.sqlite"));
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.user_agent, "pricetag/0.1");
        assert_eq!(config.timeout_ms, 8_000);
        assert_eq!(config.connect_timeout_ms, 3_000);
        assert_eq!(config.cutover_hour, 5);
        assert_eq!(config.volatile_path, "/api/prices");
        assert!(!config.evict_clears_index);
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(8_000));
        assert_eq!(config.connect_timeout(), Duration::from_millis(3_000));
    }

    #[test]
    fn test_timezone_and_cutover() {
        let config = AppConfig::default();
        assert_eq!(config.tz().unwrap(), chrono_tz::America::Sao_Paulo);
        assert_eq!(config.cutover().unwrap(), NaiveTime::from_hms_opt(5, 0, 0).unwrap());
    }

    #[test]
    fn test_load_layers_env_over_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("pricetag.toml", "timeout_ms = 4000\ncutover_hour = 6\n")?;
            jail.set_env("PRICETAG_CONFIG_FILE", "pricetag.toml");
            jail.set_env("PRICETAG_CUTOVER_HOUR", "4");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.timeout_ms, 4000);
            assert_eq!(config.cutover_hour, 4);
            Ok(())
        });
    }
}
