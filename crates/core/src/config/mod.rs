//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (MEDIASERVER_*)
//! 2. TOML config file (if MEDIASERVER_CONFIG_FILE set)
//! 3. Built-in defaults

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

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
/// 1. Environment variables (MEDIASERVER_*)
/// 2. TOML config file (if MEDIASERVER_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite artifact cache.
    ///
    /// Set via MEDIASERVER_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Interface the HTTP listener binds to.
    ///
    /// Set via MEDIASERVER_BIND_HOST environment variable.
    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    /// HTTP listen port.
    ///
    /// Set via MEDIASERVER_PORT environment variable.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum width or height of a thumbnail in pixels.
    ///
    /// Set via MEDIASERVER_THUMBNAIL_SIZE environment variable.
    #[serde(default = "default_thumbnail_size")]
    pub thumbnail_size: u32,

    /// JPEG quality of rendered thumbnails (1-100).
    ///
    /// Set via MEDIASERVER_THUMBNAIL_QUALITY environment variable.
    #[serde(default = "default_thumbnail_quality")]
    pub thumbnail_quality: u8,

    /// Cache lifetime of artifacts that carry a thumbnail, in seconds.
    ///
    /// Set via MEDIASERVER_CACHE_TTL_SECS environment variable.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Cache lifetime of artifacts without a thumbnail, in seconds.
    ///
    /// Set via MEDIASERVER_NEGATIVE_TTL_SECS environment variable.
    #[serde(default = "default_negative_ttl_secs")]
    pub negative_ttl_secs: u64,

    /// User-Agent string for outbound requests.
    ///
    /// Set via MEDIASERVER_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per outbound request.
    ///
    /// Set via MEDIASERVER_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Outbound request timeout in milliseconds.
    ///
    /// Set via MEDIASERVER_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Allow fetching loopback and private network addresses.
    ///
    /// Set via MEDIASERVER_ALLOW_PRIVATE_NETWORKS environment variable.
    #[serde(default)]
    pub allow_private_networks: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./mediaserver-cache.sqlite")
}

fn default_bind_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8080
}

fn default_thumbnail_size() -> u32 {
    256
}

fn default_thumbnail_quality() -> u8 {
    90
}

fn default_cache_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_negative_ttl_secs() -> u64 {
    60
}

fn default_user_agent() -> String {
    "mediaserver/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            bind_host: default_bind_host(),
            port: default_port(),
            thumbnail_size: default_thumbnail_size(),
            thumbnail_quality: default_thumbnail_quality(),
            cache_ttl_secs: default_cache_ttl_secs(),
            negative_ttl_secs: default_negative_ttl_secs(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            allow_private_networks: false,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Deadline for a whole inbound request: one page fetch plus one image fetch.
    pub fn request_deadline(&self) -> Duration {
        self.timeout() * 2
    }

    /// Lifetime of thumbnail-bearing artifacts.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Lifetime of artifacts without a thumbnail.
    pub fn negative_ttl(&self) -> Duration {
        Duration::from_secs(self.negative_ttl_secs)
    }

    /// Socket address for the HTTP listener.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `bind_host` is not an IP address.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_host, self.port)
            .parse()
            .map_err(|e| ConfigError::Invalid { field: "bind_host".into(), reason: format!("{e}") })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `MEDIASERVER_`
    /// 2. TOML file from `MEDIASERVER_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment()
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("MEDIASERVER_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment.merge(
            Env::prefixed("MEDIASERVER_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        )
    }
}
