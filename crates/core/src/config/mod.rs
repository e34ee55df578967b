//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (DAVATAR_*)
//! 2. TOML config file (if DAVATAR_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Storage backend for the avatar cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Sharded directory tree under `cache_root`, ages from file mtimes.
    #[default]
    Fs,
    /// SQLite database at `db_path`, ages from a stored timestamp.
    Sqlite,
    /// Process-local map; nothing survives a restart.
    Memory,
}

/// Application configuration with layered loading.
///
/// Built once at startup and handed to the resolver, the cache and the
/// front end; nothing reads process-global state after that.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (DAVATAR_*)
/// 2. TOML config file (if DAVATAR_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Verbose logging when `RUST_LOG` is not set.
    ///
    /// Set via DAVATAR_DEBUG environment variable.
    #[serde(default)]
    pub debug: bool,

    /// Which storage backend the cache uses.
    ///
    /// Set via DAVATAR_CACHE_BACKEND environment variable (`fs`, `sqlite`, `memory`).
    #[serde(default)]
    pub cache_backend: CacheBackend,

    /// Root directory of the sharded filesystem cache.
    ///
    /// Set via DAVATAR_CACHE_ROOT environment variable.
    #[serde(default = "default_cache_root")]
    pub cache_root: PathBuf,

    /// Path to the SQLite cache database.
    ///
    /// Set via DAVATAR_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Freshness window of a cache entry in seconds.
    ///
    /// Set via DAVATAR_TTL_SECS environment variable.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Timeout of each outbound HTTP request in milliseconds.
    ///
    /// Set via DAVATAR_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum homepage bytes read while looking for the head.
    ///
    /// Set via DAVATAR_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Redirects followed per outbound request.
    ///
    /// Set via DAVATAR_MAX_REDIRECTS environment variable.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via DAVATAR_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Refuse to contact private, loopback and link-local addresses.
    ///
    /// Set via DAVATAR_BLOCK_PRIVATE_ADDRESSES environment variable.
    #[serde(default = "default_true")]
    pub block_private_addresses: bool,

    /// Listen address of the HTTP front end.
    ///
    /// Set via DAVATAR_BIND_ADDR environment variable.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Avatar provider used when no domain avatar exists.
    ///
    /// Set via DAVATAR_FALLBACK_URL environment variable.
    #[serde(default = "default_fallback_url")]
    pub fallback_url: String,

    /// Where `GET /` redirects to; `/` answers 404 when unset.
    ///
    /// Set via DAVATAR_INDEX_REDIRECT environment variable.
    #[serde(default)]
    pub index_redirect: Option<String>,
}

fn default_cache_root() -> PathBuf {
    PathBuf::from("/tmp/davatar/")
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./davatar-cache.sqlite")
}

fn default_ttl_secs() -> u64 {
    172_800 // 2 days
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_max_redirects() -> usize {
    5
}

fn default_user_agent() -> String {
    "davatar/0.1".into()
}

fn default_true() -> bool {
    true
}

fn default_bind_addr() -> String {
    "127.0.0.1:5000".into()
}

fn default_fallback_url() -> String {
    "http://gravatar.com/avatar/".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            debug: false,
            cache_backend: CacheBackend::default(),
            cache_root: default_cache_root(),
            db_path: default_db_path(),
            ttl_secs: default_ttl_secs(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            max_redirects: default_max_redirects(),
            user_agent: default_user_agent(),
            block_private_addresses: true,
            bind_addr: default_bind_addr(),
            fallback_url: default_fallback_url(),
            index_redirect: None,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Cache freshness window as Duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `DAVATAR_`
    /// 2. TOML file from `DAVATAR_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var("DAVATAR_CONFIG_FILE").ok().map(PathBuf::from);
        Self::load_from(file.as_deref())
    }

    /// Like [`AppConfig::load`], with an explicit TOML file taking the place
    /// of `DAVATAR_CONFIG_FILE`.
    pub fn load_from(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = config_file {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(
            Env::prefixed("DAVATAR_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Default log filter directive when `RUST_LOG` is not set.
    pub fn default_log_filter(&self) -> &'static str {
        if self.debug { "debug" } else { "info" }
    }
}
