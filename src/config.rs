//! Gateway configuration: a TOML file plus environment credential overrides.
//!
//! ```toml
//! [google]
//! api_key = "..."
//! engine_id = "..."
//!
//! [search]
//! default_num_results = 10
//! safe_search = "medium"
//!
//! [cache]
//! ttl_seconds = 3600
//!
//! [rate_limit]
//! requests = 100
//! window_seconds = 60
//! ```
//!
//! Every section and field is optional; missing values take the search
//! core's defaults.

use std::fmt;
use std::path::{Path, PathBuf};

use cse_search::SearchConfig;
use cse_search::config::DEFAULT_BASE_URL;
use cse_search::types::SafeSearch;
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

/// Environment variable overriding `google.api_key`.
pub const ENV_API_KEY: &str = "GOOGLE_API_KEY";
/// Environment variable overriding `google.engine_id`.
pub const ENV_ENGINE_ID: &str = "GOOGLE_CSE_ID";
/// Environment variable overriding `google.base_url`.
pub const ENV_BASE_URL: &str = "CSE_BASE_URL";

/// Top-level configuration for the gateway process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Provider credentials and endpoint.
    pub google: GoogleConfig,
    /// Request defaults and ceilings.
    pub search: SearchDefaults,
    /// Result cache sizing.
    pub cache: CacheConfig,
    /// Shared upstream rate budget.
    pub rate_limit: RateLimitConfig,
}

/// Provider credentials and endpoint.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    /// API key. Prefer the `GOOGLE_API_KEY` environment variable.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    /// Search-scope identifier (`cx`).
    #[serde(alias = "cse_id")]
    pub engine_id: String,
    /// Endpoint URL.
    pub base_url: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            engine_id: String::new(),
            base_url: DEFAULT_BASE_URL.to_owned(),
        }
    }
}

impl fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("api_key_set", &!self.api_key.is_empty())
            .field("engine_id", &self.engine_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Request defaults and ceilings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchDefaults {
    /// Result count used when a request leaves it unset.
    pub default_num_results: u32,
    /// Highest accepted result count (at most 10).
    pub max_num_results: u32,
    /// Highest accepted start offset (at most 91).
    pub max_start_index: u32,
    /// Safe-search level: `off`, `medium` or `high`.
    pub safe_search: SafeSearch,
    /// Default two-letter language code.
    pub language: String,
    /// Default two-letter country code.
    pub country: String,
    /// Upstream call timeout in seconds.
    pub timeout_seconds: u64,
    /// Custom User-Agent header.
    pub user_agent: Option<String>,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        let core = SearchConfig::default();
        Self {
            default_num_results: core.default_num_results,
            max_num_results: core.max_num_results,
            max_start_index: core.max_start_index,
            safe_search: core.default_safe_search,
            language: core.default_language,
            country: core.default_country,
            timeout_seconds: core.timeout_seconds,
            user_agent: core.user_agent,
        }
    }
}

/// Result cache sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry time-to-live in seconds.
    pub ttl_seconds: u64,
    /// Entry count before least-recently-used eviction.
    pub max_entries: usize,
    /// Background expiry sweep interval in seconds.
    pub sweep_interval_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let core = SearchConfig::default();
        Self {
            ttl_seconds: core.cache_ttl_seconds,
            max_entries: core.cache_max_entries,
            sweep_interval_seconds: core.cache_sweep_interval_seconds,
        }
    }
}

/// Shared upstream rate budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Upstream calls admitted per window.
    pub requests: u32,
    /// Window length in seconds.
    pub window_seconds: u64,
    /// How long a cache miss may wait for a slot, in milliseconds.
    pub max_wait_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let core = SearchConfig::default();
        Self {
            requests: core.rate_limit_requests,
            window_seconds: core.rate_limit_window_seconds,
            max_wait_ms: core.rate_limit_max_wait_ms,
        }
    }
}

impl GatewayConfig {
    /// Load config from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| GatewayError::Config(format!("{}: {e}", path.display())))
    }

    /// Save config to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| GatewayError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("cse-gateway").join("config.toml")
        } else if let Some(config) = dirs::config_dir() {
            config.join("cse-gateway").join("config.toml")
        } else {
            PathBuf::from("/tmp/cse-gateway/config.toml")
        }
    }

    /// Resolve the effective configuration.
    ///
    /// Reads `path` when given. Otherwise reads the default path if that
    /// file exists, falling back to defaults. Environment overrides are
    /// applied last.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit or existing file cannot be loaded.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::default_config_path();
                if default_path.is_file() {
                    Self::from_file(&default_path)?
                } else {
                    tracing::debug!(path = %default_path.display(), "no config file, using defaults");
                    Self::default()
                }
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply credential overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Apply credential overrides from `lookup`, ignoring empty values.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let value = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(key) = value(ENV_API_KEY) {
            self.google.api_key = key;
        }
        if let Some(id) = value(ENV_ENGINE_ID) {
            self.google.engine_id = id;
        }
        if let Some(url) = value(ENV_BASE_URL) {
            self.google.base_url = url;
        }
    }

    /// Convert to the core's configuration and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Search`] with a `CONFIG_INVALID` code if a
    /// value is out of range.
    pub fn to_search_config(&self) -> Result<SearchConfig> {
        let config = SearchConfig {
            api_key: self.google.api_key.clone(),
            engine_id: self.google.engine_id.clone(),
            base_url: self.google.base_url.clone(),
            default_num_results: self.search.default_num_results,
            max_num_results: self.search.max_num_results,
            max_start_index: self.search.max_start_index,
            default_safe_search: self.search.safe_search,
            default_language: self.search.language.clone(),
            default_country: self.search.country.clone(),
            timeout_seconds: self.search.timeout_seconds,
            user_agent: self.search.user_agent.clone(),
            cache_ttl_seconds: self.cache.ttl_seconds,
            cache_max_entries: self.cache.max_entries,
            cache_sweep_interval_seconds: self.cache.sweep_interval_seconds,
            rate_limit_requests: self.rate_limit.requests,
            rate_limit_window_seconds: self.rate_limit.window_seconds,
            rate_limit_max_wait_ms: self.rate_limit.max_wait_ms,
        };
        config.validate()?;
        Ok(config)
    }
}
