//! Search configuration with sensible defaults.
//!
//! [`SearchConfig`] holds the values the core depends on: provider
//! credentials and endpoint, parameter defaults and ceilings, cache sizing,
//! the shared rate budget, and the upstream timeout. How those values are
//! sourced (files, environment) is the embedding application's concern.

use std::fmt;
use std::time::Duration;

use crate::error::SearchError;
use crate::types::SafeSearch;

/// The provider never returns more than this many items per call.
pub const PROVIDER_MAX_NUM_RESULTS: u32 = 10;

/// The provider rejects any start offset above this value.
pub const PROVIDER_MAX_START_INDEX: u32 = 91;

/// The provider never serves a result beyond this absolute index.
pub const PROVIDER_MAX_RESULT_INDEX: u32 = 100;

/// Longest accepted cache entry lifetime (30 days).
pub const MAX_CACHE_TTL_SECONDS: u64 = 30 * 24 * 60 * 60;

/// Longest accepted rate window (one day).
pub const MAX_RATE_LIMIT_WINDOW_SECONDS: u64 = 24 * 60 * 60;

/// Longest accepted admission wait (one minute).
pub const MAX_ADMISSION_WAIT_MS: u64 = 60_000;

/// Default Custom Search JSON API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/customsearch/v1";

/// Configuration for the search core.
///
/// Use [`Default::default()`] for sensible defaults, or construct with
/// field overrides for custom behaviour. `Debug` output redacts the key.
#[derive(Clone)]
pub struct SearchConfig {
    /// Provider API key.
    pub api_key: String,
    /// Provider search-scope identifier (`cx`).
    pub engine_id: String,
    /// Provider endpoint URL.
    pub base_url: String,
    /// Result count used when a request leaves it unset.
    pub default_num_results: u32,
    /// Highest accepted result count. Never above [`PROVIDER_MAX_NUM_RESULTS`].
    pub max_num_results: u32,
    /// Highest accepted start offset. Never above [`PROVIDER_MAX_START_INDEX`].
    pub max_start_index: u32,
    /// Safe-search level used when a request leaves it unset.
    pub default_safe_search: SafeSearch,
    /// Language code used when a request leaves it unset.
    pub default_language: String,
    /// Country code used when a request leaves it unset.
    pub default_country: String,
    /// Hard timeout for one upstream call, in seconds.
    pub timeout_seconds: u64,
    /// Custom User-Agent. If `None`, a crate-specific default is sent.
    pub user_agent: Option<String>,
    /// Time-to-live of a cache entry, fixed at insertion, in seconds.
    pub cache_ttl_seconds: u64,
    /// Maximum number of cache entries before least-recently-used eviction.
    pub cache_max_entries: usize,
    /// Interval of the background expiry sweep, in seconds.
    pub cache_sweep_interval_seconds: u64,
    /// Upstream calls admitted per rolling window, across all kinds.
    pub rate_limit_requests: u32,
    /// Length of the rolling admission window, in seconds.
    pub rate_limit_window_seconds: u64,
    /// How long a cache miss may queue for a rate slot before being
    /// rejected, in milliseconds. Zero rejects immediately. At most
    /// [`MAX_ADMISSION_WAIT_MS`] and never longer than the window.
    pub rate_limit_max_wait_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            engine_id: String::new(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            default_num_results: 10,
            max_num_results: PROVIDER_MAX_NUM_RESULTS,
            max_start_index: PROVIDER_MAX_START_INDEX,
            default_safe_search: SafeSearch::Medium,
            default_language: "en".to_owned(),
            default_country: "us".to_owned(),
            timeout_seconds: 30,
            user_agent: None,
            cache_ttl_seconds: 3600,
            cache_max_entries: 1000,
            cache_sweep_interval_seconds: 300,
            rate_limit_requests: 100,
            rate_limit_window_seconds: 60,
            rate_limit_max_wait_ms: 0,
        }
    }
}

impl fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchConfig")
            .field("api_key", &redacted(&self.api_key))
            .field("engine_id", &self.engine_id)
            .field("base_url", &self.base_url)
            .field("default_num_results", &self.default_num_results)
            .field("max_num_results", &self.max_num_results)
            .field("max_start_index", &self.max_start_index)
            .field("default_safe_search", &self.default_safe_search)
            .field("default_language", &self.default_language)
            .field("default_country", &self.default_country)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("user_agent", &self.user_agent)
            .field("cache_ttl_seconds", &self.cache_ttl_seconds)
            .field("cache_max_entries", &self.cache_max_entries)
            .field(
                "cache_sweep_interval_seconds",
                &self.cache_sweep_interval_seconds,
            )
            .field("rate_limit_requests", &self.rate_limit_requests)
            .field("rate_limit_window_seconds", &self.rate_limit_window_seconds)
            .field("rate_limit_max_wait_ms", &self.rate_limit_max_wait_ms)
            .finish()
    }
}

fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

impl SearchConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Credentials are not checked here; the provider client checks them
    /// when it is constructed, so tests can run the core against a mock.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.max_num_results == 0 || self.max_num_results > PROVIDER_MAX_NUM_RESULTS {
            return Err(SearchError::Config(format!(
                "max_num_results must be between 1 and {PROVIDER_MAX_NUM_RESULTS}"
            )));
        }
        if self.default_num_results == 0 || self.default_num_results > self.max_num_results {
            return Err(SearchError::Config(
                "default_num_results must be between 1 and max_num_results".into(),
            ));
        }
        if self.max_start_index == 0 || self.max_start_index > PROVIDER_MAX_START_INDEX {
            return Err(SearchError::Config(format!(
                "max_start_index must be between 1 and {PROVIDER_MAX_START_INDEX}"
            )));
        }
        if !is_two_letter_code(&self.default_language) {
            return Err(SearchError::Config(
                "default_language must be two lower-case letters".into(),
            ));
        }
        if !is_two_letter_code(&self.default_country) {
            return Err(SearchError::Config(
                "default_country must be two lower-case letters".into(),
            ));
        }
        if self.timeout_seconds == 0 {
            return Err(SearchError::Config(
                "timeout_seconds must be greater than 0".into(),
            ));
        }
        if self.cache_ttl_seconds == 0 || self.cache_ttl_seconds > MAX_CACHE_TTL_SECONDS {
            return Err(SearchError::Config(format!(
                "cache_ttl_seconds must be between 1 and {MAX_CACHE_TTL_SECONDS}"
            )));
        }
        if self.cache_max_entries == 0 {
            return Err(SearchError::Config(
                "cache_max_entries must be greater than 0".into(),
            ));
        }
        if self.cache_sweep_interval_seconds == 0 {
            return Err(SearchError::Config(
                "cache_sweep_interval_seconds must be greater than 0".into(),
            ));
        }
        if self.rate_limit_requests == 0 {
            return Err(SearchError::Config(
                "rate_limit_requests must be greater than 0".into(),
            ));
        }
        if self.rate_limit_window_seconds == 0
            || self.rate_limit_window_seconds > MAX_RATE_LIMIT_WINDOW_SECONDS
        {
            return Err(SearchError::Config(format!(
                "rate_limit_window_seconds must be between 1 and {MAX_RATE_LIMIT_WINDOW_SECONDS}"
            )));
        }
        let wait_ceiling = MAX_ADMISSION_WAIT_MS.min(self.rate_limit_window_seconds * 1000);
        if self.rate_limit_max_wait_ms > wait_ceiling {
            return Err(SearchError::Config(format!(
                "rate_limit_max_wait_ms must be at most {wait_ceiling} (one minute, and no longer than the window)"
            )));
        }
        match url::Url::parse(&self.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(SearchError::Config(format!(
                    "base_url scheme must be http or https, got {}",
                    url.scheme()
                )));
            }
            Err(e) => {
                return Err(SearchError::Config(format!("base_url is not a valid URL: {e}")));
            }
        }
        Ok(())
    }

    /// Upstream call timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Cache entry time-to-live.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    /// Background sweep interval.
    pub fn cache_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache_sweep_interval_seconds)
    }

    /// Rolling admission window.
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_seconds)
    }

    /// Bounded admission wait.
    pub fn rate_limit_max_wait(&self) -> Duration {
        Duration::from_millis(self.rate_limit_max_wait_ms)
    }
}

pub(crate) fn is_two_letter_code(code: &str) -> bool {
    code.len() == 2 && code.bytes().all(|b| b.is_ascii_lowercase())
}
