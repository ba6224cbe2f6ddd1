//! Per-call search pipeline: normalize, cache lookup, admission, fetch, store.
//!
//! ```text
//! Normalizing → CacheLookup ─┬─ hit  → Done (provenance = cached)
//!                            └─ miss → RateAdmission ─┬─ rejected → Done(RateLimited)
//!                                                     └─ admitted → Fetching ─┬─ ok  → CachePut → Done
//!                                                                             └─ err → Done(error)
//! ```
//!
//! Cache hits never touch the governor. Failed fetches never write the
//! cache, and a cancelled call (its future dropped) stops before the
//! cache write.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::cache::ResultCache;
use crate::config::SearchConfig;
use crate::error::{Result, SearchError, UpstreamError};
use crate::governor::RateGovernor;
use crate::normalize::QueryNormalizer;
use crate::providers::GoogleCseClient;
use crate::types::{
    ImageSearchRequest, NewsSearchRequest, Provenance, SearchRequest, SearchResponse,
    WebSearchRequest,
};
use crate::upstream::UpstreamClient;

/// Composes normalizer, cache, governor and upstream client.
///
/// The cache and governor are injected so that several orchestrators (or
/// tests) can share or isolate them explicitly.
pub struct SearchOrchestrator<U> {
    normalizer: QueryNormalizer,
    cache: Arc<ResultCache>,
    governor: Arc<RateGovernor>,
    upstream: U,
    cache_ttl: Duration,
    fetch_timeout: Duration,
    max_admission_wait: Duration,
}

impl<U: UpstreamClient> std::fmt::Debug for SearchOrchestrator<U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchOrchestrator")
            .field("upstream", &self.upstream.name())
            .field("cache", &self.cache)
            .field("governor", &self.governor)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("max_admission_wait", &self.max_admission_wait)
            .finish_non_exhaustive()
    }
}

impl<U: UpstreamClient> SearchOrchestrator<U> {
    /// Assemble an orchestrator.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if `config` fails validation.
    pub fn new(
        config: &SearchConfig,
        cache: Arc<ResultCache>,
        governor: Arc<RateGovernor>,
        upstream: U,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            normalizer: QueryNormalizer::new(config),
            cache,
            governor,
            upstream,
            cache_ttl: config.cache_ttl(),
            fetch_timeout: config.timeout(),
            max_admission_wait: config.rate_limit_max_wait(),
        })
    }

    /// Serve one search request.
    ///
    /// # Errors
    ///
    /// - [`SearchError::Validation`] before any cache or network access
    /// - [`SearchError::RateLimited`] when a cache miss is not admitted
    /// - [`SearchError::Upstream`] when the single provider attempt fails
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let query = self.normalizer.normalize(request)?;
        let fingerprint = query.fingerprint();
        tracing::trace!(
            query = query.query_text(),
            fingerprint = fingerprint.short(),
            "search"
        );

        if let Some(entry) = self.cache.get(&fingerprint) {
            let mut response = entry.into_response();
            response.provenance = Provenance::Cached;
            return Ok(response);
        }

        self.governor.admit_within(self.max_admission_wait).await?;

        let fetched = tokio::time::timeout(self.fetch_timeout, self.upstream.fetch(&query))
            .await
            .unwrap_or_else(|_| {
                Err(UpstreamError::Transport {
                    timed_out: true,
                    detail: format!("no response within {}s", self.fetch_timeout.as_secs()),
                })
            });

        let mut response = match fetched {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(
                    upstream = self.upstream.name(),
                    fingerprint = fingerprint.short(),
                    code = err.code(),
                    error = %err,
                    "upstream fetch failed"
                );
                return Err(err.into());
            }
        };

        response.provenance = Provenance::Fresh;
        self.cache.put(
            fingerprint,
            query.query_text(),
            response.clone(),
            self.cache_ttl,
        );
        Ok(response)
    }

    /// Serve a request, resolving to [`SearchError::Cancelled`] as soon as
    /// `cancel` fires.
    ///
    /// Cancellation drops the in-flight admission wait or HTTP call; neither
    /// the rate ledger nor the cache is written on that path.
    pub async fn search_with_cancel(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<SearchResponse> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(kind = %request.kind(), "search cancelled");
                Err(SearchError::Cancelled)
            }
            result = self.search(request) => result,
        }
    }

    /// Web search.
    pub async fn search_web(&self, request: WebSearchRequest) -> Result<SearchResponse> {
        self.search(&SearchRequest::Web(request)).await
    }

    /// Image search.
    pub async fn search_images(&self, request: ImageSearchRequest) -> Result<SearchResponse> {
        self.search(&SearchRequest::Image(request)).await
    }

    /// News search.
    pub async fn search_news(&self, request: NewsSearchRequest) -> Result<SearchResponse> {
        self.search(&SearchRequest::News(request)).await
    }

    /// The shared result cache, for the operational surface.
    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// The shared rate governor.
    pub fn governor(&self) -> &Arc<RateGovernor> {
        &self.governor
    }

    /// The normalizer used for every request.
    pub fn normalizer(&self) -> &QueryNormalizer {
        &self.normalizer
    }

    /// The upstream client.
    pub fn upstream(&self) -> &U {
        &self.upstream
    }
}

impl SearchOrchestrator<GoogleCseClient> {
    /// Build an orchestrator with fresh cache and governor instances and a
    /// Custom Search client, all sized from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] for invalid configuration or missing
    /// credentials.
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        config.validate()?;
        let upstream = GoogleCseClient::new(config)?;
        Self::new(
            config,
            Arc::new(ResultCache::from_config(config)),
            Arc::new(RateGovernor::from_config(config)),
            upstream,
        )
    }
}
