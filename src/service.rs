//! Process-wide search service.
//!
//! Constructs the result cache and rate governor exactly once, injects them
//! into the orchestrator, and owns the background expiry sweep. Every
//! transport adapter in the process should share one [`SearchService`] so
//! that the cache and the upstream budget are shared too.

use std::sync::Arc;

use cse_search::{
    CacheEntrySummary, CacheStats, GoogleCseClient, RateGovernor, ResultCache, SearchConfig,
    SearchOrchestrator, SearchRequest, SearchResponse, UpstreamClient,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::GatewayConfig;
use crate::error::Result;

/// Shared search entry point plus cache maintenance.
pub struct SearchService<U: UpstreamClient = GoogleCseClient> {
    orchestrator: Arc<SearchOrchestrator<U>>,
    shutdown: CancellationToken,
    sweeper: Option<JoinHandle<()>>,
}

impl<U: UpstreamClient> std::fmt::Debug for SearchService<U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchService")
            .field("orchestrator", &self.orchestrator)
            .field("stopped", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl SearchService<GoogleCseClient> {
    /// Start a service backed by the Custom Search API.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid configuration or missing credentials.
    pub fn start(config: &GatewayConfig) -> Result<Self> {
        let search_config = config.to_search_config()?;
        let upstream = GoogleCseClient::new(&search_config)?;
        Self::with_upstream(&search_config, upstream)
    }
}

impl<U: UpstreamClient> SearchService<U> {
    /// Start a service around any upstream client.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails validation.
    pub fn with_upstream(config: &SearchConfig, upstream: U) -> Result<Self> {
        let cache = Arc::new(ResultCache::from_config(config));
        let governor = Arc::new(RateGovernor::from_config(config));
        let orchestrator = SearchOrchestrator::new(config, Arc::clone(&cache), governor, upstream)?;

        let shutdown = CancellationToken::new();
        let sweeper = cache.spawn_sweeper(config.cache_sweep_interval(), shutdown.child_token());

        tracing::info!(
            upstream = orchestrator.upstream().name(),
            cache_max_entries = config.cache_max_entries,
            cache_ttl_seconds = config.cache_ttl_seconds,
            rate_limit = config.rate_limit_requests,
            rate_window_seconds = config.rate_limit_window_seconds,
            "search service started"
        );

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            shutdown,
            sweeper: Some(sweeper),
        })
    }

    /// The shared orchestrator, for adapters that need their own handle.
    pub fn orchestrator(&self) -> &Arc<SearchOrchestrator<U>> {
        &self.orchestrator
    }

    /// Serve one request.
    ///
    /// # Errors
    ///
    /// Propagates the orchestrator's typed error.
    pub async fn search(&self, request: &SearchRequest) -> cse_search::Result<SearchResponse> {
        self.orchestrator.search(request).await
    }

    /// Serve one request, aborting with `CANCELLED` when `cancel` fires.
    ///
    /// # Errors
    ///
    /// Propagates the orchestrator's typed error.
    pub async fn search_with_cancel(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> cse_search::Result<SearchResponse> {
        self.orchestrator.search_with_cancel(request, cancel).await
    }

    /// Cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.orchestrator.cache().stats()
    }

    /// The `n` most recently used cache entries.
    pub fn recent(&self, n: usize) -> Vec<CacheEntrySummary> {
        self.orchestrator.cache().recent(n)
    }

    /// The `n` most frequently hit cache entries.
    pub fn popular(&self, n: usize) -> Vec<CacheEntrySummary> {
        self.orchestrator.cache().popular(n)
    }

    /// Clear the cache (or only its expired entries); returns the count removed.
    pub fn clear(&self, expired_only: bool) -> usize {
        self.orchestrator.cache().clear(expired_only)
    }

    /// Stop the background sweep and wait for it to finish.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(sweeper) = self.sweeper.take() {
            if let Err(e) = sweeper.await {
                tracing::warn!(error = %e, "cache sweeper ended abnormally");
            }
        }
        tracing::info!("search service stopped");
    }
}

impl<U: UpstreamClient> Drop for SearchService<U> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
