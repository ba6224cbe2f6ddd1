//! Trait definition for the upstream search provider.
//!
//! The orchestrator talks to the provider only through [`UpstreamClient`],
//! so tests can swap in a counting mock and embedders can front a different
//! provider with the same caching and admission layer.

use std::future::Future;
use std::sync::Arc;

use crate::error::UpstreamError;
use crate::normalize::NormalizedQuery;
use crate::types::SearchResponse;

/// One-attempt, typed-outcome access to the upstream provider.
///
/// Implementors issue exactly one provider call per [`fetch`] and never
/// retry. Dropping the returned future must abort the outstanding request
/// and release any pooled connection.
///
/// All implementations must be `Send + Sync` so one client can serve
/// concurrent searches.
///
/// [`fetch`]: UpstreamClient::fetch
pub trait UpstreamClient: Send + Sync {
    /// Fetch results for an already validated query.
    ///
    /// The returned response has [`Provenance::Fresh`].
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Transport`] when the provider cannot be
    /// reached, [`UpstreamError::ProviderRejected`] for non-2xx answers and
    /// [`UpstreamError::InvalidResponse`] for undecodable 2xx bodies.
    ///
    /// [`Provenance::Fresh`]: crate::types::Provenance::Fresh
    fn fetch(
        &self,
        query: &NormalizedQuery,
    ) -> impl Future<Output = Result<SearchResponse, UpstreamError>> + Send;

    /// Short provider name for logs.
    fn name(&self) -> &'static str;
}

impl<T: UpstreamClient> UpstreamClient for Arc<T> {
    fn fetch(
        &self,
        query: &NormalizedQuery,
    ) -> impl Future<Output = Result<SearchResponse, UpstreamError>> + Send {
        (**self).fetch(query)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
