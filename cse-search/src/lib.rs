//! # cse-search
//!
//! Request orchestration and caching core for a rate-limited, pagination-capped
//! custom search API.
//!
//! The crate sits between a thin transport adapter (HTTP routes, tool-calling
//! protocols) and the upstream provider. It owns everything that decides
//! whether, and how, a provider call is made.
//!
//! ## Design
//!
//! - [`QueryNormalizer`] validates web/image/news requests against the
//!   provider's hard ceilings (10 items per call, offset 91, index 100) and
//!   produces an order-independent [`NormalizedQuery`]
//! - [`ResultCache`] maps the query fingerprint to a response under a TTL
//!   fixed at insertion, with LRU capacity and hit/recency introspection
//! - [`RateGovernor`] is one sliding-window budget shared by every search kind;
//!   only cache misses are admitted through it
//! - [`UpstreamClient`] is a one-attempt, typed-outcome provider call;
//!   [`GoogleCseClient`] implements it for the Custom Search JSON API
//! - [`SearchOrchestrator`] composes the above per call
//!
//! ## Security
//!
//! - The API key is added to outgoing requests only; it is excluded from
//!   fingerprints, `Debug` output and error messages
//! - Search queries are logged only at trace level
//!
//! ## Example
//!
//! ```no_run
//! # async fn example() -> cse_search::Result<()> {
//! use cse_search::{SearchConfig, SearchOrchestrator, WebSearchRequest};
//!
//! let config = SearchConfig {
//!     api_key: "AIza...".into(),
//!     engine_id: "0123456789:abcdef".into(),
//!     ..Default::default()
//! };
//! let orchestrator = SearchOrchestrator::from_config(&config)?;
//! let response = orchestrator
//!     .search_web(WebSearchRequest::new("rust async").with_num_results(5))
//!     .await?;
//! for item in &response.items {
//!     println!("{}: {}", item.title, item.link);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod governor;
pub mod http;
pub mod normalize;
pub mod orchestrator;
pub mod providers;
pub mod types;
pub mod upstream;

pub use cache::{CacheEntry, CacheEntrySummary, CacheStats, ResultCache};
pub use config::SearchConfig;
pub use error::{RejectionReason, Result, SearchError, UpstreamError};
pub use governor::{Permit, RateGovernor};
pub use normalize::{NormalizedQuery, QueryFingerprint, QueryNormalizer};
pub use orchestrator::SearchOrchestrator;
pub use providers::GoogleCseClient;
pub use types::{
    ImageSearchRequest, NewsSearchRequest, Provenance, SearchItem, SearchKind, SearchRequest,
    SearchResponse, WebSearchRequest,
};
pub use upstream::UpstreamClient;
