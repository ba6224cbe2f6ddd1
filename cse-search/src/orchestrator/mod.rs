//! Search orchestrator: normalize, cache, admit, fetch, store.
//!
//! This module composes the [`QueryNormalizer`](crate::normalize::QueryNormalizer),
//! [`ResultCache`](crate::cache::ResultCache),
//! [`RateGovernor`](crate::governor::RateGovernor) and an
//! [`UpstreamClient`](crate::upstream::UpstreamClient) into the one operation
//! per search kind that adapters call.

pub mod search;

pub use search::SearchOrchestrator;
