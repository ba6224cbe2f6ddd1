//! Provider implementations.
//!
//! Each module provides a struct implementing [`crate::upstream::UpstreamClient`]
//! for one external search API.

pub mod google_cse;

pub use google_cse::GoogleCseClient;
