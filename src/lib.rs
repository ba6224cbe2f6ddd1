//! cse-gateway: process wiring around the `cse-search` core.
//!
//! The core owns every decision about whether and how the provider is
//! called. This crate owns what the core treats as external collaborators:
//! - **Configuration**: TOML file plus environment credential overrides
//! - **Logging**: one `tracing` subscriber writing to stderr
//! - **Service**: constructs the process-wide cache and rate governor once,
//!   injects them into the orchestrator, and runs the background cache sweep
//!
//! Transport adapters (HTTP routes, tool-calling protocols) sit on top of
//! [`SearchService`] and map [`cse_search::SearchError`] codes onto their
//! own status conventions.

pub mod config;
pub mod error;
pub mod logging;
pub mod service;

pub use config::GatewayConfig;
pub use error::{GatewayError, Result};
pub use service::SearchService;
