//! Error types for the gateway.

use cse_search::SearchError;

/// Top-level error type for gateway wiring.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration file or value error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error raised by the search core.
    #[error(transparent)]
    Search(#[from] SearchError),
}

impl GatewayError {
    /// Stable error code, delegating to the core for search errors.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => cse_search::error::error_codes::CONFIG_INVALID,
            Self::Io(_) => "IO_ERROR",
            Self::Search(err) => err.code(),
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, GatewayError>;
