//! Error types for the cse-search crate.
//!
//! Every variant carries a stable error code accessible via
//! [`SearchError::code()`]. Display messages are lower-case, stable, and
//! never contain the API key.

use std::time::Duration;

/// Stable error codes for programmatic error handling.
///
/// These codes form part of the public contract. Adapters should match on
/// them rather than parsing Display output.
pub mod error_codes {
    /// A request parameter violated a documented constraint.
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";

    /// The rate governor denied admission.
    pub const RATE_LIMITED: &str = "RATE_LIMITED";

    /// The provider could not be reached.
    pub const UPSTREAM_TRANSPORT: &str = "UPSTREAM_TRANSPORT";

    /// The provider answered with a non-2xx status.
    pub const UPSTREAM_REJECTED: &str = "UPSTREAM_REJECTED";

    /// The provider answered 2xx with a body that could not be decoded.
    pub const UPSTREAM_INVALID_RESPONSE: &str = "UPSTREAM_INVALID_RESPONSE";

    /// The caller cancelled the search.
    pub const CANCELLED: &str = "CANCELLED";

    /// Invalid or missing configuration.
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";
}

/// Errors that can occur while serving a search.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Caller-supplied parameters violate a documented constraint.
    ///
    /// Always raised before any cache or network interaction.
    #[error("invalid {field}: {constraint}")]
    Validation {
        /// Name of the offending request field.
        field: &'static str,
        /// The constraint that was violated.
        constraint: String,
    },

    /// The rate governor denied admission for an upstream call.
    #[error("rate limited: retry after {}ms", retry_after.as_millis())]
    RateLimited {
        /// Estimated time until a slot frees up in the window.
        retry_after: Duration,
    },

    /// The upstream provider call failed.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// The caller cancelled the search before it completed.
    #[error("search cancelled")]
    Cancelled,

    /// Invalid search configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl SearchError {
    /// Build a validation error for `field`.
    pub fn validation(field: &'static str, constraint: impl Into<String>) -> Self {
        Self::Validation {
            field,
            constraint: constraint.into(),
        }
    }

    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => error_codes::VALIDATION_FAILED,
            Self::RateLimited { .. } => error_codes::RATE_LIMITED,
            Self::Upstream(err) => err.code(),
            Self::Cancelled => error_codes::CANCELLED,
            Self::Config(_) => error_codes::CONFIG_INVALID,
        }
    }

    /// Returns true if the caller may reasonably retry the same request later.
    ///
    /// The core itself never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Validation { .. } | Self::Config(_) | Self::Cancelled => false,
            Self::RateLimited { .. } => true,
            Self::Upstream(err) => err.is_retryable(),
        }
    }

    /// Returns true if the error is the caller's to fix (bad parameters or
    /// too many requests), as opposed to a server-side failure.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Validation { .. } | Self::RateLimited { .. } => true,
            Self::Upstream(UpstreamError::ProviderRejected { reason, .. }) => {
                *reason == RejectionReason::InvalidRange
            }
            _ => false,
        }
    }
}

/// Why the provider rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// A numeric or range argument (result count, offset) was out of bounds.
    InvalidRange,
    /// Any other 400-class malformed request.
    BadRequest,
    /// Credentials were missing, invalid, or lacked access (401/403).
    Unauthorized,
    /// The provider's quota or rate limit was exhausted (429).
    QuotaExceeded,
    /// The provider failed internally (5xx).
    ServerError,
    /// Any other non-2xx status.
    Other,
}

impl RejectionReason {
    /// Short lower-case label used in logs and messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRange => "invalid range argument",
            Self::BadRequest => "bad request",
            Self::Unauthorized => "unauthorized",
            Self::QuotaExceeded => "quota exceeded",
            Self::ServerError => "server error",
            Self::Other => "rejected",
        }
    }
}

/// Typed outcome of a failed upstream attempt.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// Network-level failure reaching the provider.
    #[error("upstream transport error{}: {detail}", if *timed_out { " (timed out)" } else { "" })]
    Transport {
        /// Whether the attempt hit the request timeout.
        timed_out: bool,
        /// Human-readable cause.
        detail: String,
    },

    /// The provider returned a non-2xx status.
    #[error("upstream rejected request ({status}, {}): {detail}", reason.as_str())]
    ProviderRejected {
        /// HTTP status code.
        status: u16,
        /// Classified rejection reason.
        reason: RejectionReason,
        /// Provider message, or an actionable hint for range errors.
        detail: String,
    },

    /// A 2xx body could not be decoded.
    #[error("upstream returned an invalid response: {0}")]
    InvalidResponse(String),
}

impl UpstreamError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transport { .. } => error_codes::UPSTREAM_TRANSPORT,
            Self::ProviderRejected { .. } => error_codes::UPSTREAM_REJECTED,
            Self::InvalidResponse(_) => error_codes::UPSTREAM_INVALID_RESPONSE,
        }
    }

    /// Returns true for failures that may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::ProviderRejected { reason, .. } => matches!(
                reason,
                RejectionReason::QuotaExceeded | RejectionReason::ServerError
            ),
            Self::InvalidResponse(_) => false,
        }
    }
}

/// Convenience type alias for cse-search results.
pub type Result<T> = std::result::Result<T, SearchError>;
