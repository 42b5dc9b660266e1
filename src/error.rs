//! Sibyl error types

use std::time::Duration;

/// Sibyl error types.
///
/// `Clone` is required: a coalesced generation fans its outcome out to
/// every waiter over a broadcast channel, so failures must be cloneable.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SibylError {
    // Request errors
    #[error("invalid reading request: {0}")]
    Validation(String),

    /// Caller exceeded its fixed-window quota. Reported, never raised
    /// mid-pipeline: the limiter itself returns a decision value and the
    /// orchestrator converts a denial into this.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration, limit: u32 },

    // Provider/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("authentication failed")]
    AuthenticationFailed,

    /// Upstream provider's own throttle (HTTP 429 from the completions
    /// endpoint), distinct from [`SibylError::RateLimited`] which is this
    /// service refusing the caller.
    #[error("provider throttled, retry after {retry_after:?}")]
    ProviderThrottled { retry_after: Option<Duration> },

    /// Uniform upstream-failure kind shown to callers; the originating
    /// provider error is logged before folding into this.
    #[error("upstream provider unavailable: {0}")]
    Upstream(String),

    // Streaming errors
    #[error("stream error: {0}")]
    Stream(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(String),

    // Configuration errors
    #[error("no narrative provider configured")]
    NoProvider,

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl SibylError {
    /// True for failures originating in the upstream call path, which the
    /// orchestrator reports to callers as [`SibylError::Upstream`].
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            SibylError::Http(_)
                | SibylError::Api { .. }
                | SibylError::AuthenticationFailed
                | SibylError::ProviderThrottled { .. }
                | SibylError::Upstream(_)
                | SibylError::Stream(_)
        )
    }

    /// Retry-after hint, when this error carries one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SibylError::RateLimited { retry_after, .. } => Some(*retry_after),
            SibylError::ProviderThrottled { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SibylError {
    fn from(err: serde_json::Error) -> Self {
        SibylError::Json(err.to_string())
    }
}

/// Result type alias for Sibyl operations
pub type Result<T> = std::result::Result<T, SibylError>;
