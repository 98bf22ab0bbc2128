//! EduBuddy error types

use std::time::Duration;

/// EduBuddy error types
#[derive(Debug, thiserror::Error)]
pub enum EduBuddyError {
    // Governor errors
    /// The call ledger denied a new call and neither cached nor fallback
    /// content was available.
    #[error("throttled, retry after {retry_after:?}")]
    Throttled { retry_after: Option<Duration> },

    // Provider/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Provider-side rate limiting (HTTP 429), distinct from [`Throttled`](Self::Throttled).
    #[error("provider rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("empty response from model")]
    EmptyResponse,

    // Data errors
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Storage errors
    #[error("storage write failed: {0}")]
    StorageWrite(String),

    // Configuration errors
    #[error("no provider configured")]
    NoProvider,

    #[error("configuration error: {0}")]
    Configuration(String),

    /// A background generation task panicked or was cancelled.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse classification of an error, as shown to end users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Too many requests; the user should wait and try again.
    RateLimited,
    /// Content could not be generated.
    GenerationFailed,
    /// The gateway itself is misconfigured.
    Configuration,
}

impl EduBuddyError {
    /// Whether a retry of the same call might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout(_) | Self::RateLimited { .. } | Self::EmptyResponse => {
                true
            }
            Self::Api { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            _ => false,
        }
    }

    /// Whether the governor may recover from this error locally, by trying
    /// the next provider and then falling back to cached or static content.
    ///
    /// Covers every transport failure (any non-2xx status included) and
    /// unparseable provider output.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Http(_)
                | Self::Timeout(_)
                | Self::Api { .. }
                | Self::RateLimited { .. }
                | Self::AuthenticationFailed
                | Self::EmptyResponse
                | Self::MalformedResponse(_)
                | Self::Json(_)
        )
    }

    /// Wait hint carried by rate-limit errors.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Throttled { retry_after } | Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Classify this error for user-facing display.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Throttled { .. } | Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::NoProvider | Self::Configuration(_) | Self::AuthenticationFailed => {
                ErrorKind::Configuration
            }
            _ => ErrorKind::GenerationFailed,
        }
    }

    /// A single human-readable sentence suitable for showing to a learner.
    ///
    /// Never includes provider payloads or internal details.
    pub fn user_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::RateLimited => {
                "You're learning fast! Please wait a moment before asking for more."
            }
            ErrorKind::GenerationFailed => {
                "Something went wrong while creating your content. Please try again."
            }
            ErrorKind::Configuration => {
                "EduBuddy isn't set up correctly yet. Please ask a grown-up for help."
            }
        }
    }
}

/// Result type alias for EduBuddy operations
pub type Result<T> = std::result::Result<T, EduBuddyError>;
