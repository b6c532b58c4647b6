//! Vegvisir error types

use std::fmt;
use std::time::Duration;

/// Vegvisir error types
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    // Remote backend errors
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(String),

    // Local backend errors
    #[error("local inference failed: {0}")]
    Local(String),

    // Soft errors
    #[error("empty response from model")]
    EmptyResponse,

    /// Token counting failed. Never surfaces from the estimator, which
    /// falls back to the word-count heuristic instead.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("unknown backend: {0}")]
    UnknownBackend(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure category attached to backend errors in logs and metrics.
///
/// Every kind is handled the same way by the dispatcher (advance to the
/// next candidate); the classification exists for observability only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Timeout,
    RateLimited,
    ServerError,
    Generic,
}

impl FailureKind {
    /// Stable label used in metric labels and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::ServerError => "server_error",
            FailureKind::Generic => "generic",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RouterError {
    /// Classify this error for logging.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            RouterError::Timeout(_) => FailureKind::Timeout,
            RouterError::RateLimited { .. } => FailureKind::RateLimited,
            RouterError::ServerError { .. } => FailureKind::ServerError,
            _ => FailureKind::Generic,
        }
    }
}

impl From<reqwest::Error> for RouterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest doesn't expose the configured duration on the error
            RouterError::Timeout(Duration::ZERO)
        } else if let Some(status) = err.status() {
            let status = status.as_u16();
            if status >= 500 {
                RouterError::ServerError {
                    status,
                    message: err.to_string(),
                }
            } else {
                RouterError::Api {
                    status,
                    message: err.to_string(),
                }
            }
        } else {
            RouterError::Http(err.to_string())
        }
    }
}

/// Result type alias for Vegvisir operations
pub type Result<T> = std::result::Result<T, RouterError>;
