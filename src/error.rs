//! Error types for trendfeed.

use thiserror::Error;

/// Common error type for trendfeed.
#[derive(Error, Debug)]
pub enum TrendError {
    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Upstream answered with a non-success HTTP status.
    #[error("HTTP {status} from {url}")]
    Http {
        /// Response status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// Connection-level failure (DNS, TLS, reset, body read).
    #[error("network error: {0}")]
    Network(String),

    /// Malformed upstream payload.
    #[error("parse error: {0}")]
    Parse(String),

    /// Operation exceeded its deadline.
    #[error("timed out: {0}")]
    Timeout(String),

    /// A source requires an API key that is not configured.
    #[error("missing API key: {0}")]
    MissingApiKey(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// A request parameter outside its allowed set.
    #[error("{message}")]
    InvalidParameter {
        message: String,
        /// Accepted values, echoed back to the client.
        valid_values: Vec<String>,
    },

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl TrendError {
    /// Whether retrying the same request could plausibly succeed.
    ///
    /// Auth and not-found responses are permanent, as are local problems
    /// like a missing key or a payload we cannot parse.
    pub fn is_retryable(&self) -> bool {
        match self {
            TrendError::Http { status, .. } => !matches!(status, 401 | 403 | 404),
            TrendError::Network(_) | TrendError::Timeout(_) | TrendError::Io(_) => true,
            TrendError::Database(_) => true,
            TrendError::Parse(_)
            | TrendError::MissingApiKey(_)
            | TrendError::Validation(_)
            | TrendError::InvalidParameter { .. }
            | TrendError::NotFound(_)
            | TrendError::Config(_) => false,
        }
    }
}

impl From<sqlx::Error> for TrendError {
    fn from(e: sqlx::Error) -> Self {
        TrendError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for TrendError {
    fn from(e: serde_json::Error) -> Self {
        TrendError::Parse(e.to_string())
    }
}

/// Result type alias for trendfeed operations.
pub type Result<T> = std::result::Result<T, TrendError>;
