//! Error types for the boardwatch engine
//!
//! The taxonomy mirrors how watch loops react to failures:
//!
//! - `Client` / `Timeout` / `RateLimited` are transient: the loop logs and
//!   retries on the next scheduled interval.
//! - `Config` / `InvalidInput` mean a job is misconfigured: the cycle is
//!   skipped, the job stays registered.
//! - `Store` means the deduplication store is unavailable. This must stay
//!   distinguishable from "no new data": treating a store outage as an empty
//!   result would silently lose dedup state.

use thiserror::Error;

/// Result type alias for boardwatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the boardwatch engine
#[derive(Error, Debug)]
pub enum Error {
    /// Board client (transport/read capability) errors
    #[error("client error: {0}")]
    Client(String),

    /// Transport-level timeout reported by the client
    #[error("client timeout: {0}")]
    Timeout(String),

    /// Upstream rate-limit signal
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Deduplication store errors
    #[error("dedup store error: {0}")]
    Store(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid input to a registration or store operation
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found upstream
    #[error("not found: {0}")]
    NotFound(String),

    /// I/O errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a client error
    pub fn client(msg: impl Into<String>) -> Self {
        Self::Client(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a rate-limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a dedup store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Whether the watch loop should treat this error as transient and
    /// simply retry at the next interval.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Client(_) | Self::Timeout(_) | Self::RateLimited(_) | Self::Io(_)
        )
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
