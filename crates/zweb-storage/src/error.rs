//! Error types for the zweb-storage crate

use std::time::Duration;
use thiserror::Error;

/// Result type alias using `StorageError`
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur while talking to the storage network
#[derive(Error, Debug)]
pub enum StorageError {
    /// Content could not be stored
    #[error("storage write failed: {0}")]
    Write(String),

    /// Content could not be retrieved
    #[error("storage read failed: {0}")]
    Read(String),

    /// Reference does not resolve to any content
    #[error("storage reference not found: {0}")]
    NotFound(String),

    /// Content could not be released
    #[error("storage remove failed: {0}")]
    Remove(String),

    /// Placement information could not be propagated
    #[error("membership refresh failed: {0}")]
    Membership(String),

    /// Connection error
    #[error("connection error: {0}")]
    Connection(String),

    /// HTTP error
    #[error("http error: {0}")]
    Http(String),

    /// Timeout error
    #[error("operation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl StorageError {
    /// Whether another node in the list might succeed where this one failed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout { .. })
    }

    /// Map a failed request, reporting `timeout` when it timed out
    pub fn from_request(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            StorageError::Timeout {
                seconds: timeout.as_secs(),
            }
        } else if err.is_connect() {
            StorageError::Connection(err.to_string())
        } else {
            StorageError::Http(err.to_string())
        }
    }
}
