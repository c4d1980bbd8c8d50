//! Error types for stores and the expiring cache
//!
//! Provides unified error handling using thiserror. None of these errors
//! escape the cache's public read/write API; they are logged and counted.

use thiserror::Error;

// == Store Error Enum ==
/// Errors raised by a key-value store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Writing would push the store past its byte quota
    #[error("Quota exceeded: {used} of {quota} bytes in use, write needs {needed}")]
    QuotaExceeded {
        used: usize,
        needed: usize,
        quota: usize,
    },

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Store contents could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persisted store contents are unreadable
    #[error("Corrupt store: {0}")]
    Corrupt(String),
}

// == Cache Error Enum ==
/// Errors on the cache's internal fallible path.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The backing store failed
    #[error("Store failure: {0}")]
    Store(#[from] StoreError),

    /// Query parameters or payload could not be encoded
    #[error("Encode failure: {0}")]
    Encode(serde_json::Error),

    /// A stored entry could not be decoded
    #[error("Decode failure for {key}: {source}")]
    Decode {
        key: String,
        source: serde_json::Error,
    },
}

// == Result Type Aliases ==
/// Convenience Result type for store backends.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Convenience Result type for the cache's fallible path.
pub type Result<T> = std::result::Result<T, CacheError>;
