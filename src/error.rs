//! Error types for the cache layer
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Medium Error ==
/// Failure reported by a durable key-value medium.
///
/// Quota exhaustion is kept distinct so the store can attempt its
/// cleanup-and-retry recovery before giving up.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediumError {
    /// The medium has no capacity left for the write
    #[error("Storage quota exceeded")]
    QuotaExceeded,

    /// Any other backend failure
    #[error("Backend failure: {0}")]
    Backend(String),
}

// == Cache Error Enum ==
/// Unified error type for the cache layer.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Value could not be serialized or deserialized
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Write still failed after quota cleanup and one retry
    #[error("Quota exceeded writing key: {key}")]
    QuotaExceeded { key: String },

    /// Durable medium failed for a reason other than quota
    #[error("Medium error: {0}")]
    Medium(#[from] MediumError),

    /// Filesystem failure in a file-backed medium
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// == Result Type Alias ==
/// Convenience Result type for the cache layer.
pub type Result<T> = std::result::Result<T, CacheError>;
