//! Error types for storage operations.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The key is not acceptable to the backend.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The value exceeds the backend's size limit.
    #[error("value of {len} bytes exceeds limit of {max} bytes")]
    ValueTooLarge {
        /// Size of the rejected value.
        len: usize,
        /// Backend limit.
        max: usize,
    },

    /// The stored bytes are corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// The storage is closed.
    #[error("storage is closed")]
    Closed,
}
