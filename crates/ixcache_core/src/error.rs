//! Error types for IXCache core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core index operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] ixcache_storage::StorageError),

    /// Wire codec error.
    #[error("codec error: {0}")]
    Codec(#[from] ixcache_codec::CodecError),

    /// A stored index page could not be interpreted.
    #[error("corrupted index {index_id}: {message}")]
    Corrupted {
        /// Hex form of the affected IndexId.
        index_id: String,
        /// Description of the corruption.
        message: String,
    },

    /// A query failed validation.
    #[error("invalid query: {message}")]
    InvalidQuery {
        /// Description of the problem.
        message: String,
    },

    /// A mutation batch failed validation as a whole.
    #[error("invalid mutation: {message}")]
    InvalidMutation {
        /// Description of the problem.
        message: String,
    },

    /// The target index name is not configured.
    #[error("invalid target index name - {name}")]
    UnknownIndex {
        /// The requested name.
        name: String,
    },

    /// Index type configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Create a corrupted index error.
    pub fn corrupted(index_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupted {
            index_id: index_id.into(),
            message: message.into(),
        }
    }

    /// Create an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Create an invalid mutation error.
    pub fn invalid_mutation(message: impl Into<String>) -> Self {
        Self::InvalidMutation {
            message: message.into(),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
