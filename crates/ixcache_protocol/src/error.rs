//! Error types for the IXCache protocol.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while encoding, splitting or merging messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Wire codec error.
    #[error("codec error: {0}")]
    Codec(#[from] ixcache_codec::CodecError),

    /// Core model error.
    #[error("core error: {0}")]
    Core(#[from] ixcache_core::CoreError),

    /// A query failed client-side validation.
    #[error("invalid query: {message}")]
    InvalidQuery {
        /// Description of the problem.
        message: String,
    },

    /// A per-index batch names the same index twice.
    #[error("duplicate index id {index_id} in batch")]
    DuplicateIndexId {
        /// Hex form of the repeated IndexId.
        index_id: String,
    },

    /// Routing was asked to place work on zero clusters.
    #[error("cluster count must be at least 1")]
    NoClusters,

    /// A reply had a different type than its request expects.
    #[error("unexpected response: expected {expected}, got {actual}")]
    UnexpectedResponse {
        /// Expected response type.
        expected: &'static str,
        /// Received response type.
        actual: &'static str,
    },
}

impl ProtocolError {
    /// Create an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Returns true if the error came from undecodable bytes.
    #[must_use]
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Self::Codec(_))
    }
}
