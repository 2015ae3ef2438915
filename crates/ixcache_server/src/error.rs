//! Error types for the cache node.

use ixcache_codec::CodecError;
use ixcache_core::CoreError;
use ixcache_protocol::ProtocolError;
use thiserror::Error;

/// Result type for node operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while serving a request.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Index model or storage error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Query validation or envelope error.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Wire error outside any single message.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A framed batch holds more messages than the node accepts.
    #[error("batch of {count} messages exceeds limit {max}")]
    BatchTooLarge {
        /// Messages in the batch.
        count: usize,
        /// Configured limit.
        max: usize,
    },

    /// Invalid node configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ServerError {
    /// Returns true if the caller sent something the node cannot serve.
    pub fn is_client_error(&self) -> bool {
        match self {
            ServerError::InvalidRequest(_)
            | ServerError::Codec(_)
            | ServerError::BatchTooLarge { .. } => true,
            ServerError::Protocol(e) => !matches!(e, ProtocolError::Core(_)),
            ServerError::Core(e) => matches!(
                e,
                CoreError::InvalidQuery { .. }
                    | CoreError::InvalidMutation { .. }
                    | CoreError::UnknownIndex { .. }
            ),
            ServerError::Config(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(ServerError::InvalidRequest("bad".into()).is_client_error());
        assert!(ServerError::from(CoreError::UnknownIndex { name: "x".into() }).is_client_error());
        assert!(!ServerError::from(CoreError::corrupted("0a", "bad page")).is_client_error());
        assert!(ServerError::from(ProtocolError::invalid_query("offset")).is_client_error());
        assert!(!ServerError::Config("empty".into()).is_client_error());
    }

    #[test]
    fn error_display() {
        let err = ServerError::from(CoreError::UnknownIndex {
            name: "ByTime".into(),
        });
        assert_eq!(err.to_string(), "invalid target index name - ByTime");
        let err = ServerError::BatchTooLarge { count: 9, max: 4 };
        assert!(err.to_string().contains('9'));
    }
}
