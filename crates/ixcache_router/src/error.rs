//! Error types for the router.

use ixcache_codec::CodecError;
use ixcache_protocol::ProtocolError;
use thiserror::Error;

/// Result type for router operations.
pub type RouterResult<T> = Result<T, RouterError>;

/// Errors that can occur while routing a request.
#[derive(Error, Debug)]
pub enum RouterError {
    /// Split, encode or decode failure, including undecodable replies.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A cluster could not be reached or failed to answer.
    #[error("transport error on {cluster}: {message}")]
    Transport {
        /// Cluster name.
        cluster: String,
        /// Error message.
        message: String,
        /// Whether the call can be retried.
        retryable: bool,
    },

    /// A node refused to decode a request.
    #[error("cluster {cluster} rejected the request: {reason}")]
    Rejected {
        /// Cluster index.
        cluster: usize,
        /// Reason reported by the node.
        reason: String,
    },

    /// A reply batch did not match the request batch.
    #[error("cluster {cluster} answered {received} messages to a batch of {sent}")]
    BatchMismatch {
        /// Cluster index.
        cluster: usize,
        /// Messages sent.
        sent: usize,
        /// Messages received.
        received: usize,
    },

    /// Invalid topology or router configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<CodecError> for RouterError {
    fn from(err: CodecError) -> Self {
        Self::Protocol(ProtocolError::Codec(err))
    }
}

impl RouterError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(cluster: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            cluster: cluster.into(),
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(cluster: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            cluster: cluster.into(),
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            RouterError::Transport { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(RouterError::transport_retryable("east", "connection reset").is_retryable());
        assert!(!RouterError::transport_fatal("east", "bad address").is_retryable());
        assert!(!RouterError::Rejected {
            cluster: 0,
            reason: "unknown type tag 9".into()
        }
        .is_retryable());
        assert!(!RouterError::from(CodecError::UnknownTypeTag { tag: 200 }).is_retryable());
    }

    #[test]
    fn error_display() {
        let err = RouterError::BatchMismatch {
            cluster: 1,
            sent: 3,
            received: 2,
        };
        assert_eq!(err.to_string(), "cluster 1 answered 2 messages to a batch of 3");
        let err = RouterError::from(CodecError::UnknownTypeTag { tag: 200 });
        assert!(err.to_string().contains("200"));
    }
}
