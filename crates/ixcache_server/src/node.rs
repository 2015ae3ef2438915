//! The cache node facade.

use crate::config::NodeConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{HandlerContext, RequestHandler};
use bytes::Bytes;
use ixcache_codec::{decode_batch, encode_batch};
use ixcache_core::{DomainSpecificProcessor, IndexStore};
use ixcache_protocol::{Rejected, Request, Response};
use ixcache_storage::{InMemoryBackend, StorageBackend};
use std::sync::Arc;
use tracing::{debug, warn};

/// One cache node.
///
/// A node owns the index pages of the IndexIds routed to its cluster and
/// answers encoded requests with encoded responses. It has no network
/// loop of its own; a transport feeds it bytes.
///
/// # Example
///
/// ```
/// use ixcache_core::{DataType, IndexId, IndexItem, IndexSpec, IndexTypeConfig, PrimarySortInfo, SortBy, SortOrder};
/// use ixcache_protocol::{RangeQuery, Request, Response, SaveIndexCommand};
/// use ixcache_server::{CacheNode, NodeConfig};
///
/// let sort = PrimarySortInfo::by_tag("score", vec![SortOrder::new(DataType::Int32, SortBy::Desc)]);
/// let config = NodeConfig::new("n1", IndexTypeConfig::new(vec![IndexSpec::new("ByScore", sort)]));
/// let node = CacheNode::new(config).unwrap();
///
/// let item = IndexItem::new(b"a".to_vec()).with_tag("score", 7i32.to_le_bytes().to_vec());
/// node.handle_request(Request::Save(SaveIndexCommand::new(IndexId::from(1)).with_add([item])));
///
/// let reply = node.handle_request(Request::Range(RangeQuery::new(IndexId::from(1), 1, 10)));
/// let Response::Range(result) = reply else { panic!("unexpected reply") };
/// assert_eq!(result.items.len(), 1);
/// ```
pub struct CacheNode<B: StorageBackend = InMemoryBackend> {
    handler: RequestHandler<B>,
    context: Arc<HandlerContext<B>>,
}

impl CacheNode<InMemoryBackend> {
    /// Creates a node over an empty in-memory store.
    pub fn new(config: NodeConfig) -> ServerResult<Self> {
        Self::with_backend(config, InMemoryBackend::new())
    }
}

impl<B: StorageBackend> CacheNode<B> {
    /// Creates a node over `backend`.
    pub fn with_backend(config: NodeConfig, backend: B) -> ServerResult<Self> {
        config.validate()?;
        let context = Arc::new(HandlerContext::new(config, backend));
        let handler = RequestHandler::new(Arc::clone(&context));
        Ok(Self { handler, context })
    }

    /// The node configuration.
    pub fn config(&self) -> &NodeConfig {
        &self.context.config
    }

    /// The node's index store.
    pub fn store(&self) -> &IndexStore<B> {
        &self.context.store
    }

    /// Registers the processor run for queries carrying domain code `code`.
    pub fn register_processor(&self, code: u8, processor: Arc<dyn DomainSpecificProcessor>) {
        self.context.register_processor(code, processor);
    }

    /// Serves a decoded request.
    pub fn handle_request(&self, request: Request) -> Response {
        debug!(node = %self.context.config.name, request = request.name(), "serving request");
        self.handler.handle(request)
    }

    /// Serves one encoded request. A request that cannot be decoded is
    /// answered with [`Response::Rejected`].
    pub fn handle(&self, bytes: &[u8]) -> ServerResult<Bytes> {
        let response = match Request::decode(bytes) {
            Ok(request) => self.handle_request(request),
            Err(e) => {
                warn!(node = %self.context.config.name, error = %e, "rejecting request");
                Response::Rejected(Rejected {
                    reason: e.to_string(),
                })
            }
        };
        Ok(response.encode()?)
    }

    /// Serves a framed batch of requests, replying with a batch of the
    /// same length and order.
    pub fn handle_batch(&self, bytes: &[u8]) -> ServerResult<Bytes> {
        let messages = decode_batch(bytes)?;
        let max = self.context.config.max_batch_messages;
        if messages.len() > max {
            return Err(ServerError::BatchTooLarge {
                count: messages.len(),
                max,
            });
        }
        let replies = messages
            .into_iter()
            .map(|message| self.handle(message))
            .collect::<ServerResult<Vec<_>>>()?;
        Ok(encode_batch(replies)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ixcache_core::{DataType, IndexId, IndexSpec, IndexTypeConfig, PrimarySortInfo, SortBy, SortOrder};
    use ixcache_protocol::{tags, RangeQuery, TagQuery};

    fn node() -> CacheNode {
        let sort = PrimarySortInfo::by_tag("score", vec![SortOrder::new(DataType::Int32, SortBy::Desc)]);
        let config = NodeConfig::new("n1", IndexTypeConfig::new(vec![IndexSpec::new("ByScore", sort)]))
            .with_max_batch_messages(2);
        CacheNode::new(config).unwrap()
    }

    #[test]
    fn invalid_config_is_refused() {
        assert!(CacheNode::new(NodeConfig::default()).is_err());
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let node = node();
        let reply = Response::decode(&node.handle(&[0xEE, 0, 0]).unwrap()).unwrap();
        assert_eq!(reply.type_tag(), tags::REJECTED);
        assert!(matches!(reply, Response::Rejected(r) if r.reason.contains("238")));
    }

    #[test]
    fn batch_limit() {
        let node = node();
        let request = Request::Tag(TagQuery).encode().unwrap();
        let batch = encode_batch([request.clone(), request.clone()]).unwrap();
        let replies = node.handle_batch(&batch).unwrap();
        assert_eq!(decode_batch(&replies).unwrap().len(), 2);

        let batch = encode_batch([request.clone(), request.clone(), request]).unwrap();
        assert!(matches!(
            node.handle_batch(&batch),
            Err(ServerError::BatchTooLarge { count: 3, max: 2 })
        ));
    }

    #[test]
    fn encoded_roundtrip() {
        let node = node();
        let request = Request::Range(RangeQuery::new(IndexId::from(3), 1, 1)).encode().unwrap();
        let reply = Response::decode(&node.handle(&request).unwrap()).unwrap();
        assert!(matches!(reply, Response::Range(r) if !r.summary.index_exists));
    }
}
