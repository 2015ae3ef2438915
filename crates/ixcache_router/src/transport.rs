//! Transport layer abstraction for cluster calls.

use crate::error::{RouterError, RouterResult};
use crate::topology::ClusterSpec;
use bytes::Bytes;
use ixcache_server::CacheNode;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Completion callback for [`ClusterTransport::send_async`].
pub type ReplyCallback = Box<dyn FnOnce(RouterResult<Bytes>) + Send>;

/// Carries framed request batches to a cluster and returns its framed
/// reply.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (TCP, HTTP, in-process loopback, mock for testing).
pub trait ClusterTransport: Send + Sync {
    /// Sends `request` and blocks for the reply.
    fn send(&self, cluster: &ClusterSpec, request: Bytes) -> RouterResult<Bytes>;

    /// Sends `request` and reports the reply through `callback`.
    ///
    /// The default implementation calls [`ClusterTransport::send`] on the
    /// calling thread.
    fn send_async(&self, cluster: &ClusterSpec, request: Bytes, callback: ReplyCallback) {
        callback(self.send(cluster, request));
    }
}

impl<T: ClusterTransport + ?Sized> ClusterTransport for Arc<T> {
    fn send(&self, cluster: &ClusterSpec, request: Bytes) -> RouterResult<Bytes> {
        (**self).send(cluster, request)
    }

    fn send_async(&self, cluster: &ClusterSpec, request: Bytes, callback: ReplyCallback) {
        (**self).send_async(cluster, request, callback);
    }
}

/// In-process transport serving each cluster from a [`CacheNode`].
#[derive(Default)]
pub struct LoopbackTransport {
    nodes: HashMap<String, Arc<CacheNode>>,
}

impl LoopbackTransport {
    /// Creates an empty loopback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves cluster `name` from `node`.
    pub fn with_node(mut self, name: impl Into<String>, node: Arc<CacheNode>) -> Self {
        self.nodes.insert(name.into(), node);
        self
    }

    /// The node serving cluster `name`.
    pub fn node(&self, name: &str) -> Option<&Arc<CacheNode>> {
        self.nodes.get(name)
    }
}

impl ClusterTransport for LoopbackTransport {
    fn send(&self, cluster: &ClusterSpec, request: Bytes) -> RouterResult<Bytes> {
        let node = self
            .nodes
            .get(&cluster.name)
            .ok_or_else(|| RouterError::transport_fatal(&cluster.name, "no node registered"))?;
        node.handle_batch(&request)
            .map_err(|e| RouterError::transport_fatal(&cluster.name, e.to_string()))
    }
}

#[derive(Debug, Clone, Default)]
struct Script {
    delay: Option<Duration>,
    failure: Option<(String, bool)>,
    reply: Option<Bytes>,
}

/// A scripted transport for testing.
///
/// Per cluster it can delay, fail, or answer with fixed bytes. Clusters
/// with no scripted reply are forwarded to the wrapped transport, if any.
#[derive(Default)]
pub struct MockTransport {
    scripts: Mutex<HashMap<String, Script>>,
    inner: Option<Arc<dyn ClusterTransport>>,
    calls: AtomicUsize,
}

impl MockTransport {
    /// Creates a mock with no scripts and nothing behind it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock forwarding unscripted calls to `inner`.
    pub fn wrapping(inner: Arc<dyn ClusterTransport>) -> Self {
        Self {
            inner: Some(inner),
            ..Self::default()
        }
    }

    /// Delays every call to `cluster`.
    pub fn set_delay(&self, cluster: &str, delay: Duration) {
        self.scripts.lock().entry(cluster.into()).or_default().delay = Some(delay);
    }

    /// Fails every call to `cluster`.
    pub fn set_failure(&self, cluster: &str, message: impl Into<String>, retryable: bool) {
        self.scripts.lock().entry(cluster.into()).or_default().failure = Some((message.into(), retryable));
    }

    /// Answers every call to `cluster` with `reply`.
    pub fn set_reply(&self, cluster: &str, reply: Bytes) {
        self.scripts.lock().entry(cluster.into()).or_default().reply = Some(reply);
    }

    /// Drops the script of `cluster`.
    pub fn clear(&self, cluster: &str) {
        self.scripts.lock().remove(cluster);
    }

    /// Calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ClusterTransport for MockTransport {
    fn send(&self, cluster: &ClusterSpec, request: Bytes) -> RouterResult<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().get(&cluster.name).cloned().unwrap_or_default();
        if let Some(delay) = script.delay {
            std::thread::sleep(delay);
        }
        if let Some((message, retryable)) = script.failure {
            return Err(RouterError::Transport {
                cluster: cluster.name.clone(),
                message,
                retryable,
            });
        }
        if let Some(reply) = script.reply {
            return Ok(reply);
        }
        match &self.inner {
            Some(inner) => inner.send(cluster, request),
            None => Err(RouterError::transport_fatal(&cluster.name, "no mock reply set")),
        }
    }
}
