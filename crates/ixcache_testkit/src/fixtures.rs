//! Node and cluster fixtures.
//!
//! Every fixture serves one index, `ByKey`, sorted descending on the
//! `Int32` tag `key`.

use ixcache_core::{
    DataType, IndexId, IndexItem, IndexSpec, IndexTypeConfig, PrimarySortInfo, SortBy, SortOrder,
};
use ixcache_protocol::{MutationResult, Request, Response, SaveIndexCommand};
use ixcache_router::{
    ClusterSpec, ClusterTopology, LoopbackTransport, MockTransport, NodeSpec, Router, RouterConfig,
};
use ixcache_server::{CacheNode, NodeConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Name of the fixture index.
pub const BY_KEY: &str = "ByKey";

/// Tag the fixture index sorts on.
pub const KEY_TAG: &str = "key";

/// Descending `Int32` sort on [`KEY_TAG`].
pub fn key_sort() -> PrimarySortInfo {
    PrimarySortInfo::by_tag(KEY_TAG, vec![SortOrder::new(DataType::Int32, SortBy::Desc)])
}

/// Node configuration serving [`BY_KEY`].
pub fn key_node_config(name: impl Into<String>) -> NodeConfig {
    NodeConfig::new(
        name,
        IndexTypeConfig::new(vec![IndexSpec::new(BY_KEY, key_sort())]),
    )
}

/// An entry with a little-endian `u32` id and an `Int32` key tag.
pub fn keyed_item(id: u32, key: i32) -> IndexItem {
    IndexItem::new(id.to_le_bytes().to_vec()).with_tag(KEY_TAG, key.to_le_bytes().to_vec())
}

/// One entry per key, ids counting from 1.
pub fn keyed_items(keys: &[i32]) -> Vec<IndexItem> {
    keys.iter()
        .zip(1u32..)
        .map(|(&key, id)| keyed_item(id, key))
        .collect()
}

/// The key tag of an entry, if present and well formed.
pub fn key_of(item: &IndexItem) -> Option<i32> {
    let bytes = item.tags.get(KEY_TAG)?;
    <[u8; 4]>::try_from(bytes.as_slice()).ok().map(i32::from_le_bytes)
}

/// Saves `items` into `index_id` on `node`.
pub fn save(node: &CacheNode, index_id: IndexId, items: Vec<IndexItem>) -> MutationResult {
    let command = SaveIndexCommand::new(index_id).with_add(items);
    match node.handle_request(Request::Save(command)) {
        Response::Mutation(result) => result,
        other => panic!("save answered with {}", other.name()),
    }
}

/// A single in-memory node serving [`BY_KEY`].
pub struct TestNode {
    /// The node.
    pub node: Arc<CacheNode>,
}

impl TestNode {
    /// Creates the node.
    pub fn new() -> Self {
        let node = CacheNode::new(key_node_config("test-node")).expect("Failed to create node");
        Self {
            node: Arc::new(node),
        }
    }

    /// Saves `items` into `index_id`, panicking on rejection.
    pub fn load(&self, index_id: IndexId, items: Vec<IndexItem>) {
        let result = save(&self.node, index_id, items);
        assert!(result.is_ok(), "save failed: {}", result.exception_info);
    }
}

impl Default for TestNode {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestNode {
    type Target = CacheNode;

    fn deref(&self) -> &Self::Target {
        &self.node
    }
}

/// An in-process deployment: one node per cluster behind a loopback
/// transport, with its topology written to a temporary file.
pub struct TestCluster {
    /// Node of each cluster, in placement order.
    pub nodes: Vec<Arc<CacheNode>>,
    topology: ClusterTopology,
    topology_path: PathBuf,
    _temp_dir: TempDir,
}

impl TestCluster {
    /// Creates `clusters` clusters named `c0..`.
    pub fn new(clusters: usize) -> Self {
        let specs: Vec<ClusterSpec> = (0..clusters)
            .map(|i| ClusterSpec::new(format!("c{i}"), vec![NodeSpec::new(format!("n{i}"), "loopback")]))
            .collect();
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let topology_path = temp_dir.path().join("topology.json");
        let json = serde_json::json!({ "clusters": specs });
        std::fs::write(&topology_path, json.to_string()).expect("Failed to write topology");

        let text = std::fs::read_to_string(&topology_path).expect("Failed to read topology");
        let topology = ClusterTopology::from_json(&text).expect("Invalid topology");
        let nodes = (0..clusters)
            .map(|i| {
                let node = CacheNode::new(key_node_config(format!("n{i}")))
                    .expect("Failed to create node");
                Arc::new(node)
            })
            .collect();
        Self {
            nodes,
            topology,
            topology_path,
            _temp_dir: temp_dir,
        }
    }

    /// The topology file.
    pub fn topology_path(&self) -> &Path {
        &self.topology_path
    }

    /// The topology.
    pub fn topology(&self) -> &ClusterTopology {
        &self.topology
    }

    /// A loopback transport over the nodes.
    pub fn transport(&self) -> LoopbackTransport {
        self.topology
            .clusters
            .iter()
            .zip(&self.nodes)
            .fold(LoopbackTransport::new(), |transport, (cluster, node)| {
                transport.with_node(cluster.name.clone(), Arc::clone(node))
            })
    }

    /// A router over the loopback transport.
    pub fn router(&self) -> Router<LoopbackTransport> {
        Router::new(self.topology.clone(), self.transport(), RouterConfig::default())
            .expect("Failed to create router")
    }

    /// A router over a mock wrapping the loopback transport. `script`
    /// configures the mock before the router is built.
    pub fn mock_router(
        &self,
        config: RouterConfig,
        script: impl FnOnce(&MockTransport),
    ) -> Router<MockTransport> {
        let mock = MockTransport::wrapping(Arc::new(self.transport()));
        script(&mock);
        Router::new(self.topology.clone(), mock, config).expect("Failed to create router")
    }

    /// The node owning `index_id`.
    pub fn owner(&self, index_id: &IndexId) -> &CacheNode {
        let cluster = self
            .topology
            .cluster_for(index_id.primary_id())
            .expect("Topology has clusters");
        &self.nodes[cluster]
    }

    /// Saves `items` into `index_id` on its owning node.
    pub fn load(&self, index_id: IndexId, items: Vec<IndexItem>) {
        let result = save(self.owner(&index_id), index_id, items);
        assert!(result.is_ok(), "save failed: {}", result.exception_info);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ixcache_protocol::RangeQuery;

    #[test]
    fn keyed_items_round_trip_their_keys() {
        let items = keyed_items(&[5, -3]);
        assert_eq!(items[1].item_id, 2u32.to_le_bytes().to_vec());
        assert_eq!(key_of(&items[1]), Some(-3));
        assert_eq!(key_of(&IndexItem::new(vec![1])), None);
    }

    #[test]
    fn node_serves_loaded_entries() {
        let node = TestNode::new();
        node.load(IndexId::from(9), keyed_items(&[1, 3, 2]));
        let Response::Range(result) =
            node.handle_request(Request::Range(RangeQuery::new(IndexId::from(9), 1, 10)))
        else {
            panic!("expected a range reply");
        };
        let keys: Vec<_> = result.items.iter().filter_map(key_of).collect();
        assert_eq!(keys, vec![3, 2, 1]);
    }

    #[test]
    fn cluster_places_by_primary_id() {
        let cluster = TestCluster::new(3);
        assert!(cluster.topology_path().exists());
        assert_eq!(cluster.topology().len(), 3);
        cluster.load(IndexId::from(4), keyed_items(&[1]));

        let reply = cluster.nodes[1].handle_request(Request::Range(RangeQuery::new(IndexId::from(4), 1, 1)));
        let Response::Range(result) = reply else {
            panic!("expected a range reply");
        };
        assert!(result.summary.index_exists);
        let reply = cluster.nodes[0].handle_request(Request::Range(RangeQuery::new(IndexId::from(4), 1, 1)));
        let Response::Range(result) = reply else {
            panic!("expected a range reply");
        };
        assert!(!result.summary.index_exists);
    }
}
