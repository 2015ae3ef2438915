//! Cluster topology and its hot-swappable handle.

use crate::error::{RouterError, RouterResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One node of a cluster and the primary ids it prefers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Node name.
    pub name: String,
    /// Transport address.
    #[serde(default)]
    pub address: String,
    /// Lowest primary id owned (inclusive).
    #[serde(default = "min_id")]
    pub min_primary_id: i32,
    /// Highest primary id owned (inclusive).
    #[serde(default = "max_id")]
    pub max_primary_id: i32,
}

fn min_id() -> i32 {
    i32::MIN
}

fn max_id() -> i32 {
    i32::MAX
}

impl NodeSpec {
    /// A node owning every primary id.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            min_primary_id: i32::MIN,
            max_primary_id: i32::MAX,
        }
    }

    /// Restricts the node to `min..=max`.
    pub fn with_range(mut self, min: i32, max: i32) -> Self {
        self.min_primary_id = min;
        self.max_primary_id = max;
        self
    }

    /// Returns true if `primary_id` falls in the node's range.
    pub fn owns(&self, primary_id: i32) -> bool {
        (self.min_primary_id..=self.max_primary_id).contains(&primary_id)
    }
}

/// A cluster: the unit a shard is placed on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpec {
    /// Cluster name.
    pub name: String,
    /// Member nodes.
    pub nodes: Vec<NodeSpec>,
}

impl ClusterSpec {
    /// Creates a cluster.
    pub fn new(name: impl Into<String>, nodes: Vec<NodeSpec>) -> Self {
        Self {
            name: name.into(),
            nodes,
        }
    }

    /// The first node whose range holds `primary_id`, else the first node.
    pub fn node_for(&self, primary_id: i32) -> Option<&NodeSpec> {
        self.nodes
            .iter()
            .find(|node| node.owns(primary_id))
            .or_else(|| self.nodes.first())
    }
}

/// The clusters a router fans out to. Cluster `i` owns the primary ids
/// congruent to `i` modulo the cluster count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterTopology {
    /// Clusters, in placement order.
    pub clusters: Vec<ClusterSpec>,
}

impl ClusterTopology {
    /// Creates and validates a topology.
    pub fn new(clusters: Vec<ClusterSpec>) -> RouterResult<Self> {
        let topology = Self { clusters };
        topology.validate()?;
        Ok(topology)
    }

    /// Loads a topology from JSON and validates it.
    pub fn from_json(text: &str) -> RouterResult<Self> {
        let topology: Self =
            serde_json::from_str(text).map_err(|e| RouterError::Config(e.to_string()))?;
        topology.validate()?;
        Ok(topology)
    }

    /// Checks there is a cluster, that every cluster has a node and that
    /// every node range is ordered.
    pub fn validate(&self) -> RouterResult<()> {
        if self.clusters.is_empty() {
            return Err(RouterError::Config("topology has no clusters".into()));
        }
        for cluster in &self.clusters {
            if cluster.nodes.is_empty() {
                return Err(RouterError::Config(format!(
                    "cluster '{}' has no nodes",
                    cluster.name
                )));
            }
            for node in &cluster.nodes {
                if node.min_primary_id > node.max_primary_id {
                    return Err(RouterError::Config(format!(
                        "node '{}' range {}..={} is inverted",
                        node.name, node.min_primary_id, node.max_primary_id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Number of clusters.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// Returns true if there are no clusters.
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Cluster index owning `primary_id`.
    pub fn cluster_for(&self, primary_id: i32) -> RouterResult<usize> {
        Ok(ixcache_protocol::cluster_for(primary_id, self.clusters.len())?)
    }

    /// Cluster at `index`.
    pub fn cluster(&self, index: usize) -> RouterResult<&ClusterSpec> {
        self.clusters
            .get(index)
            .ok_or_else(|| RouterError::Config(format!("no cluster at index {index}")))
    }
}

/// Shared, replaceable topology.
///
/// Each routed call takes one snapshot and uses it to the end, so a
/// concurrent [`TopologyHandle::replace`] never splits a call across two
/// topologies.
#[derive(Debug, Clone)]
pub struct TopologyHandle {
    current: Arc<RwLock<Arc<ClusterTopology>>>,
}

impl TopologyHandle {
    /// Wraps a validated topology.
    pub fn new(topology: ClusterTopology) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(topology))),
        }
    }

    /// The current topology.
    pub fn snapshot(&self) -> Arc<ClusterTopology> {
        Arc::clone(&self.current.read())
    }

    /// Validates and installs `topology`.
    pub fn replace(&self, topology: ClusterTopology) -> RouterResult<()> {
        topology.validate()?;
        *self.current.write() = Arc::new(topology);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON: &str = r#"{
        "clusters": [
            { "name": "east", "nodes": [
                { "name": "e1", "address": "10.0.0.1:7000", "min_primary_id": 0, "max_primary_id": 999 },
                { "name": "e2", "address": "10.0.0.2:7000", "min_primary_id": 1000, "max_primary_id": 1999 }
            ] },
            { "name": "west", "nodes": [ { "name": "w1" } ] }
        ]
    }"#;

    #[test]
    fn loads_and_places() {
        let topology = ClusterTopology::from_json(JSON).unwrap();
        assert_eq!(topology.len(), 2);
        assert_eq!(topology.cluster_for(7).unwrap(), 1);
        assert_eq!(topology.cluster_for(-7).unwrap(), 1);
        assert_eq!(topology.cluster_for(8).unwrap(), 0);

        let east = topology.cluster(0).unwrap();
        assert_eq!(east.node_for(1500).unwrap().name, "e2");
        assert_eq!(east.node_for(5000).unwrap().name, "e1");
        assert!(topology.cluster(2).is_err());
    }

    #[test]
    fn rejects_bad_topologies() {
        assert!(ClusterTopology::new(Vec::new()).is_err());
        assert!(ClusterTopology::new(vec![ClusterSpec::new("empty", Vec::new())]).is_err());
        let inverted = NodeSpec::new("n", "").with_range(5, 1);
        assert!(ClusterTopology::new(vec![ClusterSpec::new("c", vec![inverted])]).is_err());
        assert!(ClusterTopology::from_json("[]").is_err());
    }

    #[test]
    fn handle_swaps_whole_snapshots() {
        let one = ClusterTopology::new(vec![ClusterSpec::new("a", vec![NodeSpec::new("a1", "")])]).unwrap();
        let handle = TopologyHandle::new(one);
        let before = handle.snapshot();

        let two = ClusterTopology::from_json(JSON).unwrap();
        handle.replace(two).unwrap();
        assert_eq!(before.len(), 1);
        assert_eq!(handle.snapshot().len(), 2);
        assert!(handle
            .replace(ClusterTopology {
                clusters: Vec::new()
            })
            .is_err());
        assert_eq!(handle.snapshot().len(), 2);
    }
}
