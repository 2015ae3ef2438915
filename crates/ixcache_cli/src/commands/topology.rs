//! Topology command implementation.

use ixcache_router::ClusterTopology;
use serde::Serialize;
use std::path::Path;

/// Summary of a validated topology.
#[derive(Debug, Serialize)]
pub struct TopologyReport {
    /// Source file.
    pub path: String,
    /// Clusters in placement order.
    pub clusters: Vec<ClusterReport>,
}

/// One cluster of the topology.
#[derive(Debug, Serialize)]
pub struct ClusterReport {
    /// Placement index.
    pub index: usize,
    /// Cluster name.
    pub name: String,
    /// Member nodes.
    pub nodes: Vec<NodeReport>,
}

/// One node of a cluster.
#[derive(Debug, Serialize)]
pub struct NodeReport {
    /// Node name.
    pub name: String,
    /// Transport address.
    pub address: String,
    /// Lowest primary id owned.
    pub min_primary_id: i32,
    /// Highest primary id owned.
    pub max_primary_id: i32,
}

/// Reads and validates the topology at `path`.
pub fn load(path: &Path) -> Result<ClusterTopology, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read topology {}: {e}", path.display()))?;
    Ok(ClusterTopology::from_json(&text)?)
}

/// Builds the report for the topology at `path`.
pub fn report(path: &Path) -> Result<TopologyReport, Box<dyn std::error::Error>> {
    let topology = load(path)?;
    let clusters = topology
        .clusters
        .iter()
        .enumerate()
        .map(|(index, cluster)| ClusterReport {
            index,
            name: cluster.name.clone(),
            nodes: cluster
                .nodes
                .iter()
                .map(|node| NodeReport {
                    name: node.name.clone(),
                    address: node.address.clone(),
                    min_primary_id: node.min_primary_id,
                    max_primary_id: node.max_primary_id,
                })
                .collect(),
        })
        .collect();
    Ok(TopologyReport {
        path: path.display().to_string(),
        clusters,
    })
}

/// Runs the topology command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let report = report(path)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Topology: {}", report.path);
    println!("Clusters: {}", report.clusters.len());
    for cluster in &report.clusters {
        println!();
        println!("  [{}] {}", cluster.index, cluster.name);
        for node in &cluster.nodes {
            println!(
                "      {:<16} {:<24} {}..={}",
                node.name, node.address, node.min_primary_id, node.max_primary_id
            );
        }
    }
    Ok(())
}
