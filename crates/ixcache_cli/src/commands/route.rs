//! Route command implementation.

use ixcache_core::{from_hex, IndexId};
use serde::Serialize;
use std::path::Path;

/// Placement of one index id.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Placement {
    /// The id as given.
    pub index_id: String,
    /// Sharding hash of the id.
    pub primary_id: i32,
    /// Owning cluster index.
    pub cluster: usize,
    /// Owning cluster name, when a topology was given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
    /// Preferred node name, when a topology was given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
}

/// Places every hex id over `clusters` clusters, or over the clusters of
/// `topology` when one is given.
pub fn place(
    clusters: usize,
    topology: Option<&Path>,
    ids: &[String],
) -> Result<Vec<Placement>, Box<dyn std::error::Error>> {
    let topology = topology.map(super::topology::load).transpose()?;
    let count = topology.as_ref().map_or(clusters, |t| t.len());

    ids.iter()
        .map(|text| -> Result<Placement, Box<dyn std::error::Error>> {
            let bytes = from_hex(text.trim_start_matches("0x"))
                .ok_or_else(|| format!("invalid hex index id: {text}"))?;
            let id = IndexId::new(bytes);
            let primary_id = id.primary_id();
            let cluster = ixcache_protocol::cluster_for(primary_id, count)?;
            let (cluster_name, node) = match &topology {
                Some(t) => {
                    let spec = t.cluster(cluster)?;
                    (
                        Some(spec.name.clone()),
                        spec.node_for(primary_id).map(|n| n.name.clone()),
                    )
                }
                None => (None, None),
            };
            Ok(Placement {
                index_id: id.to_hex(),
                primary_id,
                cluster,
                cluster_name,
                node,
            })
        })
        .collect()
}

/// Runs the route command.
pub fn run(
    clusters: usize,
    topology: Option<&Path>,
    ids: &[String],
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let placements = place(clusters, topology, ids)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&placements)?);
        return Ok(());
    }

    println!("{:<20} {:>12} {:>8}  Node", "IndexId", "PrimaryId", "Cluster");
    for p in &placements {
        let cluster = match &p.cluster_name {
            Some(name) => format!("{} ({name})", p.cluster),
            None => p.cluster.to_string(),
        };
        println!(
            "{:<20} {:>12} {:>8}  {}",
            p.index_id,
            p.primary_id,
            cluster,
            p.node.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn places_by_primary_id() {
        // 07000000 -> 7, ff -> 255, fbffffff -> |-5| = 5
        let ids = vec!["07000000".to_string(), "ff".to_string(), "0xfbffffff".to_string()];
        let placements = place(4, None, &ids).unwrap();
        let summary: Vec<(i32, usize)> = placements.iter().map(|p| (p.primary_id, p.cluster)).collect();
        assert_eq!(summary, vec![(7, 3), (255, 3), (5, 1)]);
        assert!(placements[0].node.is_none());
    }

    #[test]
    fn resolves_names_from_a_topology() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"{ "clusters": [
                { "name": "even", "nodes": [
                    { "name": "low", "max_primary_id": 9 },
                    { "name": "high", "min_primary_id": 10 }
                ] },
                { "name": "odd", "nodes": [ { "name": "o1" } ] }
            ] }"#,
        )
        .unwrap();

        let ids = vec!["0c000000".to_string(), "03".to_string()];
        let placements = place(99, Some(file.path()), &ids).unwrap();
        assert_eq!(placements[0].cluster_name.as_deref(), Some("even"));
        assert_eq!(placements[0].node.as_deref(), Some("high"));
        assert_eq!(placements[1].cluster_name.as_deref(), Some("odd"));
        assert_eq!(placements[1].node.as_deref(), Some("o1"));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(place(2, None, &["xyz".to_string()]).is_err());
        assert!(place(0, None, &["01".to_string()]).is_err());
    }
}
