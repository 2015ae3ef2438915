//! Simulate command implementation.
//!
//! Builds one in-process node per cluster, saves sample entries through
//! the router and pages across every index, the way a client would.

use ixcache_core::{
    DataType, IndexId, IndexItem, IndexSpec, IndexTypeConfig, PrimarySortInfo, SortBy, SortOrder,
};
use ixcache_protocol::{GetIndexHeaderType, PagedIndexQuery, Request, SaveIndexCommand};
use ixcache_router::{
    ClusterSpec, ClusterTopology, LoopbackTransport, NodeSpec, Router, RouterConfig,
};
use ixcache_server::{CacheNode, NodeConfig};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

const INDEX_NAME: &str = "ByKey";
const KEY_TAG: &str = "key";

/// Shape of the simulated deployment and query.
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    /// Number of clusters.
    pub clusters: usize,
    /// Number of indexes.
    pub indexes: u32,
    /// Entries per index.
    pub items: u32,
    /// Page size.
    pub page_size: i32,
    /// Page number, 1-based.
    pub page_num: i32,
}

/// Outcome of the simulated query.
#[derive(Debug, Serialize)]
pub struct SimulateReport {
    /// Correlation id of the paged fan-out.
    pub request_id: String,
    /// True when every cluster answered.
    pub complete: bool,
    /// Entries counted across all indexes.
    pub total_count: i32,
    /// Indexes with a header in the reply.
    pub header_count: usize,
    /// The merged page.
    pub items: Vec<PageEntry>,
    /// Merged failure text.
    pub exception_info: String,
}

/// One entry of the merged page.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PageEntry {
    /// Owning index, hex encoded.
    pub index_id: String,
    /// Sort key.
    pub key: i32,
}

fn topology(clusters: usize) -> Result<ClusterTopology, Box<dyn std::error::Error>> {
    let specs = (0..clusters)
        .map(|i| ClusterSpec::new(format!("c{i}"), vec![NodeSpec::new(format!("n{i}"), "loopback")]))
        .collect();
    Ok(ClusterTopology::new(specs)?)
}

fn transport(clusters: usize) -> Result<LoopbackTransport, Box<dyn std::error::Error>> {
    let sort = PrimarySortInfo::by_tag(KEY_TAG, vec![SortOrder::new(DataType::Int32, SortBy::Desc)]);
    let mut transport = LoopbackTransport::new();
    for i in 0..clusters {
        let config = NodeConfig::new(
            format!("n{i}"),
            IndexTypeConfig::new(vec![IndexSpec::new(INDEX_NAME, sort.clone())]),
        );
        transport = transport.with_node(format!("c{i}"), Arc::new(CacheNode::new(config)?));
    }
    Ok(transport)
}

/// Key of entry `j` of index `i`; keys of all indexes interleave.
fn sample_key(index: u32, entry: u32, indexes: u32) -> i32 {
    i32::try_from(entry * indexes + index).unwrap_or(i32::MAX)
}

fn key_of(item: &IndexItem) -> i32 {
    item.tags
        .get(KEY_TAG)
        .and_then(|v| <[u8; 4]>::try_from(v.as_slice()).ok())
        .map_or(0, i32::from_le_bytes)
}

/// Runs the simulation and returns its report.
pub async fn simulate(options: &SimulateOptions) -> Result<SimulateReport, Box<dyn std::error::Error>> {
    let router = Router::new(
        topology(options.clusters)?,
        transport(options.clusters)?,
        RouterConfig::default(),
    )?;

    let ids: Vec<IndexId> = (1..=options.indexes)
        .map(|i| IndexId::from(i32::try_from(i).unwrap_or(i32::MAX)))
        .collect();
    for (i, id) in (1..=options.indexes).zip(&ids) {
        let items = (0..options.items).map(|j| {
            let key = sample_key(i, j, options.indexes).to_le_bytes();
            IndexItem::new(key.to_vec()).with_tag(KEY_TAG, key.to_vec())
        });
        let command = SaveIndexCommand::new(id.clone()).with_add(items);
        let outcome = router.execute_command(Request::Save(command)).await?;
        if !outcome.result.exception_info.is_empty() {
            return Err(outcome.result.exception_info.into());
        }
    }
    info!(
        indexes = options.indexes,
        items = options.items,
        clusters = options.clusters,
        "sample data loaded"
    );

    let query = PagedIndexQuery::new(ids, options.page_size, options.page_num)
        .with_index_header_type(GetIndexHeaderType::AllIndexIds);
    let outcome = router.execute_paged(&query).await?;
    let result = outcome.result;
    Ok(SimulateReport {
        request_id: outcome.request_id.to_string(),
        complete: outcome.complete,
        total_count: result.total_count,
        header_count: result.index_header_map.len(),
        items: result
            .items
            .iter()
            .map(|entry| PageEntry {
                index_id: entry.index_id.to_hex(),
                key: key_of(&entry.item),
            })
            .collect(),
        exception_info: result.exception_info,
    })
}

/// Runs the simulate command.
pub fn run(options: &SimulateOptions, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    let report = runtime.block_on(simulate(options))?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Request:     {}", report.request_id);
    println!("Complete:    {}", report.complete);
    println!("Total count: {}", report.total_count);
    println!("Headers:     {}", report.header_count);
    println!();
    println!("{:<12} {:>10}", "IndexId", "Key");
    for entry in &report.items {
        println!("{:<12} {:>10}", entry.index_id, entry.key);
    }
    if !report.exception_info.is_empty() {
        println!();
        println!("Errors: {}", report.exception_info);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(page_num: i32) -> SimulateOptions {
        SimulateOptions {
            clusters: 3,
            indexes: 4,
            items: 5,
            page_size: 6,
            page_num,
        }
    }

    #[tokio::test]
    async fn pages_across_clusters() {
        let report = simulate(&options(1)).await.unwrap();
        assert!(report.complete);
        assert_eq!(report.total_count, 20);
        assert_eq!(report.header_count, 4);
        let keys: Vec<i32> = report.items.iter().map(|e| e.key).collect();
        assert_eq!(keys, vec![20, 19, 18, 17, 16, 15]);
        assert!(report.exception_info.is_empty());

        let report = simulate(&options(4)).await.unwrap();
        let keys: Vec<i32> = report.items.iter().map(|e| e.key).collect();
        assert_eq!(keys, vec![2, 1]);
    }

    #[test]
    fn zero_clusters_is_an_error() {
        let mut bad = options(1);
        bad.clusters = 0;
        assert!(run(&bad, "json").is_err());
    }
}
