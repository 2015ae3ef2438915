//! Splitting requests across clusters.

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::Request;
use crate::queries::{IntersectionQuery, MultiIndexContainsQuery, PagedIndexQuery};
use ixcache_core::IndexId;
use std::collections::{BTreeMap, BTreeSet};

/// A query bound for one cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubQuery<Q> {
    /// Cluster index.
    pub cluster: usize,
    /// The query sent there.
    pub query: Q,
}

/// Cluster owning `primary_id`.
pub fn cluster_for(primary_id: i32, cluster_count: usize) -> ProtocolResult<usize> {
    let count = i64::try_from(cluster_count)
        .ok()
        .filter(|&count| count > 0)
        .ok_or(ProtocolError::NoClusters)?;
    let cluster = i64::from(primary_id).rem_euclid(count);
    usize::try_from(cluster).map_err(|_| ProtocolError::NoClusters)
}

/// Splits a paged query into one sub-query per cluster that owns at least
/// one of its indexes.
///
/// Sub-queries keep the relative order of their ids, with the matching
/// primary ids and per-id overrides. When the ids land on more than one
/// cluster and there is more than one id, each sub-query is marked for
/// client-side paging.
pub fn split_paged(
    query: &PagedIndexQuery,
    cluster_count: usize,
) -> ProtocolResult<Vec<SubQuery<PagedIndexQuery>>> {
    let per_cluster = group_by_cluster(&query.index_id_list, query.primary_ids(), cluster_count)?;
    let client_side = query.index_id_list.len() > 1 && per_cluster.len() > 1;
    Ok(per_cluster
        .into_iter()
        .map(|(cluster, (ids, primaries))| {
            let sub = PagedIndexQuery {
                index_id_params_mapping: params_for_ids(&query.index_id_params_mapping, &ids),
                index_id_list: ids,
                primary_id_list: primaries,
                client_side_subset_processing_required: query
                    .client_side_subset_processing_required
                    || client_side,
                ..query.clone()
            };
            SubQuery { cluster, query: sub }
        })
        .collect())
}

/// Splits an intersection into one sub-query per owning cluster.
///
/// Each node intersects the indexes it owns; the router intersects the
/// replies. A sub-query is marked single-cluster when every index lives on
/// one cluster, which lets the node apply the result cap itself.
pub fn split_intersection(
    query: &IntersectionQuery,
    cluster_count: usize,
) -> ProtocolResult<Vec<SubQuery<IntersectionQuery>>> {
    let per_cluster = group_by_cluster(&query.index_id_list, query.primary_ids(), cluster_count)?;
    let single_cluster = per_cluster.len() == 1;
    Ok(per_cluster
        .into_iter()
        .map(|(cluster, (ids, primaries))| {
            let sub = IntersectionQuery {
                index_id_params_mapping: params_for_ids(&query.index_id_params_mapping, &ids),
                index_id_list: ids,
                primary_id_list: primaries,
                is_single_cluster_query: single_cluster,
                ..query.clone()
            };
            SubQuery { cluster, query: sub }
        })
        .collect())
}

/// Splits a multi-index lookup into one sub-query per owning cluster.
pub fn split_multi_contains(
    query: &MultiIndexContainsQuery,
    cluster_count: usize,
) -> ProtocolResult<Vec<SubQuery<MultiIndexContainsQuery>>> {
    let per_cluster = group_by_cluster(&query.index_id_list, query.primary_ids(), cluster_count)?;
    Ok(per_cluster
        .into_iter()
        .map(|(cluster, (ids, primaries))| {
            let sub = MultiIndexContainsQuery {
                index_id_params_mapping: params_for_ids(&query.index_id_params_mapping, &ids),
                index_id_list: ids,
                primary_id_list: primaries,
                ..query.clone()
            };
            SubQuery { cluster, query: sub }
        })
        .collect())
}

/// Ids and primary ids per owning cluster, in their original relative order.
fn group_by_cluster(
    ids: &[IndexId],
    primary_ids: Vec<i32>,
    cluster_count: usize,
) -> ProtocolResult<BTreeMap<usize, (Vec<IndexId>, Vec<i32>)>> {
    let mut per_cluster: BTreeMap<usize, (Vec<IndexId>, Vec<i32>)> = BTreeMap::new();
    for (id, primary_id) in ids.iter().zip(primary_ids) {
        let cluster = cluster_for(primary_id, cluster_count)?;
        let (cluster_ids, primaries) = per_cluster.entry(cluster).or_default();
        cluster_ids.push(id.clone());
        primaries.push(primary_id);
    }
    Ok(per_cluster)
}

fn params_for_ids<P: Clone>(mapping: &BTreeMap<IndexId, P>, ids: &[IndexId]) -> BTreeMap<IndexId, P> {
    mapping
        .iter()
        .filter(|(id, _)| ids.contains(id))
        .map(|(id, params)| (id.clone(), params.clone()))
        .collect()
}

/// Where a node-wide query (tags, string hashes) is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregateScope {
    /// Every cluster answers; replies are merged.
    #[default]
    AllClusters,
    /// One cluster answers, chosen by `primary_id`.
    SingleCluster {
        /// Placement hash.
        primary_id: i32,
    },
}

impl AggregateScope {
    /// A single cluster chosen at random.
    #[must_use]
    pub fn random_cluster() -> Self {
        Self::SingleCluster {
            primary_id: rand::random::<i32>(),
        }
    }
}

/// Splits a node-wide query by scope.
pub fn split_aggregate<Q: Clone>(
    query: &Q,
    scope: AggregateScope,
    cluster_count: usize,
) -> ProtocolResult<Vec<SubQuery<Q>>> {
    match scope {
        AggregateScope::AllClusters => {
            if cluster_count == 0 {
                return Err(ProtocolError::NoClusters);
            }
            Ok((0..cluster_count)
                .map(|cluster| SubQuery {
                    cluster,
                    query: query.clone(),
                })
                .collect())
        }
        AggregateScope::SingleCluster { primary_id } => Ok(vec![SubQuery {
            cluster: cluster_for(primary_id, cluster_count)?,
            query: query.clone(),
        }]),
    }
}

/// Groups single-index requests into one batch per cluster.
///
/// Requests keep their relative order inside each batch. A request without
/// an index, or two requests naming the same index, fail the whole call.
pub fn split_per_index(
    requests: Vec<Request>,
    cluster_count: usize,
) -> ProtocolResult<BTreeMap<usize, Vec<Request>>> {
    let mut seen = BTreeSet::new();
    let mut batches: BTreeMap<usize, Vec<Request>> = BTreeMap::new();
    for request in requests {
        let (id, primary_id) = match (request.index_id(), request.primary_id()) {
            (Some(id), Some(primary_id)) => (id.clone(), primary_id),
            _ => {
                return Err(ProtocolError::invalid_query(format!(
                    "{} request is not addressed to a single index",
                    request.name()
                )))
            }
        };
        if !seen.insert(id.clone()) {
            return Err(ProtocolError::DuplicateIndexId {
                index_id: id.to_hex(),
            });
        }
        let cluster = cluster_for(primary_id, cluster_count)?;
        batches.entry(cluster).or_default().push(request);
    }
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::{IndexIdParams, IndexScanParams, RangeQuery, TagQuery};

    fn ids(values: &[i32]) -> Vec<IndexId> {
        values.iter().copied().map(IndexId::from).collect()
    }

    #[test]
    fn negative_primary_ids_wrap() {
        assert_eq!(cluster_for(-1, 3).unwrap(), 2);
        assert_eq!(cluster_for(7, 3).unwrap(), 1);
        assert!(matches!(cluster_for(1, 0), Err(ProtocolError::NoClusters)));
    }

    #[test]
    fn paged_split_by_primary_id() {
        let mut query = PagedIndexQuery::new(ids(&[1, 2, 3, 4]), 10, 1);
        query.primary_id_list = vec![1, 2, 3, 4];
        query.index_id_params_mapping.insert(
            IndexId::from(3),
            IndexIdParams {
                max_items: 2,
                filter: None,
            },
        );
        let subs = split_paged(&query, 2).unwrap();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].cluster, 0);
        assert_eq!(subs[0].query.index_id_list, ids(&[2, 4]));
        assert_eq!(subs[0].query.primary_id_list, vec![2, 4]);
        assert!(subs[0].query.index_id_params_mapping.is_empty());
        assert_eq!(subs[1].query.index_id_list, ids(&[1, 3]));
        assert!(subs[1]
            .query
            .index_id_params_mapping
            .contains_key(&IndexId::from(3)));
        assert!(subs.iter().all(|s| s.query.client_side_subset_processing_required));
    }

    #[test]
    fn single_cluster_split_is_not_marked() {
        let mut query = PagedIndexQuery::new(ids(&[1, 3]), 10, 1);
        query.primary_id_list = vec![1, 3];
        let subs = split_paged(&query, 2).unwrap();
        assert_eq!(subs.len(), 1);
        assert!(!subs[0].query.client_side_subset_processing_required);
    }

    #[test]
    fn aggregate_scopes() {
        let all = split_aggregate(&TagQuery, AggregateScope::AllClusters, 3).unwrap();
        assert_eq!(all.iter().map(|s| s.cluster).collect::<Vec<_>>(), vec![0, 1, 2]);
        let one = split_aggregate(
            &TagQuery,
            AggregateScope::SingleCluster { primary_id: 5 },
            3,
        )
        .unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].cluster, 2);
        let random = split_aggregate(&TagQuery, AggregateScope::random_cluster(), 3).unwrap();
        assert!(random[0].cluster < 3);
    }

    #[test]
    fn per_index_rejects_duplicates() {
        let requests = vec![
            Request::Range(RangeQuery::new(IndexId::from(1), 1, 1)),
            Request::Range(RangeQuery::new(IndexId::from(1), 2, 1)),
        ];
        assert!(matches!(
            split_per_index(requests, 2),
            Err(ProtocolError::DuplicateIndexId { .. })
        ));
        assert!(split_per_index(vec![Request::Tag(TagQuery)], 2).is_err());
    }

    #[test]
    fn per_index_batches_by_cluster() {
        let requests: Vec<Request> = (0..5)
            .map(|i| Request::Range(RangeQuery::new(IndexId::from(i), 1, 1)))
            .collect();
        let batches = split_per_index(requests, 2).unwrap();
        let total: usize = batches.values().map(Vec::len).sum();
        assert_eq!(total, 5);
        for (cluster, batch) in &batches {
            for request in batch {
                assert_eq!(cluster_for(request.primary_id().unwrap(), 2).unwrap(), *cluster);
            }
        }
    }

    #[test]
    fn intersection_split_marks_single_cluster() {
        let mut query = IntersectionQuery::new(ids(&[1, 2, 3])).with_max_result_items(4);
        query
            .index_id_params_mapping
            .insert(IndexId::from(2), IndexScanParams::default());
        let subs = split_intersection(&query, 2).unwrap();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].query.index_id_list, ids(&[2]));
        assert_eq!(subs[0].query.primary_id_list, vec![2]);
        assert_eq!(subs[0].query.index_id_params_mapping.len(), 1);
        assert_eq!(subs[1].query.index_id_list, ids(&[1, 3]));
        assert!(subs[1].query.index_id_params_mapping.is_empty());
        assert!(subs.iter().all(|s| !s.query.is_single_cluster_query));
        assert!(subs.iter().all(|s| s.query.max_result_items == 4));

        let subs = split_intersection(&IntersectionQuery::new(ids(&[1, 3])), 2).unwrap();
        assert_eq!(subs.len(), 1);
        assert!(subs[0].query.is_single_cluster_query);
    }

    #[test]
    fn multi_contains_split_keeps_item_ids() {
        let query = MultiIndexContainsQuery::new(ids(&[4, 5, 6]), vec![b"a".to_vec()]);
        let subs = split_multi_contains(&query, 3).unwrap();
        assert_eq!(subs.iter().map(|s| s.cluster).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(subs.iter().all(|s| s.query.item_ids == query.item_ids));
        assert!(subs.iter().all(|s| s.query.index_id_list.len() == 1));
        assert!(split_multi_contains(&query, 0).is_err());
    }
}
