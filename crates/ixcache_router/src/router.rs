//! Scatter-gather over clusters.

use crate::config::RouterConfig;
use crate::error::{RouterError, RouterResult};
use crate::topology::{ClusterTopology, TopologyHandle};
use crate::transport::ClusterTransport;
use bytes::Bytes;
use ixcache_codec::{decode_batch, encode_batch};
use ixcache_core::IndexId;
use ixcache_protocol::{
    merge_all, merge_intersection, merge_paged, push_exception, split_aggregate,
    split_intersection, split_multi_contains, split_paged, split_per_index, AggregateScope,
    IntersectionQuery, IntersectionQueryResult, MultiIndexContainsQuery,
    MultiIndexContainsQueryResult, MutationResult, NameSetResult, PagedIndexQuery,
    PagedIndexQueryResult, ProtocolError, Request, Response,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

/// A merged reply and how complete it is.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome<R> {
    /// Correlation id of the fan-out.
    pub request_id: Uuid,
    /// Merged result of every cluster that answered.
    pub result: R,
    /// True when every cluster answered.
    pub complete: bool,
    /// Clusters whose call failed.
    pub failed_clusters: Vec<usize>,
    /// Clusters that had not answered by the deadline.
    pub timed_out_clusters: Vec<usize>,
}

/// Per-cluster replies of one fan-out.
struct Gathered {
    replies: BTreeMap<usize, Vec<Response>>,
    failed: Vec<usize>,
    timed_out: Vec<usize>,
    errors: Vec<String>,
}

impl Gathered {
    fn outcome<R>(&self, request_id: Uuid, result: R) -> QueryOutcome<R> {
        QueryOutcome {
            request_id,
            result,
            complete: self.failed.is_empty() && self.timed_out.is_empty(),
            failed_clusters: self.failed.clone(),
            timed_out_clusters: self.timed_out.clone(),
        }
    }

    fn push_errors(&self, exception_info: &mut String) {
        for line in &self.errors {
            push_exception(exception_info, line);
        }
    }
}

fn unexpected(expected: &'static str, actual: &Response) -> RouterError {
    RouterError::Protocol(ProtocolError::UnexpectedResponse {
        expected,
        actual: actual.name(),
    })
}

/// Routes queries and commands to the clusters of a topology.
///
/// Every call sends one framed batch per involved cluster, concurrently,
/// and waits for the replies until the configured timeout. Clusters that
/// fail or miss the deadline are reported in the outcome and in the merged
/// `exception_info`; the replies that did arrive are still merged. A
/// cluster that rejects a request, or answers with bytes that cannot be
/// decoded, fails the whole call.
pub struct Router<T: ClusterTransport + 'static> {
    transport: Arc<T>,
    topology: TopologyHandle,
    config: RouterConfig,
}

impl<T: ClusterTransport + 'static> Router<T> {
    /// Creates a router over a validated topology.
    pub fn new(topology: ClusterTopology, transport: T, config: RouterConfig) -> RouterResult<Self> {
        topology.validate()?;
        Ok(Self {
            transport: Arc::new(transport),
            topology: TopologyHandle::new(topology),
            config,
        })
    }

    /// The topology handle, for hot swaps.
    pub fn topology(&self) -> &TopologyHandle {
        &self.topology
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The router configuration.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Runs a paged query over every cluster owning one of its indexes.
    pub async fn execute_paged(
        &self,
        query: &PagedIndexQuery,
    ) -> RouterResult<QueryOutcome<PagedIndexQueryResult>> {
        query.validate()?;
        let request_id = Uuid::new_v4();
        let topology = self.topology.snapshot();
        let subs = split_paged(query, topology.len())?;
        let marked = subs
            .iter()
            .any(|sub| sub.query.client_side_subset_processing_required);
        let batches = subs
            .into_iter()
            .map(|sub| (sub.cluster, vec![Request::Paged(sub.query)]))
            .collect();

        let gathered = self
            .gather(&topology, batches)
            .instrument(info_span!("paged", %request_id, indexes = query.index_id_list.len()))
            .await?;

        let mut results = Vec::with_capacity(gathered.replies.len());
        for response in gathered.replies.values().flatten() {
            match response {
                Response::Paged(result) => results.push(result.clone()),
                other => return Err(unexpected("PagedIndexQueryResult", other)),
            }
        }
        let merge_query = PagedIndexQuery {
            client_side_subset_processing_required: marked,
            ..query.clone()
        };
        let mut merged = merge_paged(results, &merge_query);
        gathered.push_errors(&mut merged.exception_info);
        Ok(gathered.outcome(request_id, merged))
    }

    /// Runs an intersection over every cluster owning one of its indexes.
    ///
    /// Every index must answer for an intersection to hold: when a cluster
    /// fails or times out the merged result is empty and incomplete.
    pub async fn execute_intersection(
        &self,
        query: &IntersectionQuery,
    ) -> RouterResult<QueryOutcome<IntersectionQueryResult>> {
        query.validate()?;
        let request_id = Uuid::new_v4();
        let topology = self.topology.snapshot();
        let batches = split_intersection(query, topology.len())?
            .into_iter()
            .map(|sub| (sub.cluster, vec![Request::Intersection(sub.query)]))
            .collect();

        let gathered = self
            .gather(&topology, batches)
            .instrument(info_span!("intersection", %request_id, indexes = query.index_id_list.len()))
            .await?;

        let mut results = Vec::with_capacity(gathered.replies.len());
        for response in gathered.replies.values().flatten() {
            match response {
                Response::Intersection(result) => results.push(result.clone()),
                other => return Err(unexpected("IntersectionQueryResult", other)),
            }
        }
        let mut merged = merge_intersection(results, query);
        if !gathered.failed.is_empty() || !gathered.timed_out.is_empty() {
            debug!(%request_id, "intersection incomplete, dropping partial items");
            merged.items.clear();
            merged.index_header_map.clear();
        }
        gathered.push_errors(&mut merged.exception_info);
        Ok(gathered.outcome(request_id, merged))
    }

    /// Looks up items in every index of the query, one batch per owning
    /// cluster. Indexes on clusters that failed are absent from the result.
    pub async fn execute_multi_contains(
        &self,
        query: &MultiIndexContainsQuery,
    ) -> RouterResult<QueryOutcome<MultiIndexContainsQueryResult>> {
        query.validate()?;
        let request_id = Uuid::new_v4();
        let topology = self.topology.snapshot();
        let batches = split_multi_contains(query, topology.len())?
            .into_iter()
            .map(|sub| (sub.cluster, vec![Request::MultiContains(sub.query)]))
            .collect();

        let gathered = self
            .gather(&topology, batches)
            .instrument(info_span!("multi_contains", %request_id, indexes = query.index_id_list.len()))
            .await?;

        let mut results = Vec::with_capacity(gathered.replies.len());
        for response in gathered.replies.values().flatten() {
            match response {
                Response::MultiContains(result) => results.push(result.clone()),
                other => return Err(unexpected("MultiIndexContainsQueryResult", other)),
            }
        }
        let mut merged = merge_all(results).unwrap_or_default();
        gathered.push_errors(&mut merged.exception_info);
        Ok(gathered.outcome(request_id, merged))
    }

    /// Runs a node-wide name query (`Request::Tag` or
    /// `Request::StringHash`) and merges the name sets.
    pub async fn execute_names(
        &self,
        request: Request,
        scope: AggregateScope,
    ) -> RouterResult<QueryOutcome<NameSetResult>> {
        if !matches!(request, Request::Tag(_) | Request::StringHash(_)) {
            return Err(ProtocolError::invalid_query(format!(
                "{} is not a node-wide name query",
                request.name()
            ))
            .into());
        }
        let request_id = Uuid::new_v4();
        let topology = self.topology.snapshot();
        let batches = split_aggregate(&request, scope, topology.len())?
            .into_iter()
            .map(|sub| (sub.cluster, vec![sub.query]))
            .collect();

        let gathered = self
            .gather(&topology, batches)
            .instrument(info_span!("names", %request_id, kind = request.name()))
            .await?;

        let mut sets = Vec::with_capacity(gathered.replies.len());
        for response in gathered.replies.values().flatten() {
            match response {
                Response::Tag(set) | Response::StringHash(set) => sets.push(set.clone()),
                other => return Err(unexpected("NameSetResult", other)),
            }
        }
        let mut merged = merge_all(sets).unwrap_or_default();
        gathered.push_errors(&mut merged.exception_info);
        Ok(gathered.outcome(request_id, merged))
    }

    /// Runs single-index requests as one batch per cluster and returns the
    /// replies keyed by IndexId. Requests whose cluster failed are absent
    /// from the map and listed in the outcome.
    pub async fn execute_per_index(
        &self,
        requests: Vec<Request>,
    ) -> RouterResult<QueryOutcome<BTreeMap<IndexId, Response>>> {
        let request_id = Uuid::new_v4();
        let topology = self.topology.snapshot();
        let batches = split_per_index(requests, topology.len())?;
        let ids: BTreeMap<usize, Vec<IndexId>> = batches
            .iter()
            .map(|(cluster, batch)| {
                let ids = batch.iter().filter_map(Request::index_id).cloned().collect();
                (*cluster, ids)
            })
            .collect();

        let gathered = self
            .gather(&topology, batches)
            .instrument(info_span!("per_index", %request_id))
            .await?;

        let mut replies = BTreeMap::new();
        for (cluster, responses) in &gathered.replies {
            let Some(cluster_ids) = ids.get(cluster) else {
                continue;
            };
            for (id, response) in cluster_ids.iter().zip(responses) {
                replies.insert(id.clone(), response.clone());
            }
        }
        Ok(gathered.outcome(request_id, replies))
    }

    /// Sends a command to the cluster owning its primary id.
    pub async fn execute_command(&self, request: Request) -> RouterResult<QueryOutcome<MutationResult>> {
        let primary_id = match (request.is_command(), request.primary_id()) {
            (true, Some(primary_id)) => primary_id,
            _ => {
                return Err(ProtocolError::invalid_query(format!("{} is not a command", request.name())).into())
            }
        };
        let request_id = Uuid::new_v4();
        let topology = self.topology.snapshot();
        let cluster = topology.cluster_for(primary_id)?;
        let kind = request.name();
        let batches = BTreeMap::from([(cluster, vec![request])]);

        let gathered = self
            .gather(&topology, batches)
            .instrument(info_span!("command", %request_id, kind, cluster))
            .await?;

        let mut result = MutationResult::default();
        for response in gathered.replies.values().flatten() {
            match response {
                Response::Mutation(reply) => push_exception(&mut result.exception_info, &reply.exception_info),
                other => return Err(unexpected("MutationResult", other)),
            }
        }
        gathered.push_errors(&mut result.exception_info);
        Ok(gathered.outcome(request_id, result))
    }

    /// Sends every batch concurrently and collects the replies that arrive
    /// before the deadline.
    async fn gather(
        &self,
        topology: &ClusterTopology,
        batches: BTreeMap<usize, Vec<Request>>,
    ) -> RouterResult<Gathered> {
        let deadline = tokio::time::Instant::now() + self.config.timeout;
        let mut sent = BTreeMap::new();
        let mut set = JoinSet::new();
        for (cluster, batch) in batches {
            let spec = topology.cluster(cluster)?.clone();
            let encoded = batch
                .iter()
                .map(Request::encode)
                .collect::<Result<Vec<_>, _>>()?;
            let payload = encode_batch(encoded)?;
            sent.insert(cluster, batch.len());

            let (tx, rx) = oneshot::channel::<RouterResult<Bytes>>();
            let transport = Arc::clone(&self.transport);
            let name = spec.name.clone();
            tokio::task::spawn_blocking(move || {
                transport.send_async(
                    &spec,
                    payload,
                    Box::new(move |reply| {
                        let _ = tx.send(reply);
                    }),
                );
            });
            set.spawn(async move {
                let reply = rx
                    .await
                    .unwrap_or_else(|_| Err(RouterError::transport_retryable(name, "reply dropped")));
                (cluster, reply)
            });
        }

        let mut arrived = BTreeMap::new();
        let drained = tokio::time::timeout_at(deadline, async {
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((cluster, reply)) => {
                        arrived.insert(cluster, reply);
                    }
                    Err(e) => warn!(error = %e, "cluster task ended abnormally"),
                }
            }
        })
        .await;
        if drained.is_err() {
            set.abort_all();
        }

        let mut gathered = Gathered {
            replies: BTreeMap::new(),
            failed: Vec::new(),
            timed_out: Vec::new(),
            errors: Vec::new(),
        };
        for (cluster, count) in sent {
            let name = topology.cluster(cluster).map(|c| c.name.clone()).unwrap_or_default();
            match arrived.remove(&cluster) {
                Some(Ok(bytes)) => {
                    let responses = decode_replies(cluster, &bytes, count)?;
                    debug!(cluster, replies = responses.len(), "cluster answered");
                    gathered.replies.insert(cluster, responses);
                }
                Some(Err(e)) => {
                    warn!(cluster, name = %name, error = %e, "cluster call failed");
                    gathered.failed.push(cluster);
                    gathered.errors.push(format!("cluster {cluster} ({name}): {e}"));
                }
                None => {
                    warn!(cluster, name = %name, "cluster timed out");
                    gathered.timed_out.push(cluster);
                    gathered.errors.push(format!("cluster {cluster} ({name}): timed out"));
                }
            }
        }
        Ok(gathered)
    }
}

fn decode_replies(cluster: usize, bytes: &[u8], sent: usize) -> RouterResult<Vec<Response>> {
    let messages = decode_batch(bytes)?;
    if messages.len() != sent {
        return Err(RouterError::BatchMismatch {
            cluster,
            sent,
            received: messages.len(),
        });
    }
    messages
        .into_iter()
        .map(|message| match Response::decode(message)? {
            Response::Rejected(rejected) => Err(RouterError::Rejected {
                cluster,
                reason: rejected.reason,
            }),
            response => Ok(response),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{ClusterSpec, NodeSpec};
    use crate::transport::MockTransport;
    use ixcache_protocol::{Rejected, TagQuery};
    use std::collections::BTreeSet;

    fn topology(n: usize) -> ClusterTopology {
        ClusterTopology::new(
            (0..n)
                .map(|i| ClusterSpec::new(format!("c{i}"), vec![NodeSpec::new(format!("n{i}"), "")]))
                .collect(),
        )
        .unwrap()
    }

    fn names_reply(names: &[&str]) -> Bytes {
        let set = NameSetResult {
            type_exists: true,
            names: names.iter().map(|s| s.to_string()).collect(),
            exception_info: String::new(),
        };
        encode_batch([Response::Tag(set).encode().unwrap()]).unwrap()
    }

    #[tokio::test]
    async fn names_are_unioned() {
        let transport = MockTransport::new();
        transport.set_reply("c0", names_reply(&["a", "b"]));
        transport.set_reply("c1", names_reply(&["b", "c"]));
        let router = Router::new(topology(2), transport, RouterConfig::default()).unwrap();

        let outcome = router
            .execute_names(Request::Tag(TagQuery), AggregateScope::AllClusters)
            .await
            .unwrap();
        assert!(outcome.complete);
        let expected: BTreeSet<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(outcome.result.names, expected);
        assert_eq!(router.transport().calls(), 2);
    }

    #[tokio::test]
    async fn single_cluster_scope_calls_once() {
        let transport = MockTransport::new();
        transport.set_reply("c1", names_reply(&["x"]));
        let router = Router::new(topology(3), transport, RouterConfig::default()).unwrap();
        let outcome = router
            .execute_names(Request::Tag(TagQuery), AggregateScope::SingleCluster { primary_id: 4 })
            .await
            .unwrap();
        assert_eq!(router.transport().calls(), 1);
        assert_eq!(outcome.result.names.len(), 1);
    }

    #[tokio::test]
    async fn failed_cluster_is_reported() {
        let transport = MockTransport::new();
        transport.set_reply("c0", names_reply(&["a"]));
        transport.set_failure("c1", "connection refused", true);
        let router = Router::new(topology(2), transport, RouterConfig::default()).unwrap();
        let outcome = router
            .execute_names(Request::Tag(TagQuery), AggregateScope::AllClusters)
            .await
            .unwrap();
        assert!(!outcome.complete);
        assert_eq!(outcome.failed_clusters, vec![1]);
        assert_eq!(outcome.result.names.len(), 1);
        assert!(outcome.result.exception_info.starts_with("cluster 1 (c1): "));
        assert!(outcome.result.exception_info.contains("connection refused"));
    }

    #[tokio::test]
    async fn rejection_fails_the_call() {
        let transport = MockTransport::new();
        let rejected = Response::Rejected(Rejected {
            reason: "unknown type tag 6".into(),
        });
        transport.set_reply("c0", encode_batch([rejected.encode().unwrap()]).unwrap());
        let router = Router::new(topology(1), transport, RouterConfig::default()).unwrap();
        let err = router
            .execute_names(Request::Tag(TagQuery), AggregateScope::AllClusters)
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::Rejected { cluster: 0, .. }));
    }

    #[tokio::test]
    async fn garbage_reply_fails_the_call() {
        let transport = MockTransport::new();
        transport.set_reply("c0", Bytes::from_static(b"\x01"));
        let router = Router::new(topology(1), transport, RouterConfig::default()).unwrap();
        let err = router
            .execute_names(Request::Tag(TagQuery), AggregateScope::AllClusters)
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::Protocol(_)));
    }

    #[tokio::test]
    async fn queries_are_not_commands() {
        let router = Router::new(topology(1), MockTransport::new(), RouterConfig::default()).unwrap();
        assert!(router.execute_command(Request::Tag(TagQuery)).await.is_err());
        assert_eq!(router.transport().calls(), 0);
    }
}
