//! # IXCache Protocol
//!
//! Query catalog, message envelope, cluster split and merge engine.
//!
//! This crate provides:
//! - Versioned query, command and result records
//! - [`Request`] / [`Response`] envelopes keyed by a stable type tag
//! - Splitting of multi-index and node-wide queries across clusters
//! - K-way ordered merge and associative aggregate merge of replies
//!
//! ## Example
//!
//! ```rust
//! use ixcache_core::IndexId;
//! use ixcache_protocol::{split_paged, PagedIndexQuery, Request};
//!
//! let query = PagedIndexQuery::new((1..=4).map(IndexId::from).collect(), 10, 1);
//! let subs = split_paged(&query, 2).unwrap();
//! assert_eq!(subs.len(), 2);
//! assert!(subs[0].query.client_side_subset_processing_required);
//!
//! let bytes = Request::Paged(subs[0].query.clone()).encode().unwrap();
//! assert!(matches!(Request::decode(&bytes).unwrap(), Request::Paged(_)));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod commands;
mod error;
mod merge;
mod message;
mod queries;
mod results;
mod split;
mod wire;

pub use commands::{
    DeleteIndexCommand, FilteredIndexDeleteCommand, MetadataPropertyCommand, SaveIndexCommand,
};
pub use error::{ProtocolError, ProtocolResult};
pub use merge::{
    apply_client_side_paging, kway_merge, merge_all, merge_exception_info, merge_intersection,
    merge_paged, push_exception, Mergeable,
};
pub use message::{tags, Request, Response};
pub use queries::{
    ContainsIndexQuery, DistinctQuery, FirstLastQuery, GetIndexHeaderType, IndexIdParams,
    IndexScanParams, IndexScoped, IntersectionQuery, MetadataPropertyQuery,
    MultiIndexContainsQuery, PagedIndexQuery, RandomQuery, RangeQuery, StringHashQuery, TagQuery,
};
pub use results::{
    ContainsIndexQueryResult, DistinctQueryResult, FirstLastQueryResult, IndexSummary,
    IntersectionQueryResult, MetadataPropertyQueryResult, MultiIndexContainsEntry,
    MultiIndexContainsQueryResult, MutationResult, NameSetResult, PagedIndexQueryResult,
    RandomQueryResult, RangeQueryResult, Rejected,
};
pub use split::{
    cluster_for, split_aggregate, split_intersection, split_multi_contains, split_paged,
    split_per_index, AggregateScope, SubQuery,
};
