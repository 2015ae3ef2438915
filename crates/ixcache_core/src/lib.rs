//! # IXCache Core
//!
//! Index entity model and evaluation engine for IXCache.
//!
//! This crate provides:
//! - Index entries, headers and metadata properties
//! - Typed sort-key comparison over multi-segment keys
//! - Conditions, filter trees, range bounds and per-value caps
//! - The page scan with enter/exit bounds, distinct counting and grouping
//! - Ordered mutation batches (update, delete, add)
//! - [`IndexStore`], which keeps index pages in a storage backend
//!
//! ## Example
//!
//! ```rust
//! use ixcache_core::{
//!     DataType, IndexId, IndexItem, IndexSpec, IndexStore, MutationBatch, PrimarySortInfo,
//!     ScanSpec, SortBy, SortOrder,
//! };
//! use ixcache_storage::InMemoryBackend;
//!
//! let spec = IndexSpec::new(
//!     "ByScore",
//!     PrimarySortInfo::by_tag("score", vec![SortOrder::new(DataType::Int32, SortBy::Desc)]),
//! );
//! let store = IndexStore::new(InMemoryBackend::new());
//! let id = IndexId::from(42);
//! let batch = MutationBatch::new().with_add([
//!     IndexItem::new(b"a".to_vec()).with_tag("score", 10i32.to_le_bytes().to_vec()),
//!     IndexItem::new(b"b".to_vec()).with_tag("score", 20i32.to_le_bytes().to_vec()),
//! ]);
//! store.write_index_mutation(&id, &spec, &batch).unwrap();
//!
//! let out = store.scan(&id, &spec, &ScanSpec::new()).unwrap().unwrap();
//! assert_eq!(out.items[0].item_id, b"b".to_vec());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod compare;
mod condition;
mod config;
mod error;
mod group;
mod header;
mod item;
mod mutation;
mod page;
mod scan;
mod store;
mod types;

pub use compare::{compare_keys, compare_typed, ItemComparer};
pub use condition::{
    read_filter, write_filter, CapCondition, CapTracker, Condition, Filter, FilterCap,
    IndexCondition, Operation, MAX_FILTER_DEPTH,
};
pub use config::{IndexSpec, IndexTypeConfig};
pub use error::{CoreError, CoreResult};
pub use group::{GroupBy, GroupByResult, ResultItemBag};
pub use header::{
    IndexHeader, MetadataPropertyCollection, MetadataPropertyCollectionUpdate,
    VIRTUAL_COUNT_UNKNOWN,
};
pub use item::{
    read_items, read_result_items, write_items, write_result_items, FieldSource, IndexItem,
    ResultItem,
};
pub use mutation::{
    apply_filtered_delete, apply_mutation, MutationBatch, MutationList, MutationOutcome,
    RejectReason, RejectedEntry, MAX_TAGS_PER_ITEM,
};
pub use page::{CachedIndex, PageReader};
pub use scan::{scan_page, DomainSpecificProcessor, ScanOutcome, ScanSpec};
pub use store::{page_key, page_key_prefix, IndexStore, WRITE_LOCK_STRIPES};
pub use types::{
    from_hex, primary_id, to_hex, DataType, DomainSpecificProcessingType, IndexId,
    PrimarySortInfo, SortBy, SortOrder, TagSort, ITEM_ID_FIELD,
};
