//! # IXCache Server
//!
//! A cache node: decodes requests, serves them from its index store and
//! encodes the replies.
//!
//! This crate provides:
//! - [`CacheNode`], the byte-in byte-out node facade
//! - Query processors for every read query in the catalog
//! - Save, metadata-property, filtered-delete and drop commands
//! - Tag and string-hash registries
//! - Framed batch handling
//!
//! # Failure reporting
//!
//! A request that cannot be decoded is answered with a `Rejected` reply.
//! A request that decodes but fails validation or processing is answered
//! with its normal result type carrying the failure in `exception_info`.
//!
//! ```rust
//! use ixcache_core::{DataType, IndexId, IndexSpec, IndexTypeConfig, PrimarySortInfo, SortBy, SortOrder};
//! use ixcache_protocol::{RangeQuery, Request, Response};
//! use ixcache_server::{CacheNode, NodeConfig};
//!
//! let sort = PrimarySortInfo::by_tag("score", vec![SortOrder::new(DataType::Int32, SortBy::Desc)]);
//! let node = CacheNode::new(NodeConfig::new("n1", IndexTypeConfig::new(vec![IndexSpec::new("ByScore", sort)]))).unwrap();
//!
//! let reply = node.handle_request(Request::Range(RangeQuery::new(IndexId::from(1), 0, 10)));
//! let Response::Range(result) = reply else { unreachable!() };
//! assert!(result.summary.exception_info.contains("offset"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
mod node;
mod query;
mod registry;

pub use config::NodeConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler};
pub use node::CacheNode;
pub use registry::NameRegistry;
