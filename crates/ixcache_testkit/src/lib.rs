//! # IXCache Testkit
//!
//! Test utilities for IXCache.
//!
//! This crate provides:
//! - Node and in-process cluster fixtures
//! - Property-based test generators using proptest
//! - Fuzz harnesses for the wire decoders and the node entry point
//! - Concurrent stress helpers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ixcache_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn pages_across_clusters() {
//!     let cluster = TestCluster::new(3);
//!     cluster.load(IndexId::from(1), keyed_items(&[30, 20, 10])).await;
//!     let router = cluster.router();
//!     // ... run queries
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod fuzz;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::fuzz::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use fuzz::*;
pub use generators::*;
pub use stress::*;
