//! # IXCache Router
//!
//! Client-side scatter-gather for a sharded IXCache deployment.
//!
//! This crate provides:
//! - Cluster topology loading, validation and hot swapping
//! - A transport abstraction with loopback and mock implementations
//! - Concurrent fan-out with a per-call deadline
//! - Merging of partial results with explicit failure reporting
//!
//! ## Placement
//!
//! Every IndexId has a primary id, and cluster `primary_id mod N` owns it.
//! Multi-index queries are split per cluster, node-wide queries go to all
//! clusters (or one), and single-index requests are grouped into one
//! framed batch per cluster.
//!
//! ## Example
//!
//! ```rust
//! use ixcache_router::{ClusterSpec, ClusterTopology, NodeSpec};
//!
//! let topology = ClusterTopology::new(vec![
//!     ClusterSpec::new("east", vec![NodeSpec::new("e1", "10.0.0.1:7000")]),
//!     ClusterSpec::new("west", vec![NodeSpec::new("w1", "10.0.1.1:7000")]),
//! ])
//! .unwrap();
//! assert_eq!(topology.cluster_for(5).unwrap(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod router;
mod topology;
mod transport;

pub use config::RouterConfig;
pub use error::{RouterError, RouterResult};
pub use router::{QueryOutcome, Router};
pub use topology::{ClusterSpec, ClusterTopology, NodeSpec, TopologyHandle};
pub use transport::{ClusterTransport, LoopbackTransport, MockTransport, ReplyCallback};
