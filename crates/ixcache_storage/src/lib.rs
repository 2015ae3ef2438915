//! # IXCache Storage
//!
//! Storage backend trait and implementations for IXCache.
//!
//! This crate provides the lowest-level storage abstraction for a cache
//! node. Backends are **opaque key/value stores** - they do not interpret
//! the index pages they hold.
//!
//! ## Design Principles
//!
//! - Backends are simple page stores (get, put, delete)
//! - A `put` swaps the whole page; readers keep their snapshot
//! - No knowledge of index entries, headers, or sort orders
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For tests and ephemeral nodes
//!
//! ## Example
//!
//! ```rust
//! use bytes::Bytes;
//! use ixcache_storage::{InMemoryBackend, StorageBackend};
//!
//! let backend = InMemoryBackend::new();
//! backend.put(b"index-1", Bytes::from_static(b"page")).unwrap();
//! assert_eq!(backend.len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryBackend;
