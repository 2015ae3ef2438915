//! Storage backend trait definition.

use crate::error::StorageResult;
use bytes::Bytes;

/// A key/value page store for IXCache.
///
/// Storage backends are **opaque byte stores**. Keys and values are
/// arbitrary bytes; the index layer owns all interpretation of page
/// contents. Backends do not understand index entries, headers, or sort
/// orders.
///
/// # Invariants
///
/// - `put` replaces the whole value for a key in one step; a concurrent
///   `get` observes either the old value or the new one, never a mix
/// - `get` returns exactly the bytes most recently `put` for the key
/// - Returned [`Bytes`] are immutable snapshots that remain valid after
///   later writes
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For tests and ephemeral nodes
pub trait StorageBackend: Send + Sync {
    /// Reads the current value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unavailable.
    fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the key or value is rejected or the backend is
    /// unavailable.
    fn put(&self, key: &[u8], value: Bytes) -> StorageResult<()>;

    /// Removes `key`. Returns whether a value was present.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unavailable.
    fn delete(&self, key: &[u8]) -> StorageResult<bool>;

    /// Lists every key starting with `prefix`, in ascending byte order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unavailable.
    fn keys_with_prefix(&self, prefix: &[u8]) -> StorageResult<Vec<Vec<u8>>>;

    /// Number of stored keys.
    fn len(&self) -> usize;

    /// Returns true if no keys are stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
