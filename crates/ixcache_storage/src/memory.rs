//! In-memory storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory storage backend.
///
/// This backend keeps every page in an ordered map and is suitable for:
/// - Unit and integration tests
/// - Ephemeral cache nodes whose contents are rebuilt on restart
///
/// # Thread Safety
///
/// Readers share a read lock and clone out a [`Bytes`] handle, so a page
/// read stays valid while a writer swaps in its replacement.
///
/// # Example
///
/// ```rust
/// use bytes::Bytes;
/// use ixcache_storage::{InMemoryBackend, StorageBackend};
///
/// let backend = InMemoryBackend::new();
/// backend.put(b"page", Bytes::from_static(b"v1")).unwrap();
/// assert_eq!(backend.get(b"page").unwrap().unwrap(), "v1");
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    pages: RwLock<BTreeMap<Vec<u8>, Bytes>>,
    max_value_len: Option<usize>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend that rejects values longer than `max` bytes.
    #[must_use]
    pub fn with_max_value_len(max: usize) -> Self {
        Self {
            pages: RwLock::new(BTreeMap::new()),
            max_value_len: Some(max),
        }
    }

    /// Total bytes held across all values.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.pages.read().values().map(Bytes::len).sum()
    }

    /// Removes every page.
    pub fn clear(&self) {
        self.pages.write().clear();
    }
}

impl StorageBackend for InMemoryBackend {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        Ok(self.pages.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: Bytes) -> StorageResult<()> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".into()));
        }
        if let Some(max) = self.max_value_len {
            if value.len() > max {
                return Err(StorageError::ValueTooLarge {
                    len: value.len(),
                    max,
                });
            }
        }
        self.pages.write().insert(key.to_vec(), value);
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> StorageResult<bool> {
        Ok(self.pages.write().remove(key).is_some())
    }

    fn keys_with_prefix(&self, prefix: &[u8]) -> StorageResult<Vec<Vec<u8>>> {
        let pages = self.pages.read();
        Ok(pages
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn len(&self) -> usize {
        self.pages.read().len()
    }
}
