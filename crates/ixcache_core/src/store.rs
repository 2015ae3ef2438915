//! Index pages over a storage backend.

use crate::condition::Filter;
use crate::config::IndexSpec;
use crate::error::{CoreError, CoreResult};
use crate::header::MetadataPropertyCollectionUpdate;
use crate::mutation::{apply_filtered_delete, apply_mutation, MutationBatch, MutationOutcome};
use crate::page::CachedIndex;
use crate::scan::{scan_page, ScanOutcome, ScanSpec};
use crate::types::IndexId;
use bytes::Bytes;
use ixcache_codec::{from_versioned_bytes, to_versioned_bytes};
use ixcache_storage::StorageBackend;
use parking_lot::{Mutex, MutexGuard};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::debug;

/// Number of write lock stripes.
pub const WRITE_LOCK_STRIPES: usize = 64;

/// Storage key prefix shared by every page of `index_id`.
#[must_use]
pub fn page_key_prefix(index_id: &IndexId) -> Vec<u8> {
    let bytes = index_id.as_bytes();
    let len = u16::try_from(bytes.len()).unwrap_or(u16::MAX);
    let mut key = Vec::with_capacity(2 + bytes.len());
    key.extend_from_slice(&len.to_le_bytes());
    key.extend_from_slice(bytes);
    key
}

/// Storage key of one named index of `index_id`.
#[must_use]
pub fn page_key(index_id: &IndexId, index_name: &str) -> Vec<u8> {
    let mut key = page_key_prefix(index_id);
    key.extend_from_slice(index_name.as_bytes());
    key
}

/// Reads and mutates index pages held by a [`StorageBackend`].
///
/// Reads take a cheap clone of the last committed page and never block.
/// Writes for one page are serialized by a striped lock and commit with a
/// single `put` of the re-encoded page.
pub struct IndexStore<B: StorageBackend> {
    backend: B,
    write_locks: Box<[Mutex<()>]>,
}

impl<B: StorageBackend> IndexStore<B> {
    /// Wraps a backend.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            write_locks: (0..WRITE_LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    /// The underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn lock(&self, key: &[u8]) -> MutexGuard<'_, ()> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let stripe = (hasher.finish() % self.write_locks.len() as u64) as usize;
        self.write_locks[stripe].lock()
    }

    /// Last committed page bytes, if the index exists.
    pub fn read_index_page(&self, index_id: &IndexId, spec: &IndexSpec) -> CoreResult<Option<Bytes>> {
        Ok(self.backend.get(&page_key(index_id, &spec.name))?)
    }

    /// Fully decoded page, if the index exists.
    pub fn load(&self, index_id: &IndexId, spec: &IndexSpec) -> CoreResult<Option<CachedIndex>> {
        self.read_index_page(index_id, spec)?
            .map(|page| decode_page(index_id, &page))
            .transpose()
    }

    /// Scans the index, `None` if it does not exist.
    pub fn scan(
        &self,
        index_id: &IndexId,
        spec: &IndexSpec,
        scan: &ScanSpec,
    ) -> CoreResult<Option<ScanOutcome>> {
        let Some(page) = self.read_index_page(index_id, spec)? else {
            return Ok(None);
        };
        scan_page(index_id, &page, &spec.primary_sort, scan)
            .map(Some)
            .map_err(|e| with_index_context(index_id, e))
    }

    /// Applies a batch atomically. A missing index is created only by a
    /// batch that adds or replaces.
    pub fn write_index_mutation(
        &self,
        index_id: &IndexId,
        spec: &IndexSpec,
        batch: &MutationBatch,
    ) -> CoreResult<MutationOutcome> {
        if index_id.is_empty() {
            return Err(CoreError::invalid_mutation("index id is empty"));
        }
        batch.validate()?;
        let key = page_key(index_id, &spec.name);
        let _guard = self.lock(&key);
        let mut index = match self.backend.get(&key)? {
            Some(page) => decode_page(index_id, &page)?,
            None if batch.creates_index() => CachedIndex::new(),
            None => {
                debug!(index_id = %index_id, index = %spec.name, "mutation skipped, index absent");
                return Ok(MutationOutcome::default());
            }
        };
        let outcome = apply_mutation(&mut index, spec, batch)?;
        self.backend.put(&key, to_versioned_bytes(&index)?)?;
        debug!(
            index_id = %index_id,
            index = %spec.name,
            added = outcome.added,
            updated = outcome.updated,
            deleted = outcome.deleted,
            trimmed = outcome.trimmed,
            rejected = outcome.rejected.len(),
            "mutation applied"
        );
        Ok(outcome)
    }

    /// Removes entries passing `filter`; returns how many went.
    pub fn filtered_delete(
        &self,
        index_id: &IndexId,
        spec: &IndexSpec,
        filter: &Filter,
    ) -> CoreResult<usize> {
        let key = page_key(index_id, &spec.name);
        let _guard = self.lock(&key);
        let Some(page) = self.backend.get(&key)? else {
            return Ok(0);
        };
        let mut index = decode_page(index_id, &page)?;
        let removed = apply_filtered_delete(&mut index, filter);
        if removed > 0 {
            self.backend.put(&key, to_versioned_bytes(&index)?)?;
        }
        debug!(index_id = %index_id, index = %spec.name, removed, "filtered delete");
        Ok(removed)
    }

    /// Applies metadata property changes; false if the index does not exist.
    pub fn update_metadata_properties(
        &self,
        index_id: &IndexId,
        spec: &IndexSpec,
        update: &MetadataPropertyCollectionUpdate,
    ) -> CoreResult<bool> {
        let key = page_key(index_id, &spec.name);
        let _guard = self.lock(&key);
        let Some(page) = self.backend.get(&key)? else {
            return Ok(false);
        };
        let mut index = decode_page(index_id, &page)?;
        index.header.metadata_properties.process(update);
        self.backend.put(&key, to_versioned_bytes(&index)?)?;
        Ok(true)
    }

    /// Removes every page of `index_id`; returns how many went.
    pub fn delete_index(&self, index_id: &IndexId) -> CoreResult<usize> {
        let prefix = page_key_prefix(index_id);
        let mut removed = 0;
        for key in self.backend.keys_with_prefix(&prefix)? {
            let _guard = self.lock(&key);
            if self.backend.delete(&key)? {
                removed += 1;
            }
        }
        debug!(index_id = %index_id, removed, "index deleted");
        Ok(removed)
    }
}

fn decode_page(index_id: &IndexId, page: &[u8]) -> CoreResult<CachedIndex> {
    from_versioned_bytes(page).map_err(|e| CoreError::corrupted(index_id.to_hex(), e.to_string()))
}

fn with_index_context(index_id: &IndexId, err: CoreError) -> CoreError {
    match err {
        CoreError::Codec(e) => CoreError::corrupted(index_id.to_hex(), e.to_string()),
        other => other,
    }
}
