//! Applying save batches to an index.

use crate::compare::ItemComparer;
use crate::condition::Filter;
use crate::config::IndexSpec;
use crate::error::{CoreError, CoreResult};
use crate::header::MetadataPropertyCollectionUpdate;
use crate::item::{FieldSource, IndexItem};
use crate::page::CachedIndex;
use crate::types::to_hex;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Most tags one entry may carry.
pub const MAX_TAGS_PER_ITEM: usize = 255;

/// One index's share of a save.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MutationBatch {
    /// Entries to insert or replace.
    pub add: Vec<IndexItem>,
    /// Replacements for existing entries.
    pub update: Vec<IndexItem>,
    /// Identifiers to remove.
    pub delete: Vec<Vec<u8>>,
    /// Discard the existing entries first.
    pub replace_full_index: bool,
    /// With replace, new entries without a payload inherit the old one.
    pub preserve_data: bool,
    /// Replacement metadata blob.
    pub metadata: Option<Vec<u8>>,
    /// Virtual count override applied last.
    pub virtual_count: Option<i32>,
    /// Metadata property changes.
    pub metadata_property_update: Option<MetadataPropertyCollectionUpdate>,
    /// Tags this index stores; others are dropped. The sort tag is always
    /// kept.
    pub kept_tags: Option<BTreeSet<String>>,
}

impl MutationBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds entries.
    #[must_use]
    pub fn with_add(mut self, items: impl IntoIterator<Item = IndexItem>) -> Self {
        self.add.extend(items);
        self
    }

    /// Updates entries.
    #[must_use]
    pub fn with_update(mut self, items: impl IntoIterator<Item = IndexItem>) -> Self {
        self.update.extend(items);
        self
    }

    /// Deletes entries.
    #[must_use]
    pub fn with_delete(mut self, ids: impl IntoIterator<Item = Vec<u8>>) -> Self {
        self.delete.extend(ids);
        self
    }

    /// Replaces the whole index, optionally preserving payloads.
    #[must_use]
    pub fn with_replace(mut self, preserve_data: bool) -> Self {
        self.replace_full_index = true;
        self.preserve_data = preserve_data;
        self
    }

    /// Overrides the virtual count.
    #[must_use]
    pub fn with_virtual_count(mut self, count: i32) -> Self {
        self.virtual_count = Some(count);
        self
    }

    /// Replaces the metadata blob.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Vec<u8>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Applies metadata property changes.
    #[must_use]
    pub fn with_metadata_property_update(mut self, update: MetadataPropertyCollectionUpdate) -> Self {
        self.metadata_property_update = Some(update);
        self
    }

    /// Returns true if applying the batch could create an index.
    #[must_use]
    pub fn creates_index(&self) -> bool {
        self.replace_full_index || !self.add.is_empty()
    }

    /// Rejects a batch that cannot be applied as a whole.
    pub fn validate(&self) -> CoreResult<()> {
        if self.virtual_count.is_some() && !self.add.is_empty() && !self.delete.is_empty() {
            return Err(CoreError::invalid_mutation(
                "virtual count override cannot be combined with both adds and deletes",
            ));
        }
        Ok(())
    }
}

/// Which list of a batch an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationList {
    /// The add list.
    Add,
    /// The update list.
    Update,
    /// The delete list.
    Delete,
}

impl fmt::Display for MutationList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// Why an entry was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Empty identifier.
    EmptyItemId,
    /// Tag-sorted index entry without its sort tag.
    MissingSortTag {
        /// The sort tag.
        tag: String,
    },
    /// More tags than an entry may carry.
    TooManyTags {
        /// Tags on the entry.
        count: usize,
    },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyItemId => f.write_str("empty item id"),
            Self::MissingSortTag { tag } => write!(f, "missing sort tag '{tag}'"),
            Self::TooManyTags { count } => {
                write!(f, "{count} tags exceed the limit of {MAX_TAGS_PER_ITEM}")
            }
        }
    }
}

/// One skipped entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEntry {
    /// Source list.
    pub list: MutationList,
    /// Position in that list.
    pub position: usize,
    /// Identifier, possibly empty.
    pub item_id: Vec<u8>,
    /// Reason.
    pub reason: RejectReason,
}

impl fmt::Display for RejectedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rejected {} entry {} (item '{}'): {}",
            self.list,
            self.position,
            to_hex(&self.item_id),
            self.reason
        )
    }
}

/// Counts and rejections from applying one batch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MutationOutcome {
    /// Entries skipped individually.
    pub rejected: Vec<RejectedEntry>,
    /// Entries inserted.
    pub added: usize,
    /// Entries replaced in place.
    pub updated: usize,
    /// Entries removed by the delete list or a filter.
    pub deleted: usize,
    /// Entries trimmed by the size cap.
    pub trimmed: usize,
}

impl MutationOutcome {
    /// Rejections rendered one per line; empty when nothing was rejected.
    #[must_use]
    pub fn exception_text(&self) -> String {
        self.rejected
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Folds another outcome into this one.
    pub fn absorb(&mut self, other: MutationOutcome) {
        self.rejected.extend(other.rejected);
        self.added += other.added;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.trimmed += other.trimmed;
    }
}

fn check_entry(item: &IndexItem, spec: &IndexSpec) -> Option<RejectReason> {
    if item.item_id.is_empty() {
        return Some(RejectReason::EmptyItemId);
    }
    let sort = &spec.primary_sort;
    if sort.is_tag && item.field(&sort.field_name, true).is_none() {
        return Some(RejectReason::MissingSortTag {
            tag: sort.field_name.clone(),
        });
    }
    if item.tags.len() > MAX_TAGS_PER_ITEM {
        return Some(RejectReason::TooManyTags {
            count: item.tags.len(),
        });
    }
    None
}

fn insert_sorted(items: &mut Vec<IndexItem>, item: IndexItem, comparer: &ItemComparer) {
    let at = items.partition_point(|existing| comparer.compare(existing, &item) != Ordering::Greater);
    items.insert(at, item);
}

/// Applies `batch` to `index`.
///
/// The order is fixed: metadata properties, replace, updates, deletes,
/// adds, then the metadata blob and virtual count override. Entries that
/// fail validation are skipped and reported; the rest of the batch still
/// applies.
pub fn apply_mutation(
    index: &mut CachedIndex,
    spec: &IndexSpec,
    batch: &MutationBatch,
) -> CoreResult<MutationOutcome> {
    batch.validate()?;
    let comparer = ItemComparer::from(&spec.primary_sort);
    let kept_tags = batch.kept_tags.as_ref().map(|tags| {
        let mut tags = tags.clone();
        if spec.primary_sort.is_tag {
            tags.insert(spec.primary_sort.field_name.clone());
        }
        tags
    });
    let prepare = |item: &IndexItem| {
        let mut item = item.clone();
        if let Some(keep) = &kept_tags {
            item.retain_tags(keep);
        }
        item
    };
    let mut outcome = MutationOutcome::default();

    if let Some(update) = &batch.metadata_property_update {
        index.header.metadata_properties.process(update);
    }

    let mut preserved: HashMap<Vec<u8>, Vec<u8>> = HashMap::new();
    if batch.replace_full_index {
        let old = std::mem::take(&mut index.items);
        if batch.preserve_data {
            preserved = old
                .into_iter()
                .filter(|item| !item.data.is_empty())
                .map(|item| (item.item_id, item.data))
                .collect();
        }
    }

    for (position, update) in batch.update.iter().enumerate() {
        if let Some(reason) = check_entry(update, spec) {
            outcome.rejected.push(RejectedEntry {
                list: MutationList::Update,
                position,
                item_id: update.item_id.clone(),
                reason,
            });
            continue;
        }
        let Some(pos) = index.position(&update.item_id) else {
            continue;
        };
        let old = index.items.remove(pos);
        let mut item = prepare(update);
        if item.data.is_empty() {
            item.data = old.data;
        }
        insert_sorted(&mut index.items, item, &comparer);
        outcome.updated += 1;
    }

    if !batch.replace_full_index {
        for (position, id) in batch.delete.iter().enumerate() {
            if id.is_empty() {
                outcome.rejected.push(RejectedEntry {
                    list: MutationList::Delete,
                    position,
                    item_id: Vec::new(),
                    reason: RejectReason::EmptyItemId,
                });
                continue;
            }
            if let Some(pos) = index.position(id) {
                index.items.remove(pos);
                outcome.deleted += 1;
                if index.header.has_virtual_count() {
                    index.header.virtual_count = (index.header.virtual_count - 1).max(0);
                }
            }
        }
    }

    for (position, add) in batch.add.iter().enumerate() {
        if let Some(reason) = check_entry(add, spec) {
            outcome.rejected.push(RejectedEntry {
                list: MutationList::Add,
                position,
                item_id: add.item_id.clone(),
                reason,
            });
            continue;
        }
        let mut item = prepare(add);
        match index.position(&item.item_id) {
            Some(pos) => {
                let old = index.items.remove(pos);
                if item.data.is_empty() {
                    item.data = old.data;
                }
                outcome.updated += 1;
            }
            None => {
                if item.data.is_empty() {
                    if let Some(data) = preserved.remove(&item.item_id) {
                        item.data = data;
                    }
                }
                outcome.added += 1;
                if index.header.has_virtual_count() {
                    index.header.virtual_count = index.header.virtual_count.saturating_add(1);
                }
            }
        }
        insert_sorted(&mut index.items, item, &comparer);
        if spec.max_index_size > 0 && index.items.len() > spec.max_index_size {
            if spec.trim_from_tail {
                index.items.pop();
            } else {
                index.items.remove(0);
            }
            outcome.trimmed += 1;
        }
    }

    if let Some(metadata) = &batch.metadata {
        index.header.metadata = metadata.clone();
    }
    if let Some(count) = batch.virtual_count {
        index.header.virtual_count = count;
    }
    Ok(outcome)
}

/// Removes every entry passing `filter`, decrementing a known virtual
/// count by the number removed.
pub fn apply_filtered_delete(index: &mut CachedIndex, filter: &Filter) -> usize {
    let before = index.items.len();
    index.items.retain(|item| !filter.process(item));
    let removed = before - index.items.len();
    if removed > 0 && index.header.has_virtual_count() {
        let removed = i32::try_from(removed).unwrap_or(i32::MAX);
        index.header.virtual_count = (index.header.virtual_count - removed).max(0);
    }
    removed
}
