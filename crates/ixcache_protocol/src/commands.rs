//! Write commands.

use crate::error::{ProtocolError, ProtocolResult};
use crate::queries::IndexScoped;
use crate::wire::{read_byte_list, read_names, read_opt_i32, write_byte_list, write_names, write_opt_i32};
use ixcache_codec::{CodecError, CodecResult, PrimitiveReader, PrimitiveWriter, VersionSerializable};
use ixcache_core::{
    read_filter, read_items, write_filter, write_items, Filter, IndexId, IndexItem,
    MetadataPropertyCollectionUpdate, MutationBatch,
};
use std::collections::{BTreeMap, BTreeSet};

/// Saves entries into one or all indexes of an IndexId.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SaveIndexCommand {
    /// Target index instance.
    pub index_id: IndexId,
    /// Named index; empty saves into every configured index.
    pub target_index_name: String,
    /// Per index name, the tags that index stores.
    pub index_tag_mapping: BTreeMap<String, Vec<String>>,
    /// Entries to upsert.
    pub add_list: Vec<IndexItem>,
    /// Identifiers to remove.
    pub delete_list: Vec<Vec<u8>>,
    /// Replacement metadata blob, applied when `update_metadata` is set.
    pub metadata: Vec<u8>,
    /// Apply `metadata`.
    pub update_metadata: bool,
    /// Discard existing entries first.
    pub replace_full_index: bool,
    /// With replace, new entries without a payload inherit the old one (v2).
    pub preserve_data: bool,
    /// Per index name, a virtual count override (v3).
    pub index_virtual_count_mapping: BTreeMap<String, i32>,
    /// Explicit placement hash (v4).
    pub primary_id: Option<i32>,
    /// Metadata property changes (v5).
    pub metadata_property_update: Option<MetadataPropertyCollectionUpdate>,
    /// Entries to replace in place (v6).
    pub update_list: Vec<IndexItem>,
}

impl SaveIndexCommand {
    /// Creates an empty save for `index_id`.
    #[must_use]
    pub fn new(index_id: IndexId) -> Self {
        Self {
            index_id,
            ..Self::default()
        }
    }

    /// Targets a named index.
    #[must_use]
    pub fn with_target(mut self, name: impl Into<String>) -> Self {
        self.target_index_name = name.into();
        self
    }

    /// Adds entries.
    #[must_use]
    pub fn with_add(mut self, items: impl IntoIterator<Item = IndexItem>) -> Self {
        self.add_list.extend(items);
        self
    }

    /// Deletes entries.
    #[must_use]
    pub fn with_delete(mut self, ids: impl IntoIterator<Item = Vec<u8>>) -> Self {
        self.delete_list.extend(ids);
        self
    }

    /// Updates entries.
    #[must_use]
    pub fn with_update(mut self, items: impl IntoIterator<Item = IndexItem>) -> Self {
        self.update_list.extend(items);
        self
    }

    /// Overrides placement.
    #[must_use]
    pub fn with_primary_id(mut self, primary_id: i32) -> Self {
        self.primary_id = Some(primary_id);
        self
    }

    /// Checks the index id.
    pub fn validate(&self) -> ProtocolResult<()> {
        if self.index_id.is_empty() {
            return Err(ProtocolError::invalid_query("index id is empty"));
        }
        Ok(())
    }

    /// The mutation `index_name` receives from this save.
    #[must_use]
    pub fn batch_for(&self, index_name: &str) -> MutationBatch {
        let kept_tags = lookup(&self.index_tag_mapping, index_name)
            .map(|tags| tags.iter().cloned().collect::<BTreeSet<_>>());
        MutationBatch {
            add: self.add_list.clone(),
            update: self.update_list.clone(),
            delete: self.delete_list.clone(),
            replace_full_index: self.replace_full_index,
            preserve_data: self.preserve_data,
            metadata: self.update_metadata.then(|| self.metadata.clone()),
            virtual_count: lookup(&self.index_virtual_count_mapping, index_name).copied(),
            metadata_property_update: self.metadata_property_update.clone(),
            kept_tags,
        }
    }
}

fn lookup<'a, V>(map: &'a BTreeMap<String, V>, name: &str) -> Option<&'a V> {
    map.get(name).or_else(|| {
        map.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}

impl IndexScoped for SaveIndexCommand {
    fn index_id(&self) -> &IndexId {
        &self.index_id
    }

    fn primary_id(&self) -> i32 {
        self.primary_id
            .unwrap_or_else(|| self.index_id.primary_id())
    }
}

impl VersionSerializable for SaveIndexCommand {
    const TYPE_NAME: &'static str = "SaveIndexCommand";
    const CURRENT_VERSION: u16 = 6;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, version: u16) -> CodecResult<()> {
        self.index_id.write(w)?;
        w.write_string("target_index_name", &self.target_index_name)?;
        w.write_count_i32("index_tag_mapping", self.index_tag_mapping.len())?;
        for (name, tags) in &self.index_tag_mapping {
            w.write_string("index_tag_mapping", name)?;
            write_names(w, "index_tag_mapping", tags)?;
        }
        write_items(w, &self.add_list)?;
        write_byte_list(w, "delete_list", &self.delete_list)?;
        w.write_bytes_i32("metadata", &self.metadata)?;
        w.write_bool(self.update_metadata);
        w.write_bool(self.replace_full_index);
        if version >= 2 {
            w.write_bool(self.preserve_data);
        }
        if version >= 3 {
            w.write_count_i32(
                "index_virtual_count_mapping",
                self.index_virtual_count_mapping.len(),
            )?;
            for (name, count) in &self.index_virtual_count_mapping {
                w.write_string("index_virtual_count_mapping", name)?;
                w.write_i32(*count);
            }
        }
        if version >= 4 {
            write_opt_i32(w, self.primary_id);
        }
        if version >= 5 {
            w.write_optional(self.metadata_property_update.as_ref())?;
        }
        if version >= 6 {
            write_items(w, &self.update_list)?;
        }
        Ok(())
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, version: u16) -> CodecResult<Self> {
        let index_id = IndexId::read(r)?;
        let target_index_name = r.read_string("target_index_name")?;
        let mapping_count = r.read_count_i32("index_tag_mapping")?;
        let mut index_tag_mapping = BTreeMap::new();
        for _ in 0..mapping_count {
            let name = r.read_string("index_tag_mapping")?;
            index_tag_mapping.insert(name, read_names(r, "index_tag_mapping")?);
        }
        let mut command = Self {
            index_id,
            target_index_name,
            index_tag_mapping,
            add_list: read_items(r)?,
            delete_list: read_byte_list(r, "delete_list")?,
            metadata: r.read_bytes_i32("metadata")?,
            update_metadata: r.read_bool()?,
            replace_full_index: r.read_bool()?,
            ..Self::default()
        };
        if version >= 2 {
            command.preserve_data = r.read_bool()?;
        }
        if version >= 3 {
            let count = r.read_count_i32("index_virtual_count_mapping")?;
            for _ in 0..count {
                let name = r.read_string("index_virtual_count_mapping")?;
                command.index_virtual_count_mapping.insert(name, r.read_i32()?);
            }
        }
        if version >= 4 {
            command.primary_id = read_opt_i32(r)?;
        }
        if version >= 5 {
            command.metadata_property_update = r.read_optional()?;
        }
        if version >= 6 {
            command.update_list = read_items(r)?;
        }
        Ok(command)
    }
}

/// Applies a metadata property update without touching entries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetadataPropertyCommand {
    /// Target index instance.
    pub index_id: IndexId,
    /// Named index; empty selects the default.
    pub target_index_name: String,
    /// Property changes.
    pub update: MetadataPropertyCollectionUpdate,
}

impl IndexScoped for MetadataPropertyCommand {
    fn index_id(&self) -> &IndexId {
        &self.index_id
    }
}

impl VersionSerializable for MetadataPropertyCommand {
    const TYPE_NAME: &'static str = "MetadataPropertyCommand";
    const CURRENT_VERSION: u16 = 1;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, _version: u16) -> CodecResult<()> {
        self.index_id.write(w)?;
        w.write_string("target_index_name", &self.target_index_name)?;
        w.write_nested(&self.update)
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, _version: u16) -> CodecResult<Self> {
        Ok(Self {
            index_id: IndexId::read(r)?,
            target_index_name: r.read_string("target_index_name")?,
            update: r.read_nested()?,
        })
    }
}

/// Removes every entry of an index that matches a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredIndexDeleteCommand {
    /// Target index instance.
    pub index_id: IndexId,
    /// Named index; empty selects the default.
    pub target_index_name: String,
    /// Entries matching this are removed.
    pub filter: Filter,
}

impl IndexScoped for FilteredIndexDeleteCommand {
    fn index_id(&self) -> &IndexId {
        &self.index_id
    }
}

impl VersionSerializable for FilteredIndexDeleteCommand {
    const TYPE_NAME: &'static str = "FilteredIndexDeleteCommand";
    const CURRENT_VERSION: u16 = 1;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, _version: u16) -> CodecResult<()> {
        self.index_id.write(w)?;
        w.write_string("target_index_name", &self.target_index_name)?;
        write_filter(w, Some(&self.filter))
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, _version: u16) -> CodecResult<Self> {
        let index_id = IndexId::read(r)?;
        let target_index_name = r.read_string("target_index_name")?;
        let filter = read_filter(r)?
            .ok_or_else(|| CodecError::malformed("filtered delete carries no filter"))?;
        Ok(Self {
            index_id,
            target_index_name,
            filter,
        })
    }
}

/// Drops every page stored for an IndexId.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeleteIndexCommand {
    /// Target index instance.
    pub index_id: IndexId,
}

impl IndexScoped for DeleteIndexCommand {
    fn index_id(&self) -> &IndexId {
        &self.index_id
    }
}

impl VersionSerializable for DeleteIndexCommand {
    const TYPE_NAME: &'static str = "DeleteIndexCommand";
    const CURRENT_VERSION: u16 = 1;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, _version: u16) -> CodecResult<()> {
        self.index_id.write(w)
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, _version: u16) -> CodecResult<Self> {
        Ok(Self {
            index_id: IndexId::read(r)?,
        })
    }
}
