//! Index-level metadata.

use crate::error::{CoreError, CoreResult};
use ixcache_codec::{CodecResult, PrimitiveReader, PrimitiveWriter, VersionSerializable};
use std::collections::{BTreeMap, BTreeSet};

/// VirtualCount value meaning "not known".
pub const VIRTUAL_COUNT_UNKNOWN: i32 = -1;

/// Named byte-valued properties attached to an index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetadataPropertyCollection(BTreeMap<String, Vec<u8>>);

impl MetadataPropertyCollection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a property.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.0.get(name).map(Vec::as_slice)
    }

    /// Sets a property.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.0.insert(name.into(), value.into());
    }

    /// Removes a property.
    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        self.0.remove(name)
    }

    /// Number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates properties in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Applies an update. Deletions run first and any addition whose name is
    /// also being deleted is skipped.
    pub fn process(&mut self, update: &MetadataPropertyCollectionUpdate) {
        for name in &update.delete {
            self.0.remove(name);
        }
        for (name, value) in &update.add {
            if !update.delete.contains(name) {
                self.0.insert(name.clone(), value.clone());
            }
        }
    }
}

impl FromIterator<(String, Vec<u8>)> for MetadataPropertyCollection {
    fn from_iter<I: IntoIterator<Item = (String, Vec<u8>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl VersionSerializable for MetadataPropertyCollection {
    const TYPE_NAME: &'static str = "MetadataPropertyCollection";
    const CURRENT_VERSION: u16 = 1;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, _version: u16) -> CodecResult<()> {
        w.write_count_u16("metadata_properties", self.0.len())?;
        for (name, value) in &self.0 {
            w.write_string("property_name", name)?;
            w.write_bytes_i32("property_value", value)?;
        }
        Ok(())
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, _version: u16) -> CodecResult<Self> {
        let count = r.read_count_u16()?;
        let mut map = BTreeMap::new();
        for _ in 0..count {
            let name = r.read_string("property_name")?;
            let value = r.read_bytes_i32("property_value")?;
            map.insert(name, value);
        }
        Ok(Self(map))
    }
}

/// Pending additions and deletions for a [`MetadataPropertyCollection`].
///
/// Construction keeps the two sets disjoint: a name scheduled for deletion
/// cannot be added, and scheduling a deletion cancels a pending addition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetadataPropertyCollectionUpdate {
    add: BTreeMap<String, Vec<u8>>,
    delete: BTreeSet<String>,
}

impl MetadataPropertyCollectionUpdate {
    /// Creates an empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules an addition.
    ///
    /// # Errors
    ///
    /// Fails if the name is already scheduled for addition or deletion.
    pub fn add_to_add(&mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> CoreResult<()> {
        let name = name.into();
        if self.delete.contains(&name) {
            return Err(CoreError::invalid_mutation(format!(
                "metadata property '{name}' is already scheduled for deletion"
            )));
        }
        if self.add.contains_key(&name) {
            return Err(CoreError::invalid_mutation(format!(
                "metadata property '{name}' is already scheduled for addition"
            )));
        }
        self.add.insert(name, value.into());
        Ok(())
    }

    /// Schedules a deletion, cancelling any pending addition of the name.
    pub fn add_to_delete(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.add.remove(&name);
        self.delete.insert(name);
    }

    /// Pending additions.
    #[must_use]
    pub fn additions(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.add
    }

    /// Pending deletions.
    #[must_use]
    pub fn deletions(&self) -> &BTreeSet<String> {
        &self.delete
    }

    /// Returns true if nothing is scheduled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.delete.is_empty()
    }
}

impl VersionSerializable for MetadataPropertyCollectionUpdate {
    const TYPE_NAME: &'static str = "MetadataPropertyCollectionUpdate";
    const CURRENT_VERSION: u16 = 1;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, _version: u16) -> CodecResult<()> {
        w.write_count_u16("add", self.add.len())?;
        for (name, value) in &self.add {
            w.write_string("property_name", name)?;
            w.write_bytes_i32("property_value", value)?;
        }
        w.write_count_u16("delete", self.delete.len())?;
        for name in &self.delete {
            w.write_string("property_name", name)?;
        }
        Ok(())
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, _version: u16) -> CodecResult<Self> {
        let mut add = BTreeMap::new();
        for _ in 0..r.read_count_u16()? {
            let name = r.read_string("property_name")?;
            add.insert(name, r.read_bytes_i32("property_value")?);
        }
        let mut delete = BTreeSet::new();
        for _ in 0..r.read_count_u16()? {
            delete.insert(r.read_string("property_name")?);
        }
        // Bytes from another writer may overlap; deletions win.
        add.retain(|name, _| !delete.contains(name));
        Ok(Self { add, delete })
    }
}

/// Index-level metadata stored at the head of every page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHeader {
    /// Opaque caller-owned blob.
    pub metadata: Vec<u8>,
    /// Advisory logical size, [`VIRTUAL_COUNT_UNKNOWN`] when unset.
    pub virtual_count: i32,
    /// Named properties; also the source of metadata-property bounds.
    pub metadata_properties: MetadataPropertyCollection,
}

impl IndexHeader {
    /// Returns true if the virtual count has been set.
    #[must_use]
    pub fn has_virtual_count(&self) -> bool {
        self.virtual_count >= 0
    }
}

impl Default for IndexHeader {
    fn default() -> Self {
        Self {
            metadata: Vec::new(),
            virtual_count: VIRTUAL_COUNT_UNKNOWN,
            metadata_properties: MetadataPropertyCollection::new(),
        }
    }
}

impl VersionSerializable for IndexHeader {
    const TYPE_NAME: &'static str = "IndexHeader";
    const CURRENT_VERSION: u16 = 2;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, version: u16) -> CodecResult<()> {
        w.write_bytes_u16("metadata", &self.metadata)?;
        w.write_i32(self.virtual_count);
        if version >= 2 {
            let props = (!self.metadata_properties.is_empty()).then_some(&self.metadata_properties);
            w.write_optional(props)?;
        }
        Ok(())
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, version: u16) -> CodecResult<Self> {
        let metadata = r.read_bytes_u16()?;
        let virtual_count = r.read_i32()?;
        let metadata_properties = if version >= 2 {
            r.read_optional()?.unwrap_or_default()
        } else {
            MetadataPropertyCollection::new()
        };
        Ok(Self {
            metadata,
            virtual_count,
            metadata_properties,
        })
    }
}
