//! Index entries and result items.

use crate::types::{IndexId, ITEM_ID_FIELD};
use ixcache_codec::{CodecResult, PrimitiveReader, PrimitiveWriter};
use std::collections::{BTreeMap, BTreeSet};

/// Read access to the fields conditions and comparers look at.
pub trait FieldSource {
    /// Item identifier bytes.
    fn item_id(&self) -> &[u8];

    /// Value of a tag, if present.
    fn tag(&self, name: &str) -> Option<&[u8]>;

    /// Resolves a field: the identifier when `is_tag` is false or the name
    /// is [`ITEM_ID_FIELD`], otherwise the named tag.
    fn field(&self, name: &str, is_tag: bool) -> Option<&[u8]> {
        if !is_tag || name.eq_ignore_ascii_case(ITEM_ID_FIELD) {
            Some(self.item_id())
        } else {
            self.tag(name)
        }
    }

    /// Resolves a field by name alone.
    fn named_field(&self, name: &str) -> Option<&[u8]> {
        self.field(name, true)
    }
}

/// One entry of an index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexItem {
    /// Non-empty identifier, unique within the index.
    pub item_id: Vec<u8>,
    /// Writer-supplied timestamp.
    pub timestamp: i64,
    /// Named tag values.
    pub tags: BTreeMap<String, Vec<u8>>,
    /// Optional payload; empty means absent.
    pub data: Vec<u8>,
}

impl IndexItem {
    /// Creates an entry with no tags or data.
    #[must_use]
    pub fn new(item_id: impl Into<Vec<u8>>) -> Self {
        Self {
            item_id: item_id.into(),
            ..Self::default()
        }
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.tags.insert(name.into(), value.into());
        self
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = data.into();
        self
    }

    /// Sets the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Drops every tag not in `keep`.
    pub fn retain_tags(&mut self, keep: &BTreeSet<String>) {
        self.tags.retain(|name, _| keep.contains(name));
    }

    /// Copies tags from `other` that this item does not carry.
    pub fn merge_missing_tags(&mut self, other: &IndexItem) {
        for (name, value) in &other.tags {
            self.tags
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
    }

    /// Write the entry.
    pub fn write(&self, w: &mut PrimitiveWriter<'_>) -> CodecResult<()> {
        w.write_bytes_u16("item_id", &self.item_id)?;
        w.write_i64(self.timestamp);
        w.write_count_u8("tags", self.tags.len())?;
        for (name, value) in &self.tags {
            w.write_string("tag_name", name)?;
            w.write_bytes_u16("tag_value", value)?;
        }
        w.write_bytes_i32("data", &self.data)
    }

    /// Read an entry.
    pub fn read(r: &mut PrimitiveReader<'_>) -> CodecResult<Self> {
        let item_id = r.read_bytes_u16()?;
        let timestamp = r.read_i64()?;
        let tag_count = r.read_count_u8()?;
        let mut tags = BTreeMap::new();
        for _ in 0..tag_count {
            let name = r.read_string("tag_name")?;
            let value = r.read_bytes_u16()?;
            tags.insert(name, value);
        }
        let data = r.read_bytes_i32("data")?;
        Ok(Self {
            item_id,
            timestamp,
            tags,
            data,
        })
    }
}

impl FieldSource for IndexItem {
    fn item_id(&self) -> &[u8] {
        &self.item_id
    }

    fn tag(&self, name: &str) -> Option<&[u8]> {
        self.tags.get(name).map(Vec::as_slice)
    }
}

/// An entry returned by a query, tagged with the index it came from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultItem {
    /// Source index.
    pub index_id: IndexId,
    /// The entry.
    pub item: IndexItem,
}

impl ResultItem {
    /// Creates a result item.
    #[must_use]
    pub fn new(index_id: IndexId, item: IndexItem) -> Self {
        Self { index_id, item }
    }

    /// Write the result item.
    pub fn write(&self, w: &mut PrimitiveWriter<'_>) -> CodecResult<()> {
        self.index_id.write(w)?;
        self.item.write(w)
    }

    /// Read a result item.
    pub fn read(r: &mut PrimitiveReader<'_>) -> CodecResult<Self> {
        Ok(Self {
            index_id: IndexId::read(r)?,
            item: IndexItem::read(r)?,
        })
    }
}

impl FieldSource for ResultItem {
    fn item_id(&self) -> &[u8] {
        &self.item.item_id
    }

    fn tag(&self, name: &str) -> Option<&[u8]> {
        self.item.tag(name)
    }
}

/// Write a list of entries with an `i32` count.
pub fn write_items(w: &mut PrimitiveWriter<'_>, items: &[IndexItem]) -> CodecResult<()> {
    w.write_count_i32("items", items.len())?;
    items.iter().try_for_each(|item| item.write(w))
}

/// Read a list of entries with an `i32` count.
pub fn read_items(r: &mut PrimitiveReader<'_>) -> CodecResult<Vec<IndexItem>> {
    let count = r.read_count_i32("items")?;
    let mut items = Vec::with_capacity(r.capacity_hint(count, 15));
    for _ in 0..count {
        items.push(IndexItem::read(r)?);
    }
    Ok(items)
}

/// Write a list of result items with an `i32` count.
pub fn write_result_items(w: &mut PrimitiveWriter<'_>, items: &[ResultItem]) -> CodecResult<()> {
    w.write_count_i32("result_items", items.len())?;
    items.iter().try_for_each(|item| item.write(w))
}

/// Read a list of result items with an `i32` count.
pub fn read_result_items(r: &mut PrimitiveReader<'_>) -> CodecResult<Vec<ResultItem>> {
    let count = r.read_count_i32("result_items")?;
    let mut items = Vec::with_capacity(r.capacity_hint(count, 17));
    for _ in 0..count {
        items.push(ResultItem::read(r)?);
    }
    Ok(items)
}
