//! Query and command results.

use crate::wire::{read_long_names, write_long_names};
use ixcache_codec::{CodecResult, PrimitiveReader, PrimitiveWriter, VersionSerializable};
use ixcache_core::{
    read_items, read_result_items, write_items, write_result_items, GroupByResult, IndexHeader,
    IndexId, IndexItem, ItemComparer, MetadataPropertyCollection, PrimarySortInfo, ResultItem,
    VIRTUAL_COUNT_UNKNOWN,
};
use std::collections::{BTreeMap, BTreeSet};

/// Index-level fields shared by the single-index results.
///
/// On the wire the head (`index_exists`, `index_size`, `metadata`) precedes
/// the result's entries and the tail (`exception_info` and the later
/// additions) follows them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSummary {
    /// The index was found.
    pub index_exists: bool,
    /// Stored entry count.
    pub index_size: i32,
    /// Metadata blob, when requested.
    pub metadata: Vec<u8>,
    /// Advisory logical size (v2).
    pub virtual_count: i32,
    /// Configured size cap; 0 = uncapped (v3).
    pub index_cap: i32,
    /// Metadata properties, when requested (v4).
    pub metadata_properties: Option<MetadataPropertyCollection>,
    /// Validation or processing failure text; empty on success.
    pub exception_info: String,
}

impl Default for IndexSummary {
    fn default() -> Self {
        Self {
            index_exists: false,
            index_size: 0,
            metadata: Vec::new(),
            virtual_count: VIRTUAL_COUNT_UNKNOWN,
            index_cap: 0,
            metadata_properties: None,
            exception_info: String::new(),
        }
    }
}

impl IndexSummary {
    /// Summary of an existing index.
    #[must_use]
    pub fn found(header: &IndexHeader, index_size: usize, index_cap: usize, get_metadata: bool) -> Self {
        Self {
            index_exists: true,
            index_size: i32::try_from(index_size).unwrap_or(i32::MAX),
            metadata: if get_metadata {
                header.metadata.clone()
            } else {
                Vec::new()
            },
            virtual_count: header.virtual_count,
            index_cap: i32::try_from(index_cap).unwrap_or(i32::MAX),
            metadata_properties: (get_metadata && !header.metadata_properties.is_empty())
                .then(|| header.metadata_properties.clone()),
            exception_info: String::new(),
        }
    }

    /// Summary of a request that failed.
    #[must_use]
    pub fn failed(exception_info: impl Into<String>) -> Self {
        Self {
            exception_info: exception_info.into(),
            ..Self::default()
        }
    }

    fn write_head(&self, w: &mut PrimitiveWriter<'_>) -> CodecResult<()> {
        w.write_bool(self.index_exists);
        w.write_i32(self.index_size);
        w.write_bytes_i32("metadata", &self.metadata)
    }

    fn write_tail(&self, w: &mut PrimitiveWriter<'_>, version: u16) -> CodecResult<()> {
        w.write_string("exception_info", &self.exception_info)?;
        if version >= 2 {
            w.write_i32(self.virtual_count);
        }
        if version >= 3 {
            w.write_i32(self.index_cap);
        }
        if version >= 4 {
            w.write_optional(self.metadata_properties.as_ref())?;
        }
        Ok(())
    }

    fn read_head(r: &mut PrimitiveReader<'_>) -> CodecResult<Self> {
        Ok(Self {
            index_exists: r.read_bool()?,
            index_size: r.read_i32()?,
            metadata: r.read_bytes_i32("metadata")?,
            ..Self::default()
        })
    }

    fn read_tail(&mut self, r: &mut PrimitiveReader<'_>, version: u16) -> CodecResult<()> {
        self.exception_info = r.read_string("exception_info")?;
        if version >= 2 {
            self.virtual_count = r.read_i32()?;
        }
        if version >= 3 {
            self.index_cap = r.read_i32()?;
        }
        if version >= 4 {
            self.metadata_properties = r.read_optional()?;
        }
        Ok(())
    }
}

fn write_header_map(
    w: &mut PrimitiveWriter<'_>,
    headers: &BTreeMap<IndexId, IndexHeader>,
) -> CodecResult<()> {
    w.write_count_i32("index_header_map", headers.len())?;
    for (id, header) in headers {
        id.write(w)?;
        w.write_nested(header)?;
    }
    Ok(())
}

fn read_header_map(r: &mut PrimitiveReader<'_>) -> CodecResult<BTreeMap<IndexId, IndexHeader>> {
    let count = r.read_count_i32("index_header_map")?;
    let mut headers = BTreeMap::new();
    for _ in 0..count {
        let id = IndexId::read(r)?;
        headers.insert(id, r.read_nested()?);
    }
    Ok(headers)
}

/// Reply to a [`crate::RangeQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RangeQueryResult {
    /// Index-level fields.
    pub summary: IndexSummary,
    /// The requested slice in index order.
    pub items: Vec<IndexItem>,
}

impl VersionSerializable for RangeQueryResult {
    const TYPE_NAME: &'static str = "RangeQueryResult";
    const CURRENT_VERSION: u16 = 4;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, version: u16) -> CodecResult<()> {
        self.summary.write_head(w)?;
        write_items(w, &self.items)?;
        self.summary.write_tail(w, version)
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, version: u16) -> CodecResult<Self> {
        let mut summary = IndexSummary::read_head(r)?;
        let items = read_items(r)?;
        summary.read_tail(r, version)?;
        Ok(Self { summary, items })
    }
}

/// Reply to a [`crate::FirstLastQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FirstLastQueryResult {
    /// Index-level fields.
    pub summary: IndexSummary,
    /// Leading entries.
    pub first_items: Vec<IndexItem>,
    /// Trailing entries.
    pub last_items: Vec<IndexItem>,
}

impl VersionSerializable for FirstLastQueryResult {
    const TYPE_NAME: &'static str = "FirstLastQueryResult";
    const CURRENT_VERSION: u16 = 4;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, version: u16) -> CodecResult<()> {
        self.summary.write_head(w)?;
        write_items(w, &self.first_items)?;
        write_items(w, &self.last_items)?;
        self.summary.write_tail(w, version)
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, version: u16) -> CodecResult<Self> {
        let mut summary = IndexSummary::read_head(r)?;
        let first_items = read_items(r)?;
        let last_items = read_items(r)?;
        summary.read_tail(r, version)?;
        Ok(Self {
            summary,
            first_items,
            last_items,
        })
    }
}

/// Reply to a [`crate::RandomQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RandomQueryResult {
    /// Index-level fields.
    pub summary: IndexSummary,
    /// The sample in index order.
    pub items: Vec<IndexItem>,
}

impl VersionSerializable for RandomQueryResult {
    const TYPE_NAME: &'static str = "RandomQueryResult";
    const CURRENT_VERSION: u16 = 4;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, version: u16) -> CodecResult<()> {
        self.summary.write_head(w)?;
        write_items(w, &self.items)?;
        self.summary.write_tail(w, version)
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, version: u16) -> CodecResult<Self> {
        let mut summary = IndexSummary::read_head(r)?;
        let items = read_items(r)?;
        summary.read_tail(r, version)?;
        Ok(Self { summary, items })
    }
}

/// Reply to a [`crate::ContainsIndexQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContainsIndexQueryResult {
    /// Index-level fields.
    pub summary: IndexSummary,
    /// Found entries in request order; `None` when the index is absent.
    pub items: Option<Vec<IndexItem>>,
}

impl VersionSerializable for ContainsIndexQueryResult {
    const TYPE_NAME: &'static str = "ContainsIndexQueryResult";
    const CURRENT_VERSION: u16 = 4;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, version: u16) -> CodecResult<()> {
        self.summary.write_head(w)?;
        w.write_bool(self.items.is_some());
        if let Some(items) = &self.items {
            write_items(w, items)?;
        }
        self.summary.write_tail(w, version)
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, version: u16) -> CodecResult<Self> {
        let mut summary = IndexSummary::read_head(r)?;
        let items = if r.read_bool()? {
            Some(read_items(r)?)
        } else {
            None
        };
        summary.read_tail(r, version)?;
        Ok(Self { summary, items })
    }
}

/// Reply to a [`crate::DistinctQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DistinctQueryResult {
    /// The index was found.
    pub index_exists: bool,
    /// Count per distinct value.
    pub distinct_values: BTreeMap<Vec<u8>, i32>,
    /// Failure text; empty on success.
    pub exception_info: String,
}

impl VersionSerializable for DistinctQueryResult {
    const TYPE_NAME: &'static str = "DistinctQueryResult";
    const CURRENT_VERSION: u16 = 1;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, _version: u16) -> CodecResult<()> {
        w.write_bool(self.index_exists);
        w.write_count_i32("distinct_values", self.distinct_values.len())?;
        for (value, count) in &self.distinct_values {
            w.write_bytes_u16("distinct_value", value)?;
            w.write_i32(*count);
        }
        w.write_string("exception_info", &self.exception_info)
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, _version: u16) -> CodecResult<Self> {
        let index_exists = r.read_bool()?;
        let count = r.read_count_i32("distinct_values")?;
        let mut distinct_values = BTreeMap::new();
        for _ in 0..count {
            let value = r.read_bytes_u16()?;
            distinct_values.insert(value, r.read_i32()?);
        }
        Ok(Self {
            index_exists,
            distinct_values,
            exception_info: r.read_string("exception_info")?,
        })
    }
}

/// Reply to a [`crate::TagQuery`] or a [`crate::StringHashQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NameSetResult {
    /// The node has anything to report.
    pub type_exists: bool,
    /// Sorted names.
    pub names: BTreeSet<String>,
    /// Failure text; empty on success.
    pub exception_info: String,
}

impl VersionSerializable for NameSetResult {
    const TYPE_NAME: &'static str = "NameSetResult";
    const CURRENT_VERSION: u16 = 1;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, _version: u16) -> CodecResult<()> {
        w.write_bool(self.type_exists);
        let names: Vec<String> = self.names.iter().cloned().collect();
        write_long_names(w, "names", &names)?;
        w.write_string("exception_info", &self.exception_info)
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, _version: u16) -> CodecResult<Self> {
        Ok(Self {
            type_exists: r.read_bool()?,
            names: read_long_names(r, "names")?.into_iter().collect(),
            exception_info: r.read_string("exception_info")?,
        })
    }
}

/// Reply to a [`crate::PagedIndexQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PagedIndexQueryResult {
    /// The merged page.
    pub items: Vec<ResultItem>,
    /// Headers selected by the query's header type.
    pub index_header_map: BTreeMap<IndexId, IndexHeader>,
    /// Entries counted across the queried indexes.
    pub total_count: i32,
    /// Failure text; empty on success.
    pub exception_info: String,
    /// Filtered entries beyond the merge cap (v2).
    pub additional_available_item_count: i32,
    /// Order of `items` (v3).
    pub sort_info: Option<PrimarySortInfo>,
    /// Configured size cap of the target index (v4).
    pub index_cap: i32,
    /// Groups, when the query grouped (v5).
    pub group_by_result: Option<GroupByResult>,
}

impl PagedIndexQueryResult {
    /// Comparer for `items` and the group-by result.
    #[must_use]
    pub fn comparer(&self) -> ItemComparer {
        self.sort_info
            .as_ref()
            .map(ItemComparer::from)
            .unwrap_or_default()
    }
}

impl VersionSerializable for PagedIndexQueryResult {
    const TYPE_NAME: &'static str = "PagedIndexQueryResult";
    const CURRENT_VERSION: u16 = 5;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, version: u16) -> CodecResult<()> {
        write_result_items(w, &self.items)?;
        write_header_map(w, &self.index_header_map)?;
        w.write_i32(self.total_count);
        w.write_string("exception_info", &self.exception_info)?;
        if version >= 2 {
            w.write_i32(self.additional_available_item_count);
        }
        if version >= 3 {
            w.write_optional(self.sort_info.as_ref())?;
        }
        if version >= 4 {
            w.write_i32(self.index_cap);
        }
        if version >= 5 {
            w.write_bool(self.group_by_result.is_some());
            if let Some(groups) = &self.group_by_result {
                groups.write(w)?;
            }
        }
        Ok(())
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, version: u16) -> CodecResult<Self> {
        let items = read_result_items(r)?;
        let index_header_map = read_header_map(r)?;
        let mut result = Self {
            items,
            index_header_map,
            total_count: r.read_i32()?,
            exception_info: r.read_string("exception_info")?,
            ..Self::default()
        };
        if version >= 2 {
            result.additional_available_item_count = r.read_i32()?;
        }
        if version >= 3 {
            result.sort_info = r.read_optional()?;
        }
        if version >= 4 {
            result.index_cap = r.read_i32()?;
        }
        if version >= 5 && r.read_bool()? {
            let comparer = result.comparer();
            result.group_by_result = Some(GroupByResult::read(r, comparer)?);
        }
        Ok(result)
    }
}

/// Reply to an [`crate::IntersectionQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IntersectionQueryResult {
    /// Items present in every intersected index.
    pub items: Vec<IndexItem>,
    /// Headers of the intersected indexes; empty unless requested and the
    /// intersection is not empty.
    pub index_header_map: BTreeMap<IndexId, IndexHeader>,
    /// Order of `items`.
    pub sort_info: Option<PrimarySortInfo>,
    /// Failure text; empty on success.
    pub exception_info: String,
}

impl IntersectionQueryResult {
    /// Comparer for `items`.
    #[must_use]
    pub fn comparer(&self) -> ItemComparer {
        self.sort_info
            .as_ref()
            .map(ItemComparer::from)
            .unwrap_or_default()
    }
}

impl VersionSerializable for IntersectionQueryResult {
    const TYPE_NAME: &'static str = "IntersectionQueryResult";
    const CURRENT_VERSION: u16 = 1;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, _version: u16) -> CodecResult<()> {
        write_items(w, &self.items)?;
        write_header_map(w, &self.index_header_map)?;
        w.write_optional(self.sort_info.as_ref())?;
        w.write_string("exception_info", &self.exception_info)
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, _version: u16) -> CodecResult<Self> {
        Ok(Self {
            items: read_items(r)?,
            index_header_map: read_header_map(r)?,
            sort_info: r.read_optional()?,
            exception_info: r.read_string("exception_info")?,
        })
    }
}

/// One index's matches inside a [`MultiIndexContainsQueryResult`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MultiIndexContainsEntry {
    /// The index searched.
    pub index_id: IndexId,
    /// The index was found.
    pub index_exists: bool,
    /// Stored entry count.
    pub index_size: i32,
    /// Configured size cap; 0 = uncapped.
    pub index_cap: i32,
    /// Matching items, in request order.
    pub items: Vec<IndexItem>,
    /// Header, when requested.
    pub header: Option<IndexHeader>,
}

impl VersionSerializable for MultiIndexContainsEntry {
    const TYPE_NAME: &'static str = "MultiIndexContainsEntry";
    const CURRENT_VERSION: u16 = 1;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, _version: u16) -> CodecResult<()> {
        self.index_id.write(w)?;
        w.write_bool(self.index_exists);
        w.write_i32(self.index_size);
        w.write_i32(self.index_cap);
        write_items(w, &self.items)?;
        w.write_optional(self.header.as_ref())
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, _version: u16) -> CodecResult<Self> {
        Ok(Self {
            index_id: IndexId::read(r)?,
            index_exists: r.read_bool()?,
            index_size: r.read_i32()?,
            index_cap: r.read_i32()?,
            items: read_items(r)?,
            header: r.read_optional()?,
        })
    }
}

/// Reply to a [`crate::MultiIndexContainsQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MultiIndexContainsQueryResult {
    /// Indexes holding at least one requested item.
    pub entries: Vec<MultiIndexContainsEntry>,
    /// Failure text; empty on success.
    pub exception_info: String,
}

impl VersionSerializable for MultiIndexContainsQueryResult {
    const TYPE_NAME: &'static str = "MultiIndexContainsQueryResult";
    const CURRENT_VERSION: u16 = 1;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, _version: u16) -> CodecResult<()> {
        w.write_count_i32("entries", self.entries.len())?;
        for entry in &self.entries {
            w.write_nested(entry)?;
        }
        w.write_string("exception_info", &self.exception_info)
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, _version: u16) -> CodecResult<Self> {
        let count = r.read_count_i32("entries")?;
        let mut entries = Vec::with_capacity(r.capacity_hint(count, 16));
        for _ in 0..count {
            entries.push(r.read_nested()?);
        }
        Ok(Self {
            entries,
            exception_info: r.read_string("exception_info")?,
        })
    }
}

/// Reply to a [`crate::MetadataPropertyQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetadataPropertyQueryResult {
    /// The properties; `None` when the index is absent.
    pub properties: Option<MetadataPropertyCollection>,
    /// Failure text; empty on success.
    pub exception_info: String,
}

impl VersionSerializable for MetadataPropertyQueryResult {
    const TYPE_NAME: &'static str = "MetadataPropertyQueryResult";
    const CURRENT_VERSION: u16 = 1;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, _version: u16) -> CodecResult<()> {
        w.write_optional(self.properties.as_ref())?;
        w.write_string("exception_info", &self.exception_info)
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, _version: u16) -> CodecResult<Self> {
        Ok(Self {
            properties: r.read_optional()?,
            exception_info: r.read_string("exception_info")?,
        })
    }
}

/// Reply to any write command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MutationResult {
    /// Rejected entries and failures, one per line; empty on success.
    pub exception_info: String,
}

impl MutationResult {
    /// Returns true if nothing was rejected.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.exception_info.is_empty()
    }
}

impl VersionSerializable for MutationResult {
    const TYPE_NAME: &'static str = "MutationResult";
    const CURRENT_VERSION: u16 = 1;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, _version: u16) -> CodecResult<()> {
        w.write_string("exception_info", &self.exception_info)
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, _version: u16) -> CodecResult<Self> {
        Ok(Self {
            exception_info: r.read_string("exception_info")?,
        })
    }
}

/// A node could not decode the request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Rejected {
    /// Decoder error text.
    pub reason: String,
}

impl VersionSerializable for Rejected {
    const TYPE_NAME: &'static str = "Rejected";
    const CURRENT_VERSION: u16 = 1;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, _version: u16) -> CodecResult<()> {
        w.write_string("reason", &self.reason)
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, _version: u16) -> CodecResult<Self> {
        Ok(Self {
            reason: r.read_string("reason")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use ixcache_codec::{from_versioned_bytes, to_versioned_bytes};
    use ixcache_core::{DataType, SortBy, SortOrder};

    fn summary() -> IndexSummary {
        let mut props = MetadataPropertyCollection::new();
        props.insert("floor", vec![9]);
        IndexSummary {
            index_exists: true,
            index_size: 3,
            metadata: b"m".to_vec(),
            virtual_count: 30,
            index_cap: 100,
            metadata_properties: Some(props),
            exception_info: String::new(),
        }
    }

    fn downlevel<T: VersionSerializable>(value: &T, version: u16) -> T {
        let mut buf = BytesMut::new();
        PrimitiveWriter::new(&mut buf)
            .write_nested_as(value, version)
            .unwrap();
        from_versioned_bytes(&buf).unwrap()
    }

    #[test]
    fn range_result_versions() {
        let result = RangeQueryResult {
            summary: summary(),
            items: vec![IndexItem::new(b"a".to_vec()).with_data(b"p".to_vec())],
        };
        let bytes = to_versioned_bytes(&result).unwrap();
        assert_eq!(from_versioned_bytes::<RangeQueryResult>(&bytes).unwrap(), result);

        let v1 = downlevel(&result, 1);
        assert_eq!(v1.items, result.items);
        assert_eq!(v1.summary.virtual_count, VIRTUAL_COUNT_UNKNOWN);
        assert_eq!(v1.summary.index_cap, 0);
        let v3 = downlevel(&result, 3);
        assert_eq!(v3.summary.index_cap, 100);
        assert_eq!(v3.summary.metadata_properties, None);
    }

    #[test]
    fn contains_result_keeps_absence() {
        let absent = ContainsIndexQueryResult::default();
        let bytes = to_versioned_bytes(&absent).unwrap();
        assert_eq!(
            from_versioned_bytes::<ContainsIndexQueryResult>(&bytes).unwrap().items,
            None
        );
        let empty = ContainsIndexQueryResult {
            summary: summary(),
            items: Some(Vec::new()),
        };
        let bytes = to_versioned_bytes(&empty).unwrap();
        assert_eq!(
            from_versioned_bytes::<ContainsIndexQueryResult>(&bytes).unwrap().items,
            Some(Vec::new())
        );
    }

    #[test]
    fn paged_result_carries_groups() {
        let sort = PrimarySortInfo::by_tag("score", vec![SortOrder::new(DataType::Byte, SortBy::Desc)]);
        let comparer = ItemComparer::from(&sort);
        let mut groups = GroupByResult::new(comparer);
        let item = ResultItem::new(
            IndexId::from(1),
            IndexItem::new(b"x".to_vec()).with_tag("score", vec![4]),
        );
        groups.add(b"k".to_vec(), item.clone());
        let mut result = PagedIndexQueryResult {
            items: vec![item],
            total_count: 1,
            additional_available_item_count: 2,
            sort_info: Some(sort),
            index_cap: 5,
            group_by_result: Some(groups),
            ..PagedIndexQueryResult::default()
        };
        result
            .index_header_map
            .insert(IndexId::from(1), IndexHeader::default());
        let bytes = to_versioned_bytes(&result).unwrap();
        assert_eq!(from_versioned_bytes::<PagedIndexQueryResult>(&bytes).unwrap(), result);

        let v2 = downlevel(&result, 2);
        assert_eq!(v2.additional_available_item_count, 2);
        assert_eq!(v2.sort_info, None);
        assert_eq!(v2.group_by_result, None);
    }

    #[test]
    fn name_set_is_sorted() {
        let result = NameSetResult {
            type_exists: true,
            names: ["b", "a"].into_iter().map(String::from).collect(),
            exception_info: String::new(),
        };
        let bytes = to_versioned_bytes(&result).unwrap();
        let decoded: NameSetResult = from_versioned_bytes(&bytes).unwrap();
        assert_eq!(decoded.names.iter().next().map(String::as_str), Some("a"));
    }

    #[test]
    fn multi_index_results_roundtrip() {
        let sort = PrimarySortInfo::by_tag("score", vec![SortOrder::new(DataType::Byte, SortBy::Desc)]);
        let mut intersection = IntersectionQueryResult {
            items: vec![IndexItem::new(b"x".to_vec()).with_tag("score", vec![4])],
            sort_info: Some(sort),
            ..IntersectionQueryResult::default()
        };
        intersection
            .index_header_map
            .insert(IndexId::from(2), IndexHeader::default());
        let bytes = to_versioned_bytes(&intersection).unwrap();
        let decoded: IntersectionQueryResult = from_versioned_bytes(&bytes).unwrap();
        assert_eq!(decoded, intersection);
        assert!(decoded.comparer().compare(&decoded.items[0], &decoded.items[0]).is_eq());

        let contains = MultiIndexContainsQueryResult {
            entries: vec![MultiIndexContainsEntry {
                index_id: IndexId::from(3),
                index_exists: true,
                index_size: 7,
                index_cap: 10,
                items: vec![IndexItem::new(b"y".to_vec())],
                header: Some(IndexHeader::default()),
            }],
            exception_info: "partial".into(),
        };
        let bytes = to_versioned_bytes(&contains).unwrap();
        assert_eq!(
            from_versioned_bytes::<MultiIndexContainsQueryResult>(&bytes).unwrap(),
            contains
        );
    }
}
