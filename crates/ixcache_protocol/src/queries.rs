//! The query catalog.
//!
//! Every query is a closed, versioned record. Fields added after the first
//! version are gated on the version being read or written; a node refuses
//! versions newer than the ones it knows.

use crate::error::{ProtocolError, ProtocolResult};
use crate::wire::{
    read_byte_list, read_domain_type, read_index_ids, read_names, read_opt_i32,
    read_params_mapping, read_primary_ids, write_byte_list, write_index_ids, write_names,
    write_opt_i32, write_params_mapping, write_primary_ids,
};
use ixcache_codec::{CodecError, CodecResult, PrimitiveReader, PrimitiveWriter, VersionSerializable};
use ixcache_core::{
    read_filter, write_filter, CapCondition, DomainSpecificProcessingType, Filter, GroupBy,
    IndexCondition, IndexId, TagSort,
};
use std::collections::BTreeMap;

/// Anything addressed to exactly one index.
pub trait IndexScoped {
    /// The addressed index.
    fn index_id(&self) -> &IndexId;

    /// Sharding hash used for placement.
    fn primary_id(&self) -> i32 {
        self.index_id().primary_id()
    }
}

fn require_index_id(id: &IndexId) -> ProtocolResult<()> {
    if id.is_empty() {
        return Err(ProtocolError::invalid_query("index id is empty"));
    }
    Ok(())
}

fn require_index_ids(ids: &[IndexId], primary_ids: &[i32]) -> ProtocolResult<()> {
    if ids.is_empty() {
        return Err(ProtocolError::invalid_query("index_id_list is empty"));
    }
    for id in ids {
        require_index_id(id)?;
    }
    if !primary_ids.is_empty() && primary_ids.len() != ids.len() {
        return Err(ProtocolError::invalid_query(format!(
            "primary_id_list has {} entries for {} index ids",
            primary_ids.len(),
            ids.len()
        )));
    }
    Ok(())
}

/// Explicit primary ids when they parallel `ids`, else the derived ones.
fn primary_ids_of(ids: &[IndexId], primary_ids: &[i32]) -> Vec<i32> {
    if primary_ids.len() == ids.len() {
        primary_ids.to_vec()
    } else {
        ids.iter().map(IndexId::primary_id).collect()
    }
}

/// A 1-based page of one index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RangeQuery {
    /// Target index instance.
    pub index_id: IndexId,
    /// 1-based position of the first item returned.
    pub offset: i32,
    /// Items to return.
    pub item_num: i32,
    /// Named index; empty selects the default.
    pub target_index_name: String,
    /// Strip payloads.
    pub exclude_data: bool,
    /// Return the header metadata blob.
    pub get_metadata: bool,
    /// Per-entry predicate (v2).
    pub filter: Option<Filter>,
    /// Re-sort before paging (v3).
    pub tag_sort: Option<TagSort>,
    /// Range bounds (v4).
    pub index_condition: Option<IndexCondition>,
    /// Domain processing (v5).
    pub domain_type: DomainSpecificProcessingType,
}

impl RangeQuery {
    /// Creates a range query.
    #[must_use]
    pub fn new(index_id: IndexId, offset: i32, item_num: i32) -> Self {
        Self {
            index_id,
            offset,
            item_num,
            ..Self::default()
        }
    }

    /// Targets a named index.
    #[must_use]
    pub fn with_target(mut self, name: impl Into<String>) -> Self {
        self.target_index_name = name.into();
        self
    }

    /// Sets the filter.
    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Sets the range bounds.
    #[must_use]
    pub fn with_index_condition(mut self, condition: IndexCondition) -> Self {
        self.index_condition = Some(condition);
        self
    }

    /// Checks the index id and page bounds.
    pub fn validate(&self) -> ProtocolResult<()> {
        require_index_id(&self.index_id)?;
        if self.offset < 1 {
            return Err(ProtocolError::invalid_query(format!(
                "offset must be at least 1, got {}",
                self.offset
            )));
        }
        if self.item_num < 1 {
            return Err(ProtocolError::invalid_query(format!(
                "item_num must be at least 1, got {}",
                self.item_num
            )));
        }
        Ok(())
    }
}

impl IndexScoped for RangeQuery {
    fn index_id(&self) -> &IndexId {
        &self.index_id
    }
}

impl VersionSerializable for RangeQuery {
    const TYPE_NAME: &'static str = "RangeQuery";
    const CURRENT_VERSION: u16 = 5;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, version: u16) -> CodecResult<()> {
        self.index_id.write(w)?;
        w.write_i32(self.offset);
        w.write_i32(self.item_num);
        w.write_string("target_index_name", &self.target_index_name)?;
        w.write_bool(self.exclude_data);
        w.write_bool(self.get_metadata);
        if version >= 2 {
            write_filter(w, self.filter.as_ref())?;
        }
        if version >= 3 {
            w.write_optional(self.tag_sort.as_ref())?;
        }
        if version >= 4 {
            w.write_optional(self.index_condition.as_ref())?;
        }
        if version >= 5 {
            w.write_u8(self.domain_type.as_u8());
        }
        Ok(())
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, version: u16) -> CodecResult<Self> {
        let mut query = Self {
            index_id: IndexId::read(r)?,
            offset: r.read_i32()?,
            item_num: r.read_i32()?,
            target_index_name: r.read_string("target_index_name")?,
            exclude_data: r.read_bool()?,
            get_metadata: r.read_bool()?,
            ..Self::default()
        };
        if version >= 2 {
            query.filter = read_filter(r)?;
        }
        if version >= 3 {
            query.tag_sort = r.read_optional()?;
        }
        if version >= 4 {
            query.index_condition = r.read_optional()?;
        }
        if version >= 5 {
            query.domain_type = read_domain_type(r)?;
        }
        Ok(query)
    }
}

/// The first and last pages of one index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FirstLastQuery {
    /// Target index instance.
    pub index_id: IndexId,
    /// Items on the first page.
    pub first_page_size: i32,
    /// Items on the last page.
    pub last_page_size: i32,
    /// Named index; empty selects the default.
    pub target_index_name: String,
    /// Strip payloads.
    pub exclude_data: bool,
    /// Return the header metadata blob.
    pub get_metadata: bool,
    /// Per-entry predicate (v2).
    pub filter: Option<Filter>,
    /// Re-sort before paging (v3).
    pub tag_sort: Option<TagSort>,
    /// Range bounds (v4).
    pub index_condition: Option<IndexCondition>,
    /// Domain processing (v5).
    pub domain_type: DomainSpecificProcessingType,
}

impl FirstLastQuery {
    /// Creates a first/last query.
    #[must_use]
    pub fn new(index_id: IndexId, first_page_size: i32, last_page_size: i32) -> Self {
        Self {
            index_id,
            first_page_size,
            last_page_size,
            ..Self::default()
        }
    }

    /// Checks the index id and that at least one page is requested.
    pub fn validate(&self) -> ProtocolResult<()> {
        require_index_id(&self.index_id)?;
        if self.first_page_size < 1 && self.last_page_size < 1 {
            return Err(ProtocolError::invalid_query(
                "first_page_size or last_page_size must be at least 1",
            ));
        }
        Ok(())
    }
}

impl IndexScoped for FirstLastQuery {
    fn index_id(&self) -> &IndexId {
        &self.index_id
    }
}

impl VersionSerializable for FirstLastQuery {
    const TYPE_NAME: &'static str = "FirstLastQuery";
    const CURRENT_VERSION: u16 = 5;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, version: u16) -> CodecResult<()> {
        self.index_id.write(w)?;
        w.write_i32(self.first_page_size);
        w.write_i32(self.last_page_size);
        w.write_string("target_index_name", &self.target_index_name)?;
        w.write_bool(self.exclude_data);
        w.write_bool(self.get_metadata);
        if version >= 2 {
            write_filter(w, self.filter.as_ref())?;
        }
        if version >= 3 {
            w.write_optional(self.tag_sort.as_ref())?;
        }
        if version >= 4 {
            w.write_optional(self.index_condition.as_ref())?;
        }
        if version >= 5 {
            w.write_u8(self.domain_type.as_u8());
        }
        Ok(())
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, version: u16) -> CodecResult<Self> {
        let mut query = Self {
            index_id: IndexId::read(r)?,
            first_page_size: r.read_i32()?,
            last_page_size: r.read_i32()?,
            target_index_name: r.read_string("target_index_name")?,
            exclude_data: r.read_bool()?,
            get_metadata: r.read_bool()?,
            ..Self::default()
        };
        if version >= 2 {
            query.filter = read_filter(r)?;
        }
        if version >= 3 {
            query.tag_sort = r.read_optional()?;
        }
        if version >= 4 {
            query.index_condition = r.read_optional()?;
        }
        if version >= 5 {
            query.domain_type = read_domain_type(r)?;
        }
        Ok(query)
    }
}

/// A uniform random sample of one index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RandomQuery {
    /// Target index instance.
    pub index_id: IndexId,
    /// Sample size.
    pub count: i32,
    /// Named index; empty selects the default.
    pub target_index_name: String,
    /// Strip payloads.
    pub exclude_data: bool,
    /// Return the header metadata blob.
    pub get_metadata: bool,
    /// Per-entry predicate.
    pub filter: Option<Filter>,
    /// Range bounds.
    pub index_condition: Option<IndexCondition>,
    /// Domain processing (v2).
    pub domain_type: DomainSpecificProcessingType,
}

impl RandomQuery {
    /// Creates a random query.
    #[must_use]
    pub fn new(index_id: IndexId, count: i32) -> Self {
        Self {
            index_id,
            count,
            ..Self::default()
        }
    }

    /// Checks the index id and sample size.
    pub fn validate(&self) -> ProtocolResult<()> {
        require_index_id(&self.index_id)?;
        if self.count < 1 {
            return Err(ProtocolError::invalid_query(format!(
                "count must be at least 1, got {}",
                self.count
            )));
        }
        Ok(())
    }
}

impl IndexScoped for RandomQuery {
    fn index_id(&self) -> &IndexId {
        &self.index_id
    }
}

impl VersionSerializable for RandomQuery {
    const TYPE_NAME: &'static str = "RandomQuery";
    const CURRENT_VERSION: u16 = 2;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, version: u16) -> CodecResult<()> {
        self.index_id.write(w)?;
        w.write_i32(self.count);
        w.write_string("target_index_name", &self.target_index_name)?;
        w.write_bool(self.exclude_data);
        w.write_bool(self.get_metadata);
        write_filter(w, self.filter.as_ref())?;
        w.write_optional(self.index_condition.as_ref())?;
        if version >= 2 {
            w.write_u8(self.domain_type.as_u8());
        }
        Ok(())
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, version: u16) -> CodecResult<Self> {
        let mut query = Self {
            index_id: IndexId::read(r)?,
            count: r.read_i32()?,
            target_index_name: r.read_string("target_index_name")?,
            exclude_data: r.read_bool()?,
            get_metadata: r.read_bool()?,
            filter: read_filter(r)?,
            index_condition: r.read_optional()?,
            ..Self::default()
        };
        if version >= 2 {
            query.domain_type = read_domain_type(r)?;
        }
        Ok(query)
    }
}

/// Looks up specific items of one index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContainsIndexQuery {
    /// Target index instance.
    pub index_id: IndexId,
    /// Item identifiers to look up, in reply order.
    pub item_ids: Vec<Vec<u8>>,
    /// Named index; empty selects the default.
    pub target_index_name: String,
    /// Indexes of the same id whose tags are merged into found items.
    pub tags_from_indexes: Vec<String>,
    /// Strip payloads.
    pub exclude_data: bool,
    /// Return the header metadata blob.
    pub get_metadata: bool,
    /// Domain processing (v2).
    pub domain_type: DomainSpecificProcessingType,
}

impl ContainsIndexQuery {
    /// Creates a contains query.
    #[must_use]
    pub fn new(index_id: IndexId, item_ids: Vec<Vec<u8>>) -> Self {
        Self {
            index_id,
            item_ids,
            ..Self::default()
        }
    }

    /// Checks the index id.
    pub fn validate(&self) -> ProtocolResult<()> {
        require_index_id(&self.index_id)
    }
}

impl IndexScoped for ContainsIndexQuery {
    fn index_id(&self) -> &IndexId {
        &self.index_id
    }
}

impl VersionSerializable for ContainsIndexQuery {
    const TYPE_NAME: &'static str = "ContainsIndexQuery";
    const CURRENT_VERSION: u16 = 2;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, version: u16) -> CodecResult<()> {
        self.index_id.write(w)?;
        w.write_count_u16("item_ids", self.item_ids.len())?;
        for id in &self.item_ids {
            w.write_bytes_u16("item_id", id)?;
        }
        w.write_string("target_index_name", &self.target_index_name)?;
        write_names(w, "tags_from_indexes", &self.tags_from_indexes)?;
        w.write_bool(self.exclude_data);
        w.write_bool(self.get_metadata);
        if version >= 2 {
            w.write_u8(self.domain_type.as_u8());
        }
        Ok(())
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, version: u16) -> CodecResult<Self> {
        let index_id = IndexId::read(r)?;
        let count = r.read_count_u16()?;
        let mut item_ids = Vec::with_capacity(r.capacity_hint(count, 2));
        for _ in 0..count {
            item_ids.push(r.read_bytes_u16()?);
        }
        let mut query = Self {
            index_id,
            item_ids,
            target_index_name: r.read_string("target_index_name")?,
            tags_from_indexes: read_names(r, "tags_from_indexes")?,
            exclude_data: r.read_bool()?,
            get_metadata: r.read_bool()?,
            ..Self::default()
        };
        if version >= 2 {
            query.domain_type = read_domain_type(r)?;
        }
        Ok(query)
    }
}

/// Counts distinct values of one field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DistinctQuery {
    /// Target index instance.
    pub index_id: IndexId,
    /// Field counted; `ItemId` counts identifiers.
    pub field_name: String,
    /// Entries examined at most; unset means all.
    pub items_to_look_up: Option<i32>,
    /// Named index; empty selects the default.
    pub target_index_name: String,
    /// Range bounds.
    pub index_condition: Option<IndexCondition>,
}

impl DistinctQuery {
    /// Creates a distinct query.
    #[must_use]
    pub fn new(index_id: IndexId, field_name: impl Into<String>) -> Self {
        Self {
            index_id,
            field_name: field_name.into(),
            ..Self::default()
        }
    }

    /// Caps the entries examined.
    #[must_use]
    pub fn with_items_to_look_up(mut self, n: i32) -> Self {
        self.items_to_look_up = Some(n);
        self
    }

    /// Entries examined at most.
    #[must_use]
    pub fn look_up_limit(&self) -> i32 {
        self.items_to_look_up.unwrap_or(i32::MAX)
    }

    /// Checks the index id and field name.
    pub fn validate(&self) -> ProtocolResult<()> {
        require_index_id(&self.index_id)?;
        if self.field_name.is_empty() {
            return Err(ProtocolError::invalid_query("field_name is empty"));
        }
        if self.look_up_limit() < 1 {
            return Err(ProtocolError::invalid_query(
                "items_to_look_up must be at least 1",
            ));
        }
        Ok(())
    }
}

impl IndexScoped for DistinctQuery {
    fn index_id(&self) -> &IndexId {
        &self.index_id
    }
}

impl VersionSerializable for DistinctQuery {
    const TYPE_NAME: &'static str = "DistinctQuery";
    const CURRENT_VERSION: u16 = 1;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, _version: u16) -> CodecResult<()> {
        self.index_id.write(w)?;
        w.write_string("field_name", &self.field_name)?;
        write_opt_i32(w, self.items_to_look_up);
        w.write_string("target_index_name", &self.target_index_name)?;
        w.write_optional(self.index_condition.as_ref())
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, _version: u16) -> CodecResult<Self> {
        Ok(Self {
            index_id: IndexId::read(r)?,
            field_name: r.read_string("field_name")?,
            items_to_look_up: read_opt_i32(r)?,
            target_index_name: r.read_string("target_index_name")?,
            index_condition: r.read_optional()?,
        })
    }
}

/// Lists every tag name a node has stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TagQuery;

impl VersionSerializable for TagQuery {
    const TYPE_NAME: &'static str = "TagQuery";
    const CURRENT_VERSION: u16 = 1;

    fn serialize_as(&self, _w: &mut PrimitiveWriter<'_>, _version: u16) -> CodecResult<()> {
        Ok(())
    }

    fn deserialize(_r: &mut PrimitiveReader<'_>, _version: u16) -> CodecResult<Self> {
        Ok(Self)
    }
}

/// Lists the interned string values of the configured string-hash tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StringHashQuery;

impl VersionSerializable for StringHashQuery {
    const TYPE_NAME: &'static str = "StringHashQuery";
    const CURRENT_VERSION: u16 = 1;

    fn serialize_as(&self, _w: &mut PrimitiveWriter<'_>, _version: u16) -> CodecResult<()> {
        Ok(())
    }

    fn deserialize(_r: &mut PrimitiveReader<'_>, _version: u16) -> CodecResult<Self> {
        Ok(Self)
    }
}

/// Reads the metadata properties of one index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetadataPropertyQuery {
    /// Target index instance.
    pub index_id: IndexId,
    /// Named index; empty selects the default.
    pub target_index_name: String,
}

impl MetadataPropertyQuery {
    /// Creates a metadata property query.
    #[must_use]
    pub fn new(index_id: IndexId) -> Self {
        Self {
            index_id,
            target_index_name: String::new(),
        }
    }
}

impl IndexScoped for MetadataPropertyQuery {
    fn index_id(&self) -> &IndexId {
        &self.index_id
    }
}

impl VersionSerializable for MetadataPropertyQuery {
    const TYPE_NAME: &'static str = "MetadataPropertyQuery";
    const CURRENT_VERSION: u16 = 1;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, _version: u16) -> CodecResult<()> {
        self.index_id.write(w)?;
        w.write_string("target_index_name", &self.target_index_name)
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, _version: u16) -> CodecResult<Self> {
        Ok(Self {
            index_id: IndexId::read(r)?,
            target_index_name: r.read_string("target_index_name")?,
        })
    }
}

/// Per-IndexId override inside a [`PagedIndexQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexIdParams {
    /// Items extracted from this index; 0 defers to the query.
    pub max_items: i32,
    /// Replaces the query filter for this index.
    pub filter: Option<Filter>,
}

impl VersionSerializable for IndexIdParams {
    const TYPE_NAME: &'static str = "IndexIdParams";
    const CURRENT_VERSION: u16 = 1;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, _version: u16) -> CodecResult<()> {
        w.write_i32(self.max_items);
        write_filter(w, self.filter.as_ref())
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, _version: u16) -> CodecResult<Self> {
        Ok(Self {
            max_items: r.read_i32()?,
            filter: read_filter(r)?,
        })
    }
}

/// Which index headers a paged query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum GetIndexHeaderType {
    /// No headers.
    #[default]
    None = 0,
    /// Headers of every queried index.
    AllIndexIds = 1,
    /// Headers of the indexes present in the result page.
    ResultItemsIndexIds = 2,
}

impl GetIndexHeaderType {
    fn from_u8(value: u8) -> CodecResult<Self> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::AllIndexIds),
            2 => Ok(Self::ResultItemsIndexIds),
            other => Err(CodecError::malformed(format!(
                "unknown index header type {other}"
            ))),
        }
    }
}

/// A merged, paged view over many indexes, optionally grouped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PagedIndexQuery {
    /// Items per page.
    pub page_size: i32,
    /// 1-based page; 0 returns everything merged.
    pub page_num: i32,
    /// Named index; empty selects the default.
    pub target_index_name: String,
    /// Indexes of the same ids whose tags are merged into results.
    pub tags_from_indexes: Vec<String>,
    /// Re-sort before paging.
    pub tag_sort: Option<TagSort>,
    /// Indexes queried.
    pub index_id_list: Vec<IndexId>,
    /// Cap on merged items when `page_num` is 0; 0 = unbounded.
    pub max_items: i32,
    /// Strip payloads.
    pub exclude_data: bool,
    /// Count what a filtered index holds beyond the merge cap (v2).
    pub get_additional_available_item_count: bool,
    /// Primary ids parallel to `index_id_list` (v3).
    pub primary_id_list: Vec<i32>,
    /// Per-entry predicate (v4).
    pub filter: Option<Filter>,
    /// Per-index overrides (v5).
    pub index_id_params_mapping: BTreeMap<IndexId, IndexIdParams>,
    /// Paging must be re-applied after the cross-cluster merge (v6).
    pub client_side_subset_processing_required: bool,
    /// Range bounds (v7).
    pub index_condition: Option<IndexCondition>,
    /// Per-value caps (v8).
    pub cap_condition: Option<CapCondition>,
    /// Which headers to return (v9; earlier versions carry only a flag).
    pub index_header_type: GetIndexHeaderType,
    /// Domain processing (v10).
    pub domain_type: DomainSpecificProcessingType,
    /// Grouping (v11).
    pub group_by: Option<GroupBy>,
}

impl PagedIndexQuery {
    /// Creates a paged query over `index_id_list`.
    #[must_use]
    pub fn new(index_id_list: Vec<IndexId>, page_size: i32, page_num: i32) -> Self {
        Self {
            index_id_list,
            page_size,
            page_num,
            ..Self::default()
        }
    }

    /// Targets a named index.
    #[must_use]
    pub fn with_target(mut self, name: impl Into<String>) -> Self {
        self.target_index_name = name.into();
        self
    }

    /// Sets the filter.
    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Sets the grouping.
    #[must_use]
    pub fn with_group_by(mut self, group_by: GroupBy) -> Self {
        self.group_by = Some(group_by);
        self
    }

    /// Sets the header selection.
    #[must_use]
    pub fn with_index_header_type(mut self, kind: GetIndexHeaderType) -> Self {
        self.index_header_type = kind;
        self
    }

    /// Most items a merge keeps; 0 = unbounded.
    #[must_use]
    pub fn max_merge_count(&self) -> usize {
        if self.page_num > 0 {
            let count = i64::from(self.page_num) * i64::from(self.page_size.max(0));
            usize::try_from(count).unwrap_or(usize::MAX)
        } else {
            usize::try_from(self.max_items.max(0)).unwrap_or(0)
        }
    }

    /// Primary id of each entry of `index_id_list`.
    #[must_use]
    pub fn primary_ids(&self) -> Vec<i32> {
        primary_ids_of(&self.index_id_list, &self.primary_id_list)
    }

    /// Checks ids and paging.
    pub fn validate(&self) -> ProtocolResult<()> {
        if self.index_id_list.is_empty() {
            return Err(ProtocolError::invalid_query("index_id_list is empty"));
        }
        for id in &self.index_id_list {
            require_index_id(id)?;
        }
        if self.page_num < 0 {
            return Err(ProtocolError::invalid_query("page_num must not be negative"));
        }
        if self.page_num > 0 && self.page_size < 1 {
            return Err(ProtocolError::invalid_query(
                "page_size must be at least 1 when paging",
            ));
        }
        Ok(())
    }
}

impl VersionSerializable for PagedIndexQuery {
    const TYPE_NAME: &'static str = "PagedIndexQuery";
    const CURRENT_VERSION: u16 = 11;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, version: u16) -> CodecResult<()> {
        w.write_i32(self.page_size);
        w.write_i32(self.page_num);
        w.write_string("target_index_name", &self.target_index_name)?;
        write_names(w, "tags_from_indexes", &self.tags_from_indexes)?;
        w.write_optional(self.tag_sort.as_ref())?;
        write_index_ids(w, &self.index_id_list)?;
        w.write_i32(self.max_items);
        w.write_bool(self.exclude_data);
        w.write_bool(self.index_header_type != GetIndexHeaderType::None);
        if version >= 2 {
            w.write_bool(self.get_additional_available_item_count);
        }
        if version >= 3 {
            write_primary_ids(w, &self.primary_id_list)?;
        }
        if version >= 4 {
            write_filter(w, self.filter.as_ref())?;
        }
        if version >= 5 {
            write_params_mapping(w, &self.index_id_params_mapping)?;
        }
        if version >= 6 {
            w.write_bool(self.client_side_subset_processing_required);
        }
        if version >= 7 {
            w.write_optional(self.index_condition.as_ref())?;
        }
        if version >= 8 {
            w.write_optional(self.cap_condition.as_ref())?;
        }
        if version >= 9 {
            w.write_u8(self.index_header_type as u8);
        }
        if version >= 10 {
            w.write_u8(self.domain_type.as_u8());
        }
        if version >= 11 {
            w.write_optional(self.group_by.as_ref())?;
        }
        Ok(())
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, version: u16) -> CodecResult<Self> {
        let mut query = Self {
            page_size: r.read_i32()?,
            page_num: r.read_i32()?,
            target_index_name: r.read_string("target_index_name")?,
            tags_from_indexes: read_names(r, "tags_from_indexes")?,
            tag_sort: r.read_optional()?,
            index_id_list: read_index_ids(r)?,
            max_items: r.read_i32()?,
            exclude_data: r.read_bool()?,
            ..Self::default()
        };
        if r.read_bool()? {
            query.index_header_type = GetIndexHeaderType::AllIndexIds;
        }
        if version >= 2 {
            query.get_additional_available_item_count = r.read_bool()?;
        }
        if version >= 3 {
            query.primary_id_list = read_primary_ids(r)?;
        }
        if version >= 4 {
            query.filter = read_filter(r)?;
        }
        if version >= 5 {
            query.index_id_params_mapping = read_params_mapping(r)?;
        }
        if version >= 6 {
            query.client_side_subset_processing_required = r.read_bool()?;
        }
        if version >= 7 {
            query.index_condition = r.read_optional()?;
        }
        if version >= 8 {
            query.cap_condition = r.read_optional()?;
        }
        if version >= 9 {
            query.index_header_type = GetIndexHeaderType::from_u8(r.read_u8()?)?;
        }
        if version >= 10 {
            query.domain_type = read_domain_type(r)?;
        }
        if version >= 11 {
            query.group_by = r.read_optional()?;
        }
        Ok(query)
    }
}

/// Per-IndexId override inside an [`IntersectionQuery`] or a
/// [`MultiIndexContainsQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexScanParams {
    /// Entries scanned from this index; 0 defers to the query.
    pub count: i32,
    /// Replaces the query filter for this index.
    pub filter: Option<Filter>,
    /// Replaces the query range bounds for this index.
    pub index_condition: Option<IndexCondition>,
}

impl IndexScanParams {
    fn effective(
        overrides: Option<&Self>,
        count: i32,
        filter: Option<&Filter>,
        index_condition: Option<&IndexCondition>,
    ) -> Self {
        let overrides = overrides.cloned().unwrap_or_default();
        Self {
            count: if overrides.count > 0 { overrides.count } else { count },
            filter: overrides.filter.or_else(|| filter.cloned()),
            index_condition: overrides
                .index_condition
                .or_else(|| index_condition.cloned()),
        }
    }
}

impl VersionSerializable for IndexScanParams {
    const TYPE_NAME: &'static str = "IndexScanParams";
    const CURRENT_VERSION: u16 = 1;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, _version: u16) -> CodecResult<()> {
        w.write_i32(self.count);
        write_filter(w, self.filter.as_ref())?;
        w.write_optional(self.index_condition.as_ref())
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, _version: u16) -> CodecResult<Self> {
        Ok(Self {
            count: r.read_i32()?,
            filter: read_filter(r)?,
            index_condition: r.read_optional()?,
        })
    }
}

/// Items present in every one of several indexes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IntersectionQuery {
    /// Named index; empty selects the default.
    pub target_index_name: String,
    /// Indexes intersected.
    pub index_id_list: Vec<IndexId>,
    /// Strip payloads.
    pub exclude_data: bool,
    /// Return the headers of the intersected indexes.
    pub get_index_header: bool,
    /// Primary ids parallel to `index_id_list`; empty derives them.
    pub primary_id_list: Vec<i32>,
    /// Per-entry predicate.
    pub filter: Option<Filter>,
    /// Per-index overrides.
    pub index_id_params_mapping: BTreeMap<IndexId, IndexScanParams>,
    /// Entries scanned per index; 0 = all (v2).
    pub count: i32,
    /// Items returned; 0 = unbounded (v2).
    pub max_result_items: i32,
    /// Every index lives on one cluster, so the node applies `max_result_items` itself (v2).
    pub is_single_cluster_query: bool,
    /// Range bounds (v2).
    pub index_condition: Option<IndexCondition>,
    /// Domain processing (v3).
    pub domain_type: DomainSpecificProcessingType,
}

impl IntersectionQuery {
    /// Creates an intersection over `index_id_list`.
    #[must_use]
    pub fn new(index_id_list: Vec<IndexId>) -> Self {
        Self {
            index_id_list,
            ..Self::default()
        }
    }

    /// Targets a named index.
    #[must_use]
    pub fn with_target(mut self, name: impl Into<String>) -> Self {
        self.target_index_name = name.into();
        self
    }

    /// Sets the filter.
    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Caps the returned items.
    #[must_use]
    pub fn with_max_result_items(mut self, max: i32) -> Self {
        self.max_result_items = max;
        self
    }

    /// Primary id of each entry of `index_id_list`.
    #[must_use]
    pub fn primary_ids(&self) -> Vec<i32> {
        primary_ids_of(&self.index_id_list, &self.primary_id_list)
    }

    /// Scan settings for one index, overrides first.
    #[must_use]
    pub fn params_for(&self, index_id: &IndexId) -> IndexScanParams {
        IndexScanParams::effective(
            self.index_id_params_mapping.get(index_id),
            self.count,
            self.filter.as_ref(),
            self.index_condition.as_ref(),
        )
    }

    /// `max_result_items` when set.
    #[must_use]
    pub fn result_cap(&self) -> Option<usize> {
        usize::try_from(self.max_result_items).ok().filter(|&n| n > 0)
    }

    /// Checks ids and limits.
    pub fn validate(&self) -> ProtocolResult<()> {
        require_index_ids(&self.index_id_list, &self.primary_id_list)?;
        if self.count < 0 {
            return Err(ProtocolError::invalid_query("count must not be negative"));
        }
        if self.max_result_items < 0 {
            return Err(ProtocolError::invalid_query(
                "max_result_items must not be negative",
            ));
        }
        Ok(())
    }
}

impl VersionSerializable for IntersectionQuery {
    const TYPE_NAME: &'static str = "IntersectionQuery";
    const CURRENT_VERSION: u16 = 3;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, version: u16) -> CodecResult<()> {
        w.write_string("target_index_name", &self.target_index_name)?;
        write_index_ids(w, &self.index_id_list)?;
        w.write_bool(self.exclude_data);
        w.write_bool(self.get_index_header);
        write_primary_ids(w, &self.primary_id_list)?;
        write_filter(w, self.filter.as_ref())?;
        write_params_mapping(w, &self.index_id_params_mapping)?;
        if version >= 2 {
            w.write_i32(self.count);
            w.write_i32(self.max_result_items);
            w.write_bool(self.is_single_cluster_query);
            w.write_optional(self.index_condition.as_ref())?;
        }
        if version >= 3 {
            w.write_u8(self.domain_type.as_u8());
        }
        Ok(())
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, version: u16) -> CodecResult<Self> {
        let mut query = Self {
            target_index_name: r.read_string("target_index_name")?,
            index_id_list: read_index_ids(r)?,
            exclude_data: r.read_bool()?,
            get_index_header: r.read_bool()?,
            primary_id_list: read_primary_ids(r)?,
            filter: read_filter(r)?,
            index_id_params_mapping: read_params_mapping(r)?,
            ..Self::default()
        };
        if version >= 2 {
            query.count = r.read_i32()?;
            query.max_result_items = r.read_i32()?;
            query.is_single_cluster_query = r.read_bool()?;
            query.index_condition = r.read_optional()?;
        }
        if version >= 3 {
            query.domain_type = read_domain_type(r)?;
        }
        Ok(query)
    }
}

/// Looks up the same items in several indexes at once.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MultiIndexContainsQuery {
    /// Indexes searched.
    pub index_id_list: Vec<IndexId>,
    /// Item identifiers to look up, in reply order.
    pub item_ids: Vec<Vec<u8>>,
    /// Named index; empty selects the default.
    pub target_index_name: String,
    /// Strip payloads.
    pub exclude_data: bool,
    /// Return each matching index's header.
    pub get_index_header: bool,
    /// Primary ids parallel to `index_id_list`; empty derives them.
    pub primary_id_list: Vec<i32>,
    /// Per-entry predicate.
    pub filter: Option<Filter>,
    /// Per-index overrides.
    pub index_id_params_mapping: BTreeMap<IndexId, IndexScanParams>,
    /// Entries scanned per index; 0 = all.
    pub count: i32,
    /// Range bounds.
    pub index_condition: Option<IndexCondition>,
    /// Domain processing (v2).
    pub domain_type: DomainSpecificProcessingType,
}

impl MultiIndexContainsQuery {
    /// Creates a lookup of `item_ids` in every index of `index_id_list`.
    #[must_use]
    pub fn new(index_id_list: Vec<IndexId>, item_ids: Vec<Vec<u8>>) -> Self {
        Self {
            index_id_list,
            item_ids,
            ..Self::default()
        }
    }

    /// Targets a named index.
    #[must_use]
    pub fn with_target(mut self, name: impl Into<String>) -> Self {
        self.target_index_name = name.into();
        self
    }

    /// Primary id of each entry of `index_id_list`.
    #[must_use]
    pub fn primary_ids(&self) -> Vec<i32> {
        primary_ids_of(&self.index_id_list, &self.primary_id_list)
    }

    /// Scan settings for one index, overrides first.
    #[must_use]
    pub fn params_for(&self, index_id: &IndexId) -> IndexScanParams {
        IndexScanParams::effective(
            self.index_id_params_mapping.get(index_id),
            self.count,
            self.filter.as_ref(),
            self.index_condition.as_ref(),
        )
    }

    /// Checks ids and limits.
    pub fn validate(&self) -> ProtocolResult<()> {
        require_index_ids(&self.index_id_list, &self.primary_id_list)?;
        if self.count < 0 {
            return Err(ProtocolError::invalid_query("count must not be negative"));
        }
        Ok(())
    }
}

impl VersionSerializable for MultiIndexContainsQuery {
    const TYPE_NAME: &'static str = "MultiIndexContainsQuery";
    const CURRENT_VERSION: u16 = 2;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, version: u16) -> CodecResult<()> {
        write_index_ids(w, &self.index_id_list)?;
        write_byte_list(w, "item_ids", &self.item_ids)?;
        w.write_string("target_index_name", &self.target_index_name)?;
        w.write_bool(self.exclude_data);
        w.write_bool(self.get_index_header);
        write_primary_ids(w, &self.primary_id_list)?;
        write_filter(w, self.filter.as_ref())?;
        write_params_mapping(w, &self.index_id_params_mapping)?;
        w.write_i32(self.count);
        w.write_optional(self.index_condition.as_ref())?;
        if version >= 2 {
            w.write_u8(self.domain_type.as_u8());
        }
        Ok(())
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, version: u16) -> CodecResult<Self> {
        let mut query = Self {
            index_id_list: read_index_ids(r)?,
            item_ids: read_byte_list(r, "item_ids")?,
            target_index_name: r.read_string("target_index_name")?,
            exclude_data: r.read_bool()?,
            get_index_header: r.read_bool()?,
            primary_id_list: read_primary_ids(r)?,
            filter: read_filter(r)?,
            index_id_params_mapping: read_params_mapping(r)?,
            count: r.read_i32()?,
            index_condition: r.read_optional()?,
            ..Self::default()
        };
        if version >= 2 {
            query.domain_type = read_domain_type(r)?;
        }
        Ok(query)
    }
}
