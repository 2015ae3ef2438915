//! Core type definitions for IXCache.

use ixcache_codec::{CodecError, CodecResult, PrimitiveReader, PrimitiveWriter, VersionSerializable};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name that always resolves to an item's identifier rather than a tag.
pub const ITEM_ID_FIELD: &str = "ItemId";

/// Opaque identifier of one index instance.
///
/// Every IndexId maps to exactly one [`primary_id`], which decides the
/// cluster that owns the index.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexId(Vec<u8>);

impl IndexId {
    /// Creates an IndexId from raw bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Returns the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the id, returning its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Returns true for the empty id.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sharding hash of this id.
    #[must_use]
    pub fn primary_id(&self) -> i32 {
        primary_id(&self.0)
    }

    /// Lowercase hex rendering, used in logs and error text.
    #[must_use]
    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }

    /// Write with a `u16` length prefix.
    pub fn write(&self, w: &mut PrimitiveWriter<'_>) -> CodecResult<()> {
        w.write_bytes_u16("index_id", &self.0)
    }

    /// Read a `u16`-prefixed id.
    pub fn read(r: &mut PrimitiveReader<'_>) -> CodecResult<Self> {
        r.read_bytes_u16().map(Self)
    }
}

impl From<Vec<u8>> for IndexId {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for IndexId {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<i32> for IndexId {
    /// Little-endian encoding of an integer id, the common case for
    /// member-keyed indexes.
    fn from(id: i32) -> Self {
        Self(id.to_le_bytes().to_vec())
    }
}

impl AsRef<[u8]> for IndexId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Derives the sharding hash from IndexId bytes.
///
/// Empty ids hash to 1. Ids of four or more bytes use the absolute value
/// of their leading little-endian `i32`; shorter ids use their first byte.
#[must_use]
pub fn primary_id(bytes: &[u8]) -> i32 {
    match bytes {
        [] => 1,
        [a, b, c, d, ..] => {
            let raw = i32::from_le_bytes([*a, *b, *c, *d]);
            i32::try_from(raw.unsigned_abs()).unwrap_or(i32::MAX)
        }
        [first, ..] => i32::from(*first),
    }
}

/// Lowercase hex rendering of arbitrary bytes.
#[must_use]
pub fn to_hex(bytes: &[u8]) -> String {
    use fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Parses lowercase or uppercase hex. Returns `None` on odd length or bad digits.
#[must_use]
pub fn from_hex(text: &str) -> Option<Vec<u8>> {
    let text = text.trim();
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(text.get(i..i + 2)?, 16).ok())
        .collect()
}

/// Value type of a sort key segment or condition operand.
///
/// Fixed-width types are little-endian. `String` is UTF-8 and consumes the
/// rest of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum DataType {
    /// Unsigned 16-bit integer.
    UInt16 = 0,
    /// Signed 16-bit integer.
    Int16 = 1,
    /// Unsigned 32-bit integer.
    UInt32 = 2,
    /// Signed 32-bit integer.
    #[default]
    Int32 = 3,
    /// Minute-resolution timestamp stored as `i32`.
    SmallDateTime = 4,
    /// Unsigned 64-bit integer.
    UInt64 = 5,
    /// Signed 64-bit integer.
    Int64 = 6,
    /// Tick timestamp stored as `i64`.
    DateTime = 7,
    /// UTF-8 text.
    String = 8,
    /// Single byte.
    Byte = 9,
    /// 32-bit float.
    Float = 10,
    /// 64-bit float.
    Double = 11,
}

impl DataType {
    /// Decodes a wire byte.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::UInt16,
            1 => Self::Int16,
            2 => Self::UInt32,
            3 => Self::Int32,
            4 => Self::SmallDateTime,
            5 => Self::UInt64,
            6 => Self::Int64,
            7 => Self::DateTime,
            8 => Self::String,
            9 => Self::Byte,
            10 => Self::Float,
            11 => Self::Double,
            _ => return None,
        })
    }

    /// Wire byte.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Bytes consumed in a composite key, `None` for the variable-width
    /// string type.
    #[must_use]
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            Self::Byte => Some(1),
            Self::UInt16 | Self::Int16 => Some(2),
            Self::UInt32 | Self::Int32 | Self::SmallDateTime | Self::Float => Some(4),
            Self::UInt64 | Self::Int64 | Self::DateTime | Self::Double => Some(8),
            Self::String => None,
        }
    }

    pub(crate) fn read(r: &mut PrimitiveReader<'_>) -> CodecResult<Self> {
        let raw = r.read_u8()?;
        Self::from_u8(raw).ok_or_else(|| CodecError::malformed(format!("unknown data type {raw}")))
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum SortBy {
    /// Ascending.
    #[serde(alias = "ASC")]
    Asc = 0,
    /// Descending.
    #[default]
    #[serde(alias = "DESC")]
    Desc = 1,
}

impl SortBy {
    /// Decodes a wire byte.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Asc),
            1 => Some(Self::Desc),
            _ => None,
        }
    }

    /// The opposite direction.
    #[must_use]
    pub fn flip(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// One segment of a sort key: its type and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SortOrder {
    /// Value type of the segment.
    pub data_type: DataType,
    /// Direction of the segment.
    pub sort_by: SortBy,
}

impl SortOrder {
    /// Creates a sort order.
    #[must_use]
    pub const fn new(data_type: DataType, sort_by: SortBy) -> Self {
        Self { data_type, sort_by }
    }
}

impl VersionSerializable for SortOrder {
    const TYPE_NAME: &'static str = "SortOrder";
    const CURRENT_VERSION: u16 = 1;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, _version: u16) -> CodecResult<()> {
        w.write_u8(self.data_type.as_u8());
        w.write_u8(self.sort_by as u8);
        Ok(())
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, _version: u16) -> CodecResult<Self> {
        let data_type = DataType::read(r)?;
        let raw = r.read_u8()?;
        let sort_by = SortBy::from_u8(raw)
            .ok_or_else(|| CodecError::malformed(format!("unknown sort direction {raw}")))?;
        Ok(Self { data_type, sort_by })
    }
}

pub(crate) fn write_sort_orders(w: &mut PrimitiveWriter<'_>, orders: &[SortOrder]) -> CodecResult<()> {
    w.write_count_u8("sort_orders", orders.len())?;
    for order in orders {
        w.write_nested(order)?;
    }
    Ok(())
}

pub(crate) fn read_sort_orders(r: &mut PrimitiveReader<'_>) -> CodecResult<Vec<SortOrder>> {
    let count = r.read_count_u8()?;
    (0..count).map(|_| r.read_nested()).collect()
}

/// The field an index is ordered by and how its key is laid out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimarySortInfo {
    /// Tag name, or [`ITEM_ID_FIELD`] when sorting by identifier.
    pub field_name: String,
    /// Whether `field_name` names a tag.
    #[serde(default)]
    pub is_tag: bool,
    /// Key segments in order.
    pub sort_orders: Vec<SortOrder>,
}

impl PrimarySortInfo {
    /// Sort by a tag.
    #[must_use]
    pub fn by_tag(name: impl Into<String>, sort_orders: Vec<SortOrder>) -> Self {
        Self {
            field_name: name.into(),
            is_tag: true,
            sort_orders,
        }
    }

    /// Sort by item identifier.
    #[must_use]
    pub fn by_item_id(sort_orders: Vec<SortOrder>) -> Self {
        Self {
            field_name: ITEM_ID_FIELD.to_string(),
            is_tag: false,
            sort_orders,
        }
    }

    /// First key segment, or the default order when none is declared.
    #[must_use]
    pub fn leading_order(&self) -> SortOrder {
        self.sort_orders.first().copied().unwrap_or_default()
    }
}

impl Default for PrimarySortInfo {
    fn default() -> Self {
        Self::by_item_id(vec![SortOrder::default()])
    }
}

impl VersionSerializable for PrimarySortInfo {
    const TYPE_NAME: &'static str = "PrimarySortInfo";
    const CURRENT_VERSION: u16 = 1;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, _version: u16) -> CodecResult<()> {
        w.write_bool(self.is_tag);
        w.write_string("field_name", &self.field_name)?;
        write_sort_orders(w, &self.sort_orders)
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, _version: u16) -> CodecResult<Self> {
        Ok(Self {
            is_tag: r.read_bool()?,
            field_name: r.read_string("field_name")?,
            sort_orders: read_sort_orders(r)?,
        })
    }
}

/// Query-level re-sort by a field other than the index's primary sort.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagSort {
    /// Field to sort by.
    pub tag_name: String,
    /// Whether `tag_name` names a tag.
    pub is_tag: bool,
    /// Type and direction.
    pub sort_order: SortOrder,
}

impl TagSort {
    /// Creates a tag sort.
    #[must_use]
    pub fn new(tag_name: impl Into<String>, is_tag: bool, sort_order: SortOrder) -> Self {
        Self {
            tag_name: tag_name.into(),
            is_tag,
            sort_order,
        }
    }

    /// The equivalent primary sort description.
    #[must_use]
    pub fn as_sort_info(&self) -> PrimarySortInfo {
        PrimarySortInfo {
            field_name: self.tag_name.clone(),
            is_tag: self.is_tag,
            sort_orders: vec![self.sort_order],
        }
    }
}

impl VersionSerializable for TagSort {
    const TYPE_NAME: &'static str = "TagSort";
    const CURRENT_VERSION: u16 = 1;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, _version: u16) -> CodecResult<()> {
        w.write_string("tag_name", &self.tag_name)?;
        w.write_bool(self.is_tag);
        w.write_nested(&self.sort_order)
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, _version: u16) -> CodecResult<Self> {
        Ok(Self {
            tag_name: r.read_string("tag_name")?,
            is_tag: r.read_bool()?,
            sort_order: r.read_nested()?,
        })
    }
}

/// Selects pluggable per-domain post-processing on the serving node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DomainSpecificProcessingType {
    /// No domain processing.
    #[default]
    None,
    /// Domain-defined processing identified by a non-zero code.
    Custom(u8),
}

impl DomainSpecificProcessingType {
    /// Decodes a wire byte; zero means none.
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::None,
            code => Self::Custom(code),
        }
    }

    /// Wire byte.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Custom(code) => code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ixcache_codec::{from_versioned_bytes, to_versioned_bytes};

    #[test]
    fn primary_id_of_empty_is_one() {
        assert_eq!(primary_id(&[]), 1);
    }

    #[test]
    fn primary_id_uses_leading_le_int() {
        assert_eq!(primary_id(&7i32.to_le_bytes()), 7);
        assert_eq!(primary_id(&(-7i32).to_le_bytes()), 7);
        let mut long = 300i32.to_le_bytes().to_vec();
        long.extend_from_slice(b"suffix");
        assert_eq!(primary_id(&long), 300);
    }

    #[test]
    fn primary_id_short_uses_first_byte() {
        assert_eq!(primary_id(&[9, 200]), 9);
        assert_eq!(primary_id(&[250]), 250);
    }

    #[test]
    fn primary_id_saturates_min() {
        assert_eq!(primary_id(&i32::MIN.to_le_bytes()), i32::MAX);
    }

    #[test]
    fn hex_roundtrip() {
        let id = IndexId::new(vec![0x00, 0xab, 0x10]);
        assert_eq!(id.to_hex(), "00ab10");
        assert_eq!(from_hex("00AB10").unwrap(), id.as_bytes());
        assert!(from_hex("abc").is_none());
        assert!(from_hex("zz").is_none());
    }

    #[test]
    fn data_type_bytes() {
        for raw in 0..=11u8 {
            assert_eq!(DataType::from_u8(raw).unwrap().as_u8(), raw);
        }
        assert!(DataType::from_u8(12).is_none());
        assert_eq!(DataType::String.fixed_width(), None);
        assert_eq!(DataType::DateTime.fixed_width(), Some(8));
    }

    #[test]
    fn sort_info_roundtrip() {
        let info = PrimarySortInfo::by_tag(
            "score",
            vec![
                SortOrder::new(DataType::Int32, SortBy::Desc),
                SortOrder::new(DataType::String, SortBy::Asc),
            ],
        );
        let bytes = to_versioned_bytes(&info).unwrap();
        assert_eq!(from_versioned_bytes::<PrimarySortInfo>(&bytes).unwrap(), info);
    }

    #[test]
    fn tag_sort_roundtrip() {
        let sort = TagSort::new("age", true, SortOrder::new(DataType::Int16, SortBy::Asc));
        let bytes = to_versioned_bytes(&sort).unwrap();
        assert_eq!(from_versioned_bytes::<TagSort>(&bytes).unwrap(), sort);
    }

    #[test]
    fn bad_sort_direction_is_malformed() {
        let bytes = [1u8, 0, 2, 0, 0, 0, 3, 9];
        assert!(from_versioned_bytes::<SortOrder>(&bytes).is_err());
    }

    #[test]
    fn domain_type_zero_is_none() {
        assert_eq!(
            DomainSpecificProcessingType::from_u8(0),
            DomainSpecificProcessingType::None
        );
        assert_eq!(DomainSpecificProcessingType::from_u8(4).as_u8(), 4);
    }
}
