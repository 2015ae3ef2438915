//! Typed key comparison.

use crate::item::{FieldSource, ResultItem};
use crate::types::{DataType, PrimarySortInfo, SortBy, SortOrder, TagSort};
use std::cmp::Ordering;

fn fixed<const N: usize>(bytes: &[u8]) -> Option<[u8; N]> {
    bytes.get(..N)?.try_into().ok()
}

/// Compares two encoded values of `data_type` in ascending order.
///
/// A value shorter than its type's width is treated as missing and sorts
/// below any present value. Floats use IEEE total ordering.
#[must_use]
pub fn compare_typed(a: &[u8], b: &[u8], data_type: DataType) -> Ordering {
    macro_rules! typed {
        ($ty:ty, $n:literal) => {
            match (fixed::<$n>(a), fixed::<$n>(b)) {
                (Some(x), Some(y)) => <$ty>::from_le_bytes(x).cmp(&<$ty>::from_le_bytes(y)),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => a.cmp(b),
            }
        };
    }
    match data_type {
        DataType::Byte => typed!(u8, 1),
        DataType::UInt16 => typed!(u16, 2),
        DataType::Int16 => typed!(i16, 2),
        DataType::UInt32 => typed!(u32, 4),
        DataType::Int32 | DataType::SmallDateTime => typed!(i32, 4),
        DataType::UInt64 => typed!(u64, 8),
        DataType::Int64 | DataType::DateTime => typed!(i64, 8),
        DataType::Float => match (fixed::<4>(a), fixed::<4>(b)) {
            (Some(x), Some(y)) => f32::from_le_bytes(x).total_cmp(&f32::from_le_bytes(y)),
            (x, y) => x.is_some().cmp(&y.is_some()).then_with(|| a.cmp(b)),
        },
        DataType::Double => match (fixed::<8>(a), fixed::<8>(b)) {
            (Some(x), Some(y)) => f64::from_le_bytes(x).total_cmp(&f64::from_le_bytes(y)),
            (x, y) => x.is_some().cmp(&y.is_some()).then_with(|| a.cmp(b)),
        },
        DataType::String => a.cmp(b),
    }
}

/// Compares two composite keys segment by segment.
///
/// Each [`SortOrder`] consumes its type's width from both keys; a string
/// segment consumes the remainder and ends the walk. Descending segments
/// reverse their comparison. With no sort orders the keys compare as raw
/// bytes.
#[must_use]
pub fn compare_keys(a: &[u8], b: &[u8], orders: &[SortOrder]) -> Ordering {
    if orders.is_empty() {
        return a.cmp(b);
    }
    let mut offset = 0usize;
    for order in orders {
        let width = order.data_type.fixed_width();
        let (sa, sb) = match width {
            Some(w) => (segment(a, offset, w), segment(b, offset, w)),
            None => (a.get(offset..).unwrap_or(&[]), b.get(offset..).unwrap_or(&[])),
        };
        let ord = compare_typed(sa, sb, order.data_type);
        let ord = match order.sort_by {
            SortBy::Asc => ord,
            SortBy::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
        match width {
            Some(w) => offset += w,
            None => break,
        }
    }
    Ordering::Equal
}

fn segment(bytes: &[u8], offset: usize, width: usize) -> &[u8] {
    let start = offset.min(bytes.len());
    let end = offset.saturating_add(width).min(bytes.len());
    &bytes[start..end]
}

/// Orders items by one field under a list of sort orders.
///
/// `compare` gives index order: the item that belongs earlier in the index
/// compares less. Items missing the field sort first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemComparer {
    /// Field compared.
    pub field_name: String,
    /// Whether the field is a tag.
    pub is_tag: bool,
    /// Key layout.
    pub sort_orders: Vec<SortOrder>,
}

impl ItemComparer {
    /// Creates a comparer.
    #[must_use]
    pub fn new(field_name: impl Into<String>, is_tag: bool, sort_orders: Vec<SortOrder>) -> Self {
        Self {
            field_name: field_name.into(),
            is_tag,
            sort_orders,
        }
    }

    /// Sort key of `item`.
    pub fn sort_key<'a, T: FieldSource>(&self, item: &'a T) -> Option<&'a [u8]> {
        item.field(&self.field_name, self.is_tag)
    }

    /// Index-order comparison.
    pub fn compare<T: FieldSource>(&self, a: &T, b: &T) -> Ordering {
        match (self.sort_key(a), self.sort_key(b)) {
            (Some(x), Some(y)) => compare_keys(x, y, &self.sort_orders),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }

    /// Index-order comparison made total by falling back to index id and
    /// item id, so that merges are deterministic functions of their input.
    #[must_use]
    pub fn compare_total(&self, a: &ResultItem, b: &ResultItem) -> Ordering {
        self.compare(a, b)
            .then_with(|| a.index_id.cmp(&b.index_id))
            .then_with(|| a.item.item_id.cmp(&b.item.item_id))
    }

    /// Descriptor for the wire.
    #[must_use]
    pub fn to_sort_info(&self) -> PrimarySortInfo {
        PrimarySortInfo {
            field_name: self.field_name.clone(),
            is_tag: self.is_tag,
            sort_orders: self.sort_orders.clone(),
        }
    }
}

impl From<&PrimarySortInfo> for ItemComparer {
    fn from(info: &PrimarySortInfo) -> Self {
        Self::new(info.field_name.clone(), info.is_tag, info.sort_orders.clone())
    }
}

impl From<&TagSort> for ItemComparer {
    fn from(sort: &TagSort) -> Self {
        Self::new(sort.tag_name.clone(), sort.is_tag, vec![sort.sort_order])
    }
}
