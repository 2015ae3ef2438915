//! Inclusive range bounds over an index's sort key.

use super::{Condition, Operation};
use crate::compare::compare_typed;
use crate::header::MetadataPropertyCollection;
use crate::types::{DataType, SortBy, SortOrder};
use ixcache_codec::{CodecResult, PrimitiveReader, PrimitiveWriter, VersionSerializable};
use std::cmp::Ordering;
use tracing::debug;

/// Inclusive max and min bounds on the sort key.
///
/// Each bound is either a literal value or the name of a metadata property
/// whose current value in the index header supplies the bound. A literal
/// takes precedence when both are set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexCondition {
    /// Literal inclusive maximum; empty when unset.
    pub inclusive_max_value: Vec<u8>,
    /// Literal inclusive minimum; empty when unset.
    pub inclusive_min_value: Vec<u8>,
    /// Metadata property supplying the maximum.
    pub inclusive_max_metadata_property: String,
    /// Type of the maximum property value.
    pub inclusive_max_metadata_data_type: DataType,
    /// Metadata property supplying the minimum.
    pub inclusive_min_metadata_property: String,
    /// Type of the minimum property value.
    pub inclusive_min_metadata_data_type: DataType,
}

impl IndexCondition {
    /// Condition with literal bounds.
    #[must_use]
    pub fn with_bounds(max: Option<Vec<u8>>, min: Option<Vec<u8>>) -> Self {
        Self {
            inclusive_max_value: max.unwrap_or_default(),
            inclusive_min_value: min.unwrap_or_default(),
            ..Self::default()
        }
    }

    /// Takes the maximum from a metadata property.
    #[must_use]
    pub fn with_max_property(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.inclusive_max_metadata_property = name.into();
        self.inclusive_max_metadata_data_type = data_type;
        self
    }

    /// Takes the minimum from a metadata property.
    #[must_use]
    pub fn with_min_property(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.inclusive_min_metadata_property = name.into();
        self.inclusive_min_metadata_data_type = data_type;
        self
    }

    /// Returns true if neither bound is set in any form.
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.inclusive_max_value.is_empty()
            && self.inclusive_min_value.is_empty()
            && self.inclusive_max_metadata_property.is_empty()
            && self.inclusive_min_metadata_property.is_empty()
    }

    /// Derives the scan's enter and exit conditions.
    ///
    /// For a descending index a forward scan meets the maximum first, so
    /// enter is the max bound and exit the min bound; ascending swaps them.
    /// Property-backed bounds are resolved against `properties`; a property
    /// that is absent drops its bound.
    ///
    /// Callers pass the leading sort order of the index. Later segments of
    /// a multi-segment sort never narrow the scan bounds; entries tied on
    /// the leading segment are all scanned.
    #[must_use]
    pub fn create_conditions(
        &self,
        field_name: &str,
        is_tag: bool,
        sort_order: SortOrder,
        properties: &MetadataPropertyCollection,
    ) -> (Option<Condition>, Option<Condition>) {
        let max = resolve_bound(
            &self.inclusive_max_value,
            &self.inclusive_max_metadata_property,
            self.inclusive_max_metadata_data_type,
            sort_order.data_type,
            properties,
        )
        .map(|(value, dt)| Condition::new(field_name, is_tag, Operation::LessThanEquals, value, dt));
        let min = resolve_bound(
            &self.inclusive_min_value,
            &self.inclusive_min_metadata_property,
            self.inclusive_min_metadata_data_type,
            sort_order.data_type,
            properties,
        )
        .map(|(value, dt)| {
            Condition::new(field_name, is_tag, Operation::GreaterThanEquals, value, dt)
        });
        match sort_order.sort_by {
            SortBy::Desc => (max, min),
            SortBy::Asc => (min, max),
        }
    }

    /// Narrows the far bound to `boundary`, the sort key of the last item a
    /// full merge buffer will keep. Entries beyond it can no longer enter
    /// the merged result. A literal bound that is already tighter is kept.
    pub fn tighten(&mut self, sort_order: SortOrder, boundary: &[u8]) {
        let dt = sort_order.data_type;
        match sort_order.sort_by {
            SortBy::Desc => {
                let keep = !self.inclusive_min_value.is_empty()
                    && compare_typed(&self.inclusive_min_value, boundary, dt) == Ordering::Greater;
                if !keep {
                    self.inclusive_min_value = boundary.to_vec();
                    self.inclusive_min_metadata_property.clear();
                }
            }
            SortBy::Asc => {
                let keep = !self.inclusive_max_value.is_empty()
                    && compare_typed(&self.inclusive_max_value, boundary, dt) == Ordering::Less;
                if !keep {
                    self.inclusive_max_value = boundary.to_vec();
                    self.inclusive_max_metadata_property.clear();
                }
            }
        }
    }
}

fn resolve_bound(
    literal: &[u8],
    property: &str,
    property_type: DataType,
    sort_type: DataType,
    properties: &MetadataPropertyCollection,
) -> Option<(Vec<u8>, DataType)> {
    if !literal.is_empty() {
        return Some((literal.to_vec(), sort_type));
    }
    if property.is_empty() {
        return None;
    }
    match properties.get(property) {
        Some(value) => Some((value.to_vec(), property_type)),
        None => {
            debug!(property, "metadata property bound absent, bound dropped");
            None
        }
    }
}

impl VersionSerializable for IndexCondition {
    const TYPE_NAME: &'static str = "IndexCondition";
    const CURRENT_VERSION: u16 = 2;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, version: u16) -> CodecResult<()> {
        w.write_bytes_u16("inclusive_max_value", &self.inclusive_max_value)?;
        w.write_bytes_u16("inclusive_min_value", &self.inclusive_min_value)?;
        if version >= 2 {
            w.write_string(
                "inclusive_max_metadata_property",
                &self.inclusive_max_metadata_property,
            )?;
            w.write_u8(self.inclusive_max_metadata_data_type.as_u8());
            w.write_string(
                "inclusive_min_metadata_property",
                &self.inclusive_min_metadata_property,
            )?;
            w.write_u8(self.inclusive_min_metadata_data_type.as_u8());
        }
        Ok(())
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, version: u16) -> CodecResult<Self> {
        let mut condition = Self {
            inclusive_max_value: r.read_bytes_u16()?,
            inclusive_min_value: r.read_bytes_u16()?,
            ..Self::default()
        };
        if version >= 2 {
            condition.inclusive_max_metadata_property =
                r.read_string("inclusive_max_metadata_property")?;
            condition.inclusive_max_metadata_data_type = DataType::read(r)?;
            condition.inclusive_min_metadata_property =
                r.read_string("inclusive_min_metadata_property")?;
            condition.inclusive_min_metadata_data_type = DataType::read(r)?;
        }
        Ok(condition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use ixcache_codec::{from_versioned_bytes, to_versioned_bytes};

    fn int(v: i32) -> Vec<u8> {
        v.to_le_bytes().to_vec()
    }

    fn bounds() -> IndexCondition {
        IndexCondition::with_bounds(Some(int(40)), Some(int(20)))
    }

    #[test]
    fn ascending_enters_at_min() {
        let order = SortOrder::new(DataType::Int32, SortBy::Asc);
        let (enter, exit) =
            bounds().create_conditions("score", true, order, &MetadataPropertyCollection::new());
        let enter = enter.unwrap();
        let exit = exit.unwrap();
        assert_eq!(enter.operation, Operation::GreaterThanEquals);
        assert_eq!(enter.value, int(20));
        assert_eq!(exit.operation, Operation::LessThanEquals);
        assert_eq!(exit.value, int(40));
    }

    #[test]
    fn descending_enters_at_max() {
        let order = SortOrder::new(DataType::Int32, SortBy::Desc);
        let (enter, exit) =
            bounds().create_conditions("score", true, order, &MetadataPropertyCollection::new());
        assert_eq!(enter.unwrap().value, int(40));
        assert_eq!(exit.unwrap().value, int(20));
    }

    #[test]
    fn property_bound_resolved_from_header() {
        let mut props = MetadataPropertyCollection::new();
        props.insert("floor", int(15));
        let condition = IndexCondition::default().with_min_property("floor", DataType::Int32);
        let order = SortOrder::new(DataType::Int32, SortBy::Desc);
        let (enter, exit) = condition.create_conditions("score", true, order, &props);
        assert!(enter.is_none());
        let exit = exit.unwrap();
        assert_eq!(exit.value, int(15));
        assert_eq!(exit.operation, Operation::GreaterThanEquals);
    }

    #[test]
    fn literal_beats_property() {
        let mut props = MetadataPropertyCollection::new();
        props.insert("ceiling", int(99));
        let condition = IndexCondition::with_bounds(Some(int(50)), None)
            .with_max_property("ceiling", DataType::Int32);
        let order = SortOrder::new(DataType::Int32, SortBy::Desc);
        let (enter, _) = condition.create_conditions("score", true, order, &props);
        assert_eq!(enter.unwrap().value, int(50));
    }

    #[test]
    fn missing_property_drops_bound() {
        let condition = IndexCondition::default().with_max_property("gone", DataType::Int32);
        let order = SortOrder::new(DataType::Int32, SortBy::Asc);
        let (enter, exit) = condition.create_conditions(
            "score",
            true,
            order,
            &MetadataPropertyCollection::new(),
        );
        assert!(enter.is_none());
        assert!(exit.is_none());
    }

    #[test]
    fn bounds_follow_the_leading_segment_only() {
        let sort = crate::PrimarySortInfo::by_tag(
            "score",
            vec![
                SortOrder::new(DataType::Int32, SortBy::Desc),
                SortOrder::new(DataType::Int16, SortBy::Asc),
            ],
        );
        let (enter, exit) = bounds().create_conditions(
            &sort.field_name,
            sort.is_tag,
            sort.leading_order(),
            &MetadataPropertyCollection::new(),
        );
        let enter = enter.unwrap();
        let exit = exit.unwrap();
        assert_eq!(enter.value, int(40));
        assert_eq!(exit.value, int(20));
        assert_eq!(enter.data_type, DataType::Int32);
        assert_eq!(exit.data_type, DataType::Int32);
    }

    #[test]
    fn tighten_descending_raises_min() {
        let mut condition = IndexCondition::default();
        let order = SortOrder::new(DataType::Int32, SortBy::Desc);
        condition.tighten(order, &int(30));
        assert_eq!(condition.inclusive_min_value, int(30));
        condition.tighten(order, &int(10));
        assert_eq!(condition.inclusive_min_value, int(30));
    }

    #[test]
    fn tighten_ascending_lowers_max() {
        let mut condition = IndexCondition::with_bounds(Some(int(100)), None);
        let order = SortOrder::new(DataType::Int32, SortBy::Asc);
        condition.tighten(order, &int(60));
        assert_eq!(condition.inclusive_max_value, int(60));
    }

    #[test]
    fn roundtrip_both_versions() {
        let condition = bounds().with_max_property("p", DataType::Int64);
        let bytes = to_versioned_bytes(&condition).unwrap();
        assert_eq!(from_versioned_bytes::<IndexCondition>(&bytes).unwrap(), condition);

        let mut buf = BytesMut::new();
        PrimitiveWriter::new(&mut buf)
            .write_nested_as(&condition, 1)
            .unwrap();
        let v1: IndexCondition = from_versioned_bytes(&buf).unwrap();
        assert_eq!(v1, bounds());
    }
}
