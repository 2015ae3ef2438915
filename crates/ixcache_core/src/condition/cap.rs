//! Per-value admission caps.

use super::{read_filter, write_filter, Filter};
use crate::item::FieldSource;
use ixcache_codec::{CodecResult, PrimitiveReader, PrimitiveWriter, VersionSerializable};
use std::collections::BTreeMap;

/// Cap on how many entries carrying one field value may be admitted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterCap {
    /// Maximum admissions for the value.
    pub cap: i32,
    /// Evaluate the query filter instead of `filter`.
    pub use_parent_filter: bool,
    /// Filter specific to this value.
    pub filter: Option<Filter>,
}

impl FilterCap {
    /// Cap evaluated under the query filter.
    #[must_use]
    pub fn new(cap: i32) -> Self {
        Self {
            cap,
            use_parent_filter: true,
            filter: None,
        }
    }

    /// Cap evaluated under its own filter.
    #[must_use]
    pub fn with_filter(cap: i32, filter: Filter) -> Self {
        Self {
            cap,
            use_parent_filter: false,
            filter: Some(filter),
        }
    }
}

impl VersionSerializable for FilterCap {
    const TYPE_NAME: &'static str = "FilterCap";
    const CURRENT_VERSION: u16 = 1;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, _version: u16) -> CodecResult<()> {
        w.write_i32(self.cap);
        w.write_bool(self.use_parent_filter);
        write_filter(w, self.filter.as_ref())
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, _version: u16) -> CodecResult<Self> {
        Ok(Self {
            cap: r.read_i32()?,
            use_parent_filter: r.read_bool()?,
            filter: read_filter(r)?,
        })
    }
}

/// Limits admissions per value of one field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CapCondition {
    /// Field whose value selects the cap.
    pub field_name: String,
    /// Caps keyed by field value.
    pub filter_caps: BTreeMap<Vec<u8>, FilterCap>,
    /// Reject entries whose value has no cap.
    pub ignore_non_capped_items: bool,
}

impl CapCondition {
    /// Creates a condition with no caps.
    #[must_use]
    pub fn new(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            ..Self::default()
        }
    }

    /// Adds a cap for one value.
    #[must_use]
    pub fn with_cap(mut self, value: impl Into<Vec<u8>>, cap: FilterCap) -> Self {
        self.filter_caps.insert(value.into(), cap);
        self
    }

    /// Starts per-scan admission accounting.
    #[must_use]
    pub fn tracker(&self) -> CapTracker<'_> {
        CapTracker {
            condition: self,
            remaining: self
                .filter_caps
                .iter()
                .map(|(value, cap)| (value.as_slice(), cap.cap))
                .collect(),
        }
    }
}

impl VersionSerializable for CapCondition {
    const TYPE_NAME: &'static str = "CapCondition";
    const CURRENT_VERSION: u16 = 2;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, version: u16) -> CodecResult<()> {
        w.write_string("field_name", &self.field_name)?;
        w.write_count_u16("filter_caps", self.filter_caps.len())?;
        for (value, cap) in &self.filter_caps {
            w.write_bytes_u16("cap_value", value)?;
            w.write_nested(cap)?;
        }
        if version >= 2 {
            w.write_bool(self.ignore_non_capped_items);
        }
        Ok(())
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, version: u16) -> CodecResult<Self> {
        let field_name = r.read_string("field_name")?;
        let count = r.read_count_u16()?;
        let mut filter_caps = BTreeMap::new();
        for _ in 0..count {
            let value = r.read_bytes_u16()?;
            filter_caps.insert(value, r.read_nested()?);
        }
        let ignore_non_capped_items = if version >= 2 { r.read_bool()? } else { false };
        Ok(Self {
            field_name,
            filter_caps,
            ignore_non_capped_items,
        })
    }
}

/// Remaining admissions for one scan of a [`CapCondition`].
#[derive(Debug)]
pub struct CapTracker<'a> {
    condition: &'a CapCondition,
    remaining: BTreeMap<&'a [u8], i32>,
}

impl CapTracker<'_> {
    /// Decides whether `item` is admitted, consuming one admission of its
    /// value's cap when it is.
    pub fn admit<T: FieldSource>(&mut self, item: &T, parent_filter: Option<&Filter>) -> bool {
        let passes = |filter: Option<&Filter>| filter.map_or(true, |f| f.process(item));
        let value = item.named_field(&self.condition.field_name);
        let cap = value.and_then(|v| {
            self.condition
                .filter_caps
                .get_key_value(v)
                .map(|(key, cap)| (key.as_slice(), cap))
        });
        let Some((key, cap)) = cap else {
            return !self.condition.ignore_non_capped_items && passes(parent_filter);
        };
        let Some(left) = self.remaining.get_mut(key) else {
            return false;
        };
        if *left <= 0 {
            return false;
        }
        let filter = if cap.use_parent_filter || cap.filter.is_none() {
            parent_filter
        } else {
            cap.filter.as_ref()
        };
        if !passes(filter) {
            return false;
        }
        *left -= 1;
        true
    }

    /// Remaining admissions for `value`, if it is capped.
    #[must_use]
    pub fn remaining(&self, value: &[u8]) -> Option<i32> {
        self.remaining.get(value).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Condition, Operation};
    use crate::item::IndexItem;
    use crate::types::DataType;
    use bytes::BytesMut;
    use ixcache_codec::{from_versioned_bytes, to_versioned_bytes};

    fn item(id: &str, kind: &[u8], score: u8) -> IndexItem {
        IndexItem::new(id.as_bytes().to_vec())
            .with_tag("kind", kind.to_vec())
            .with_tag("score", vec![score])
    }

    fn high_score() -> Filter {
        Condition::new("score", true, Operation::GreaterThan, vec![5], DataType::Byte).into()
    }

    #[test]
    fn cap_limits_admissions() {
        let cap = CapCondition::new("kind").with_cap(b"photo".to_vec(), FilterCap::new(2));
        let mut tracker = cap.tracker();
        assert!(tracker.admit(&item("a", b"photo", 1), None));
        assert!(tracker.admit(&item("b", b"photo", 1), None));
        assert!(!tracker.admit(&item("c", b"photo", 1), None));
        assert_eq!(tracker.remaining(b"photo"), Some(0));
        assert!(tracker.admit(&item("d", b"video", 1), None));
    }

    #[test]
    fn rejected_by_filter_does_not_consume() {
        let cap = CapCondition::new("kind").with_cap(b"photo".to_vec(), FilterCap::new(1));
        let mut tracker = cap.tracker();
        let filter = high_score();
        assert!(!tracker.admit(&item("a", b"photo", 1), Some(&filter)));
        assert_eq!(tracker.remaining(b"photo"), Some(1));
        assert!(tracker.admit(&item("b", b"photo", 9), Some(&filter)));
    }

    #[test]
    fn own_filter_replaces_parent() {
        let cap = CapCondition::new("kind")
            .with_cap(b"photo".to_vec(), FilterCap::with_filter(5, high_score()));
        let mut tracker = cap.tracker();
        let reject_all: Filter =
            Condition::new("score", true, Operation::Equals, vec![200], DataType::Byte).into();
        assert!(tracker.admit(&item("a", b"photo", 9), Some(&reject_all)));
        assert!(!tracker.admit(&item("b", b"photo", 1), Some(&reject_all)));
        assert!(!tracker.admit(&item("c", b"video", 9), Some(&reject_all)));
    }

    #[test]
    fn ignore_non_capped() {
        let mut cap = CapCondition::new("kind").with_cap(b"photo".to_vec(), FilterCap::new(1));
        cap.ignore_non_capped_items = true;
        let mut tracker = cap.tracker();
        assert!(!tracker.admit(&item("a", b"video", 1), None));
        assert!(!tracker.admit(&IndexItem::new(b"b".to_vec()), None));
        assert!(tracker.admit(&item("c", b"photo", 1), None));
    }

    #[test]
    fn roundtrip_and_v1_default() {
        let mut cap = CapCondition::new("kind")
            .with_cap(b"photo".to_vec(), FilterCap::with_filter(3, high_score()))
            .with_cap(b"video".to_vec(), FilterCap::new(1));
        cap.ignore_non_capped_items = true;
        let bytes = to_versioned_bytes(&cap).unwrap();
        assert_eq!(from_versioned_bytes::<CapCondition>(&bytes).unwrap(), cap);

        let mut buf = BytesMut::new();
        PrimitiveWriter::new(&mut buf).write_nested_as(&cap, 1).unwrap();
        let v1: CapCondition = from_versioned_bytes(&buf).unwrap();
        assert!(!v1.ignore_non_capped_items);
        assert_eq!(v1.filter_caps, cap.filter_caps);
    }
}
