//! Conditions, filters, range bounds and caps.

mod cap;
mod filter;
mod index_condition;

pub use cap::{CapCondition, CapTracker, FilterCap};
pub use filter::{read_filter, write_filter, Filter, MAX_FILTER_DEPTH};
pub use index_condition::IndexCondition;

use crate::compare::compare_typed;
use crate::item::FieldSource;
use crate::types::DataType;
use ixcache_codec::{CodecError, CodecResult, PrimitiveReader, PrimitiveWriter, VersionSerializable};
use std::cmp::Ordering;

/// Comparison operator of a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Operation {
    /// Field equals the value.
    Equals = 0,
    /// Field differs from the value.
    NotEquals = 1,
    /// Field is greater than the value.
    GreaterThan = 2,
    /// Field is greater than or equal to the value.
    GreaterThanEquals = 3,
    /// Field is less than the value.
    LessThan = 4,
    /// Field is less than or equal to the value.
    LessThanEquals = 5,
    /// Field and value share a set bit.
    BitwiseAnd = 6,
}

impl Operation {
    /// Decodes a wire byte.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Equals,
            1 => Self::NotEquals,
            2 => Self::GreaterThan,
            3 => Self::GreaterThanEquals,
            4 => Self::LessThan,
            5 => Self::LessThanEquals,
            6 => Self::BitwiseAnd,
            _ => return None,
        })
    }
}

/// A single comparison of one field against a bound value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    /// Tag name, or the item identifier when `is_tag` is false.
    pub field_name: String,
    /// Whether `field_name` names a tag.
    pub is_tag: bool,
    /// Operator.
    pub operation: Operation,
    /// Encoded bound.
    pub value: Vec<u8>,
    /// Type used to compare field and bound.
    pub data_type: DataType,
}

impl Condition {
    /// Creates a condition.
    #[must_use]
    pub fn new(
        field_name: impl Into<String>,
        is_tag: bool,
        operation: Operation,
        value: impl Into<Vec<u8>>,
        data_type: DataType,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            is_tag,
            operation,
            value: value.into(),
            data_type,
        }
    }

    /// Evaluates the condition against an item. A missing field fails every
    /// operator except [`Operation::NotEquals`].
    pub fn process<T: FieldSource>(&self, item: &T) -> bool {
        let Some(field) = item.field(&self.field_name, self.is_tag) else {
            return self.operation == Operation::NotEquals;
        };
        if self.operation == Operation::BitwiseAnd {
            return field
                .iter()
                .zip(self.value.iter())
                .any(|(a, b)| a & b != 0);
        }
        let ord = compare_typed(field, &self.value, self.data_type);
        match self.operation {
            Operation::Equals => ord == Ordering::Equal,
            Operation::NotEquals => ord != Ordering::Equal,
            Operation::GreaterThan => ord == Ordering::Greater,
            Operation::GreaterThanEquals => ord != Ordering::Less,
            Operation::LessThan => ord == Ordering::Less,
            Operation::LessThanEquals => ord != Ordering::Greater,
            Operation::BitwiseAnd => false,
        }
    }
}

impl VersionSerializable for Condition {
    const TYPE_NAME: &'static str = "Condition";
    const CURRENT_VERSION: u16 = 1;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, _version: u16) -> CodecResult<()> {
        w.write_string("field_name", &self.field_name)?;
        w.write_bool(self.is_tag);
        w.write_u8(self.operation as u8);
        w.write_bytes_u16("value", &self.value)?;
        w.write_u8(self.data_type.as_u8());
        Ok(())
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, _version: u16) -> CodecResult<Self> {
        let field_name = r.read_string("field_name")?;
        let is_tag = r.read_bool()?;
        let raw = r.read_u8()?;
        let operation = Operation::from_u8(raw)
            .ok_or_else(|| CodecError::malformed(format!("unknown operation {raw}")))?;
        let value = r.read_bytes_u16()?;
        let data_type = DataType::read(r)?;
        Ok(Self {
            field_name,
            is_tag,
            operation,
            value,
            data_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::IndexItem;
    use ixcache_codec::{from_versioned_bytes, to_versioned_bytes};

    fn scored(score: i32) -> IndexItem {
        IndexItem::new(b"id".to_vec()).with_tag("score", score.to_le_bytes().to_vec())
    }

    fn cond(op: Operation, v: i32) -> Condition {
        Condition::new("score", true, op, v.to_le_bytes().to_vec(), DataType::Int32)
    }

    #[test]
    fn operators() {
        let item = scored(10);
        assert!(cond(Operation::Equals, 10).process(&item));
        assert!(!cond(Operation::NotEquals, 10).process(&item));
        assert!(cond(Operation::GreaterThan, 9).process(&item));
        assert!(cond(Operation::GreaterThanEquals, 10).process(&item));
        assert!(cond(Operation::LessThan, 11).process(&item));
        assert!(cond(Operation::LessThanEquals, 10).process(&item));
        assert!(!cond(Operation::LessThan, -3).process(&item));
    }

    #[test]
    fn bitwise_and() {
        let flags = IndexItem::new(b"id".to_vec()).with_tag("flags", vec![0b0101]);
        let c = |mask: u8| Condition::new("flags", true, Operation::BitwiseAnd, vec![mask], DataType::Byte);
        assert!(c(0b0100).process(&flags));
        assert!(!c(0b1010).process(&flags));
    }

    #[test]
    fn missing_field() {
        let item = IndexItem::new(b"id".to_vec());
        assert!(!cond(Operation::Equals, 1).process(&item));
        assert!(cond(Operation::NotEquals, 1).process(&item));
    }

    #[test]
    fn condition_roundtrip() {
        let c = cond(Operation::GreaterThanEquals, 77);
        let bytes = to_versioned_bytes(&c).unwrap();
        assert_eq!(from_versioned_bytes::<Condition>(&bytes).unwrap(), c);
    }
}
