//! Predicate trees.

use super::Condition;
use crate::item::FieldSource;
use ixcache_codec::{CodecError, CodecResult, PrimitiveReader, PrimitiveWriter};

/// Deepest nesting accepted when decoding a filter.
pub const MAX_FILTER_DEPTH: usize = 32;

const TYPE_NONE: u8 = 0;
const TYPE_CONDITION: u8 = 1;
const TYPE_AND: u8 = 2;
const TYPE_OR: u8 = 3;

/// A predicate tree evaluated per entry during a scan.
///
/// An empty `And` or `Or` group imposes no constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// A single comparison.
    Condition(Condition),
    /// Every child must pass.
    And(Vec<Filter>),
    /// At least one child must pass.
    Or(Vec<Filter>),
}

impl Filter {
    /// Evaluates the filter.
    pub fn process<T: FieldSource>(&self, item: &T) -> bool {
        match self {
            Self::Condition(c) => c.process(item),
            Self::And(children) => children.iter().all(|f| f.process(item)),
            Self::Or(children) => children.is_empty() || children.iter().any(|f| f.process(item)),
        }
    }

    /// Nesting depth; a lone condition has depth 1.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Condition(_) => 1,
            Self::And(children) | Self::Or(children) => {
                1 + children.iter().map(Filter::depth).max().unwrap_or(0)
            }
        }
    }

    fn write(&self, w: &mut PrimitiveWriter<'_>) -> CodecResult<()> {
        match self {
            Self::Condition(c) => {
                w.write_u8(TYPE_CONDITION);
                w.write_nested(c)
            }
            Self::And(children) | Self::Or(children) => {
                w.write_u8(if matches!(self, Self::And(_)) {
                    TYPE_AND
                } else {
                    TYPE_OR
                });
                w.write_count_u16("filters", children.len())?;
                children.iter().try_for_each(|child| child.write(w))
            }
        }
    }

    fn read(r: &mut PrimitiveReader<'_>, type_byte: u8, depth: usize) -> CodecResult<Self> {
        if depth > MAX_FILTER_DEPTH {
            return Err(CodecError::malformed(format!(
                "filter nesting exceeds {MAX_FILTER_DEPTH}"
            )));
        }
        match type_byte {
            TYPE_CONDITION => Ok(Self::Condition(r.read_nested()?)),
            TYPE_AND | TYPE_OR => {
                let count = r.read_count_u16()?;
                let mut children = Vec::with_capacity(r.capacity_hint(count, 1));
                for _ in 0..count {
                    let child_type = r.read_u8()?;
                    children.push(Self::read(r, child_type, depth + 1)?);
                }
                Ok(if type_byte == TYPE_AND {
                    Self::And(children)
                } else {
                    Self::Or(children)
                })
            }
            other => Err(CodecError::malformed(format!("unknown filter type {other}"))),
        }
    }
}

impl From<Condition> for Filter {
    fn from(c: Condition) -> Self {
        Self::Condition(c)
    }
}

/// Write an optional filter as a type byte (0 for none) and its body.
pub fn write_filter(w: &mut PrimitiveWriter<'_>, filter: Option<&Filter>) -> CodecResult<()> {
    match filter {
        Some(f) => f.write(w),
        None => {
            w.write_u8(TYPE_NONE);
            Ok(())
        }
    }
}

/// Read an optional filter written by [`write_filter`].
pub fn read_filter(r: &mut PrimitiveReader<'_>) -> CodecResult<Option<Filter>> {
    match r.read_u8()? {
        TYPE_NONE => Ok(None),
        type_byte => Filter::read(r, type_byte, 1).map(Some),
    }
}
