//! Property-based test generators using proptest.
//!
//! Entries produced here follow the fixture layout: `u32` ids and an
//! `Int32` [`KEY_TAG`] tag.

use crate::fixtures::{keyed_item, KEY_TAG};
use ixcache_core::{Condition, DataType, Filter, IndexCondition, IndexId, IndexItem, Operation};
use ixcache_protocol::PagedIndexQuery;
use proptest::prelude::*;

/// Strategy for index ids.
pub fn index_id_strategy() -> impl Strategy<Value = IndexId> {
    any::<i32>().prop_map(IndexId::from)
}

/// Strategy for sort keys. The range is narrow so ties occur.
pub fn key_strategy() -> impl Strategy<Value = i32> {
    -100..100i32
}

/// Strategy for up to `max` entries with distinct ids.
pub fn keyed_items_strategy(max: usize) -> impl Strategy<Value = Vec<IndexItem>> {
    prop::collection::btree_map(1u32..10_000, key_strategy(), 0..max)
        .prop_map(|entries| entries.into_iter().map(|(id, key)| keyed_item(id, key)).collect())
}

/// Strategy for comparison operators.
pub fn operation_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        Just(Operation::Equals),
        Just(Operation::NotEquals),
        Just(Operation::GreaterThan),
        Just(Operation::GreaterThanEquals),
        Just(Operation::LessThan),
        Just(Operation::LessThanEquals),
        Just(Operation::BitwiseAnd),
    ]
}

/// Strategy for conditions on the key tag.
pub fn key_condition_strategy() -> impl Strategy<Value = Condition> {
    (operation_strategy(), key_strategy()).prop_map(|(operation, bound)| {
        Condition::new(KEY_TAG, true, operation, bound.to_le_bytes().to_vec(), DataType::Int32)
    })
}

/// Strategy for filter trees up to four levels deep, empty groups
/// included.
pub fn filter_strategy() -> impl Strategy<Value = Filter> {
    let leaf = key_condition_strategy().prop_map(Filter::Condition);
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Filter::And),
            prop::collection::vec(inner, 0..4).prop_map(Filter::Or),
        ]
    })
}

/// Evaluates `filter` against an entry whose key is `key` without going
/// through the byte comparators.
pub fn reference_eval(filter: &Filter, key: Option<i32>) -> bool {
    match filter {
        Filter::Condition(c) => {
            let Some(key) = key else {
                return c.operation == Operation::NotEquals;
            };
            let bound = <[u8; 4]>::try_from(c.value.as_slice())
                .map(i32::from_le_bytes)
                .unwrap_or_default();
            match c.operation {
                Operation::Equals => key == bound,
                Operation::NotEquals => key != bound,
                Operation::GreaterThan => key > bound,
                Operation::GreaterThanEquals => key >= bound,
                Operation::LessThan => key < bound,
                Operation::LessThanEquals => key <= bound,
                Operation::BitwiseAnd => key.to_le_bytes().iter().zip(bound.to_le_bytes()).any(|(a, b)| a & b != 0),
            }
        }
        Filter::And(children) => children.iter().all(|f| reference_eval(f, key)),
        Filter::Or(children) => children.is_empty() || children.iter().any(|f| reference_eval(f, key)),
    }
}

/// Strategy for literal key ranges; either bound may be absent.
pub fn key_range_strategy() -> impl Strategy<Value = (Option<i32>, Option<i32>)> {
    (prop::option::of(key_strategy()), prop::option::of(key_strategy())).prop_map(|(a, b)| match (a, b) {
        (Some(a), Some(b)) => (Some(a.max(b)), Some(a.min(b))),
        other => other,
    })
}

/// Builds the index condition for a `(max, min)` key range.
pub fn key_range_condition(range: (Option<i32>, Option<i32>)) -> IndexCondition {
    let (max, min) = range;
    IndexCondition::with_bounds(
        max.map(|v| v.to_le_bytes().to_vec()),
        min.map(|v| v.to_le_bytes().to_vec()),
    )
}

/// Strategy for paged queries over up to `max_indexes` distinct small ids,
/// with an optional filter.
pub fn paged_query_strategy(max_indexes: usize) -> impl Strategy<Value = PagedIndexQuery> {
    (
        prop::collection::btree_set(1..500i32, 1..max_indexes.max(2)),
        1..8i32,
        1..4i32,
        prop::option::of(filter_strategy()),
    )
        .prop_map(|(ids, page_size, page_num, filter)| {
            let query = PagedIndexQuery::new(ids.into_iter().map(IndexId::from).collect(), page_size, page_num);
            match filter {
                Some(filter) => query.with_filter(filter),
                None => query,
            }
        })
}

/// Strategy for arbitrary input bytes.
pub fn fuzz_bytes_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..512)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::key_of;

    proptest! {
        #[test]
        fn filters_match_the_reference(filter in filter_strategy(), key in prop::option::of(key_strategy())) {
            let item = match key {
                Some(key) => keyed_item(1, key),
                None => IndexItem::new(vec![1]),
            };
            prop_assert_eq!(filter.process(&item), reference_eval(&filter, key_of(&item)));
        }

        #[test]
        fn generated_items_have_distinct_ids(items in keyed_items_strategy(32)) {
            let mut ids: Vec<_> = items.iter().map(|i| i.item_id.clone()).collect();
            ids.dedup();
            prop_assert_eq!(ids.len(), items.len());
        }

        #[test]
        fn generated_ranges_are_ordered(range in key_range_strategy()) {
            if let (Some(max), Some(min)) = range {
                prop_assert!(max >= min);
            }
        }
    }
}
