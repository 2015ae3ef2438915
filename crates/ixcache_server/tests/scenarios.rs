//! End-to-end scenarios against a single node, driven through encoded
//! requests where the wire matters.

use ixcache_core::{
    Condition, DataType, DomainSpecificProcessingType, DomainSpecificProcessor, IndexId, IndexItem,
    IndexSpec, IndexTypeConfig, MetadataPropertyCollectionUpdate, Operation, PrimarySortInfo, SortBy,
    SortOrder,
};
use ixcache_protocol::{
    DistinctQuery, FilteredIndexDeleteCommand, MetadataPropertyCommand, MetadataPropertyQuery,
    PagedIndexQuery, RangeQuery, Request, Response, SaveIndexCommand, StringHashQuery, TagQuery,
};
use ixcache_server::{CacheNode, NodeConfig};
use std::sync::Arc;

fn node() -> CacheNode {
    let by_key = PrimarySortInfo::by_tag("key", vec![SortOrder::new(DataType::Int32, SortBy::Desc)]);
    let config = NodeConfig::new(
        "scenario",
        IndexTypeConfig::new(vec![IndexSpec::new("ByKey", by_key)]).with_string_hash_tags(["city"]),
    );
    CacheNode::new(config).unwrap()
}

fn keyed(id: u32, key: i32) -> IndexItem {
    IndexItem::new(id.to_le_bytes().to_vec())
        .with_tag("key", key.to_le_bytes().to_vec())
        .with_tag("color", vec![u8::try_from(id % 3).unwrap()])
}

fn key_of(item: &IndexItem) -> i32 {
    i32::from_le_bytes(item.tags["key"].as_slice().try_into().unwrap())
}

/// Sends `request` through the node's byte interface.
fn call(node: &CacheNode, request: Request) -> Response {
    let bytes = request.encode().unwrap();
    Response::decode(&node.handle(&bytes).unwrap()).unwrap()
}

fn save(node: &CacheNode, command: SaveIndexCommand) {
    let Response::Mutation(result) = call(node, Request::Save(command)) else {
        panic!("expected a mutation result");
    };
    assert!(result.is_ok(), "{}", result.exception_info);
}

fn load_keys(node: &CacheNode, index: i32, keys: &[i32]) {
    let items = keys
        .iter()
        .enumerate()
        .map(|(i, k)| keyed(u32::try_from(i).unwrap() + 1, *k));
    save(node, SaveIndexCommand::new(IndexId::from(index)).with_add(items));
}

fn range(node: &CacheNode, offset: i32, count: i32) -> Vec<i32> {
    let Response::Range(result) = call(node, Request::Range(RangeQuery::new(IndexId::from(1), offset, count))) else {
        panic!("expected a range result");
    };
    assert!(result.summary.index_exists);
    result.items.iter().map(key_of).collect()
}

#[test]
fn descending_range_pages() {
    let node = node();
    load_keys(&node, 1, &[20, 50, 10, 40, 30]);
    assert_eq!(range(&node, 1, 2), vec![50, 40]);
    assert_eq!(range(&node, 2, 2), vec![40, 30]);
    assert_eq!(range(&node, 5, 2), vec![10]);
    assert!(range(&node, 6, 2).is_empty());
}

#[test]
fn distinct_is_capped_by_items_examined() {
    let node = node();
    let keys: Vec<i32> = (0..100).collect();
    load_keys(&node, 1, &keys);
    let query = DistinctQuery::new(IndexId::from(1), "color").with_items_to_look_up(10);
    let Response::Distinct(result) = call(&node, Request::Distinct(query)) else {
        panic!("expected a distinct result");
    };
    assert!(result.index_exists);
    assert!(result.distinct_values.len() <= 3);
    assert_eq!(result.distinct_values.values().sum::<i32>(), 10);

    let query = DistinctQuery::new(IndexId::from(1), "color");
    let Response::Distinct(result) = call(&node, Request::Distinct(query)) else {
        panic!("expected a distinct result");
    };
    assert_eq!(result.distinct_values.len(), 3);
    assert_eq!(result.distinct_values.values().sum::<i32>(), 100);
}

#[test]
fn delete_then_add_of_the_same_item() {
    let node = node();
    save(
        &node,
        SaveIndexCommand::new(IndexId::from(1)).with_add([keyed(7, 5).with_data(b"old".to_vec())]),
    );
    save(
        &node,
        SaveIndexCommand::new(IndexId::from(1))
            .with_delete([7u32.to_le_bytes().to_vec()])
            .with_add([keyed(7, 6).with_data(b"new".to_vec())]),
    );
    let Response::Range(result) = call(&node, Request::Range(RangeQuery::new(IndexId::from(1), 1, 10))) else {
        panic!("expected a range result");
    };
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].data, b"new");
    assert_eq!(key_of(&result.items[0]), 6);
}

#[test]
fn garbage_is_rejected() {
    let node = node();
    let reply = Response::decode(&node.handle(b"\x01\x00").unwrap()).unwrap();
    assert!(matches!(reply, Response::Rejected(_)));
    assert!(!reply.exception_info().is_empty());
}

#[test]
fn paged_query_across_many_indexes() {
    let node = node();
    load_keys(&node, 1, &[100, 60, 20]);
    load_keys(&node, 2, &[90, 80, 70]);
    load_keys(&node, 3, &[50, 40, 30]);
    let ids = (1..=3).map(IndexId::from).collect();
    let Response::Paged(result) = call(&node, Request::Paged(PagedIndexQuery::new(ids, 2, 2))) else {
        panic!("expected a paged result");
    };
    let keys: Vec<i32> = result.items.iter().map(|i| key_of(&i.item)).collect();
    assert_eq!(keys, vec![80, 70]);
    assert_eq!(result.total_count, 9);
    assert!(result.exception_info.is_empty());
}

#[test]
fn paged_filter_counts_additional_items() {
    let node = node();
    load_keys(&node, 1, &[100, 60, 20]);
    load_keys(&node, 2, &[90, 80, 70]);
    let filter = Condition::new("key", true, Operation::GreaterThan, 50i32.to_le_bytes().to_vec(), DataType::Int32);
    let mut query = PagedIndexQuery::new(vec![IndexId::from(1), IndexId::from(2)], 2, 1).with_filter(filter.into());
    query.get_additional_available_item_count = true;
    let Response::Paged(result) = call(&node, Request::Paged(query)) else {
        panic!("expected a paged result");
    };
    let keys: Vec<i32> = result.items.iter().map(|i| key_of(&i.item)).collect();
    assert_eq!(keys, vec![100, 90]);
    assert_eq!(result.additional_available_item_count, 3);
}

#[test]
fn metadata_properties_and_filtered_delete() {
    let node = node();
    load_keys(&node, 1, &[10, 20, 30]);
    let mut update = MetadataPropertyCollectionUpdate::new();
    update.add_to_add("floor", 15i32.to_le_bytes().to_vec()).unwrap();
    let command = MetadataPropertyCommand {
        index_id: IndexId::from(1),
        target_index_name: String::new(),
        update,
    };
    assert!(matches!(
        call(&node, Request::MetadataPropertyUpdate(command)),
        Response::Mutation(r) if r.is_ok()
    ));
    let Response::MetadataProperty(result) =
        call(&node, Request::MetadataProperty(MetadataPropertyQuery::new(IndexId::from(1))))
    else {
        panic!("expected a metadata property result");
    };
    let properties = result.properties.unwrap();
    assert_eq!(properties.get("floor"), Some(&15i32.to_le_bytes()[..]));

    let filter = Condition::new("key", true, Operation::LessThan, 25i32.to_le_bytes().to_vec(), DataType::Int32);
    let command = FilteredIndexDeleteCommand {
        index_id: IndexId::from(1),
        target_index_name: "bykey".into(),
        filter: filter.into(),
    };
    assert!(matches!(call(&node, Request::FilteredDelete(command)), Response::Mutation(r) if r.is_ok()));
    assert_eq!(range(&node, 1, 10), vec![30]);
}

#[test]
fn tag_and_string_hash_names() {
    let node = node();
    save(
        &node,
        SaveIndexCommand::new(IndexId::from(1)).with_add([
            keyed(1, 1).with_tag("city", b"Oslo".to_vec()),
            keyed(2, 2).with_tag("city", b"Lima".to_vec()),
        ]),
    );
    let Response::Tag(tags) = call(&node, Request::Tag(TagQuery)) else {
        panic!("expected a tag result");
    };
    assert!(tags.type_exists);
    assert_eq!(tags.names.into_iter().collect::<Vec<_>>(), vec!["city", "color", "key"]);
    let Response::StringHash(strings) = call(&node, Request::StringHash(StringHashQuery)) else {
        panic!("expected a string hash result");
    };
    assert_eq!(strings.names.into_iter().collect::<Vec<_>>(), vec!["Lima", "Oslo"]);
}

struct EvenKeysOnly;

impl DomainSpecificProcessor for EvenKeysOnly {
    fn process(&self, _kind: DomainSpecificProcessingType, _index_id: &IndexId, item: &mut IndexItem) -> bool {
        item.data = b"seen".to_vec();
        key_of(item) % 2 == 0
    }
}

#[test]
fn domain_processor_filters_and_rewrites() {
    let node = node();
    node.register_processor(4, Arc::new(EvenKeysOnly));
    load_keys(&node, 1, &[1, 2, 3, 4, 5, 6]);
    let mut query = RangeQuery::new(IndexId::from(1), 1, 2);
    query.domain_type = DomainSpecificProcessingType::Custom(4);
    let Response::Range(result) = call(&node, Request::Range(query)) else {
        panic!("expected a range result");
    };
    let keys: Vec<i32> = result.items.iter().map(key_of).collect();
    assert_eq!(keys, vec![6, 4]);
    assert!(result.items.iter().all(|i| i.data == b"seen"));
}

mod props {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn range_matches_sorted_keys(
            keys in proptest::collection::btree_set(-1000i32..1000, 1..40),
            offset in 1i32..50,
            count in 1i32..20,
        ) {
            let node = node();
            let keys: Vec<i32> = keys.into_iter().collect();
            load_keys(&node, 1, &keys);

            let expected: Vec<i32> = keys
                .iter()
                .rev()
                .skip(usize::try_from(offset - 1).unwrap())
                .take(usize::try_from(count).unwrap())
                .copied()
                .collect();
            prop_assert_eq!(range(&node, offset, count), expected);
        }
    }
}
