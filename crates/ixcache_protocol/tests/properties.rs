//! Property tests for splitting and merging, and wire compatibility of
//! every message at every version.

use bytes::BytesMut;
use ixcache_codec::{from_versioned_bytes, PrimitiveWriter, VersionSerializable};
use ixcache_core::{
    CapCondition, Condition, DataType, DomainSpecificProcessingType, Filter, GroupBy,
    GroupByResult, IndexCondition, IndexHeader, IndexId, IndexItem, ItemComparer,
    MetadataPropertyCollection, MetadataPropertyCollectionUpdate, Operation, PrimarySortInfo,
    ResultItem, SortBy, SortOrder, TagSort,
};
use ixcache_protocol::{
    kway_merge, merge_all, split_paged, tags, ContainsIndexQuery, ContainsIndexQueryResult,
    DeleteIndexCommand, DistinctQuery, DistinctQueryResult, FilteredIndexDeleteCommand,
    FirstLastQuery, FirstLastQueryResult, GetIndexHeaderType, IndexIdParams, IndexScanParams,
    IndexSummary, IntersectionQuery, IntersectionQueryResult, Mergeable, MetadataPropertyCommand,
    MetadataPropertyQuery, MetadataPropertyQueryResult, MultiIndexContainsEntry,
    MultiIndexContainsQuery, MultiIndexContainsQueryResult, MutationResult, NameSetResult,
    PagedIndexQuery, PagedIndexQueryResult, RandomQuery, RandomQueryResult, RangeQuery,
    RangeQueryResult, Rejected, Request, Response, SaveIndexCommand, StringHashQuery, TagQuery,
};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::fmt::Debug;

fn comparer() -> ItemComparer {
    ItemComparer::new("score", true, vec![SortOrder::new(DataType::Int32, SortBy::Desc)])
}

fn result_item_strategy() -> impl Strategy<Value = ResultItem> {
    (0..4i32, 0..6u8, 0..3u8, -50..50i32).prop_map(|(index, id, kind, score)| {
        ResultItem::new(
            IndexId::from(index),
            IndexItem::new(vec![b'a' + id])
                .with_tag("kind", vec![b'k', kind])
                .with_tag("score", score.to_le_bytes().to_vec()),
        )
    })
}

fn grouped_strategy() -> impl Strategy<Value = GroupByResult> {
    prop::collection::vec(result_item_strategy(), 0..12).prop_map(|items| {
        let group_by = GroupBy::new(["kind"]);
        let mut result = GroupByResult::new(comparer());
        for item in items {
            if let Some(key) = group_by.composite_key(&item) {
                result.add(key, item);
            }
        }
        result
    })
}

fn name_set_strategy() -> impl Strategy<Value = NameSetResult> {
    (
        any::<bool>(),
        prop::collection::btree_set("[a-e]{1,3}", 0..6),
        prop::option::of("[a-c]{1,2}"),
    )
        .prop_map(|(type_exists, names, error)| NameSetResult {
            type_exists,
            names,
            exception_info: error.unwrap_or_default(),
        })
}

fn merged<T: Mergeable + Clone>(a: &T, b: &T) -> T {
    let mut out = a.clone();
    out.merge_from(b.clone());
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn split_covers_every_id_once(
        raw in prop::collection::btree_set(any::<i32>(), 1..24),
        clusters in 1usize..6,
        overrides in prop::collection::vec(any::<bool>(), 24),
    ) {
        let ids: Vec<IndexId> = raw.iter().copied().map(IndexId::from).collect();
        let mut query = PagedIndexQuery::new(ids.clone(), 10, 1);
        for (id, wanted) in ids.iter().zip(&overrides) {
            if *wanted {
                query.index_id_params_mapping.insert(id.clone(), IndexIdParams { max_items: 3, filter: None });
            }
        }
        let subs = split_paged(&query, clusters).unwrap();

        let mut seen = BTreeSet::new();
        for sub in &subs {
            prop_assert!(sub.cluster < clusters);
            prop_assert_eq!(sub.query.index_id_list.len(), sub.query.primary_id_list.len());
            for id in &sub.query.index_id_list {
                prop_assert!(seen.insert(id.clone()), "id placed twice");
            }
            for id in sub.query.index_id_params_mapping.keys() {
                prop_assert!(sub.query.index_id_list.contains(id));
            }
            // Relative order is kept.
            let positions: Vec<usize> = sub
                .query
                .index_id_list
                .iter()
                .filter_map(|id| ids.iter().position(|x| x == id))
                .collect();
            prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
        }
        prop_assert_eq!(seen, ids.iter().cloned().collect::<BTreeSet<_>>());
        let marked = ids.len() > 1 && subs.len() > 1;
        prop_assert!(subs.iter().all(|s| s.query.client_side_subset_processing_required == marked));
    }

    #[test]
    fn group_merge_is_associative(a in grouped_strategy(), b in grouped_strategy(), c in grouped_strategy()) {
        let left = merged(&merged(&a, &b), &c);
        let right = merged(&a, &merged(&b, &c));
        prop_assert_eq!(&left, &right);
        let shuffled = merge_all([c.clone(), a.clone(), b.clone()]).unwrap();
        prop_assert_eq!(&left, &shuffled);
    }

    #[test]
    fn group_merge_is_idempotent(a in grouped_strategy(), b in grouped_strategy()) {
        let ab = merged(&a, &b);
        prop_assert_eq!(merged(&ab, &ab), ab.clone());
        prop_assert_eq!(merged(&ab, &a), ab);
    }

    #[test]
    fn name_set_merge_laws(a in name_set_strategy(), b in name_set_strategy(), c in name_set_strategy()) {
        let left = merged(&merged(&a, &b), &c);
        let right = merged(&a, &merged(&b, &c));
        prop_assert_eq!(&left, &right);
        prop_assert_eq!(&merged(&b, &a), &merged(&a, &b));
        prop_assert_eq!(merged(&left, &left), left);
    }

    #[test]
    fn kway_merge_matches_sorted_union(
        lists in prop::collection::vec(prop::collection::vec(result_item_strategy(), 0..8), 1..5),
        cap in 0usize..20,
    ) {
        let comparer = comparer();
        let sorted: Vec<Vec<ResultItem>> = lists
            .into_iter()
            .map(|mut list| {
                list.sort_by(|x, y| comparer.compare(x, y));
                list
            })
            .collect();
        let mut expected: Vec<ResultItem> = sorted.iter().flatten().cloned().collect();
        expected.sort_by(|x, y| comparer.compare(x, y));
        let out = kway_merge(sorted, &comparer, cap);

        let limit = if cap == 0 { expected.len() } else { cap.min(expected.len()) };
        prop_assert_eq!(out.len(), limit);
        prop_assert!(out.windows(2).all(|w| comparer.compare(&w[0], &w[1]) != std::cmp::Ordering::Greater));
        let got: Vec<_> = out.iter().map(|i| comparer.sort_key(i).map(<[u8]>::to_vec)).collect();
        let want: Vec<_> = expected[..limit].iter().map(|i| comparer.sort_key(i).map(<[u8]>::to_vec)).collect();
        prop_assert_eq!(got, want);
    }

    #[test]
    fn paged_request_roundtrip(
        raw in prop::collection::vec(any::<i32>(), 1..8),
        page_size in 1i32..50,
        page_num in 0i32..5,
        exclude in any::<bool>(),
    ) {
        let mut query = PagedIndexQuery::new(raw.into_iter().map(IndexId::from).collect(), page_size, page_num);
        query.exclude_data = exclude;
        let request = Request::Paged(query);
        let bytes = request.encode().unwrap();
        prop_assert_eq!(Request::decode(&bytes).unwrap(), request);
    }
}

fn nested_as<T: VersionSerializable>(value: &T, version: u16) -> BytesMut {
    let mut buf = BytesMut::new();
    PrimitiveWriter::new(&mut buf)
        .write_nested_as(value, version)
        .unwrap();
    buf
}

/// Encodes `value` at every version it knows. Each encoding must decode
/// and re-encode to the same bytes, and the current version must decode
/// back to `value` itself.
fn at_every_version<T: VersionSerializable + PartialEq + Debug>(value: &T) {
    for version in 1..=T::CURRENT_VERSION {
        let bytes = nested_as(value, version);
        let decoded: T = from_versioned_bytes(&bytes)
            .unwrap_or_else(|e| panic!("{} v{version}: {e}", T::TYPE_NAME));
        assert_eq!(
            nested_as(&decoded, version),
            bytes,
            "{} v{version} does not re-encode identically",
            T::TYPE_NAME
        );
        if version == T::CURRENT_VERSION {
            assert_eq!(&decoded, value, "{} current version", T::TYPE_NAME);
        }
    }
}

fn request_at_every_version(request: &Request) {
    match request {
        Request::Range(q) => at_every_version(q),
        Request::FirstLast(q) => at_every_version(q),
        Request::Random(q) => at_every_version(q),
        Request::Contains(q) => at_every_version(q),
        Request::Distinct(q) => at_every_version(q),
        Request::Tag(q) => at_every_version(q),
        Request::StringHash(q) => at_every_version(q),
        Request::Paged(q) => at_every_version(q),
        Request::MetadataProperty(q) => at_every_version(q),
        Request::Intersection(q) => at_every_version(q),
        Request::MultiContains(q) => at_every_version(q),
        Request::Save(c) => at_every_version(c),
        Request::MetadataPropertyUpdate(c) => at_every_version(c),
        Request::FilteredDelete(c) => at_every_version(c),
        Request::DeleteIndex(c) => at_every_version(c),
    }
}

fn response_at_every_version(response: &Response) {
    match response {
        Response::Range(r) => at_every_version(r),
        Response::FirstLast(r) => at_every_version(r),
        Response::Random(r) => at_every_version(r),
        Response::Contains(r) => at_every_version(r),
        Response::Distinct(r) => at_every_version(r),
        Response::Tag(r) | Response::StringHash(r) => at_every_version(r),
        Response::Paged(r) => at_every_version(r),
        Response::MetadataProperty(r) => at_every_version(r),
        Response::Intersection(r) => at_every_version(r),
        Response::MultiContains(r) => at_every_version(r),
        Response::Mutation(r) => at_every_version(r),
        Response::Rejected(r) => at_every_version(r),
    }
}

fn kind_filter() -> Filter {
    Condition::new("kind", true, Operation::Equals, vec![1], DataType::Byte).into()
}

fn score_sort() -> PrimarySortInfo {
    PrimarySortInfo::by_tag("score", vec![SortOrder::new(DataType::Int32, SortBy::Desc)])
}

fn bounds() -> IndexCondition {
    IndexCondition::with_bounds(Some(90i32.to_le_bytes().to_vec()), Some(vec![0, 0, 0, 0]))
}

fn items() -> Vec<IndexItem> {
    vec![
        IndexItem::new(b"a".to_vec())
            .with_tag("score", 7i32.to_le_bytes().to_vec())
            .with_tag("kind", vec![1])
            .with_data(b"payload".to_vec()),
        IndexItem::new(b"b".to_vec()).with_tag("score", 3i32.to_le_bytes().to_vec()),
    ]
}

fn properties() -> MetadataPropertyCollection {
    let mut props = MetadataPropertyCollection::new();
    props.insert("floor", vec![1, 0, 0, 0]);
    props
}

fn header() -> IndexHeader {
    IndexHeader {
        metadata: b"meta".to_vec(),
        virtual_count: 40,
        metadata_properties: properties(),
    }
}

fn summary() -> IndexSummary {
    IndexSummary {
        index_exists: true,
        index_size: 2,
        metadata: b"meta".to_vec(),
        virtual_count: 40,
        index_cap: 100,
        metadata_properties: Some(properties()),
        exception_info: String::new(),
    }
}

fn every_request() -> Vec<Request> {
    let tag_sort = TagSort::new("score", true, SortOrder::new(DataType::Int32, SortBy::Asc));
    let domain = DomainSpecificProcessingType::Custom(2);

    let range = RangeQuery {
        exclude_data: true,
        get_metadata: true,
        filter: Some(kind_filter()),
        tag_sort: Some(tag_sort.clone()),
        index_condition: Some(bounds()),
        domain_type: domain,
        ..RangeQuery::new(IndexId::from(1), 2, 5).with_target("ByScore")
    };
    let first_last = FirstLastQuery {
        target_index_name: "ByScore".into(),
        exclude_data: true,
        get_metadata: true,
        filter: Some(kind_filter()),
        tag_sort: Some(tag_sort.clone()),
        index_condition: Some(bounds()),
        domain_type: domain,
        ..FirstLastQuery::new(IndexId::from(2), 3, 4)
    };
    let random = RandomQuery {
        target_index_name: "ByScore".into(),
        exclude_data: true,
        get_metadata: true,
        filter: Some(kind_filter()),
        index_condition: Some(bounds()),
        domain_type: domain,
        ..RandomQuery::new(IndexId::from(3), 6)
    };
    let contains = ContainsIndexQuery {
        target_index_name: "ByScore".into(),
        tags_from_indexes: vec!["ByTime".into()],
        exclude_data: true,
        get_metadata: true,
        domain_type: domain,
        ..ContainsIndexQuery::new(IndexId::from(4), vec![b"a".to_vec(), b"b".to_vec()])
    };
    let distinct = DistinctQuery {
        target_index_name: "ByScore".into(),
        index_condition: Some(bounds()),
        ..DistinctQuery::new(IndexId::from(5), "kind").with_items_to_look_up(10)
    };
    let mut paged = PagedIndexQuery {
        tags_from_indexes: vec!["ByTime".into()],
        tag_sort: Some(tag_sort),
        max_items: 30,
        exclude_data: true,
        get_additional_available_item_count: true,
        primary_id_list: vec![6, 7],
        client_side_subset_processing_required: true,
        index_condition: Some(bounds()),
        cap_condition: Some(CapCondition::new("kind")),
        domain_type: domain,
        ..PagedIndexQuery::new(vec![IndexId::from(6), IndexId::from(7)], 10, 2)
            .with_target("ByScore")
            .with_filter(kind_filter())
            .with_group_by(GroupBy::new(["kind"]))
            .with_index_header_type(GetIndexHeaderType::AllIndexIds)
    };
    paged.index_id_params_mapping.insert(
        IndexId::from(7),
        IndexIdParams {
            max_items: 3,
            filter: Some(kind_filter()),
        },
    );
    let scan_params = IndexScanParams {
        count: 4,
        filter: Some(kind_filter()),
        index_condition: Some(bounds()),
    };
    let mut intersection = IntersectionQuery {
        exclude_data: true,
        get_index_header: true,
        primary_id_list: vec![8, 9],
        count: 50,
        is_single_cluster_query: true,
        index_condition: Some(bounds()),
        domain_type: domain,
        ..IntersectionQuery::new(vec![IndexId::from(8), IndexId::from(9)])
            .with_target("ByScore")
            .with_filter(kind_filter())
            .with_max_result_items(5)
    };
    intersection
        .index_id_params_mapping
        .insert(IndexId::from(9), scan_params.clone());
    let mut multi_contains = MultiIndexContainsQuery {
        exclude_data: true,
        get_index_header: true,
        primary_id_list: vec![10, 11],
        filter: Some(kind_filter()),
        count: 20,
        index_condition: Some(bounds()),
        domain_type: domain,
        ..MultiIndexContainsQuery::new(
            vec![IndexId::from(10), IndexId::from(11)],
            vec![b"a".to_vec()],
        )
        .with_target("ByScore")
    };
    multi_contains
        .index_id_params_mapping
        .insert(IndexId::from(10), scan_params);

    let mut update = MetadataPropertyCollectionUpdate::new();
    update.add_to_add("floor", vec![2, 0, 0, 0]).unwrap();
    update.add_to_delete("ceiling");
    let mut save = SaveIndexCommand::new(IndexId::from(12))
        .with_target("ByScore")
        .with_add(items())
        .with_delete([b"c".to_vec()])
        .with_update(items().into_iter().take(1))
        .with_primary_id(3);
    save.index_tag_mapping
        .insert("ByScore".into(), vec!["score".into(), "kind".into()]);
    save.index_virtual_count_mapping.insert("ByScore".into(), 40);
    save.metadata = b"meta".to_vec();
    save.update_metadata = true;
    save.replace_full_index = true;
    save.preserve_data = true;
    save.metadata_property_update = Some(update.clone());

    vec![
        Request::Range(range),
        Request::FirstLast(first_last),
        Request::Random(random),
        Request::Contains(contains),
        Request::Distinct(distinct),
        Request::Tag(TagQuery),
        Request::StringHash(StringHashQuery),
        Request::Paged(paged),
        Request::MetadataProperty(MetadataPropertyQuery {
            index_id: IndexId::from(13),
            target_index_name: "ByScore".into(),
        }),
        Request::Intersection(intersection),
        Request::MultiContains(multi_contains),
        Request::Save(save),
        Request::MetadataPropertyUpdate(MetadataPropertyCommand {
            index_id: IndexId::from(14),
            target_index_name: "ByScore".into(),
            update,
        }),
        Request::FilteredDelete(FilteredIndexDeleteCommand {
            index_id: IndexId::from(15),
            target_index_name: "ByScore".into(),
            filter: kind_filter(),
        }),
        Request::DeleteIndex(DeleteIndexCommand {
            index_id: IndexId::from(16),
        }),
    ]
}

fn every_response() -> Vec<Response> {
    let comparer = ItemComparer::from(&score_sort());
    let result_items: Vec<ResultItem> = items()
        .into_iter()
        .map(|item| ResultItem::new(IndexId::from(1), item))
        .collect();
    let mut groups = GroupByResult::new(comparer);
    for item in &result_items {
        groups.add(b"k".to_vec(), item.clone());
    }
    let mut paged = PagedIndexQueryResult {
        items: result_items,
        total_count: 2,
        exception_info: "cluster 1 (c1): timed out".into(),
        additional_available_item_count: 3,
        sort_info: Some(score_sort()),
        index_cap: 100,
        group_by_result: Some(groups),
        ..PagedIndexQueryResult::default()
    };
    paged.index_header_map.insert(IndexId::from(1), header());
    let mut intersection = IntersectionQueryResult {
        items: items(),
        sort_info: Some(score_sort()),
        ..IntersectionQueryResult::default()
    };
    intersection
        .index_header_map
        .insert(IndexId::from(2), header());

    vec![
        Response::Range(RangeQueryResult {
            summary: summary(),
            items: items(),
        }),
        Response::FirstLast(FirstLastQueryResult {
            summary: summary(),
            first_items: items(),
            last_items: items().into_iter().rev().collect(),
        }),
        Response::Random(RandomQueryResult {
            summary: summary(),
            items: items(),
        }),
        Response::Contains(ContainsIndexQueryResult {
            summary: summary(),
            items: Some(items()),
        }),
        Response::Distinct(DistinctQueryResult {
            index_exists: true,
            distinct_values: [(vec![1], 4), (vec![2], 1)].into_iter().collect(),
            exception_info: String::new(),
        }),
        Response::Tag(NameSetResult {
            type_exists: true,
            names: ["kind".to_string(), "score".to_string()].into_iter().collect(),
            exception_info: String::new(),
        }),
        Response::StringHash(NameSetResult {
            type_exists: false,
            names: BTreeSet::new(),
            exception_info: "no string hash type".into(),
        }),
        Response::Paged(paged),
        Response::MetadataProperty(MetadataPropertyQueryResult {
            properties: Some(properties()),
            exception_info: String::new(),
        }),
        Response::Intersection(intersection),
        Response::MultiContains(MultiIndexContainsQueryResult {
            entries: vec![MultiIndexContainsEntry {
                index_id: IndexId::from(3),
                index_exists: true,
                index_size: 2,
                index_cap: 100,
                items: items(),
                header: Some(header()),
            }],
            exception_info: String::new(),
        }),
        Response::Mutation(MutationResult {
            exception_info: "b: too many tags".into(),
        }),
        Response::Rejected(Rejected {
            reason: "unknown message type tag 77".into(),
        }),
    ]
}

#[test]
fn every_request_decodes_at_every_version() {
    let requests = every_request();
    let covered: BTreeSet<u8> = requests.iter().map(Request::type_tag).collect();
    let expected: BTreeSet<u8> = (tags::RANGE_QUERY..=tags::MULTI_INDEX_CONTAINS_QUERY)
        .chain(tags::SAVE_INDEX_COMMAND..=tags::DELETE_INDEX_COMMAND)
        .collect();
    assert_eq!(covered, expected);

    for request in &requests {
        request_at_every_version(request);
        let bytes = request.encode().unwrap();
        assert_eq!(&Request::decode(&bytes).unwrap(), request, "{} envelope", request.name());
    }
}

#[test]
fn every_response_decodes_at_every_version() {
    let responses = every_response();
    let covered: BTreeSet<u8> = responses.iter().map(Response::type_tag).collect();
    let expected: BTreeSet<u8> = (tags::RANGE_QUERY_RESULT..=tags::MULTI_INDEX_CONTAINS_QUERY_RESULT)
        .chain([tags::MUTATION_RESULT, tags::REJECTED])
        .collect();
    assert_eq!(covered, expected);

    for response in &responses {
        response_at_every_version(response);
        let bytes = response.encode().unwrap();
        assert_eq!(&Response::decode(&bytes).unwrap(), response, "{} envelope", response.name());
    }
}
