//! Merging per-cluster replies.
//!
//! Ordered lists are combined with a k-way heap merge whose ties are broken
//! by list position and then by `(index_id, item_id)`, so the output is a
//! function of the input set. Aggregates implement [`Mergeable`], whose
//! `merge_from` must be associative, commutative and idempotent.

use crate::queries::{GetIndexHeaderType, IntersectionQuery, PagedIndexQuery};
use crate::results::{
    IntersectionQueryResult, MultiIndexContainsQueryResult, NameSetResult, PagedIndexQueryResult,
};
use ixcache_core::{GroupByResult, IndexId, ItemComparer, ResultItem};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashSet};

/// Combines exception texts into sorted, de-duplicated lines.
pub fn merge_exception_info<'a, I>(texts: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    texts
        .into_iter()
        .flat_map(str::lines)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>()
        .join("\n")
}

/// Adds `line` to an exception text.
pub fn push_exception(info: &mut String, line: &str) {
    *info = merge_exception_info([info.as_str(), line]);
}

struct HeapEntry<'a> {
    item: ResultItem,
    list: usize,
    comparer: &'a ItemComparer,
}

impl HeapEntry<'_> {
    fn rank(&self, other: &Self) -> Ordering {
        self.comparer
            .compare(&self.item, &other.item)
            .then_with(|| self.list.cmp(&other.list))
            .then_with(|| self.item.index_id.cmp(&other.item.index_id))
            .then_with(|| self.item.item.item_id.cmp(&other.item.item.item_id))
    }
}

impl PartialEq for HeapEntry<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.rank(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry<'_> {}

impl PartialOrd for HeapEntry<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry<'_> {
    // Reversed: BinaryHeap is a max-heap.
    fn cmp(&self, other: &Self) -> Ordering {
        other.rank(self)
    }
}

/// Merges lists that are each sorted under `comparer`, keeping at most
/// `cap` items; zero keeps everything.
pub fn kway_merge(lists: Vec<Vec<ResultItem>>, comparer: &ItemComparer, cap: usize) -> Vec<ResultItem> {
    let total: usize = lists.iter().map(Vec::len).sum();
    let limit = if cap == 0 { total } else { cap.min(total) };
    let mut sources: Vec<_> = lists.into_iter().map(Vec::into_iter).collect();
    let mut heap = BinaryHeap::with_capacity(sources.len());
    for (list, source) in sources.iter_mut().enumerate() {
        if let Some(item) = source.next() {
            heap.push(HeapEntry { item, list, comparer });
        }
    }

    let mut merged = Vec::with_capacity(limit);
    while merged.len() < limit {
        let Some(HeapEntry { item, list, .. }) = heap.pop() else {
            break;
        };
        if let Some(next) = sources[list].next() {
            heap.push(HeapEntry {
                item: next,
                list,
                comparer,
            });
        }
        merged.push(item);
    }
    merged
}

/// An aggregate reply that can absorb another reply of the same kind.
pub trait Mergeable {
    /// Folds `other` into `self`.
    fn merge_from(&mut self, other: Self);
}

impl Mergeable for NameSetResult {
    fn merge_from(&mut self, other: Self) {
        self.type_exists |= other.type_exists;
        self.names.extend(other.names);
        self.exception_info =
            merge_exception_info([self.exception_info.as_str(), other.exception_info.as_str()]);
    }
}

impl Mergeable for GroupByResult {
    fn merge_from(&mut self, other: Self) {
        self.merge(other);
    }
}

impl Mergeable for MultiIndexContainsQueryResult {
    // Each index is owned by one cluster; an index reported twice keeps
    // its first entry.
    fn merge_from(&mut self, other: Self) {
        let mut entries = BTreeMap::new();
        for entry in self.entries.drain(..).chain(other.entries) {
            entries.entry(entry.index_id.clone()).or_insert(entry);
        }
        self.entries = entries.into_values().collect();
        self.exception_info =
            merge_exception_info([self.exception_info.as_str(), other.exception_info.as_str()]);
    }
}

/// Folds replies left to right; `None` when there are none.
pub fn merge_all<T: Mergeable>(results: impl IntoIterator<Item = T>) -> Option<T> {
    results.into_iter().reduce(|mut acc, next| {
        acc.merge_from(next);
        acc
    })
}

/// Merges per-cluster paged replies into the reply for `query`.
///
/// Counts are summed, the first non-zero cap wins, header maps are
/// unioned with the first entry winning, and groups are unioned and then
/// cut to the merge cap. Client-side paging is applied last when the query
/// is marked for it.
pub fn merge_paged(results: Vec<PagedIndexQueryResult>, query: &PagedIndexQuery) -> PagedIndexQueryResult {
    let sort_info = results.iter().find_map(|r| r.sort_info.clone());
    let comparer = sort_info
        .as_ref()
        .map(ItemComparer::from)
        .unwrap_or_default();

    let mut merged = PagedIndexQueryResult {
        sort_info,
        ..PagedIndexQueryResult::default()
    };
    let mut lists = Vec::with_capacity(results.len());
    let mut exceptions = Vec::with_capacity(results.len());
    let mut groups: Option<GroupByResult> = None;
    for result in results {
        merged.total_count = merged.total_count.saturating_add(result.total_count);
        merged.additional_available_item_count = merged
            .additional_available_item_count
            .saturating_add(result.additional_available_item_count);
        if merged.index_cap == 0 {
            merged.index_cap = result.index_cap;
        }
        for (id, header) in result.index_header_map {
            merged.index_header_map.entry(id).or_insert(header);
        }
        exceptions.push(result.exception_info);
        lists.push(result.items);
        if let Some(incoming) = result.group_by_result {
            match groups.as_mut() {
                Some(acc) => acc.merge_from(incoming),
                None => groups = Some(incoming),
            }
        }
    }

    let cap = query.max_merge_count();
    merged.items = kway_merge(lists, &comparer, cap);
    merged.exception_info = merge_exception_info(exceptions.iter().map(String::as_str));
    merged.group_by_result = groups.map(|mut groups| {
        groups.truncate(cap);
        groups
    });

    if query.client_side_subset_processing_required && query.page_num != 0 {
        apply_client_side_paging(&mut merged, query);
    }
    merged
}

/// Intersects per-cluster intersection replies into the reply for `query`.
///
/// Each reply holds the intersection of the indexes its cluster owns, so
/// the merged items are those whose item id appears in every reply. They
/// are sorted in index order with ties broken by item id and cut to
/// `max_result_items`. An empty intersection carries no headers.
pub fn merge_intersection(
    results: Vec<IntersectionQueryResult>,
    query: &IntersectionQuery,
) -> IntersectionQueryResult {
    let sort_info = results.iter().find_map(|r| r.sort_info.clone());
    let comparer = sort_info
        .as_ref()
        .map(ItemComparer::from)
        .unwrap_or_default();
    let mut merged = IntersectionQueryResult {
        sort_info,
        exception_info: merge_exception_info(results.iter().map(|r| r.exception_info.as_str())),
        ..IntersectionQueryResult::default()
    };

    let mut results = results.into_iter();
    let Some(first) = results.next() else {
        return merged;
    };
    let mut items = first.items;
    let mut headers = first.index_header_map;
    for result in results {
        let present: HashSet<&[u8]> = result.items.iter().map(|i| i.item_id.as_slice()).collect();
        items.retain(|item| present.contains(item.item_id.as_slice()));
        for (id, header) in result.index_header_map {
            headers.entry(id).or_insert(header);
        }
    }

    items.sort_by(|a, b| comparer.compare(a, b).then_with(|| a.item_id.cmp(&b.item_id)));
    if let Some(cap) = query.result_cap() {
        items.truncate(cap);
    }
    if query.get_index_header && !items.is_empty() {
        merged.index_header_map = headers;
    }
    merged.items = items;
    merged
}

/// Slices the merged reply to the query's page and prunes headers of
/// indexes no longer present.
pub fn apply_client_side_paging(result: &mut PagedIndexQueryResult, query: &PagedIndexQuery) {
    let size = usize::try_from(query.page_size.max(0)).unwrap_or(0);
    let page = usize::try_from(query.page_num.max(1)).unwrap_or(1);
    let start = (page - 1).saturating_mul(size);

    let end = start.saturating_add(size).min(result.items.len());
    let start_at = start.min(end);
    result.items.truncate(end);
    result.items.drain(..start_at);

    if let Some(groups) = result.group_by_result.as_mut() {
        groups.page(start, size);
    }

    if query.index_header_type == GetIndexHeaderType::ResultItemsIndexIds {
        let present: BTreeSet<&IndexId> = match &result.group_by_result {
            Some(groups) => groups.items().map(|item| &item.index_id).collect(),
            None => result.items.iter().map(|item| &item.index_id).collect(),
        };
        let present: BTreeSet<IndexId> = present.into_iter().cloned().collect();
        result.index_header_map.retain(|id, _| present.contains(id));
    }
}
