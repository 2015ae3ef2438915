//! Read query processors.
//!
//! Each processor validates its query, resolves the target index and scans
//! the last committed page. Failures never escape as errors: they are
//! logged and reported in the result's `exception_info`.

use crate::error::ServerResult;
use crate::handler::RequestHandler;
use ixcache_core::{
    CoreError, DomainSpecificProcessingType, GroupByResult, IndexCondition, IndexId, IndexItem,
    IndexSpec, ItemComparer, PageReader, ResultItem, ScanOutcome, ScanSpec, TagSort,
};
use ixcache_protocol::{
    apply_client_side_paging, kway_merge, push_exception, ContainsIndexQuery,
    ContainsIndexQueryResult, DistinctQuery, DistinctQueryResult, FirstLastQuery,
    FirstLastQueryResult, GetIndexHeaderType, IndexScanParams, IndexSummary, IntersectionQuery,
    IntersectionQueryResult, MetadataPropertyQuery, MetadataPropertyQueryResult,
    MultiIndexContainsEntry, MultiIndexContainsQuery, MultiIndexContainsQueryResult,
    NameSetResult, PagedIndexQuery, PagedIndexQueryResult, RandomQuery, RandomQueryResult,
    RangeQuery, RangeQueryResult,
};
use ixcache_storage::StorageBackend;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, error};

fn to_usize(n: i32) -> usize {
    usize::try_from(n).unwrap_or(0)
}

fn page_count(outcome: &ScanOutcome) -> usize {
    to_usize(outcome.total_count)
}

impl<B: StorageBackend> RequestHandler<B> {
    fn base_scan(&self, exclude_data: bool, domain_type: DomainSpecificProcessingType) -> ScanSpec {
        ScanSpec::new()
            .with_exclude_data(exclude_data)
            .with_domain_processing(domain_type, self.context.processor(domain_type))
    }

    /// Scans `index_id`. A tag sort reads the whole range and re-sorts it.
    fn scan_sorted(
        &self,
        index_id: &IndexId,
        spec: &IndexSpec,
        scan: ScanSpec,
        tag_sort: Option<&TagSort>,
    ) -> ServerResult<Option<ScanOutcome>> {
        let scan = match tag_sort {
            Some(_) => scan.with_max_items(0),
            None => scan,
        };
        let mut outcome = self.context.store.scan(index_id, spec, &scan)?;
        if let (Some(sort), Some(outcome)) = (tag_sort, outcome.as_mut()) {
            let comparer = ItemComparer::from(sort);
            outcome.items.sort_by(|a, b| comparer.compare(a, b));
        }
        Ok(outcome)
    }

    /// Copies missing tags onto `items` from the same entries in the
    /// auxiliary indexes `names`.
    fn source_tags(&self, index_id: &IndexId, names: &[String], items: &mut [IndexItem]) -> ServerResult<()> {
        for name in names {
            let spec = self.context.resolve(name)?;
            let Some(aux) = self.context.store.load(index_id, spec)? else {
                continue;
            };
            for item in items.iter_mut() {
                if let Some(at) = aux.position(&item.item_id) {
                    item.merge_missing_tags(&aux.items[at]);
                }
            }
        }
        Ok(())
    }

    /// Serves a [`RangeQuery`].
    pub fn handle_range(&self, query: &RangeQuery) -> RangeQueryResult {
        self.process_range(query).unwrap_or_else(|e| {
            error!(index_id = %query.index_id, error = %e, "range query failed");
            RangeQueryResult {
                summary: IndexSummary::failed(e.to_string()),
                items: Vec::new(),
            }
        })
    }

    fn process_range(&self, query: &RangeQuery) -> ServerResult<RangeQueryResult> {
        query.validate()?;
        let spec = self.context.resolve(&query.target_index_name)?;
        let skip = to_usize(query.offset - 1);
        let take = to_usize(query.item_num);
        let scan = self
            .base_scan(query.exclude_data, query.domain_type)
            .with_max_items(skip + take)
            .with_index_condition(query.index_condition.clone())
            .with_filter(query.filter.clone());
        let Some(outcome) = self.scan_sorted(&query.index_id, spec, scan, query.tag_sort.as_ref())? else {
            return Ok(RangeQueryResult::default());
        };
        let summary = IndexSummary::found(&outcome.header, page_count(&outcome), spec.max_index_size, query.get_metadata);
        let items = outcome.items.into_iter().skip(skip).take(take).collect();
        Ok(RangeQueryResult {
            summary,
            items,
        })
    }

    /// Serves a [`FirstLastQuery`].
    pub fn handle_first_last(&self, query: &FirstLastQuery) -> FirstLastQueryResult {
        self.process_first_last(query).unwrap_or_else(|e| {
            error!(index_id = %query.index_id, error = %e, "first/last query failed");
            FirstLastQueryResult {
                summary: IndexSummary::failed(e.to_string()),
                ..FirstLastQueryResult::default()
            }
        })
    }

    fn process_first_last(&self, query: &FirstLastQuery) -> ServerResult<FirstLastQueryResult> {
        query.validate()?;
        let spec = self.context.resolve(&query.target_index_name)?;
        let first = to_usize(query.first_page_size);
        let last = to_usize(query.last_page_size);
        let max_items = if last == 0 { first } else { 0 };
        let scan = self
            .base_scan(query.exclude_data, query.domain_type)
            .with_max_items(max_items)
            .with_index_condition(query.index_condition.clone())
            .with_filter(query.filter.clone());
        let Some(outcome) = self.scan_sorted(&query.index_id, spec, scan, query.tag_sort.as_ref())? else {
            return Ok(FirstLastQueryResult::default());
        };
        let summary = IndexSummary::found(&outcome.header, page_count(&outcome), spec.max_index_size, query.get_metadata);
        let mut first_items = outcome.items;
        let last_items = if first + last <= first_items.len() {
            let tail = first_items.split_off(first_items.len() - last);
            first_items.truncate(first);
            tail
        } else {
            Vec::new()
        };
        Ok(FirstLastQueryResult {
            summary,
            first_items,
            last_items,
        })
    }

    /// Serves a [`RandomQuery`].
    pub fn handle_random(&self, query: &RandomQuery) -> RandomQueryResult {
        self.process_random(query).unwrap_or_else(|e| {
            error!(index_id = %query.index_id, error = %e, "random query failed");
            RandomQueryResult {
                summary: IndexSummary::failed(e.to_string()),
                items: Vec::new(),
            }
        })
    }

    fn process_random(&self, query: &RandomQuery) -> ServerResult<RandomQueryResult> {
        query.validate()?;
        let spec = self.context.resolve(&query.target_index_name)?;
        let scan = self
            .base_scan(query.exclude_data, query.domain_type)
            .with_index_condition(query.index_condition.clone())
            .with_filter(query.filter.clone());
        let Some(outcome) = self.context.store.scan(&query.index_id, spec, &scan)? else {
            return Ok(RandomQueryResult::default());
        };
        let summary = IndexSummary::found(&outcome.header, page_count(&outcome), spec.max_index_size, query.get_metadata);
        let amount = to_usize(query.count).min(outcome.items.len());
        let mut picked = rand::seq::index::sample(&mut rand::thread_rng(), outcome.items.len(), amount).into_vec();
        picked.sort_unstable();
        let mut slots: Vec<Option<IndexItem>> = outcome.items.into_iter().map(Some).collect();
        let items = picked.into_iter().filter_map(|i| slots[i].take()).collect();
        Ok(RandomQueryResult { summary, items })
    }

    /// Serves a [`ContainsIndexQuery`].
    pub fn handle_contains(&self, query: &ContainsIndexQuery) -> ContainsIndexQueryResult {
        self.process_contains(query).unwrap_or_else(|e| {
            error!(index_id = %query.index_id, error = %e, "contains query failed");
            ContainsIndexQueryResult {
                summary: IndexSummary::failed(e.to_string()),
                items: None,
            }
        })
    }

    fn process_contains(&self, query: &ContainsIndexQuery) -> ServerResult<ContainsIndexQueryResult> {
        query.validate()?;
        let spec = self.context.resolve(&query.target_index_name)?;
        let scan = self.base_scan(query.exclude_data, query.domain_type);
        let Some(outcome) = self.context.store.scan(&query.index_id, spec, &scan)? else {
            return Ok(ContainsIndexQueryResult::default());
        };
        let summary = IndexSummary::found(&outcome.header, page_count(&outcome), spec.max_index_size, query.get_metadata);
        let mut by_id: HashMap<Vec<u8>, IndexItem> = outcome
            .items
            .into_iter()
            .map(|item| (item.item_id.clone(), item))
            .collect();
        let mut found: Vec<IndexItem> = query
            .item_ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect();
        self.source_tags(&query.index_id, &query.tags_from_indexes, &mut found)?;
        Ok(ContainsIndexQueryResult {
            summary,
            items: Some(found),
        })
    }

    /// Serves a [`DistinctQuery`].
    pub fn handle_distinct(&self, query: &DistinctQuery) -> DistinctQueryResult {
        self.process_distinct(query).unwrap_or_else(|e| {
            error!(index_id = %query.index_id, error = %e, "distinct query failed");
            DistinctQueryResult {
                exception_info: e.to_string(),
                ..DistinctQueryResult::default()
            }
        })
    }

    fn process_distinct(&self, query: &DistinctQuery) -> ServerResult<DistinctQueryResult> {
        query.validate()?;
        let spec = self.context.resolve(&query.target_index_name)?;
        let scan = ScanSpec::new()
            .with_distinct_field(query.field_name.clone())
            .with_max_items(to_usize(query.look_up_limit()))
            .with_index_condition(query.index_condition.clone());
        let Some(outcome) = self.context.store.scan(&query.index_id, spec, &scan)? else {
            return Ok(DistinctQueryResult::default());
        };
        debug!(
            index_id = %query.index_id,
            examined = outcome.read_item_count,
            values = outcome.distinct_values.len(),
            "distinct scan"
        );
        Ok(DistinctQueryResult {
            index_exists: true,
            distinct_values: outcome.distinct_values,
            exception_info: String::new(),
        })
    }

    /// Tag names this node has stored.
    pub fn handle_tag(&self) -> NameSetResult {
        NameSetResult {
            type_exists: true,
            names: self.context.names.tags(),
            exception_info: String::new(),
        }
    }

    /// Interned string-hash values.
    pub fn handle_string_hash(&self) -> NameSetResult {
        NameSetResult {
            type_exists: true,
            names: self.context.names.strings(),
            exception_info: String::new(),
        }
    }

    /// Serves a [`MetadataPropertyQuery`].
    pub fn handle_metadata_property(&self, query: &MetadataPropertyQuery) -> MetadataPropertyQueryResult {
        self.process_metadata_property(query).unwrap_or_else(|e| {
            error!(index_id = %query.index_id, error = %e, "metadata property query failed");
            MetadataPropertyQueryResult {
                properties: None,
                exception_info: e.to_string(),
            }
        })
    }

    fn process_metadata_property(&self, query: &MetadataPropertyQuery) -> ServerResult<MetadataPropertyQueryResult> {
        let spec = self.context.resolve(&query.target_index_name)?;
        let Some(page) = self.context.store.read_index_page(&query.index_id, spec)? else {
            return Ok(MetadataPropertyQueryResult::default());
        };
        let reader = PageReader::new(&page)
            .map_err(|e| CoreError::corrupted(query.index_id.to_hex(), e.to_string()))?;
        Ok(MetadataPropertyQueryResult {
            properties: Some(reader.header().metadata_properties.clone()),
            exception_info: String::new(),
        })
    }

    /// Serves a [`PagedIndexQuery`] over the ids this node owns.
    pub fn handle_paged(&self, query: &PagedIndexQuery) -> PagedIndexQueryResult {
        self.process_paged(query).unwrap_or_else(|e| {
            error!(indexes = query.index_id_list.len(), error = %e, "paged query failed");
            PagedIndexQueryResult {
                exception_info: e.to_string(),
                ..PagedIndexQueryResult::default()
            }
        })
    }

    fn process_paged(&self, query: &PagedIndexQuery) -> ServerResult<PagedIndexQueryResult> {
        query.validate()?;
        let spec = self.context.resolve(&query.target_index_name)?;
        let comparer = query
            .tag_sort
            .as_ref()
            .map_or_else(|| ItemComparer::from(&spec.primary_sort), ItemComparer::from);
        let cap = query.max_merge_count();
        let counting_additional = query.get_additional_available_item_count && query.filter.is_some();
        let can_tighten =
            query.tag_sort.is_none() && query.group_by.is_none() && cap > 0 && !counting_additional;
        let mut index_condition = query.index_condition.clone();

        let mut result = PagedIndexQueryResult::default();
        let mut merged: Vec<ResultItem> = Vec::new();
        let mut groups: Option<GroupByResult> = None;
        let mut headers = BTreeMap::new();
        let mut matched = 0usize;

        for index_id in &query.index_id_list {
            let params = query.index_id_params_mapping.get(index_id);
            let filter = params
                .and_then(|p| p.filter.clone())
                .or_else(|| query.filter.clone());
            let max_extract = match params.map(|p| p.max_items) {
                Some(n) if n > 0 => to_usize(n),
                _ if query.get_additional_available_item_count && filter.is_some() => 0,
                _ => cap,
            };
            let mut scan = self
                .base_scan(query.exclude_data, query.domain_type)
                .with_max_items(max_extract)
                .with_index_condition(index_condition.clone())
                .with_filter(filter)
                .with_cap(query.cap_condition.clone());
            if let Some(group_by) = &query.group_by {
                scan = scan.with_group_by(group_by.clone(), comparer.clone());
            }

            let outcome = match self.scan_sorted(index_id, spec, scan, query.tag_sort.as_ref()) {
                Ok(Some(outcome)) => outcome,
                Ok(None) => continue,
                Err(e) => {
                    error!(index_id = %index_id, error = %e, "paged scan failed");
                    push_exception(&mut result.exception_info, &format!("{index_id}: {e}"));
                    continue;
                }
            };
            result.total_count = result.total_count.saturating_add(outcome.total_count);
            headers.insert(index_id.clone(), outcome.header);
            matched += outcome.items.len();

            if let Some(incoming) = outcome.group_by {
                match groups.as_mut() {
                    Some(acc) => acc.merge(incoming),
                    None => groups = Some(incoming),
                }
                continue;
            }
            let incoming = outcome
                .items
                .into_iter()
                .map(|item| ResultItem::new(index_id.clone(), item))
                .collect();
            merged = kway_merge(vec![std::mem::take(&mut merged), incoming], &comparer, cap);

            if can_tighten && merged.len() >= cap {
                if let Some(boundary) = merged.last().and_then(|last| comparer.sort_key(last)) {
                    index_condition
                        .get_or_insert_with(IndexCondition::default)
                        .tighten(spec.primary_sort.leading_order(), boundary);
                }
            }
        }

        if counting_additional {
            result.additional_available_item_count =
                i32::try_from(matched.saturating_sub(merged.len())).unwrap_or(i32::MAX);
        }
        if !query.tags_from_indexes.is_empty() {
            for item in &mut merged {
                self.source_tags(
                    &item.index_id,
                    &query.tags_from_indexes,
                    std::slice::from_mut(&mut item.item),
                )?;
            }
        }

        result.items = merged;
        result.group_by_result = groups;
        result.sort_info = Some(comparer.to_sort_info());
        result.index_cap = i32::try_from(spec.max_index_size).unwrap_or(i32::MAX);
        if query.index_header_type != GetIndexHeaderType::None {
            result.index_header_map = headers;
        }

        if !query.client_side_subset_processing_required && query.page_num != 0 {
            if let Some(groups) = result.group_by_result.as_mut() {
                groups.truncate(cap);
            }
            apply_client_side_paging(&mut result, query);
        } else if query.index_header_type == GetIndexHeaderType::ResultItemsIndexIds {
            let present: std::collections::BTreeSet<IndexId> = match &result.group_by_result {
                Some(groups) => groups.items().map(|i| i.index_id.clone()).collect(),
                None => result.items.iter().map(|i| i.index_id.clone()).collect(),
            };
            result.index_header_map.retain(|id, _| present.contains(id));
        }
        Ok(result)
    }

    /// Scans one index of a multi-index query with its effective params.
    fn scan_with_params(
        &self,
        index_id: &IndexId,
        spec: &IndexSpec,
        params: IndexScanParams,
        exclude_data: bool,
        domain_type: DomainSpecificProcessingType,
    ) -> ServerResult<Option<ScanOutcome>> {
        let scan = self
            .base_scan(exclude_data, domain_type)
            .with_max_items(to_usize(params.count))
            .with_index_condition(params.index_condition)
            .with_filter(params.filter);
        Ok(self.context.store.scan(index_id, spec, &scan)?)
    }

    /// Serves an [`IntersectionQuery`] over the ids this node owns.
    pub fn handle_intersection(&self, query: &IntersectionQuery) -> IntersectionQueryResult {
        self.process_intersection(query).unwrap_or_else(|e| {
            error!(indexes = query.index_id_list.len(), error = %e, "intersection query failed");
            IntersectionQueryResult {
                exception_info: e.to_string(),
                ..IntersectionQueryResult::default()
            }
        })
    }

    fn process_intersection(&self, query: &IntersectionQuery) -> ServerResult<IntersectionQueryResult> {
        query.validate()?;
        let spec = self.context.resolve(&query.target_index_name)?;
        let comparer = ItemComparer::from(&spec.primary_sort);
        let mut headers = BTreeMap::new();
        let mut items: Option<Vec<IndexItem>> = None;

        for index_id in &query.index_id_list {
            let params = query.params_for(index_id);
            let Some(outcome) =
                self.scan_with_params(index_id, spec, params, query.exclude_data, query.domain_type)?
            else {
                debug!(index_id = %index_id, "intersection stops at a missing index");
                items = Some(Vec::new());
                break;
            };
            headers.insert(index_id.clone(), outcome.header);
            let kept = match items.take() {
                None => outcome.items,
                Some(mut kept) => {
                    let present: HashSet<&[u8]> =
                        outcome.items.iter().map(|i| i.item_id.as_slice()).collect();
                    kept.retain(|item| present.contains(item.item_id.as_slice()));
                    kept
                }
            };
            let exhausted = kept.is_empty();
            items = Some(kept);
            if exhausted {
                break;
            }
        }

        let mut items = items.unwrap_or_default();
        if query.is_single_cluster_query {
            if let Some(cap) = query.result_cap() {
                items.truncate(cap);
            }
        }
        Ok(IntersectionQueryResult {
            index_header_map: if query.get_index_header && !items.is_empty() {
                headers
            } else {
                BTreeMap::new()
            },
            items,
            sort_info: Some(comparer.to_sort_info()),
            exception_info: String::new(),
        })
    }

    /// Serves a [`MultiIndexContainsQuery`] over the ids this node owns.
    pub fn handle_multi_contains(&self, query: &MultiIndexContainsQuery) -> MultiIndexContainsQueryResult {
        self.process_multi_contains(query).unwrap_or_else(|e| {
            error!(indexes = query.index_id_list.len(), error = %e, "multi-index contains query failed");
            MultiIndexContainsQueryResult {
                exception_info: e.to_string(),
                ..MultiIndexContainsQueryResult::default()
            }
        })
    }

    fn process_multi_contains(
        &self,
        query: &MultiIndexContainsQuery,
    ) -> ServerResult<MultiIndexContainsQueryResult> {
        query.validate()?;
        let spec = self.context.resolve(&query.target_index_name)?;
        let index_cap = i32::try_from(spec.max_index_size).unwrap_or(i32::MAX);
        let mut result = MultiIndexContainsQueryResult::default();

        for index_id in &query.index_id_list {
            let params = query.params_for(index_id);
            let outcome =
                match self.scan_with_params(index_id, spec, params, query.exclude_data, query.domain_type) {
                    Ok(Some(outcome)) => outcome,
                    Ok(None) => continue,
                    Err(e) => {
                        error!(index_id = %index_id, error = %e, "multi-index contains scan failed");
                        push_exception(&mut result.exception_info, &format!("{index_id}: {e}"));
                        continue;
                    }
                };
            let mut by_id: HashMap<Vec<u8>, IndexItem> = outcome
                .items
                .into_iter()
                .map(|item| (item.item_id.clone(), item))
                .collect();
            let items: Vec<IndexItem> = query
                .item_ids
                .iter()
                .filter_map(|id| by_id.remove(id))
                .collect();
            if items.is_empty() {
                continue;
            }
            result.entries.push(MultiIndexContainsEntry {
                index_id: index_id.clone(),
                index_exists: true,
                index_size: outcome.total_count,
                index_cap,
                items,
                header: query.get_index_header.then_some(outcome.header),
            });
        }
        Ok(result)
    }
}
