//! The page scan: range bounds, predicates, distinct counting and grouping.

use crate::compare::ItemComparer;
use crate::condition::{CapCondition, Filter, IndexCondition};
use crate::error::{CoreError, CoreResult};
use crate::group::{GroupBy, GroupByResult};
use crate::header::IndexHeader;
use crate::item::{FieldSource, IndexItem, ResultItem};
use crate::page::PageReader;
use crate::types::{DomainSpecificProcessingType, IndexId, PrimarySortInfo};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Pluggable per-domain post-processing applied to each admitted entry.
///
/// Returning false drops the entry from the result.
pub trait DomainSpecificProcessor: Send + Sync {
    /// Processes one entry in place.
    fn process(
        &self,
        kind: DomainSpecificProcessingType,
        index_id: &IndexId,
        item: &mut IndexItem,
    ) -> bool;
}

/// What a scan collects and how.
#[derive(Clone, Default)]
pub struct ScanSpec {
    /// Stop after this many items (groups when grouping); 0 = unbounded.
    pub max_items: usize,
    /// Range bounds on the sort key.
    pub index_condition: Option<IndexCondition>,
    /// Per-entry predicate.
    pub filter: Option<Filter>,
    /// Per-value admission caps.
    pub cap: Option<CapCondition>,
    /// Grouping and the comparer ordering its bags.
    pub group_by: Option<(GroupBy, ItemComparer)>,
    /// Count values of this field instead of collecting entries.
    pub distinct_field: Option<String>,
    /// Strip payloads from collected entries.
    pub exclude_data: bool,
    /// Domain processing selector.
    pub domain_type: DomainSpecificProcessingType,
    /// Domain processing hook.
    pub domain_processor: Option<Arc<dyn DomainSpecificProcessor>>,
}

impl fmt::Debug for ScanSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanSpec")
            .field("max_items", &self.max_items)
            .field("index_condition", &self.index_condition)
            .field("filter", &self.filter)
            .field("cap", &self.cap)
            .field("group_by", &self.group_by)
            .field("distinct_field", &self.distinct_field)
            .field("exclude_data", &self.exclude_data)
            .field("domain_type", &self.domain_type)
            .field("has_domain_processor", &self.domain_processor.is_some())
            .finish()
    }
}

impl ScanSpec {
    /// An unbounded scan with no predicates.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the collection limit.
    #[must_use]
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    /// Sets the range bounds.
    #[must_use]
    pub fn with_index_condition(mut self, condition: Option<IndexCondition>) -> Self {
        self.index_condition = condition;
        self
    }

    /// Sets the filter.
    #[must_use]
    pub fn with_filter(mut self, filter: Option<Filter>) -> Self {
        self.filter = filter;
        self
    }

    /// Sets the cap condition.
    #[must_use]
    pub fn with_cap(mut self, cap: Option<CapCondition>) -> Self {
        self.cap = cap;
        self
    }

    /// Groups collected entries.
    #[must_use]
    pub fn with_group_by(mut self, group_by: GroupBy, comparer: ItemComparer) -> Self {
        self.group_by = Some((group_by, comparer));
        self
    }

    /// Counts distinct values of `field`.
    #[must_use]
    pub fn with_distinct_field(mut self, field: impl Into<String>) -> Self {
        self.distinct_field = Some(field.into());
        self
    }

    /// Strips payloads.
    #[must_use]
    pub fn with_exclude_data(mut self, exclude: bool) -> Self {
        self.exclude_data = exclude;
        self
    }

    /// Enables domain processing.
    #[must_use]
    pub fn with_domain_processing(
        mut self,
        kind: DomainSpecificProcessingType,
        processor: Option<Arc<dyn DomainSpecificProcessor>>,
    ) -> Self {
        self.domain_type = kind;
        self.domain_processor = processor;
        self
    }
}

/// Everything a scan produced.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanOutcome {
    /// Page header.
    pub header: IndexHeader,
    /// Collected entries in index order.
    pub items: Vec<IndexItem>,
    /// Groups, when grouping.
    pub group_by: Option<GroupByResult>,
    /// Distinct value counts, when counting.
    pub distinct_values: BTreeMap<Vec<u8>, i32>,
    /// Entries in the page.
    pub total_count: i32,
    /// Entries examined.
    pub read_item_count: i32,
}

fn saturating_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// Scans one encoded page.
///
/// Entries are skipped until the enter bound passes; from then on the
/// first entry failing the exit bound ends the scan. In-range entries are
/// counted for distinct scans, otherwise they go through the cap or
/// filter, the domain hook and projection before being collected.
pub fn scan_page(
    index_id: &IndexId,
    page: &[u8],
    sort: &PrimarySortInfo,
    spec: &ScanSpec,
) -> CoreResult<ScanOutcome> {
    let mut reader = PageReader::new(page)?;
    let header = reader.header().clone();
    let total_count = saturating_i32(reader.total());

    let (enter, exit) = match &spec.index_condition {
        Some(condition) => condition.create_conditions(
            &sort.field_name,
            sort.is_tag,
            sort.leading_order(),
            &header.metadata_properties,
        ),
        None => (None, None),
    };
    let mut entered = enter.is_none();
    let mut tracker = spec.cap.as_ref().map(CapCondition::tracker);
    let mut group = spec
        .group_by
        .as_ref()
        .map(|(_, comparer)| GroupByResult::new(comparer.clone()));
    let projection = spec
        .group_by
        .as_ref()
        .and_then(|(group_by, comparer)| group_by.projection(&comparer.field_name));

    let mut items = Vec::new();
    let mut distinct_values: BTreeMap<Vec<u8>, i32> = BTreeMap::new();
    let mut counted = 0usize;

    loop {
        let collected = match (&spec.distinct_field, &group) {
            (Some(_), _) => counted,
            (None, Some(g)) => g.len(),
            (None, None) => items.len(),
        };
        if spec.max_items > 0 && collected >= spec.max_items {
            break;
        }
        let Some(mut item) = reader.next_item()? else {
            break;
        };
        if item.item_id.is_empty() {
            return Err(CoreError::corrupted(
                index_id.to_hex(),
                format!("entry {} has an empty item id", reader.read_count()),
            ));
        }

        if !entered {
            if let Some(enter) = &enter {
                if !enter.process(&item) {
                    continue;
                }
            }
            entered = true;
        }
        if let Some(exit) = &exit {
            if !exit.process(&item) {
                break;
            }
        }

        if let Some(field) = &spec.distinct_field {
            counted += 1;
            if let Some(value) = item.named_field(field) {
                *distinct_values.entry(value.to_vec()).or_insert(0) += 1;
            }
            continue;
        }

        let admitted = match tracker.as_mut() {
            Some(tracker) => tracker.admit(&item, spec.filter.as_ref()),
            None => spec.filter.as_ref().map_or(true, |f| f.process(&item)),
        };
        if !admitted {
            continue;
        }

        if spec.domain_type != DomainSpecificProcessingType::None {
            if let Some(processor) = &spec.domain_processor {
                if !processor.process(spec.domain_type, index_id, &mut item) {
                    continue;
                }
            }
        }
        if spec.exclude_data {
            item.data.clear();
        }

        match (&mut group, &spec.group_by) {
            (Some(result), Some((group_by, _))) => {
                let Some(key) = group_by.composite_key(&item) else {
                    continue;
                };
                if let Some(keep) = &projection {
                    item.retain_tags(keep);
                }
                result.add(key, ResultItem::new(index_id.clone(), item));
            }
            _ => items.push(item),
        }
    }

    Ok(ScanOutcome {
        header,
        items,
        group_by: group,
        distinct_values,
        total_count,
        read_item_count: saturating_i32(reader.read_count()),
    })
}
