//! Group-by specification and result bags.

use crate::compare::ItemComparer;
use crate::item::{read_result_items, write_result_items, FieldSource, ResultItem};
use ixcache_codec::{CodecResult, PrimitiveReader, PrimitiveWriter, VersionSerializable};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Grouping fields, an optional value subset on the first field and the
/// fields projected into grouped items.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroupBy {
    /// Fields forming the composite key, in order.
    pub field_names: Vec<String>,
    /// When set, only entries whose first field takes one of these values
    /// are grouped.
    pub field_value_subset: Option<BTreeSet<Vec<u8>>>,
    /// Extra tags kept on grouped items. Empty keeps every tag.
    pub non_group_by_field_names: Vec<String>,
}

impl GroupBy {
    /// Groups by the given fields.
    #[must_use]
    pub fn new<I, S>(field_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field_names: field_names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Restricts grouping to the listed first-field values.
    #[must_use]
    pub fn with_value_subset(mut self, values: impl IntoIterator<Item = Vec<u8>>) -> Self {
        self.field_value_subset = Some(values.into_iter().collect());
        self
    }

    /// Sets the projected tags.
    #[must_use]
    pub fn with_projection<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.non_group_by_field_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Composite key of `item`: each field's value with a `u16` length
    /// prefix, a missing field contributing an empty value. Returns `None`
    /// when the first field falls outside the value subset.
    pub fn composite_key<T: FieldSource>(&self, item: &T) -> Option<Vec<u8>> {
        let mut key = Vec::new();
        for (i, name) in self.field_names.iter().enumerate() {
            let value = item.named_field(name).unwrap_or(&[]);
            if i == 0 {
                if let Some(subset) = &self.field_value_subset {
                    if !subset.contains(value) {
                        return None;
                    }
                }
            }
            let len = u16::try_from(value.len()).ok()?;
            key.extend_from_slice(&len.to_le_bytes());
            key.extend_from_slice(value);
        }
        Some(key)
    }

    /// Tags a grouped item keeps, or `None` to keep all of them.
    #[must_use]
    pub fn projection(&self, sort_field: &str) -> Option<BTreeSet<String>> {
        if self.non_group_by_field_names.is_empty() {
            return None;
        }
        Some(
            self.field_names
                .iter()
                .chain(&self.non_group_by_field_names)
                .cloned()
                .chain(std::iter::once(sort_field.to_string()))
                .collect(),
        )
    }
}

impl VersionSerializable for GroupBy {
    const TYPE_NAME: &'static str = "GroupBy";
    const CURRENT_VERSION: u16 = 1;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, _version: u16) -> CodecResult<()> {
        w.write_count_u16("field_names", self.field_names.len())?;
        for name in &self.field_names {
            w.write_string("field_name", name)?;
        }
        match &self.field_value_subset {
            Some(subset) => {
                w.write_bool(true);
                w.write_count_u16("field_value_subset", subset.len())?;
                for value in subset {
                    w.write_bytes_u16("field_value", value)?;
                }
            }
            None => w.write_bool(false),
        }
        w.write_count_u16("non_group_by_field_names", self.non_group_by_field_names.len())?;
        for name in &self.non_group_by_field_names {
            w.write_string("field_name", name)?;
        }
        Ok(())
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, _version: u16) -> CodecResult<Self> {
        let field_names = read_names(r)?;
        let field_value_subset = if r.read_bool()? {
            let count = r.read_count_u16()?;
            let mut subset = BTreeSet::new();
            for _ in 0..count {
                subset.insert(r.read_bytes_u16()?);
            }
            Some(subset)
        } else {
            None
        };
        Ok(Self {
            field_names,
            field_value_subset,
            non_group_by_field_names: read_names(r)?,
        })
    }
}

fn read_names(r: &mut PrimitiveReader<'_>) -> CodecResult<Vec<String>> {
    let count = r.read_count_u16()?;
    let mut names = Vec::with_capacity(r.capacity_hint(count, 4));
    for _ in 0..count {
        names.push(r.read_string("field_name")?);
    }
    Ok(names)
}

/// Items sharing one composite group key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultItemBag {
    /// The composite key.
    pub composite_key: Vec<u8>,
    /// Items in comparer order, unique by `(index_id, item_id)`.
    pub items: Vec<ResultItem>,
}

impl ResultItemBag {
    /// Creates an empty bag.
    #[must_use]
    pub fn new(composite_key: Vec<u8>) -> Self {
        Self {
            composite_key,
            items: Vec::new(),
        }
    }

    /// Inserts an item in order. When the bag already holds the same
    /// `(index_id, item_id)`, the copy that sorts first is kept.
    pub fn add(&mut self, item: ResultItem, comparer: &ItemComparer) {
        if let Some(pos) = self.items.iter().position(|existing| {
            existing.index_id == item.index_id && existing.item.item_id == item.item.item_id
        }) {
            if comparer.compare_total(&self.items[pos], &item) != Ordering::Greater {
                return;
            }
            self.items.remove(pos);
        }
        let at = self
            .items
            .partition_point(|existing| comparer.compare_total(existing, &item) == Ordering::Less);
        self.items.insert(at, item);
    }

    /// Adds every item of `other`.
    pub fn union(&mut self, other: ResultItemBag, comparer: &ItemComparer) {
        for item in other.items {
            self.add(item, comparer);
        }
    }

    fn compare(&self, other: &ResultItemBag, comparer: &ItemComparer) -> Ordering {
        let first = match (self.items.first(), other.items.first()) {
            (Some(a), Some(b)) => comparer.compare_total(a, b),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        first.then_with(|| self.composite_key.cmp(&other.composite_key))
    }
}

/// Bags ordered by their leading item under a comparer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroupByResult {
    /// Orders items within and across bags.
    pub comparer: ItemComparer,
    bags: Vec<ResultItemBag>,
}

impl GroupByResult {
    /// Creates an empty result.
    #[must_use]
    pub fn new(comparer: ItemComparer) -> Self {
        Self {
            comparer,
            bags: Vec::new(),
        }
    }

    /// Bags in order.
    #[must_use]
    pub fn bags(&self) -> &[ResultItemBag] {
        &self.bags
    }

    /// Number of bags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bags.len()
    }

    /// Returns true if there are no bags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bags.is_empty()
    }

    /// Every item across all bags, bag by bag.
    pub fn items(&self) -> impl Iterator<Item = &ResultItem> {
        self.bags.iter().flat_map(|bag| bag.items.iter())
    }

    /// Adds one item to the bag for `composite_key`.
    pub fn add(&mut self, composite_key: Vec<u8>, item: ResultItem) {
        let mut bag = self.take_bag(&composite_key);
        bag.add(item, &self.comparer);
        self.insert_bag(bag);
    }

    /// Unions a whole bag into the result.
    pub fn add_bag(&mut self, incoming: ResultItemBag) {
        let mut bag = self.take_bag(&incoming.composite_key);
        bag.union(incoming, &self.comparer);
        self.insert_bag(bag);
    }

    /// Unions every bag of `other` into this result.
    pub fn merge(&mut self, other: GroupByResult) {
        for bag in other.bags {
            self.add_bag(bag);
        }
    }

    /// Keeps the first `max_bags` bags; zero keeps all.
    pub fn truncate(&mut self, max_bags: usize) {
        if max_bags > 0 {
            self.bags.truncate(max_bags);
        }
    }

    /// Keeps bags `[skip, skip + take)`.
    pub fn page(&mut self, skip: usize, take: usize) {
        let end = skip.saturating_add(take).min(self.bags.len());
        let start = skip.min(end);
        self.bags.truncate(end);
        self.bags.drain(..start);
    }

    fn take_bag(&mut self, composite_key: &[u8]) -> ResultItemBag {
        match self
            .bags
            .iter()
            .position(|bag| bag.composite_key == composite_key)
        {
            Some(pos) => self.bags.remove(pos),
            None => ResultItemBag::new(composite_key.to_vec()),
        }
    }

    fn insert_bag(&mut self, bag: ResultItemBag) {
        let comparer = &self.comparer;
        let at = self
            .bags
            .binary_search_by(|existing| existing.compare(&bag, comparer))
            .unwrap_or_else(|pos| pos);
        self.bags.insert(at, bag);
    }

    /// Write the bags. The comparer travels separately.
    pub fn write(&self, w: &mut PrimitiveWriter<'_>) -> CodecResult<()> {
        w.write_count_i32("bags", self.bags.len())?;
        for bag in &self.bags {
            w.write_bytes_u16("composite_key", &bag.composite_key)?;
            write_result_items(w, &bag.items)?;
        }
        Ok(())
    }

    /// Read bags written by [`GroupByResult::write`], reordering them under
    /// `comparer`.
    pub fn read(r: &mut PrimitiveReader<'_>, comparer: ItemComparer) -> CodecResult<Self> {
        let count = r.read_count_i32("bags")?;
        let mut result = Self::new(comparer);
        for _ in 0..count {
            let mut bag = ResultItemBag::new(r.read_bytes_u16()?);
            for item in read_result_items(r)? {
                bag.add(item, &result.comparer);
            }
            result.add_bag(bag);
        }
        Ok(result)
    }
}
