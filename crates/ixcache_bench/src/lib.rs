//! Benchmark utilities.

#![warn(missing_docs)]

use ixcache_core::{
    DataType, IndexId, IndexItem, IndexSpec, IndexStore, ItemComparer, MutationBatch,
    PrimarySortInfo, ResultItem, SortBy, SortOrder,
};
use ixcache_storage::InMemoryBackend;
use rand::Rng;

/// Tag every generated entry is sorted on.
pub const SCORE_TAG: &str = "score";

/// Descending `Int32` sort on [`SCORE_TAG`].
pub fn score_sort() -> PrimarySortInfo {
    PrimarySortInfo::by_tag(SCORE_TAG, vec![SortOrder::new(DataType::Int32, SortBy::Desc)])
}

/// Comparer matching [`score_sort`].
pub fn score_comparer() -> ItemComparer {
    ItemComparer::from(&score_sort())
}

/// Generate random payload bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate entries with random scores, a `kind` tag and a payload.
pub fn generate_items(count: usize, payload_size: usize) -> Vec<IndexItem> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| {
            let score: i32 = rng.gen_range(0..1_000_000);
            IndexItem::new((i as u32).to_le_bytes().to_vec())
                .with_tag(SCORE_TAG, score.to_le_bytes().to_vec())
                .with_tag("kind", vec![(i % 8) as u8])
                .with_data(random_data(payload_size))
        })
        .collect()
}

/// `lists` result lists of `per_list` entries, each sorted by score.
pub fn sorted_result_lists(lists: usize, per_list: usize) -> Vec<Vec<ResultItem>> {
    let comparer = score_comparer();
    (0..lists)
        .map(|list| {
            let index_id = IndexId::from(list as i32 + 1);
            let mut items: Vec<ResultItem> = generate_items(per_list, 0)
                .into_iter()
                .map(|item| ResultItem::new(index_id.clone(), item))
                .collect();
            items.sort_by(|a, b| comparer.compare(a, b));
            items
        })
        .collect()
}

/// An in-memory store holding one index of `count` entries.
pub fn loaded_store(count: usize, payload_size: usize) -> (IndexStore<InMemoryBackend>, IndexId, IndexSpec) {
    let store = IndexStore::new(InMemoryBackend::new());
    let index_id = IndexId::from(1);
    let spec = IndexSpec::new("ByScore", score_sort());
    let batch = MutationBatch::new().with_add(generate_items(count, payload_size));
    store
        .write_index_mutation(&index_id, &spec, &batch)
        .expect("Failed to load index");
    (store, index_id, spec)
}
