//! Tag and string-hash registries.

use ixcache_core::{IndexItem, IndexTypeConfig};
use parking_lot::RwLock;
use std::collections::BTreeSet;

/// Names a node has seen in saved entries.
///
/// Tag names are recorded for every saved entry. Values of the configured
/// string-hash tags are interned as text.
#[derive(Debug, Default)]
pub struct NameRegistry {
    string_hash_tags: BTreeSet<String>,
    tags: RwLock<BTreeSet<String>>,
    strings: RwLock<BTreeSet<String>>,
}

impl NameRegistry {
    /// Creates a registry interning the tags named by `config`.
    pub fn new(config: &IndexTypeConfig) -> Self {
        Self {
            string_hash_tags: config.string_hash_tags.iter().cloned().collect(),
            ..Self::default()
        }
    }

    /// Records the tags of `items`.
    pub fn record<'a>(&self, items: impl IntoIterator<Item = &'a IndexItem>) {
        let mut new_tags = Vec::new();
        let mut new_strings = Vec::new();
        {
            let tags = self.tags.read();
            let strings = self.strings.read();
            for item in items {
                for (name, value) in &item.tags {
                    if !tags.contains(name) {
                        new_tags.push(name.clone());
                    }
                    if self.string_hash_tags.contains(name) {
                        let text = String::from_utf8_lossy(value);
                        if !text.is_empty() && !strings.contains(text.as_ref()) {
                            new_strings.push(text.into_owned());
                        }
                    }
                }
            }
        }
        if !new_tags.is_empty() {
            self.tags.write().extend(new_tags);
        }
        if !new_strings.is_empty() {
            self.strings.write().extend(new_strings);
        }
    }

    /// Sorted tag names.
    pub fn tags(&self) -> BTreeSet<String> {
        self.tags.read().clone()
    }

    /// Sorted interned strings.
    pub fn strings(&self) -> BTreeSet<String> {
        self.strings.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_tags_and_interned_values() {
        let config = IndexTypeConfig::default().with_string_hash_tags(["city"]);
        let registry = NameRegistry::new(&config);
        let items = [
            IndexItem::new(b"a".to_vec())
                .with_tag("city", b"Oslo".to_vec())
                .with_tag("score", vec![1]),
            IndexItem::new(b"b".to_vec()).with_tag("city", b"Lima".to_vec()),
            IndexItem::new(b"c".to_vec()).with_tag("city", Vec::new()),
        ];
        registry.record(&items);
        assert_eq!(
            registry.tags().into_iter().collect::<Vec<_>>(),
            vec!["city", "score"]
        );
        assert_eq!(
            registry.strings().into_iter().collect::<Vec<_>>(),
            vec!["Lima", "Oslo"]
        );
    }
}
