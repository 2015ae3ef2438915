//! Index type configuration.

use crate::error::{CoreError, CoreResult};
use crate::types::PrimarySortInfo;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

fn default_trim_from_tail() -> bool {
    true
}

/// One named index of a cache type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Index name, matched case-insensitively.
    pub name: String,

    /// Sort field and key layout.
    #[serde(default)]
    pub primary_sort: PrimarySortInfo,

    /// Entry cap (0 = unbounded).
    #[serde(default)]
    pub max_index_size: usize,

    /// Trim overflow from the tail rather than the head.
    #[serde(default = "default_trim_from_tail")]
    pub trim_from_tail: bool,
}

impl IndexSpec {
    /// Creates an unbounded index sorted by `primary_sort`.
    #[must_use]
    pub fn new(name: impl Into<String>, primary_sort: PrimarySortInfo) -> Self {
        Self {
            name: name.into(),
            primary_sort,
            max_index_size: 0,
            trim_from_tail: true,
        }
    }

    /// Sets the entry cap.
    #[must_use]
    pub const fn with_max_index_size(mut self, max: usize) -> Self {
        self.max_index_size = max;
        self
    }

    /// Sets the trim end.
    #[must_use]
    pub const fn with_trim_from_tail(mut self, value: bool) -> Self {
        self.trim_from_tail = value;
        self
    }
}

/// The indexes served by a node and the tags whose string values are
/// interned.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexTypeConfig {
    /// Configured indexes; the first is the default target.
    pub indexes: Vec<IndexSpec>,

    /// Tags recorded in the string-hash registry.
    #[serde(default)]
    pub string_hash_tags: Vec<String>,
}

impl IndexTypeConfig {
    /// Creates a configuration from index specs.
    #[must_use]
    pub fn new(indexes: Vec<IndexSpec>) -> Self {
        Self {
            indexes,
            string_hash_tags: Vec::new(),
        }
    }

    /// Sets the string-hash tags.
    #[must_use]
    pub fn with_string_hash_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.string_hash_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Parses and validates JSON.
    pub fn from_json(text: &str) -> CoreResult<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| CoreError::invalid_config(format!("index type config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that there is at least one index, names are non-empty and
    /// unique, and every sort declares at least one key segment.
    pub fn validate(&self) -> CoreResult<()> {
        if self.indexes.is_empty() {
            return Err(CoreError::invalid_config("no indexes configured"));
        }
        let mut seen = HashSet::new();
        for spec in &self.indexes {
            if spec.name.is_empty() {
                return Err(CoreError::invalid_config("index name is empty"));
            }
            if !seen.insert(spec.name.to_ascii_lowercase()) {
                return Err(CoreError::invalid_config(format!(
                    "duplicate index name '{}'",
                    spec.name
                )));
            }
            if spec.primary_sort.sort_orders.is_empty() {
                return Err(CoreError::invalid_config(format!(
                    "index '{}' has no sort orders",
                    spec.name
                )));
            }
        }
        Ok(())
    }

    /// Resolves a target index name; empty selects the default index.
    pub fn resolve(&self, target: &str) -> CoreResult<&IndexSpec> {
        let found = if target.is_empty() {
            self.indexes.first()
        } else {
            self.indexes
                .iter()
                .find(|spec| spec.name.eq_ignore_ascii_case(target))
        };
        found.ok_or_else(|| CoreError::UnknownIndex {
            name: target.to_string(),
        })
    }

    /// Returns true if `tag` is interned.
    #[must_use]
    pub fn is_string_hash_tag(&self, tag: &str) -> bool {
        self.string_hash_tags.iter().any(|t| t == tag)
    }
}
