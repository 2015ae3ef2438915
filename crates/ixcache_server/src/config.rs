//! Node configuration.

use crate::error::{ServerError, ServerResult};
use ixcache_codec::MAX_BATCH_MESSAGES;
use ixcache_core::IndexTypeConfig;
use serde::{Deserialize, Serialize};

fn default_max_batch_messages() -> usize {
    1024
}

/// Configuration for one cache node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node name used in logs.
    pub name: String,
    /// The indexes this node serves.
    pub index_types: IndexTypeConfig,
    /// Most messages accepted in one framed batch.
    #[serde(default = "default_max_batch_messages")]
    pub max_batch_messages: usize,
}

impl NodeConfig {
    /// Creates a node configuration.
    pub fn new(name: impl Into<String>, index_types: IndexTypeConfig) -> Self {
        Self {
            name: name.into(),
            index_types,
            max_batch_messages: default_max_batch_messages(),
        }
    }

    /// Sets the batch limit.
    pub fn with_max_batch_messages(mut self, max: usize) -> Self {
        self.max_batch_messages = max;
        self
    }

    /// Loads a configuration from JSON and validates it.
    pub fn from_json(text: &str) -> ServerResult<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ServerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the index types and the batch limit.
    pub fn validate(&self) -> ServerResult<()> {
        self.index_types.validate()?;
        if self.max_batch_messages == 0 || self.max_batch_messages > MAX_BATCH_MESSAGES {
            return Err(ServerError::Config(format!(
                "max_batch_messages must be in 1..={MAX_BATCH_MESSAGES}, got {}",
                self.max_batch_messages
            )));
        }
        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::new("node", IndexTypeConfig::default())
    }
}
