//! Router configuration.

use std::time::Duration;

/// Configuration for a router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    /// Deadline for one logical fan-out.
    pub timeout: Duration,
}

impl RouterConfig {
    /// Creates a configuration with the default timeout.
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(5),
        }
    }

    /// Sets the fan-out timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}
