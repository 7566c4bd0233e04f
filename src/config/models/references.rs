//! Reference URL refresh configuration

use serde::{Deserialize, Serialize};

/// Configuration for refreshing time-limited reference URLs
///
/// Signed reference URLs can expire while a long batch is still running.
/// Once a batch has been running longer than `staleness_secs`, reference
/// URLs are re-derived from their canonical locators before each item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceConfig {
    /// Batch age after which reference URLs are considered stale, in seconds
    #[serde(default = "default_staleness_secs")]
    pub staleness_secs: u64,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            staleness_secs: default_staleness_secs(),
        }
    }
}

fn default_staleness_secs() -> u64 {
    1_800
}
