//! Object store configuration

use crate::utils::error::{ForgeError, Result};
use serde::{Deserialize, Serialize};

/// Object store backend selection
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// In-memory store (tests and embedded use; state is lost on restart)
    #[default]
    Memory,
    /// Local filesystem store (one JSON document per batch, JSONL cost ledger)
    Local,
}

/// Object store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Selected backend
    #[serde(default)]
    pub backend: StorageBackend,
    /// Base directory for the local backend
    #[serde(default)]
    pub local_path: Option<String>,
}

impl StorageConfig {
    /// Validate backend-specific requirements
    pub fn validate(&self) -> Result<()> {
        if self.backend == StorageBackend::Local && self.local_path.is_none() {
            return Err(ForgeError::Config(
                "storage.local_path is required for the local backend".to_string(),
            ));
        }
        Ok(())
    }
}
