//! External object store backends
//!
//! Job state and the append-only cost ledger live outside the process so a
//! restart or a second instance can still answer status queries.

pub mod local;
pub mod memory;
pub mod object_store;

pub use local::LocalStore;
pub use memory::MemoryStore;
pub use object_store::{CostRecord, ObjectStore};

use crate::config::{StorageBackend, StorageConfig};
use crate::utils::error::{ForgeError, Result};
use std::sync::Arc;
use tracing::info;

/// Build the configured object store backend
pub async fn from_config(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    info!("Initializing object store: {:?}", config.backend);

    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageBackend::Local => {
            let path = config.local_path.as_ref().ok_or_else(|| {
                ForgeError::Config("storage.local_path is required for the local backend".into())
            })?;
            Ok(Arc::new(LocalStore::new(path).await?))
        }
    }
}
