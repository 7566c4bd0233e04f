//! In-memory object store
//!
//! Used in tests and embedded deployments. State does not survive a process
//! restart, so it provides the [`ObjectStore`] contract without the
//! durability production deployments need.

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

use super::object_store::{CostRecord, ObjectStore};
use crate::core::types::JobState;
use crate::utils::error::Result;

/// In-memory [`ObjectStore`] implementation
#[derive(Default)]
pub struct MemoryStore {
    jobs: RwLock<HashMap<String, JobState>>,
    ledger: RwLock<BTreeMap<NaiveDate, Vec<CostRecord>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger lines recorded for one day, for inspection in tests
    pub fn ledger_lines(&self, bucket: NaiveDate) -> Vec<CostRecord> {
        self.ledger
            .read()
            .get(&bucket)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of stored job state documents
    pub fn job_count(&self) -> usize {
        self.jobs.read().len()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put_job_state(&self, batch_id: &str, state: &JobState) -> Result<()> {
        self.jobs
            .write()
            .insert(batch_id.to_string(), state.clone());
        Ok(())
    }

    async fn get_job_state(&self, batch_id: &str) -> Result<Option<JobState>> {
        Ok(self.jobs.read().get(batch_id).cloned())
    }

    async fn append_ledger_line(&self, bucket: NaiveDate, record: &CostRecord) -> Result<()> {
        self.ledger
            .write()
            .entry(bucket)
            .or_default()
            .push(record.clone());
        Ok(())
    }
}
