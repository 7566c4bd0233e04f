//! Object store interface and persisted record types

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::core::types::JobState;
use crate::utils::error::Result;

/// One audit line in the day-partitioned cost ledger
///
/// Append-only; never mutated after write. Used for reconciliation, not for
/// control decisions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostRecord {
    /// When the batch finished
    pub timestamp: DateTime<Utc>,
    /// User billed for the batch
    pub user_id: String,
    /// Batch fingerprint
    pub batch_id: String,
    /// Short human-readable description of what was generated
    pub prompt_summary: String,
    /// Images actually generated (completed items only)
    pub image_count: u32,
    /// Billed cost in dollars
    pub cost: f64,
}

/// Durable store for job state and the cost ledger
///
/// Job state is keyed by batch id and overwritten on every update; ledger
/// lines are appended to a per-day partition, one JSON record per line.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write (or overwrite) the state document for a batch
    async fn put_job_state(&self, batch_id: &str, state: &JobState) -> Result<()>;

    /// Fetch the state document for a batch
    async fn get_job_state(&self, batch_id: &str) -> Result<Option<JobState>>;

    /// Append one cost record to the given day's ledger partition
    async fn append_ledger_line(&self, bucket: NaiveDate, record: &CostRecord) -> Result<()>;
}
