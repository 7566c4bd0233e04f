//! Local filesystem object store
//!
//! Job state lives under `jobs/<batch_id>.json`, one document per batch.
//! The cost ledger lives under `ledger/<YYYY-MM-DD>.jsonl`, one JSON record
//! per line, append-only and human-inspectable for reconciliation.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::object_store::{CostRecord, ObjectStore};
use crate::core::types::JobState;
use crate::utils::error::{ForgeError, Result};

/// Filesystem-backed [`ObjectStore`]
#[derive(Debug, Clone)]
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    /// Create a local store rooted at `base_path`, creating directories as needed
    pub async fn new(base_path: &str) -> Result<Self> {
        let base = PathBuf::from(base_path);

        for sub in ["jobs", "ledger"] {
            fs::create_dir_all(base.join(sub)).await.map_err(|e| {
                ForgeError::Storage(format!("Failed to create storage directory: {}", e))
            })?;
        }

        info!("Local object store initialized at: {}", base.display());
        Ok(Self { base_path: base })
    }

    fn job_path(&self, batch_id: &str) -> PathBuf {
        self.base_path.join("jobs").join(format!("{}.json", batch_id))
    }

    fn ledger_path(&self, bucket: NaiveDate) -> PathBuf {
        self.base_path
            .join("ledger")
            .join(format!("{}.jsonl", bucket.format("%Y-%m-%d")))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put_job_state(&self, batch_id: &str, state: &JobState) -> Result<()> {
        let path = self.job_path(batch_id);
        let content = serde_json::to_vec_pretty(state)
            .map_err(|e| ForgeError::Storage(format!("Failed to serialize job state: {}", e)))?;

        fs::write(&path, content)
            .await
            .map_err(|e| ForgeError::Storage(format!("Failed to write job state: {}", e)))?;

        debug!("Job state written: {}", batch_id);
        Ok(())
    }

    async fn get_job_state(&self, batch_id: &str) -> Result<Option<JobState>> {
        let path = self.job_path(batch_id);

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ForgeError::Storage(format!(
                    "Failed to read job state: {}",
                    e
                )));
            }
        };

        let state: JobState = serde_json::from_str(&content)
            .map_err(|e| ForgeError::Storage(format!("Failed to parse job state: {}", e)))?;
        Ok(Some(state))
    }

    async fn append_ledger_line(&self, bucket: NaiveDate, record: &CostRecord) -> Result<()> {
        let path = self.ledger_path(bucket);
        let mut line = serde_json::to_string(record)
            .map_err(|e| ForgeError::Storage(format!("Failed to serialize ledger line: {}", e)))?;
        line.push('\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| ForgeError::Storage(format!("Failed to open ledger partition: {}", e)))?;

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| ForgeError::Storage(format!("Failed to append ledger line: {}", e)))?;

        debug!("Ledger line appended for {}", record.batch_id);
        Ok(())
    }
}
