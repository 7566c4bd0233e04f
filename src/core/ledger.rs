//! Job ledger
//!
//! The single source of truth for one batch's progress. The orchestrator
//! that owns a batch is the only writer; the progress streamer and status
//! queries only read. State is mirrored into the external object store
//! after every transition so other instances and restarted processes can
//! still answer status queries.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::core::generation::GeneratedImage;
use crate::core::types::{BatchItem, BatchStatus, ItemStatus, JobState};
use crate::storage::ObjectStore;
use crate::utils::error::{ForgeError, Result};

/// Ledger over an external object store with an in-process cache of active jobs
pub struct JobLedger {
    store: Arc<dyn ObjectStore>,
    active: Arc<RwLock<HashMap<String, JobState>>>,
}

impl JobLedger {
    /// Create a ledger backed by the given object store
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            active: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create the initial state document for a batch
    ///
    /// The initial write must succeed: a batch whose state cannot be
    /// persisted is not allowed to start.
    pub async fn create_job(&self, batch_id: &str, items: &[BatchItem]) -> Result<JobState> {
        let state = JobState::new(batch_id, items);
        self.store.put_job_state(batch_id, &state).await?;

        let mut active = self.active.write().await;
        active.insert(batch_id.to_string(), state.clone());

        info!("Job created: {} ({} items)", batch_id, items.len());
        Ok(state)
    }

    /// Fetch the current state of a batch
    ///
    /// Active jobs are answered from the cache; finished or foreign jobs
    /// fall through to the object store.
    pub async fn get_job(&self, batch_id: &str) -> Result<Option<JobState>> {
        {
            let active = self.active.read().await;
            if let Some(state) = active.get(batch_id) {
                return Ok(Some(state.clone()));
            }
        }

        self.store.get_job_state(batch_id).await
    }

    /// Mark one item as running
    pub async fn mark_item_running(&self, batch_id: &str, scene_id: &str) -> Result<JobState> {
        self.update_item(batch_id, scene_id, |item| {
            item.status = ItemStatus::Running;
        })
        .await
    }

    /// Mark one item as completed with its outputs
    pub async fn complete_item(
        &self,
        batch_id: &str,
        scene_id: &str,
        outputs: Vec<GeneratedImage>,
    ) -> Result<JobState> {
        self.update_item(batch_id, scene_id, |item| {
            item.status = ItemStatus::Completed;
            item.error = None;
            item.outputs = outputs;
        })
        .await
    }

    /// Mark one item as failed with a terminal error message
    pub async fn fail_item(
        &self,
        batch_id: &str,
        scene_id: &str,
        error: impl Into<String>,
    ) -> Result<JobState> {
        let error = error.into();
        self.update_item(batch_id, scene_id, |item| {
            item.status = ItemStatus::Failed;
            item.error = Some(error);
        })
        .await
    }

    /// Write the terminal batch status, exactly once
    ///
    /// Any item somehow left in a non-terminal state is failed here so the
    /// ledger never records an abandoned item. A second finalize call is a
    /// no-op returning the already-terminal state.
    pub async fn finalize(&self, batch_id: &str, status: BatchStatus) -> Result<JobState> {
        let state = {
            let mut active = self.active.write().await;
            let Some(state) = active.get_mut(batch_id) else {
                // Not active anymore: either already finalized (return the
                // stored terminal state untouched) or never created.
                drop(active);
                return match self.store.get_job_state(batch_id).await? {
                    Some(stored) if stored.status.is_terminal() => {
                        debug!("Job {} already finalized as {:?}", batch_id, stored.status);
                        Ok(stored)
                    }
                    _ => Err(ForgeError::NotFound(format!("Job not found: {}", batch_id))),
                };
            };

            if state.status.is_terminal() {
                debug!("Job {} already finalized as {:?}", batch_id, state.status);
                return Ok(state.clone());
            }

            for item in &mut state.items {
                if !item.status.is_terminal() {
                    warn!(
                        "Item {} of batch {} was not terminal at finalize; failing it",
                        item.scene_id, batch_id
                    );
                    item.status = ItemStatus::Failed;
                    item.error = Some("batch finalized before item completed".to_string());
                }
            }

            state.status = status;
            state.recompute_progress();
            state.updated_at = Utc::now();
            state.clone()
        };

        // The terminal write must land in the store, it is what status
        // queries on other instances will see.
        self.store.put_job_state(batch_id, &state).await?;

        let mut active = self.active.write().await;
        active.remove(batch_id);

        info!(
            "Job finalized: {} -> {:?} ({} completed, {} failed)",
            batch_id,
            status,
            state.completed_count(),
            state.failed_count()
        );
        Ok(state)
    }

    async fn update_item(
        &self,
        batch_id: &str,
        scene_id: &str,
        mutate: impl FnOnce(&mut crate::core::types::ItemState),
    ) -> Result<JobState> {
        let state = {
            let mut active = self.active.write().await;
            let state = active
                .get_mut(batch_id)
                .ok_or_else(|| ForgeError::NotFound(format!("Job not found: {}", batch_id)))?;

            let item = state
                .item_mut(scene_id)
                .ok_or_else(|| ForgeError::NotFound(format!("Item not found: {}", scene_id)))?;
            mutate(item);

            state.recompute_progress();
            state.updated_at = Utc::now();
            state.clone()
        };

        // Mid-run persistence is best-effort; the cache stays authoritative
        // for this instance and the terminal write is mandatory.
        if let Err(e) = self.store.put_job_state(batch_id, &state).await {
            warn!("Failed to persist job state for {}: {}", batch_id, e);
        }

        Ok(state)
    }
}
