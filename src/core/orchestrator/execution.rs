//! Batch execution and finalization
//!
//! Items are processed one at a time so the number of concurrent upstream
//! calls stays bounded and backoff timing stays predictable. Every item
//! ends in a terminal status: generation failures are recorded into the
//! ledger and the loop moves on.

use chrono::Utc;
use std::collections::HashMap;
use tracing::{error, info, warn};

use super::Orchestrator;
use crate::core::generation::GeneratedImage;
use crate::core::types::{BatchItem, BatchRequest, BatchStatus, JobState};
use crate::notify::notify_best_effort;
use crate::storage::CostRecord;
use crate::utils::error::{ForgeError, Result};

impl Orchestrator {
    /// Process every item of an admitted batch, sequentially
    pub(super) async fn run_batch(&self, request: &BatchRequest, job: &JobState) {
        info!(
            "Processing batch {}: {} items",
            job.batch_id,
            request.items.len()
        );

        for item in &request.items {
            if let Err(e) = self.process_item(request, job, item).await {
                // Ledger bookkeeping failed for this item; record a terminal
                // failure so the item is never left abandoned.
                error!(
                    "Item {} of batch {} hit an internal error: {}",
                    item.scene_id, job.batch_id, e
                );
                let _ = self
                    .ledger
                    .fail_item(
                        &job.batch_id,
                        &item.scene_id,
                        format!("internal error: {}", e),
                    )
                    .await;
            }
        }
    }

    /// Drive one item through reference refresh, generation and ledger updates
    async fn process_item(
        &self,
        request: &BatchRequest,
        job: &JobState,
        item: &BatchItem,
    ) -> Result<()> {
        self.ledger
            .mark_item_running(&job.batch_id, &item.scene_id)
            .await?;
        self.notify_item(request, &item.scene_id, "running", None)
            .await;

        // Re-derive reference URLs if the batch has outlived their signatures
        let references = self
            .refresher
            .refresh(job.started_at, &request.references)
            .await;
        let reference_urls: Vec<String> = references.iter().map(|r| r.url.clone()).collect();

        let mut outputs: Vec<GeneratedImage> = Vec::with_capacity(item.variant_count as usize);
        let mut failure: Option<String> = None;

        for variant in 0..item.variant_count {
            let result = self
                .retry
                .run(|| {
                    self.generator
                        .generate(&item.prompt, &reference_urls, variant)
                })
                .await;

            match result {
                Ok(image) => outputs.push(image),
                Err(e) => {
                    warn!(
                        "Generation failed for scene {} variant {}: {}",
                        item.scene_id, variant, e
                    );
                    failure = Some(e.to_string());
                    break;
                }
            }
        }

        match failure {
            None => {
                self.ledger
                    .complete_item(&job.batch_id, &item.scene_id, outputs)
                    .await?;
                self.notify_item(request, &item.scene_id, "completed", None)
                    .await;
            }
            Some(message) => {
                self.ledger
                    .fail_item(&job.batch_id, &item.scene_id, message.clone())
                    .await?;
                self.notify_item(request, &item.scene_id, "failed", Some(message))
                    .await;
            }
        }

        Ok(())
    }

    /// Finalize a finished batch: terminal ledger write, spend, audit line
    pub(super) async fn finalize_batch(
        &self,
        request: &BatchRequest,
        batch_id: &str,
    ) -> Result<(JobState, f64)> {
        let state = match self.ledger.finalize(batch_id, BatchStatus::Completed).await {
            Ok(state) => state,
            Err(e) => {
                // The terminal write did not land in the store; this
                // instance still knows the true state and the batch did run,
                // so spend must still be booked.
                error!("Terminal ledger write failed for {}: {}", batch_id, e);
                self.ledger
                    .get_job(batch_id)
                    .await?
                    .ok_or_else(|| ForgeError::NotFound(format!("Job not found: {}", batch_id)))?
            }
        };

        let actual = self.cost.actual_cost(&state);
        self.budget.record_spend(&request.user_id, actual).await;

        let record = CostRecord {
            timestamp: Utc::now(),
            user_id: request.user_id.clone(),
            batch_id: batch_id.to_string(),
            prompt_summary: summarize_prompts(&request.items),
            image_count: state.generated_image_count(),
            cost: actual,
        };
        if let Err(e) = self
            .store
            .append_ledger_line(Utc::now().date_naive(), &record)
            .await
        {
            // Audit-only data; the batch result stands, reconciliation will
            // notice the gap.
            error!("Failed to append cost ledger line for {}: {}", batch_id, e);
        }

        info!(
            "Batch {} finalized: {} completed, {} failed, billed ${:.2}",
            batch_id,
            state.completed_count(),
            state.failed_count(),
            actual
        );
        Ok((state, actual))
    }

    async fn notify_item(
        &self,
        request: &BatchRequest,
        scene_id: &str,
        status: &str,
        error: Option<String>,
    ) {
        let Some(sheet_id) = request.sheet_id.as_deref() else {
            return;
        };

        let mut fields = HashMap::new();
        fields.insert("status".to_string(), status.to_string());
        if let Some(error) = error {
            fields.insert("error".to_string(), error);
        }
        notify_best_effort(self.sink.as_ref(), sheet_id, scene_id, fields).await;
    }
}

/// Short human-readable description of the batch for the cost ledger
fn summarize_prompts(items: &[BatchItem]) -> String {
    const MAX_PROMPT_CHARS: usize = 80;

    let first = items
        .first()
        .map(|i| i.prompt.chars().take(MAX_PROMPT_CHARS).collect::<String>())
        .unwrap_or_default();
    if items.len() > 1 {
        format!("{} (+{} more)", first, items.len() - 1)
    } else {
        first
    }
}
