//! Batch orchestrator
//!
//! Drives one batch from admission to finalization:
//! `Admitting -> Running -> Finalizing -> Done`, or `Rejected` when an
//! admission check fails. Admission order is fixed: rate limit first (it is
//! the cheapest check and sheds load), then the idempotency lookup (so a
//! duplicate never executes twice), then the budget check (it needs the
//! cost estimate). Items run sequentially; a per-item failure never aborts
//! its siblings.

mod admission;
mod execution;

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::Config;
use crate::core::budget::BudgetGuard;
use crate::core::cost::CostModel;
use crate::core::fingerprint::generate_batch_id;
use crate::core::generation::ImageGenerator;
use crate::core::idempotency::IdempotencyStore;
use crate::core::ledger::JobLedger;
use crate::core::rate_limiter::RateLimiter;
use crate::core::references::{ReferenceRefresher, ReferenceResolver};
use crate::core::retry::RetryExecutor;
use crate::core::streaming::{ProgressEvent, ProgressStreamer};
use crate::core::types::{
    BatchRequest, JobState, Rejection, RejectionCode, SubmissionMode, SubmitOutcome,
};
use crate::notify::StatusSink;
use crate::storage::ObjectStore;
use crate::utils::error::Result;

use admission::Admission;

/// The batch orchestration entry point
pub struct Orchestrator {
    config: Config,
    rate_limiter: RateLimiter,
    idempotency: IdempotencyStore,
    budget: BudgetGuard,
    retry: RetryExecutor,
    refresher: ReferenceRefresher,
    cost: CostModel,
    ledger: Arc<JobLedger>,
    store: Arc<dyn ObjectStore>,
    generator: Arc<dyn ImageGenerator>,
    sink: Arc<dyn StatusSink>,
}

impl Orchestrator {
    /// Wire up an orchestrator from configuration and its collaborators
    pub fn new(
        config: Config,
        store: Arc<dyn ObjectStore>,
        generator: Arc<dyn ImageGenerator>,
        resolver: Arc<dyn ReferenceResolver>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        let rate_limiter = RateLimiter::new(config.rate_limit.clone());
        let idempotency = IdempotencyStore::new(std::time::Duration::from_secs(
            config.idempotency.ttl_secs,
        ));
        let budget = BudgetGuard::new(config.budget.clone());
        let retry = RetryExecutor::new(config.retry.clone());
        let refresher = ReferenceRefresher::new(config.references.clone(), resolver);
        let cost = CostModel::new(&config.budget);
        let ledger = Arc::new(JobLedger::new(store.clone()));

        Self {
            config,
            rate_limiter,
            idempotency,
            budget,
            retry,
            refresher,
            cost,
            ledger,
            store,
            generator,
            sink,
        }
    }

    /// Submit one batch
    ///
    /// Runs admission, and in live mode processes the whole batch to
    /// completion before returning. Admission denials come back as a
    /// structured rejected outcome, never as an error.
    pub async fn submit_batch(&self, request: BatchRequest) -> Result<SubmitOutcome> {
        let batch_id = generate_batch_id(&request.user_id, &request.items);
        let estimated = self.cost.estimate_batch(&request.items);

        if let Some(rejection) = validate_request(&request) {
            return Ok(SubmitOutcome::rejected(batch_id, estimated, rejection));
        }

        match request.mode {
            SubmissionMode::DryRun => self.dry_run(&request, &batch_id, estimated).await,
            SubmissionMode::Live => self.run_live(&request, &batch_id, estimated).await,
        }
    }

    /// Current ledger state of a batch, if it exists
    pub async fn get_batch_status(&self, batch_id: &str) -> Result<Option<JobState>> {
        self.ledger.get_job(batch_id).await
    }

    /// Open a progress stream for a batch
    pub fn stream_progress(
        &self,
        batch_id: &str,
    ) -> tokio_stream::wrappers::ReceiverStream<ProgressEvent> {
        ProgressStreamer::new(self.ledger.clone(), self.config.streaming.clone())
            .stream(batch_id)
    }

    /// The budget guard, for spend inspection
    pub fn budget(&self) -> &BudgetGuard {
        &self.budget
    }

    /// The job ledger shared with streams and status queries
    pub fn ledger(&self) -> Arc<JobLedger> {
        self.ledger.clone()
    }

    async fn run_live(
        &self,
        request: &BatchRequest,
        batch_id: &str,
        estimated: f64,
    ) -> Result<SubmitOutcome> {
        match self.admit(request, batch_id, estimated).await {
            Admission::Rejected(rejection) => {
                info!(
                    "Batch {} rejected at admission: {:?}",
                    batch_id, rejection.code
                );
                Ok(SubmitOutcome::rejected(batch_id, estimated, rejection))
            }
            Admission::Cached(record) => {
                info!(
                    "Batch {} matched an admission from {}; returning cached result",
                    batch_id, record.created_at
                );
                Ok(SubmitOutcome::cached(batch_id, estimated))
            }
            Admission::Admitted => {
                let job = match self.ledger.create_job(batch_id, &request.items).await {
                    Ok(job) => job,
                    Err(e) => {
                        // The batch never started; release the fingerprint so
                        // a retry is not treated as a duplicate.
                        error!("Could not initialize job ledger for {}: {}", batch_id, e);
                        let _ = self.idempotency.remove(batch_id);
                        return Ok(SubmitOutcome::rejected(
                            batch_id,
                            estimated,
                            Rejection::new(
                                RejectionCode::Infrastructure,
                                format!("could not initialize job ledger: {}", e),
                            ),
                        ));
                    }
                };

                self.run_batch(request, &job).await;
                let (_state, actual) = self.finalize_batch(request, batch_id).await?;

                let mut outcome = SubmitOutcome::accepted(batch_id, estimated);
                outcome.actual_cost = Some(actual);
                Ok(outcome)
            }
        }
    }
}

/// Reject structurally invalid submissions before any admission work
fn validate_request(request: &BatchRequest) -> Option<Rejection> {
    if request.items.is_empty() {
        return Some(Rejection::new(
            RejectionCode::InvalidRequest,
            "batch contains no items",
        ));
    }

    let mut seen = HashSet::new();
    for item in &request.items {
        if item.scene_id.is_empty() {
            return Some(Rejection::new(
                RejectionCode::InvalidRequest,
                "item has an empty scene id",
            ));
        }
        if item.prompt.trim().is_empty() {
            return Some(Rejection::new(
                RejectionCode::InvalidRequest,
                format!("scene {}: prompt is empty", item.scene_id),
            ));
        }
        if item.variant_count == 0 {
            return Some(Rejection::new(
                RejectionCode::InvalidRequest,
                format!("scene {}: variant count must be at least 1", item.scene_id),
            ));
        }
        if !seen.insert(&item.scene_id) {
            return Some(Rejection::new(
                RejectionCode::InvalidRequest,
                format!("duplicate scene id: {}", item.scene_id),
            ));
        }
    }

    None
}
