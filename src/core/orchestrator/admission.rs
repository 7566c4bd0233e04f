//! Admission control
//!
//! Pre-flight checks in fixed order: rate limit, idempotency, budget. A
//! check that cannot be consulted rejects the submission (fail closed); a
//! submission that loses the idempotency race is pointed at the winner's
//! batch instead of being treated as an error.

use tracing::debug;

use super::Orchestrator;
use crate::core::idempotency::{IdempotencyRecord, ItemSummary, StoreOutcome};
use crate::core::types::{BatchRequest, Rejection, RejectionCode, SubmitOutcome};
use crate::utils::error::Result;

/// Outcome of the admission phase
pub(super) enum Admission {
    /// This submission owns the batch and may start processing
    Admitted,
    /// An unexpired admission of the same fingerprint already exists
    Cached(IdempotencyRecord),
    /// One of the checks denied the submission
    Rejected(Rejection),
}

impl Orchestrator {
    /// Run the admission checks for a live submission
    pub(super) async fn admit(
        &self,
        request: &BatchRequest,
        batch_id: &str,
        estimated: f64,
    ) -> Admission {
        // 1. Rate limit: atomic check-and-reserve per user
        let rate = self.rate_limiter.check_and_reserve(&request.user_id).await;
        if !rate.allowed {
            return Admission::Rejected(Rejection {
                code: RejectionCode::RateLimited,
                reason: format!(
                    "cooldown active; retry in {}s",
                    rate.retry_after_secs
                ),
                retry_after_secs: Some(rate.retry_after_secs),
                remaining: None,
            });
        }

        // 2. Idempotency: atomic insert-if-absent on the fingerprint
        let summary = ItemSummary {
            item_count: request.items.len() as u32,
            image_count: request.image_count(),
        };
        match self.idempotency.store(batch_id, &request.user_id, summary) {
            Ok(StoreOutcome::Inserted) => {}
            Ok(StoreOutcome::Duplicate(record)) => return Admission::Cached(record),
            Err(e) => {
                // Cannot confirm idempotency: reject rather than risk a
                // double execution.
                return Admission::Rejected(Rejection::new(
                    RejectionCode::Infrastructure,
                    format!("idempotency store unavailable: {}", e),
                ));
            }
        }

        // 3. Budget: advisory pre-flight check against today's remaining cap
        let budget = self.budget.check_budget(&request.user_id, estimated).await;
        if !budget.allowed {
            // The batch never starts, so the fingerprint must not keep
            // deduplicating future (possibly affordable) resubmissions.
            let _ = self.idempotency.remove(batch_id);
            return Admission::Rejected(Rejection {
                code: RejectionCode::DailyLimitExceeded,
                reason: format!(
                    "estimated cost ${:.2} exceeds remaining daily budget ${:.2} (limit ${:.2})",
                    estimated, budget.remaining, budget.daily_limit
                ),
                retry_after_secs: None,
                remaining: Some(budget.remaining),
            });
        }

        debug!(
            "Batch {} admitted for {} (estimated ${:.2})",
            batch_id, request.user_id, estimated
        );
        Admission::Admitted
    }

    /// Dry-run submission: same checks, read-only, no generation, no spend
    pub(super) async fn dry_run(
        &self,
        request: &BatchRequest,
        batch_id: &str,
        estimated: f64,
    ) -> Result<SubmitOutcome> {
        let rate = self.rate_limiter.check(&request.user_id).await;
        if !rate.allowed {
            return Ok(SubmitOutcome::rejected(
                batch_id,
                estimated,
                Rejection {
                    code: RejectionCode::RateLimited,
                    reason: format!("cooldown active; retry in {}s", rate.retry_after_secs),
                    retry_after_secs: Some(rate.retry_after_secs),
                    remaining: None,
                },
            ));
        }

        match self.idempotency.lookup(batch_id) {
            Ok(Some(_)) => return Ok(SubmitOutcome::cached(batch_id, estimated)),
            Ok(None) => {}
            Err(e) => {
                return Ok(SubmitOutcome::rejected(
                    batch_id,
                    estimated,
                    Rejection::new(
                        RejectionCode::Infrastructure,
                        format!("idempotency store unavailable: {}", e),
                    ),
                ));
            }
        }

        let budget = self.budget.check_budget(&request.user_id, estimated).await;
        if !budget.allowed {
            return Ok(SubmitOutcome::rejected(
                batch_id,
                estimated,
                Rejection {
                    code: RejectionCode::DailyLimitExceeded,
                    reason: format!(
                        "estimated cost ${:.2} exceeds remaining daily budget ${:.2} (limit ${:.2})",
                        estimated, budget.remaining, budget.daily_limit
                    ),
                    retry_after_secs: None,
                    remaining: Some(budget.remaining),
                },
            ));
        }

        Ok(SubmitOutcome::accepted(batch_id, estimated))
    }
}
