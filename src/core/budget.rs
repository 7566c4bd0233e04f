//! Per-user daily budget guard
//!
//! Tracks cumulative spend per user per calendar day. `check_budget` is the
//! advisory pre-flight gate; `record_spend` books actual cost after a batch
//! finishes. The guard never blocks an in-flight batch retroactively.

use crate::config::BudgetConfig;
use crate::core::types::RejectionCode;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Result of a budget check
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetDecision {
    /// Whether the estimated cost fits into today's remaining budget
    pub allowed: bool,
    /// Unspent budget for today, clamped to >= 0
    pub remaining: f64,
    /// The configured daily cap
    pub daily_limit: f64,
    /// Denial reason, set when not allowed
    pub code: Option<RejectionCode>,
}

/// Spend accumulated by one user for one calendar day
#[derive(Debug, Clone)]
struct BudgetEntry {
    /// Calendar day this entry covers; rolling past it resets the spend
    bucket: NaiveDate,
    spent: f64,
}

/// Budget guard keyed by user id
pub struct BudgetGuard {
    config: BudgetConfig,
    entries: Arc<RwLock<HashMap<String, BudgetEntry>>>,
}

impl BudgetGuard {
    /// Create a budget guard from configuration
    pub fn new(config: BudgetConfig) -> Self {
        Self {
            config,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Check whether `estimated_cost` fits into the user's remaining budget today
    pub async fn check_budget(&self, user_id: &str, estimated_cost: f64) -> BudgetDecision {
        let today = Utc::now().date_naive();
        let limit = self.config.daily_limit;

        let mut entries = self.entries.write().await;
        let entry = entries.entry(user_id.to_string()).or_insert(BudgetEntry {
            bucket: today,
            spent: 0.0,
        });
        if entry.bucket != today {
            entry.bucket = today;
            entry.spent = 0.0;
        }

        let remaining = (limit - entry.spent).max(0.0);
        // Small epsilon so accumulated float error cannot flip an exact fit
        let allowed = entry.spent + estimated_cost <= limit + 1e-9;

        if !allowed {
            debug!(
                "Budget denied for {}: estimated ${:.2}, remaining ${:.2} of ${:.2}",
                user_id, estimated_cost, remaining, limit
            );
        }

        BudgetDecision {
            allowed,
            remaining,
            daily_limit: limit,
            code: (!allowed).then_some(RejectionCode::DailyLimitExceeded),
        }
    }

    /// Record actual spend for a finished batch
    ///
    /// Called at most once per completed batch, with actual completed-item
    /// cost. If the actual cost overshoots what was checked, the overage is
    /// still recorded; crossing the daily limit raises an alert instead of
    /// an error.
    pub async fn record_spend(&self, user_id: &str, actual_cost: f64) -> f64 {
        let today = Utc::now().date_naive();
        let limit = self.config.daily_limit;

        let mut entries = self.entries.write().await;
        let entry = entries.entry(user_id.to_string()).or_insert(BudgetEntry {
            bucket: today,
            spent: 0.0,
        });
        if entry.bucket != today {
            entry.bucket = today;
            entry.spent = 0.0;
        }

        entry.spent += actual_cost;

        if entry.spent > limit {
            warn!(
                "User {} exceeded daily budget: spent ${:.2} of ${:.2}",
                user_id, entry.spent, limit
            );
        } else if entry.spent >= limit * self.config.alert_threshold {
            warn!(
                "User {} is nearing the daily budget: spent ${:.2} of ${:.2}",
                user_id, entry.spent, limit
            );
        }

        entry.spent
    }

    /// Spend booked for this user today
    pub async fn spent_today(&self, user_id: &str) -> f64 {
        let today = Utc::now().date_naive();
        let entries = self.entries.read().await;
        entries
            .get(user_id)
            .filter(|e| e.bucket == today)
            .map(|e| e.spent)
            .unwrap_or(0.0)
    }

    /// Backdate a user's bucket, simulating a day rollover
    #[cfg(test)]
    async fn backdate(&self, user_id: &str, bucket: NaiveDate) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(user_id) {
            entry.bucket = bucket;
        }
    }
}
