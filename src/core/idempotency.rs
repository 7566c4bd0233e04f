//! Idempotency store
//!
//! Records which batch fingerprints have already been admitted so that a
//! retried submission returns the original batch instead of re-executing
//! work. Records expire passively after a TTL; expired entries are ignored
//! by lookups rather than deleted eagerly.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::utils::error::Result;

/// Compact description of the admitted item set, returned to duplicate callers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemSummary {
    /// Number of items in the batch
    pub item_count: u32,
    /// Total variants across all items
    pub image_count: u32,
}

/// One admitted fingerprint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdempotencyRecord {
    /// The batch fingerprint
    pub fingerprint: String,
    /// First admission time; preserved across duplicate `store` calls
    pub created_at: DateTime<Utc>,
    /// When the record stops deduplicating
    pub expires_at: DateTime<Utc>,
    /// User who owns the original admission
    pub owner_user_id: String,
    /// Summary of the admitted items
    pub item_summary: ItemSummary,
}

impl IdempotencyRecord {
    /// Whether the record is past its TTL
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Outcome of an insert-if-absent attempt
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOutcome {
    /// The fingerprint was not present; this caller owns the admission
    Inserted,
    /// A valid record already exists; the original record is returned
    Duplicate(IdempotencyRecord),
}

/// In-memory idempotency store with per-fingerprint atomic insert-if-absent
///
/// Operations are `Result`-typed: a shared-store backend can fail, and the
/// caller must treat any failure as "cannot confirm idempotency" and reject
/// the submission rather than risking a double execution.
pub struct IdempotencyStore {
    records: DashMap<String, IdempotencyRecord>,
    ttl: ChronoDuration,
}

impl IdempotencyStore {
    /// Create a store with the given record TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            records: DashMap::new(),
            ttl: ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::MAX),
        }
    }

    /// Whether a valid (unexpired) record exists for this fingerprint
    pub fn exists(&self, fingerprint: &str) -> Result<bool> {
        Ok(self.lookup(fingerprint)?.is_some())
    }

    /// Fetch the valid record for a fingerprint, if any
    pub fn lookup(&self, fingerprint: &str) -> Result<Option<IdempotencyRecord>> {
        Ok(self
            .records
            .get(fingerprint)
            .filter(|r| !r.is_expired())
            .map(|r| r.value().clone()))
    }

    /// Atomically insert a record unless a valid one already exists
    ///
    /// A second `store` for the same fingerprint inside the TTL returns the
    /// original record untouched, `created_at` included. An expired record
    /// is replaced as if absent.
    pub fn store(
        &self,
        fingerprint: &str,
        owner_user_id: &str,
        item_summary: ItemSummary,
    ) -> Result<StoreOutcome> {
        let now = Utc::now();
        let fresh = IdempotencyRecord {
            fingerprint: fingerprint.to_string(),
            created_at: now,
            expires_at: now + self.ttl,
            owner_user_id: owner_user_id.to_string(),
            item_summary,
        };

        match self.records.entry(fingerprint.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_expired() {
                    entry.insert(fresh);
                    Ok(StoreOutcome::Inserted)
                } else {
                    debug!("Duplicate submission for fingerprint {}", fingerprint);
                    Ok(StoreOutcome::Duplicate(entry.get().clone()))
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(fresh);
                Ok(StoreOutcome::Inserted)
            }
        }
    }

    /// Remove a record, releasing the fingerprint for resubmission
    ///
    /// Used to roll back an admission whose batch never started (e.g. the
    /// initial ledger write failed).
    pub fn remove(&self, fingerprint: &str) -> Result<()> {
        self.records.remove(fingerprint);
        Ok(())
    }
}
