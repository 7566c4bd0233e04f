//! Core batch orchestration components

pub mod budget;
pub mod cost;
pub mod fingerprint;
pub mod generation;
pub mod idempotency;
pub mod ledger;
pub mod orchestrator;
pub mod rate_limiter;
pub mod references;
pub mod retry;
pub mod streaming;
pub mod types;
