//! # sceneforge
//!
//! Batch orchestration core for human-in-the-loop AI image generation.
//! Takes externally supplied prompts in bounded batches and drives them
//! through admission control, sequential generation and durable progress
//! tracking.
//!
//! ## Features
//!
//! - **Idempotent admission**: deterministic batch fingerprints deduplicate
//!   retried submissions for 24 hours
//! - **Budget control**: per-user daily spend caps checked pre-flight,
//!   actual spend booked post-flight
//! - **Rate limiting**: per-user cooldown with atomic check-and-reserve
//! - **Retries**: bounded exponential backoff with jitter around the flaky
//!   generation call, with retryable/fatal error classification
//! - **Partial failure isolation**: one item failing never aborts its
//!   siblings
//! - **Progress streaming**: poll + heartbeat event stream over the durable
//!   job ledger
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sceneforge::{
//!     BatchItem, BatchRequest, Config, Orchestrator, SubmissionMode,
//! };
//!
//! # async fn example(
//! #     generator: Arc<dyn sceneforge::ImageGenerator>,
//! #     resolver: Arc<dyn sceneforge::ReferenceResolver>,
//! # ) -> sceneforge::Result<()> {
//! let config = Config::default();
//! let store = sceneforge::storage::from_config(&config.storage).await?;
//! let orchestrator = Orchestrator::new(
//!     config,
//!     store,
//!     generator,
//!     resolver,
//!     Arc::new(sceneforge::notify::NoopSink),
//! );
//!
//! let outcome = orchestrator
//!     .submit_batch(BatchRequest {
//!         user_id: "u1".to_string(),
//!         items: vec![BatchItem {
//!             scene_id: "scene-1".to_string(),
//!             prompt: "a castle at dusk".to_string(),
//!             variant_count: 2,
//!         }],
//!         references: Vec::new(),
//!         sheet_id: None,
//!         mode: SubmissionMode::Live,
//!     })
//!     .await?;
//!
//! println!("batch {} accepted={}", outcome.batch_id, outcome.accepted);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_inception)]

// Public module exports
pub mod config;
pub mod core;
pub mod notify;
pub mod storage;
pub mod utils;

// Re-export main types
pub use config::Config;
pub use utils::error::{ForgeError, Result};
pub use utils::logging::init_tracing;

pub use core::fingerprint::generate_batch_id;
pub use core::generation::{GeneratedImage, GenerationError, ImageGenerator};
pub use core::orchestrator::Orchestrator;
pub use core::references::{ReferenceImage, ReferenceResolver};
pub use core::streaming::ProgressEvent;
pub use core::types::{
    BatchItem, BatchRequest, BatchStatus, ItemStatus, JobState, Rejection, RejectionCode,
    SubmissionMode, SubmitOutcome,
};

pub use notify::{NoopSink, StatusSink};
pub use storage::{CostRecord, LocalStore, MemoryStore, ObjectStore};

// Version information
/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Name of the crate
pub const NAME: &str = env!("CARGO_PKG_NAME");
