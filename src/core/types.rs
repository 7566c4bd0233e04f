//! Shared types for batch submissions and job state

use crate::core::generation::GeneratedImage;
use crate::core::references::ReferenceImage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single generation unit within a batch: one scene, N variants
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchItem {
    /// Stable scene identifier within the source material
    pub scene_id: String,
    /// Generation prompt for this scene
    pub prompt: String,
    /// Number of image variants to generate
    pub variant_count: u32,
}

/// Submission mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionMode {
    /// Run admission and cost estimation only; no generation, no spend
    DryRun,
    /// Run the full batch
    Live,
}

/// One batch submission as handed to the orchestrator by the routing layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Submitting user
    pub user_id: String,
    /// Items to generate
    pub items: Vec<BatchItem>,
    /// Reference images shared by all items (may be empty)
    #[serde(default)]
    pub references: Vec<ReferenceImage>,
    /// Spreadsheet to mirror per-item status into, if any
    #[serde(default)]
    pub sheet_id: Option<String>,
    /// Submission mode
    pub mode: SubmissionMode,
}

impl BatchRequest {
    /// Total number of images this request would generate
    pub fn image_count(&self) -> u32 {
        self.items.iter().map(|i| i.variant_count).sum()
    }
}

/// Per-item processing status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Not started yet
    Pending,
    /// Generation in flight
    Running,
    /// All variants generated
    Completed,
    /// Terminal failure after retries
    Failed,
}

impl ItemStatus {
    /// Whether this status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Failed)
    }
}

/// Batch-level status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// The control loop is processing items
    Running,
    /// The control loop finished; item failures stay visible at item level
    Completed,
    /// The batch could not run to completion
    Failed,
}

impl BatchStatus {
    /// Whether this status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Failed)
    }
}

/// State of one item inside the job ledger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemState {
    /// Scene identifier
    pub scene_id: String,
    /// Current status
    pub status: ItemStatus,
    /// Terminal failure message, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Generated outputs, populated on completion
    #[serde(default)]
    pub outputs: Vec<GeneratedImage>,
}

impl ItemState {
    /// A fresh pending item
    pub fn pending(scene_id: impl Into<String>) -> Self {
        Self {
            scene_id: scene_id.into(),
            status: ItemStatus::Pending,
            error: None,
            outputs: Vec::new(),
        }
    }
}

/// Durable per-batch progress record, the single source of truth for one batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobState {
    /// Batch fingerprint
    pub batch_id: String,
    /// Batch-level status
    pub status: BatchStatus,
    /// Fraction of items in a terminal state, 0.0..=1.0, monotonically non-decreasing
    pub progress: f64,
    /// Per-item state, in submission order
    pub items: Vec<ItemState>,
    /// When the batch started
    pub started_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
}

impl JobState {
    /// A fresh running job with all items pending
    pub fn new(batch_id: impl Into<String>, items: &[BatchItem]) -> Self {
        let now = Utc::now();
        Self {
            batch_id: batch_id.into(),
            status: BatchStatus::Running,
            progress: 0.0,
            items: items
                .iter()
                .map(|i| ItemState::pending(i.scene_id.clone()))
                .collect(),
            started_at: now,
            updated_at: now,
        }
    }

    /// Recompute progress from per-item terminal counts
    pub fn recompute_progress(&mut self) {
        if self.items.is_empty() {
            self.progress = 0.0;
            return;
        }
        let terminal = self.items.iter().filter(|i| i.status.is_terminal()).count();
        self.progress = terminal as f64 / self.items.len() as f64;
    }

    /// Find an item by scene id
    pub fn item_mut(&mut self, scene_id: &str) -> Option<&mut ItemState> {
        self.items.iter_mut().find(|i| i.scene_id == scene_id)
    }

    /// Number of completed items
    pub fn completed_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.status == ItemStatus::Completed)
            .count()
    }

    /// Number of failed items
    pub fn failed_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.status == ItemStatus::Failed)
            .count()
    }

    /// Total images generated across completed items
    pub fn generated_image_count(&self) -> u32 {
        self.items
            .iter()
            .filter(|i| i.status == ItemStatus::Completed)
            .map(|i| i.outputs.len() as u32)
            .sum()
    }
}

/// Machine-readable rejection codes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionCode {
    /// The user is still inside the cooldown window
    RateLimited,
    /// The estimated cost would exceed the user's daily cap
    DailyLimitExceeded,
    /// The submission itself is malformed
    InvalidRequest,
    /// An admission dependency could not be consulted; the request is
    /// rejected rather than risking a double spend
    Infrastructure,
}

/// One admission rejection with a human-readable reason
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rejection {
    /// Machine-readable code
    pub code: RejectionCode,
    /// Human-readable reason
    pub reason: String,
    /// Seconds until a retry may succeed, for rate limiting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    /// Unspent daily budget, for budget rejections
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<f64>,
}

impl Rejection {
    /// A plain rejection with no advisory fields
    pub fn new(code: RejectionCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
            retry_after_secs: None,
            remaining: None,
        }
    }
}

/// Structured result of one submission
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmitOutcome {
    /// Deterministic batch id (the fingerprint)
    pub batch_id: String,
    /// Whether the batch was admitted (or matched an existing admission)
    pub accepted: bool,
    /// Whether this submission matched a previously admitted batch
    pub cached: bool,
    /// Rejections, empty when accepted
    pub rejections: Vec<Rejection>,
    /// Pre-flight cost estimate for all requested variants
    pub estimated_cost: f64,
    /// Actual billed cost; present once a live batch has finished
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_cost: Option<f64>,
}

impl SubmitOutcome {
    /// An accepted outcome
    pub fn accepted(batch_id: impl Into<String>, estimated_cost: f64) -> Self {
        Self {
            batch_id: batch_id.into(),
            accepted: true,
            cached: false,
            rejections: Vec::new(),
            estimated_cost,
            actual_cost: None,
        }
    }

    /// A cached outcome pointing at an earlier admission of the same fingerprint
    pub fn cached(batch_id: impl Into<String>, estimated_cost: f64) -> Self {
        Self {
            batch_id: batch_id.into(),
            accepted: true,
            cached: true,
            rejections: Vec::new(),
            estimated_cost,
            actual_cost: None,
        }
    }

    /// A rejected outcome
    pub fn rejected(
        batch_id: impl Into<String>,
        estimated_cost: f64,
        rejection: Rejection,
    ) -> Self {
        Self {
            batch_id: batch_id.into(),
            accepted: false,
            cached: false,
            rejections: vec![rejection],
            estimated_cost,
            actual_cost: None,
        }
    }
}
