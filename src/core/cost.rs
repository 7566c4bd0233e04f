//! Cost estimation and actual-cost computation
//!
//! Pre-flight estimates assume every requested variant is generated; actual
//! cost is computed after the fact from completed items only, so failed
//! items are never billed.

use crate::config::BudgetConfig;
use crate::core::types::{BatchItem, JobState};

/// Flat per-image pricing model
#[derive(Debug, Clone)]
pub struct CostModel {
    cost_per_image: f64,
}

impl CostModel {
    /// Create a cost model from the budget configuration
    pub fn new(config: &BudgetConfig) -> Self {
        Self {
            cost_per_image: config.cost_per_image,
        }
    }

    /// Pre-flight estimate: all requested variants across all items
    pub fn estimate_batch(&self, items: &[BatchItem]) -> f64 {
        let images: u32 = items.iter().map(|i| i.variant_count).sum();
        images as f64 * self.cost_per_image
    }

    /// Actual cost of a finished batch: images generated by completed items
    pub fn actual_cost(&self, job: &JobState) -> f64 {
        job.generated_image_count() as f64 * self.cost_per_image
    }
}
