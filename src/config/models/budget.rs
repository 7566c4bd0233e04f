//! Budget configuration

use serde::{Deserialize, Serialize};

/// Per-user daily budget configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Maximum spend per user per calendar day, in dollars
    #[serde(default = "default_daily_limit")]
    pub daily_limit: f64,
    /// Flat cost per generated image, in dollars
    #[serde(default = "default_cost_per_image")]
    pub cost_per_image: f64,
    /// Fraction of the daily limit that raises an out-of-band alert
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            daily_limit: default_daily_limit(),
            cost_per_image: default_cost_per_image(),
            alert_threshold: default_alert_threshold(),
        }
    }
}

fn default_daily_limit() -> f64 {
    10.0
}

fn default_cost_per_image() -> f64 {
    0.04
}

fn default_alert_threshold() -> f64 {
    0.8
}
