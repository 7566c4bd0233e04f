//! Configuration management for the orchestration core
//!
//! This module handles loading and validation of all orchestrator configuration.

pub mod models;

pub use models::*;

use crate::utils::error::{ForgeError, Result};
use std::path::Path;
use tracing::{debug, info};

/// Main configuration struct for the orchestration core
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Config {
    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Idempotency configuration
    #[serde(default)]
    pub idempotency: IdempotencyConfig,
    /// Budget configuration
    #[serde(default)]
    pub budget: BudgetConfig,
    /// Retry configuration
    #[serde(default)]
    pub retry: RetryConfig,
    /// Reference URL refresh configuration
    #[serde(default)]
    pub references: ReferenceConfig,
    /// Progress streaming configuration
    #[serde(default)]
    pub streaming: StreamingConfig,
    /// Object store configuration
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {:?}", path);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ForgeError::Config(format!("Failed to read config file: {}", e)))?;

        let config = Self::from_yaml(&content)?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| ForgeError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.budget.daily_limit <= 0.0 {
            return Err(ForgeError::Config(
                "budget.daily_limit must be positive".to_string(),
            ));
        }
        if self.budget.cost_per_image < 0.0 {
            return Err(ForgeError::Config(
                "budget.cost_per_image must not be negative".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.budget.alert_threshold) {
            return Err(ForgeError::Config(
                "budget.alert_threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ForgeError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.streaming.poll_interval_ms == 0 || self.streaming.heartbeat_interval_ms == 0 {
            return Err(ForgeError::Config(
                "streaming intervals must be positive".to_string(),
            ));
        }
        if self.streaming.poll_interval_ms > self.streaming.heartbeat_interval_ms {
            return Err(ForgeError::Config(
                "streaming.poll_interval_ms must not exceed streaming.heartbeat_interval_ms"
                    .to_string(),
            ));
        }
        self.storage.validate()?;

        Ok(())
    }
}
