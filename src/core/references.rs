//! Reference URL refreshing
//!
//! Reference images are handed to the orchestrator as time-limited signed
//! URLs paired with a canonical locator. Once a batch has been running long
//! enough for the original URLs to have expired, each URL is re-derived from
//! its locator. A reference that cannot be re-derived is dropped from the
//! set; generation proceeds with fewer references rather than failing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ReferenceConfig;
use crate::utils::error::Result;

/// One reference image: the currently usable URL plus its stable locator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReferenceImage {
    /// Signed, time-limited URL
    pub url: String,
    /// Canonical locator the URL can be re-derived from
    pub locator: String,
}

/// Re-derives a signed URL from a canonical locator
#[async_trait]
pub trait ReferenceResolver: Send + Sync {
    /// Produce a fresh signed URL for `locator`
    async fn resolve(&self, locator: &str) -> Result<String>;
}

/// Refreshes reference URLs for long-running batches
pub struct ReferenceRefresher {
    config: ReferenceConfig,
    resolver: Arc<dyn ReferenceResolver>,
}

impl ReferenceRefresher {
    /// Create a refresher from configuration and a resolver
    pub fn new(config: ReferenceConfig, resolver: Arc<dyn ReferenceResolver>) -> Self {
        Self { config, resolver }
    }

    /// Return usable reference URLs for the next generation call
    ///
    /// While the batch is younger than the staleness threshold, the original
    /// URLs are returned as-is. Past it, every URL is re-derived from its
    /// locator; failed re-derivations drop that reference only.
    pub async fn refresh(
        &self,
        batch_started_at: DateTime<Utc>,
        references: &[ReferenceImage],
    ) -> Vec<ReferenceImage> {
        if references.is_empty() {
            return Vec::new();
        }

        let age_secs = (Utc::now() - batch_started_at).num_seconds().max(0) as u64;
        if age_secs < self.config.staleness_secs {
            return references.to_vec();
        }

        debug!(
            "Refreshing {} reference URLs (batch age {}s)",
            references.len(),
            age_secs
        );

        let mut refreshed = Vec::with_capacity(references.len());
        for reference in references {
            match self.resolver.resolve(&reference.locator).await {
                Ok(url) => refreshed.push(ReferenceImage {
                    url,
                    locator: reference.locator.clone(),
                }),
                Err(e) => {
                    warn!(
                        "Dropping reference {} after failed refresh: {}",
                        reference.locator, e
                    );
                }
            }
        }
        refreshed
    }
}
