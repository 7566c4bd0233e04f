//! Per-user rate limiting
//!
//! Enforces a cooldown window between accepted batches from the same user.
//! Check and reservation happen under one lock acquisition, so two
//! concurrent submissions from the same user cannot both pass.

use crate::config::RateLimitConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Result of a rate limit check
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitDecision {
    /// Whether the request is allowed
    pub allowed: bool,
    /// Seconds until the cooldown window opens again (0 when allowed)
    pub retry_after_secs: u64,
}

impl RateLimitDecision {
    fn allowed() -> Self {
        Self {
            allowed: true,
            retry_after_secs: 0,
        }
    }

    fn denied(retry_after: Duration) -> Self {
        Self {
            allowed: false,
            retry_after_secs: retry_after.as_secs().max(1),
        }
    }
}

/// Cooldown-based rate limiter, keyed by user id
pub struct RateLimiter {
    config: RateLimitConfig,
    /// Last accepted submission per user
    entries: Arc<RwLock<HashMap<String, Instant>>>,
    cooldown: Duration,
}

impl RateLimiter {
    /// Create a new rate limiter from configuration
    pub fn new(config: RateLimitConfig) -> Self {
        let cooldown = Duration::from_secs(config.cooldown_secs);
        Self {
            config,
            entries: Arc::new(RwLock::new(HashMap::new())),
            cooldown,
        }
    }

    /// Create a rate limiter with a custom cooldown window
    pub fn with_cooldown(config: RateLimitConfig, cooldown: Duration) -> Self {
        Self {
            config,
            entries: Arc::new(RwLock::new(HashMap::new())),
            cooldown,
        }
    }

    /// Check whether a submission would be allowed, without reserving
    ///
    /// Used by dry-run submissions, which must not consume the user's slot.
    pub async fn check(&self, user_id: &str) -> RateLimitDecision {
        if !self.config.enabled {
            return RateLimitDecision::allowed();
        }

        let entries = self.entries.read().await;
        match entries.get(user_id) {
            Some(&last) if last.elapsed() < self.cooldown => {
                RateLimitDecision::denied(self.cooldown - last.elapsed())
            }
            _ => RateLimitDecision::allowed(),
        }
    }

    /// Atomically check the cooldown and reserve the slot if allowed
    ///
    /// The check and the reservation happen under a single write lock, so
    /// concurrent submissions from the same user observe each other.
    pub async fn check_and_reserve(&self, user_id: &str) -> RateLimitDecision {
        if !self.config.enabled {
            return RateLimitDecision::allowed();
        }

        let now = Instant::now();
        let mut entries = self.entries.write().await;
        if let Some(&last) = entries.get(user_id) {
            let elapsed = now.duration_since(last);
            if elapsed < self.cooldown {
                let decision = RateLimitDecision::denied(self.cooldown - elapsed);
                debug!(
                    "Rate limit cooldown active for {}: retry after {}s",
                    user_id, decision.retry_after_secs
                );
                return decision;
            }
        }

        entries.insert(user_id.to_string(), now);
        RateLimitDecision::allowed()
    }

    /// Drop entries whose cooldown has fully elapsed
    pub async fn cleanup(&self) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, &mut last| last.elapsed() < self.cooldown);
    }
}
