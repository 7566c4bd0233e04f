//! Admission control configuration (rate limiting and idempotency)

use serde::{Deserialize, Serialize};

/// Per-user rate limiting configuration
///
/// The limiter enforces a cooldown window between accepted batches from the
/// same user. It is advisory capacity control against accidental cost storms
/// (double-clicks), not a security boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cooldown window between accepted batches, in seconds
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

/// Idempotency store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyConfig {
    /// How long a batch fingerprint stays deduplicated, in seconds
    #[serde(default = "default_idempotency_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_idempotency_ttl_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_idempotency_ttl_secs() -> u64 {
    86_400
}
