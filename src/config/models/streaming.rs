//! Progress streaming configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the progress stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// How often the ledger is re-read for changes (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// How often a keep-alive is pushed on an otherwise idle stream (milliseconds)
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Buffered events per stream before backpressure
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl StreamingConfig {
    /// Poll interval as a [`Duration`]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Heartbeat interval as a [`Duration`]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_channel_capacity() -> usize {
    16
}
