//! Progress streaming
//!
//! Serves a live view of one batch's ledger state. Each stream runs two
//! independent timers: a poll timer that re-reads the ledger and pushes a
//! snapshot whenever the state changed, and a heartbeat timer that pushes a
//! no-op keep-alive so idle-connection timeouts in intermediate
//! infrastructure do not kill a quiet stream. The stream ends itself when
//! the job reaches a terminal status, when the ledger lookup comes back
//! empty (after a final error event), or when the client goes away.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Instant, interval, interval_at};
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;
use uuid::Uuid;

use crate::config::StreamingConfig;
use crate::core::ledger::JobLedger;
use crate::core::types::JobState;

/// One event on a progress stream
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// The current job state; pushed on change and once more at terminal
    Snapshot {
        /// Current ledger state
        job: JobState,
    },
    /// Keep-alive with no state attached
    Heartbeat {
        /// Emission time
        at: DateTime<Utc>,
    },
    /// Terminal error, pushed once before the stream closes
    Error {
        /// Human-readable reason
        message: String,
    },
}

/// Streams ledger state for one batch at a time
pub struct ProgressStreamer {
    ledger: Arc<JobLedger>,
    config: StreamingConfig,
}

impl ProgressStreamer {
    /// Create a streamer over the given ledger
    pub fn new(ledger: Arc<JobLedger>, config: StreamingConfig) -> Self {
        Self { ledger, config }
    }

    /// Open a progress stream for `batch_id`
    ///
    /// The first poll fires immediately, so a connecting client always gets
    /// a snapshot (or the not-found error) right away. Dropping the returned
    /// stream cancels both timers.
    pub fn stream(&self, batch_id: &str) -> ReceiverStream<ProgressEvent> {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let ledger = self.ledger.clone();
        let batch_id = batch_id.to_string();
        let stream_id = format!("stream-{}", Uuid::new_v4());
        let poll_period = self.config.poll_interval();
        let heartbeat_period = self.config.heartbeat_interval();

        debug!("Opening progress stream {} for {}", stream_id, batch_id);
        tokio::spawn(async move {
            let mut poll = interval(poll_period);
            // The heartbeat must not fire at t=0, the first poll covers that
            let mut heartbeat = interval_at(Instant::now() + heartbeat_period, heartbeat_period);
            let mut last_pushed: Option<JobState> = None;

            loop {
                tokio::select! {
                    _ = poll.tick() => {
                        match ledger.get_job(&batch_id).await {
                            Ok(Some(job)) => {
                                let terminal = job.status.is_terminal();
                                if last_pushed.as_ref() != Some(&job) {
                                    if tx.send(ProgressEvent::Snapshot { job: job.clone() }).await.is_err() {
                                        break;
                                    }
                                    last_pushed = Some(job);
                                }
                                if terminal {
                                    debug!("Progress stream {} reached terminal state", stream_id);
                                    break;
                                }
                            }
                            Ok(None) => {
                                let _ = tx
                                    .send(ProgressEvent::Error {
                                        message: format!("Batch not found: {}", batch_id),
                                    })
                                    .await;
                                break;
                            }
                            Err(e) => {
                                let _ = tx
                                    .send(ProgressEvent::Error {
                                        message: format!("Ledger unavailable: {}", e),
                                    })
                                    .await;
                                break;
                            }
                        }
                    }
                    _ = heartbeat.tick() => {
                        if tx.send(ProgressEvent::Heartbeat { at: Utc::now() }).await.is_err() {
                            break;
                        }
                    }
                    _ = tx.closed() => {
                        debug!("Progress stream {} client disconnected", stream_id);
                        break;
                    }
                }
            }
        });

        ReceiverStream::new(rx)
    }
}
