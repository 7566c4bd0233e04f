//! Best-effort status notifications
//!
//! Mirrors per-item progress into an external sink (typically a spreadsheet
//! row). Sink failures are logged and swallowed; they never affect batch
//! processing.

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::warn;

use crate::utils::error::Result;

/// Destination for per-item status updates
#[async_trait]
pub trait StatusSink: Send + Sync {
    /// Update the row for one scene with the given fields
    async fn update_row_status(
        &self,
        sheet_id: &str,
        scene_id: &str,
        fields: &HashMap<String, String>,
    ) -> Result<()>;
}

/// Sink that drops all updates
pub struct NoopSink;

#[async_trait]
impl StatusSink for NoopSink {
    async fn update_row_status(
        &self,
        _sheet_id: &str,
        _scene_id: &str,
        _fields: &HashMap<String, String>,
    ) -> Result<()> {
        Ok(())
    }
}

/// Push an update to the sink, logging and swallowing any failure
pub async fn notify_best_effort(
    sink: &dyn StatusSink,
    sheet_id: &str,
    scene_id: &str,
    fields: HashMap<String, String>,
) {
    if let Err(e) = sink.update_row_status(sheet_id, scene_id, &fields).await {
        warn!(
            "Status update for scene {} on sheet {} failed: {}",
            scene_id, sheet_id, e
        );
    }
}
