//! Outbound collaborators of the orchestrator: the remote record update and the
//! user notification.

use async_trait::async_trait;
use crux_core::UploadResult;
use serde::Serialize;
use uuid::Uuid;

/// Media URLs attached to one server-side record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecordMedia {
    pub target_entity_id: Option<String>,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub image_url: Option<String>,
}

impl RecordMedia {
    pub fn urls(&self) -> Vec<String> {
        [&self.video_url, &self.thumbnail_url, &self.image_url]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }
}

/// Writes uploaded URLs back onto the owning record.
#[async_trait]
pub trait RecordUpdater: Send + Sync {
    async fn update(&self, media: &RecordMedia) -> UploadResult<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecordUpdater;

#[async_trait]
impl RecordUpdater for NoopRecordUpdater {
    async fn update(&self, _media: &RecordMedia) -> UploadResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Notification {
    Completed {
        record_id: Uuid,
        /// A secondary leg failed.
        degraded: bool,
        urls: Vec<String>,
    },
    Failed {
        record_id: Uuid,
        message: String,
    },
}

/// Receives exactly one notification per terminal record state.
#[async_trait]
pub trait UploadNotifier: Send + Sync {
    async fn notify(&self, notification: Notification);
}

/// Logs notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl UploadNotifier for TracingNotifier {
    async fn notify(&self, notification: Notification) {
        match notification {
            Notification::Completed {
                record_id,
                degraded,
                urls,
            } => {
                tracing::info!(
                    record_id = %record_id,
                    degraded = degraded,
                    urls = ?urls,
                    "Upload completed"
                );
            }
            Notification::Failed { record_id, message } => {
                tracing::error!(record_id = %record_id, message = %message, "Upload failed");
            }
        }
    }
}
