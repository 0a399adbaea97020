use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Upload status state machine.
///
/// `pending → compressing → uploading → completed`, any non-terminal state may go to
/// `failed`, and `failed → pending` on an explicit retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Compressing,
    Uploading,
    Completed,
    Failed,
}

impl UploadStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, UploadStatus::Completed | UploadStatus::Failed)
    }

    pub fn can_transition_to(self, next: UploadStatus) -> bool {
        use UploadStatus::*;
        matches!(
            (self, next),
            (Pending, Compressing)
                | (Pending, Uploading)
                | (Compressing, Uploading)
                | (Uploading, Completed)
                | (Pending, Failed)
                | (Compressing, Failed)
                | (Uploading, Failed)
                | (Failed, Pending)
        )
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Compressing => "compressing",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Completed => "completed",
            UploadStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Opaque reference to a session record held by the session logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionHandle(pub Uuid);

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Durable record of one upload attempt series, owned by the session logger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSessionRecord {
    pub id: Uuid,
    pub fingerprint: String,
    pub file_name: String,
    pub status: UploadStatus,
    pub progress: u8,
    pub retry_count: u32,
    pub error_message: Option<String>,
    pub result_url: Option<String>,
    pub history: Vec<UploadStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
