//! Session logger: durable record of every upload attempt, used for duplicate
//! detection and status history.
//!
//! The pipeline only talks to the [`SessionLogger`] trait. [`InMemorySessionLogger`]
//! keeps records for the life of the process.

use async_trait::async_trait;
use chrono::Utc;
use crux_core::{SessionHandle, UploadError, UploadResult, UploadSessionRecord, UploadStatus, UploadTask};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

#[async_trait]
pub trait SessionLogger: Send + Sync {
    /// Open a session for `task`. Fails with [`UploadError::Duplicate`] when the same
    /// upload is in flight or finished recently.
    async fn initialize(&self, task: &UploadTask) -> UploadResult<SessionHandle>;

    async fn update_status(
        &self,
        handle: SessionHandle,
        status: UploadStatus,
        progress: u8,
        error: Option<&str>,
        result_url: Option<&str>,
    ) -> UploadResult<()>;

    async fn increment_retry(&self, handle: SessionHandle) -> UploadResult<()>;
}

/// Identity of an upload for duplicate detection: hex SHA-256 over the source bytes,
/// the media kind and the target entity.
pub fn fingerprint(task: &UploadTask) -> String {
    let mut hasher = Sha256::new();
    hasher.update(task.source());
    hasher.update(task.kind().as_str().as_bytes());
    if let Some(target) = task.target_entity_id() {
        hasher.update(b"\0");
        hasher.update(target.as_bytes());
    }
    hex::encode(hasher.finalize())
}

pub struct InMemorySessionLogger {
    window: Duration,
    records: Mutex<HashMap<Uuid, UploadSessionRecord>>,
}

impl InMemorySessionLogger {
    /// Sessions created within `window` of a new one with the same fingerprint make
    /// it a duplicate, unless they failed.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, handle: SessionHandle) -> Option<UploadSessionRecord> {
        self.records.lock().await.get(&handle.0).cloned()
    }

    /// All records, oldest first.
    pub async fn records(&self) -> Vec<UploadSessionRecord> {
        let mut records: Vec<_> = self.records.lock().await.values().cloned().collect();
        records.sort_by_key(|r| r.created_at);
        records
    }
}

#[async_trait]
impl SessionLogger for InMemorySessionLogger {
    async fn initialize(&self, task: &UploadTask) -> UploadResult<SessionHandle> {
        let fingerprint = fingerprint(task);
        let now = Utc::now();
        let window = chrono::Duration::from_std(self.window)
            .map_err(|e| UploadError::Config(format!("dedup window out of range: {}", e)))?;

        let mut records = self.records.lock().await;
        let duplicate = records.values().find(|r| {
            r.fingerprint == fingerprint
                && r.status != UploadStatus::Failed
                && now - r.created_at < window
        });
        if let Some(existing) = duplicate {
            tracing::debug!(
                session_id = %existing.id,
                file_name = %task.file_name(),
                status = %existing.status,
                "Duplicate upload rejected"
            );
            return Err(UploadError::Duplicate(format!(
                "{} matches session {} ({})",
                task.file_name(),
                existing.id,
                existing.status
            )));
        }

        let id = Uuid::new_v4();
        records.insert(
            id,
            UploadSessionRecord {
                id,
                fingerprint,
                file_name: task.file_name().to_string(),
                status: UploadStatus::Pending,
                progress: 0,
                retry_count: 0,
                error_message: None,
                result_url: None,
                history: vec![UploadStatus::Pending],
                created_at: now,
                updated_at: now,
            },
        );

        tracing::debug!(session_id = %id, file_name = %task.file_name(), "Upload session created");
        Ok(SessionHandle(id))
    }

    async fn update_status(
        &self,
        handle: SessionHandle,
        status: UploadStatus,
        progress: u8,
        error: Option<&str>,
        result_url: Option<&str>,
    ) -> UploadResult<()> {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(&handle.0)
            .ok_or_else(|| UploadError::Internal(format!("unknown upload session {}", handle)))?;

        if record.status != status {
            if !record.status.can_transition_to(status) {
                return Err(UploadError::Internal(format!(
                    "invalid session transition {} -> {}",
                    record.status, status
                )));
            }
            record.status = status;
            record.history.push(status);
            if status == UploadStatus::Pending {
                record.error_message = None;
            }
        }

        record.progress = progress.min(100);
        if let Some(error) = error {
            record.error_message = Some(error.to_string());
        }
        if let Some(url) = result_url {
            record.result_url = Some(url.to_string());
        }
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn increment_retry(&self, handle: SessionHandle) -> UploadResult<()> {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(&handle.0)
            .ok_or_else(|| UploadError::Internal(format!("unknown upload session {}", handle)))?;
        record.retry_count += 1;
        record.updated_at = Utc::now();
        Ok(())
    }
}
