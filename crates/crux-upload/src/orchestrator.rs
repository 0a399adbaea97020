//! UploadOrchestrator: the public entry point of the pipeline.
//!
//! A [`RecordUpload`] groups the legs that belong to one server-side record (a video
//! and its thumbnail, or a single image). Each leg runs
//! validate → open session → plan → compress → check size → chunk → transfer
//! concurrently with the others. Once every leg has settled the record gets one
//! metadata update and exactly one notification.
//!
//! Calling [`UploadOrchestrator::upload`] again on the same record retries it: legs
//! that already uploaded are skipped and only the metadata update is re-issued for
//! them.

use crate::collaborators::{
    Notification, NoopRecordUpdater, RecordMedia, RecordUpdater, TracingNotifier, UploadNotifier,
};
use crate::platform::{ConnectivityMonitor, PowerHold, VisibilityMonitor};
use crate::progress::{PhaseWeights, ProgressReporter, TaskProgress};
use crate::resilience::{ResilienceController, RetryObserver};
use crate::session::{InMemorySessionLogger, SessionLogger};
use async_trait::async_trait;
use bytes::Bytes;
use crux_core::{
    CompressionPlan, ErrorMetadata, MediaKind, PipelineConfig, ProgressEvent, ProgressPhase,
    ProgressSink, SessionHandle, TranscodeResult, UploadError, UploadResult, UploadStatus,
    UploadTask,
};
use crux_processing::{CompressionPlanner, MediaCodecs, MediaValidator};
use crux_storage::{ChunkPlanner, FileDescriptor, Transport};
use futures::future::join_all;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegRole {
    /// Its failure fails the record.
    Primary,
    /// Its failure degrades the record.
    Secondary,
}

/// Progress of one leg across calls to [`UploadOrchestrator::upload`].
#[derive(Debug)]
pub struct LegState {
    role: LegRole,
    task: UploadTask,
    uploaded: bool,
    url: Option<String>,
    error: Option<UploadError>,
    session: Option<SessionHandle>,
    status: UploadStatus,
    progress: Option<TaskProgress>,
}

impl LegState {
    fn new(role: LegRole, task: UploadTask) -> Self {
        Self {
            role,
            task,
            uploaded: false,
            url: None,
            error: None,
            session: None,
            status: UploadStatus::Pending,
            progress: None,
        }
    }

    pub fn role(&self) -> LegRole {
        self.role
    }

    pub fn task(&self) -> &UploadTask {
        &self.task
    }

    pub fn is_uploaded(&self) -> bool {
        self.uploaded
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn error(&self) -> Option<&UploadError> {
        self.error.as_ref()
    }

    pub fn session(&self) -> Option<SessionHandle> {
        self.session
    }

    pub fn status(&self) -> UploadStatus {
        self.status
    }

    /// Last overall progress published for this leg.
    pub fn progress(&self) -> Option<u8> {
        self.progress.as_ref().and_then(TaskProgress::current)
    }
}

/// All legs of one record. Keep it around after a failure to retry.
#[derive(Debug)]
pub struct RecordUpload {
    id: Uuid,
    target_entity_id: Option<String>,
    legs: Vec<LegState>,
    cancel: CancellationToken,
}

impl RecordUpload {
    /// A video record with an optional thumbnail.
    pub fn video(video: UploadTask, thumbnail: Option<UploadTask>) -> Self {
        let target_entity_id = video.target_entity_id().map(str::to_string);
        let mut legs = vec![LegState::new(LegRole::Primary, video)];
        legs.extend(thumbnail.map(|t| LegState::new(LegRole::Secondary, t)));
        Self::with_legs(target_entity_id, legs)
    }

    /// A single image (thumbnail or full-size) record.
    pub fn image(image: UploadTask) -> Self {
        let target_entity_id = image.target_entity_id().map(str::to_string);
        Self::with_legs(target_entity_id, vec![LegState::new(LegRole::Primary, image)])
    }

    fn with_legs(target_entity_id: Option<String>, legs: Vec<LegState>) -> Self {
        Self {
            id: Uuid::new_v4(),
            target_entity_id,
            legs,
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn legs(&self) -> &[LegState] {
        &self.legs
    }

    /// Cancels the in-flight requests of the current run. A cancelled token is
    /// replaced when the record is uploaded again, so take a fresh handle per run.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_complete(&self) -> bool {
        self.legs.iter().all(|leg| leg.uploaded)
    }

    /// URLs of every uploaded leg, by media kind.
    pub fn media(&self) -> RecordMedia {
        let mut media = RecordMedia {
            target_entity_id: self.target_entity_id.clone(),
            ..RecordMedia::default()
        };
        for leg in self.legs.iter().filter(|leg| leg.uploaded) {
            let url = leg.url.clone();
            match leg.task.kind() {
                MediaKind::Video => media.video_url = url,
                MediaKind::Thumbnail => media.thumbnail_url = url,
                MediaKind::Image => media.image_url = url,
            }
        }
        media
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Completed(RecordMedia),
    /// The primary leg uploaded, at least one secondary leg did not.
    Degraded {
        media: RecordMedia,
        errors: Vec<UploadError>,
    },
}

impl RecordOutcome {
    pub fn media(&self) -> &RecordMedia {
        match self {
            RecordOutcome::Completed(media) => media,
            RecordOutcome::Degraded { media, .. } => media,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, RecordOutcome::Degraded { .. })
    }
}

/// Counts retries on the leg's session record.
struct SessionRetries<'a> {
    logger: &'a dyn SessionLogger,
    handle: SessionHandle,
}

#[async_trait]
impl RetryObserver for SessionRetries<'_> {
    async fn on_retry(&self, _retry: u32, _delay: Duration, _error: &UploadError) {
        if let Err(e) = self.logger.increment_retry(self.handle).await {
            tracing::warn!(session = %self.handle, error = %e, "Failed to record retry");
        }
    }
}

pub struct UploadOrchestrator {
    codecs: MediaCodecs,
    validator: MediaValidator,
    controller: ResilienceController,
    logger: Arc<dyn SessionLogger>,
    records: Arc<dyn RecordUpdater>,
    notifier: Arc<dyn UploadNotifier>,
    progress: ProgressReporter,
}

impl UploadOrchestrator {
    /// Orchestrator with an in-memory session logger, no record updates and
    /// tracing notifications.
    pub fn new(config: &PipelineConfig, codecs: MediaCodecs, transport: Arc<dyn Transport>) -> Self {
        Self {
            codecs,
            validator: MediaValidator,
            controller: ResilienceController::new(transport, config),
            logger: Arc::new(InMemorySessionLogger::new(config.dedup_window)),
            records: Arc::new(NoopRecordUpdater),
            notifier: Arc::new(TracingNotifier),
            progress: ProgressReporter::new(),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn SessionLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_record_updater(mut self, records: Arc<dyn RecordUpdater>) -> Self {
        self.records = records;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn UploadNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_connectivity(mut self, connectivity: Arc<dyn ConnectivityMonitor>) -> Self {
        self.controller = self.controller.with_connectivity(connectivity);
        self
    }

    pub fn with_visibility(mut self, visibility: Arc<dyn VisibilityMonitor>) -> Self {
        self.controller = self.controller.with_visibility(visibility);
        self
    }

    pub fn with_power_hold(mut self, power: Arc<dyn PowerHold>) -> Self {
        self.controller = self.controller.with_power_hold(power);
        self
    }

    /// Progress events of every task this orchestrator runs.
    pub fn progress(&self) -> broadcast::Receiver<ProgressEvent> {
        self.progress.subscribe()
    }

    /// Upload (or retry) every leg of `record` that has not uploaded yet.
    ///
    /// Fails when the primary leg fails or the record update is rejected. A failed
    /// secondary leg yields [`RecordOutcome::Degraded`].
    pub async fn upload(&self, record: &mut RecordUpload) -> UploadResult<RecordOutcome> {
        if record.cancel.is_cancelled() {
            record.cancel = CancellationToken::new();
        }
        let cancel = record.cancel.clone();
        let started = Instant::now();

        let pending = record.legs.iter().filter(|leg| !leg.uploaded).count();
        tracing::info!(
            record_id = %record.id,
            legs = record.legs.len(),
            pending_legs = pending,
            "Starting record upload"
        );

        let runs = record
            .legs
            .iter_mut()
            .filter(|leg| !leg.uploaded)
            .map(|leg| self.run_leg(leg, &cancel));
        join_all(runs).await;

        let outcome = self.settle(record).await;
        tracing::info!(
            record_id = %record.id,
            success = outcome.is_ok(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Record upload finished"
        );
        outcome
    }

    /// Best-effort removal of an uploaded asset.
    pub async fn delete_asset(&self, url: &str) {
        match self.controller.transport().delete(url).await {
            Ok(()) => tracing::info!(url = %url, "Asset deleted"),
            Err(e) => tracing::warn!(url = %url, error = %e, "Failed to delete asset"),
        }
    }

    /// Release the codec handle.
    pub async fn shutdown(self) {
        self.codecs.shutdown().await;
    }

    async fn settle(&self, record: &RecordUpload) -> UploadResult<RecordOutcome> {
        let primary_error = record
            .legs
            .iter()
            .filter(|leg| leg.role == LegRole::Primary && !leg.uploaded)
            .find_map(|leg| leg.error.clone());
        if let Some(error) = primary_error {
            self.notify_failed(record.id, &error).await;
            return Err(error);
        }

        let media = record.media();
        if let Err(error) = self.records.update(&media).await {
            tracing::error!(record_id = %record.id, error = %error, "Record update failed");
            self.notify_failed(record.id, &error).await;
            return Err(error);
        }

        let errors: Vec<UploadError> = record
            .legs
            .iter()
            .filter(|leg| !leg.uploaded)
            .filter_map(|leg| leg.error.clone())
            .collect();

        self.notifier
            .notify(Notification::Completed {
                record_id: record.id,
                degraded: !errors.is_empty(),
                urls: media.urls(),
            })
            .await;

        if errors.is_empty() {
            Ok(RecordOutcome::Completed(media))
        } else {
            tracing::warn!(
                record_id = %record.id,
                failed_legs = errors.len(),
                "Record uploaded without all secondary media"
            );
            Ok(RecordOutcome::Degraded { media, errors })
        }
    }

    async fn notify_failed(&self, record_id: Uuid, error: &UploadError) {
        self.notifier
            .notify(Notification::Failed {
                record_id,
                message: error.client_message(),
            })
            .await;
    }

    async fn run_leg(&self, leg: &mut LegState, cancel: &CancellationToken) {
        match self.execute_leg(leg, cancel).await {
            Ok(url) => {
                leg.uploaded = true;
                leg.url = Some(url);
                leg.error = None;
            }
            Err(error) => {
                match error.log_level() {
                    crux_core::LogLevel::Debug => tracing::debug!(
                        leg = %leg.task.kind(),
                        file_name = %leg.task.file_name(),
                        error = %error,
                        "Leg rejected"
                    ),
                    _ => tracing::error!(
                        leg = %leg.task.kind(),
                        file_name = %leg.task.file_name(),
                        error_code = error.error_code(),
                        error = %error,
                        "Leg failed"
                    ),
                }
                if leg.session.is_some() && leg.status != UploadStatus::Failed {
                    let progress = leg.progress().unwrap_or(0);
                    let message = error.to_string();
                    self.set_status(leg, UploadStatus::Failed, progress, Some(message.as_str()), None)
                        .await;
                }
                leg.error = Some(error);
            }
        }
    }

    async fn execute_leg(&self, leg: &mut LegState, cancel: &CancellationToken) -> UploadResult<String> {
        let task = leg.task.clone();
        let kind = task.kind();

        // 1. Validate the source
        self.validator.validate_task(&task)?;

        // 2. Open the session, or reopen it for a retry
        let session = match leg.session {
            Some(handle) => {
                if leg.status == UploadStatus::Failed {
                    self.set_status(leg, UploadStatus::Pending, 0, None, None).await;
                }
                handle
            }
            None => {
                let handle = self.logger.initialize(&task).await?;
                leg.session = Some(handle);
                leg.status = UploadStatus::Pending;
                handle
            }
        };

        // 3. Plan
        let plan = CompressionPlanner::plan(kind, task.source_len());
        let transcodes = plan.should_transcode && (kind.is_image() || self.codecs.video_available());
        // A retried leg keeps its publisher so overall progress never drops.
        let progress = leg
            .progress
            .get_or_insert_with(|| {
                self.progress
                    .task(task.id(), PhaseWeights::for_task(kind, transcodes))
            })
            .clone();

        // 4. Compress; failures fall back to the source
        let (body, file_name, mime_type) = if transcodes {
            self.set_status(leg, UploadStatus::Compressing, 0, None, None).await;
            progress.compression(0);
            let (sink, rx) = TaskProgress::stage();
            let result = progress
                .track(ProgressPhase::Compressing, rx, self.compress(&task, &plan, sink))
                .await;
            progress.compression(100);
            compressed_file(&task, result)
        } else {
            (task.source(), task.file_name().to_string(), task.mime_type().to_string())
        };

        // 5. Size ceiling on the final bytes
        let final_size = body.len() as u64;
        self.validator.validate_final_size(final_size, &plan)?;

        // 6. Transfer
        let chunk_plan = ChunkPlanner::plan(final_size);
        let overall = progress.weights().compression();
        self.set_status(leg, UploadStatus::Uploading, overall, None, None).await;
        progress.transfer(0);

        tracing::info!(
            leg = %kind,
            file_name = %file_name,
            size_bytes = final_size,
            total_chunks = chunk_plan.total_chunks,
            session_id = ?chunk_plan.session_id,
            "Uploading"
        );

        let file = FileDescriptor {
            file_name,
            file_size: final_size,
            mime_type,
            target_entity_id: task.target_entity_id().map(str::to_string),
        };
        let retries = SessionRetries {
            logger: self.logger.as_ref(),
            handle: session,
        };
        let (sink, rx) = TaskProgress::stage();
        let transfer = self
            .controller
            .transfer(&file, &body, chunk_plan, cancel, &sink, &retries);
        let url = progress
            .track(ProgressPhase::Uploading, rx, transfer)
            .await?;

        progress.complete();
        self.set_status(leg, UploadStatus::Completed, 100, None, Some(url.as_str()))
            .await;
        tracing::info!(leg = %kind, url = %url, "Leg uploaded");
        Ok(url)
    }

    async fn compress(
        &self,
        task: &UploadTask,
        plan: &CompressionPlan,
        progress: ProgressSink,
    ) -> Option<TranscodeResult> {
        let started = Instant::now();

        let result = match (task.kind(), plan.byte_budget, plan.dimension_ladder) {
            (MediaKind::Video, _, _) => {
                let extension = task.extension().unwrap_or_else(|| "mp4".to_string());
                self.codecs
                    .video_transcoder()
                    .transcode(task.source(), &extension, &progress)
                    .await
            }
            (_, Some(budget), Some(ladder)) => {
                self.codecs
                    .image_transcoder()
                    .transcode(task.source(), budget, ladder, progress)
                    .await
            }
            _ => return None,
        };

        match result {
            Ok(result) => {
                tracing::info!(
                    leg = %task.kind(),
                    source_bytes = task.source_len(),
                    output_bytes = result.output_len(),
                    transcoded = result.transcoded,
                    width = result.width,
                    height = result.height,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Compression finished"
                );
                Some(result)
            }
            Err(e) => {
                let error = UploadError::from(e);
                tracing::warn!(
                    leg = %task.kind(),
                    file_name = %task.file_name(),
                    error = %error,
                    "Compression failed, uploading original"
                );
                None
            }
        }
    }

    /// Record a status change on the leg and its session. Logger failures are
    /// logged and otherwise ignored.
    async fn set_status(
        &self,
        leg: &mut LegState,
        status: UploadStatus,
        progress: u8,
        error: Option<&str>,
        result_url: Option<&str>,
    ) {
        leg.status = status;
        let Some(handle) = leg.session else {
            return;
        };
        tracing::debug!(leg = %leg.task.kind(), session = %handle, status = %status, "Status change");
        if let Err(e) = self
            .logger
            .update_status(handle, status, progress, error, result_url)
            .await
        {
            tracing::warn!(session = %handle, status = %status, error = %e, "Failed to update session");
        }
    }
}

/// Bytes, file name and MIME type to send after compression. Transcoded images are
/// JPEG; videos keep their container.
fn compressed_file(task: &UploadTask, result: Option<TranscodeResult>) -> (Bytes, String, String) {
    match result {
        Some(result) if result.transcoded && task.kind().is_image() => {
            let file_name = Path::new(task.file_name())
                .with_extension("jpg")
                .to_string_lossy()
                .into_owned();
            (result.output, file_name, "image/jpeg".to_string())
        }
        Some(result) => (
            result.output,
            task.file_name().to_string(),
            task.mime_type().to_string(),
        ),
        None => (
            task.source(),
            task.file_name().to_string(),
            task.mime_type().to_string(),
        ),
    }
}
