//! End-to-end pipeline behaviour against in-process fakes.

use async_trait::async_trait;
use bytes::Bytes;
use crux_core::constants::MB;
use crux_core::{
    MediaKind, PipelineConfig, ProgressEvent, ProgressPhase, ProgressSink, UploadError,
    UploadStatus, UploadTask,
};
use crux_processing::{
    CodecError, DecodedImage, ImageCodec, MediaCodecs, PassthroughVideoCodec, VideoCodec,
    VideoEncodeParams, VideoMetadata,
};
use crux_storage::{
    ChunkHeader, FileDescriptor, StorageBackend, TransferError, TransferResult, Transport,
};
use crux_upload::{
    InMemorySessionLogger, Notification, RecordMedia, RecordOutcome, RecordUpdater, RecordUpload,
    UploadNotifier, UploadOrchestrator,
};
use image::{DynamicImage, GenericImageView};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Request {
    file_name: String,
    chunk: Option<u32>,
    size: usize,
}

/// Accepts everything unless told to fail the next request for a file name.
#[derive(Default)]
struct FakeTransport {
    requests: Mutex<Vec<Request>>,
    failures: Mutex<Vec<(String, TransferError)>>,
    deletes: Mutex<Vec<String>>,
    stalled: AtomicBool,
}

impl FakeTransport {
    fn fail_next(&self, file_name: &str, error: TransferError) {
        self.failures
            .lock()
            .unwrap()
            .push((file_name.to_string(), error));
    }

    fn requests_for(&self, file_name: &str) -> Vec<Request> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.file_name == file_name)
            .cloned()
            .collect()
    }

    fn total_requests(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    async fn respond(&self, file: &FileDescriptor, chunk: Option<u32>, size: usize) -> TransferResult<()> {
        self.requests.lock().unwrap().push(Request {
            file_name: file.file_name.clone(),
            chunk,
            size,
        });
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let mut failures = self.failures.lock().unwrap();
        match failures.iter().position(|(name, _)| *name == file.file_name) {
            Some(pos) => Err(failures.remove(pos).1),
            None => Ok(()),
        }
    }

    fn url(file: &FileDescriptor) -> String {
        format!("https://cdn.test/{}", file.file_name)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    fn backend(&self) -> StorageBackend {
        StorageBackend::Chunked
    }

    fn supports_chunking(&self) -> bool {
        true
    }

    async fn send_single(
        &self,
        file: &FileDescriptor,
        body: Bytes,
        _timeout: Duration,
    ) -> TransferResult<String> {
        self.respond(file, None, body.len()).await?;
        Ok(Self::url(file))
    }

    async fn send_chunk(
        &self,
        file: &FileDescriptor,
        chunk: &ChunkHeader,
        body: Bytes,
        _timeout: Duration,
    ) -> TransferResult<Option<String>> {
        self.respond(file, Some(chunk.index), body.len()).await?;
        Ok((chunk.index + 1 == chunk.total).then(|| Self::url(file)))
    }

    async fn delete(&self, url: &str) -> TransferResult<()> {
        self.deletes.lock().unwrap().push(url.to_string());
        Err(TransferError::Server {
            status: 404,
            message: "not found".to_string(),
        })
    }
}

/// Decodes anything to a 600x900 frame; encoded size is `quality × 6.5MB`.
#[derive(Default)]
struct LadderCodec {
    encodes: Mutex<Vec<(u32, u32, f32)>>,
}

impl ImageCodec for LadderCodec {
    fn decode(&self, _data: &[u8]) -> Result<DecodedImage, CodecError> {
        Ok(DecodedImage {
            image: DynamicImage::new_rgb8(600, 900),
            stored_width: 600,
            stored_height: 900,
            orientation_applied: false,
        })
    }

    fn encode(&self, image: &DynamicImage, quality: f32) -> Result<Vec<u8>, CodecError> {
        let (width, height) = image.dimensions();
        self.encodes.lock().unwrap().push((width, height, quality));
        Ok(vec![0u8; (f64::from(quality) * 6.5 * MB as f64) as usize])
    }
}

/// 1280x720 H.264 source whose encode is `ratio` of the staged size, or an error.
struct ShrinkingVideoCodec {
    ratio: Option<f64>,
    transcodes: AtomicU32,
}

impl ShrinkingVideoCodec {
    fn shrinking(ratio: f64) -> Self {
        Self {
            ratio: Some(ratio),
            transcodes: AtomicU32::new(0),
        }
    }

    fn broken() -> Self {
        Self {
            ratio: None,
            transcodes: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl VideoCodec for ShrinkingVideoCodec {
    async fn probe(&self, _source: &Path) -> Result<VideoMetadata, CodecError> {
        Ok(VideoMetadata {
            width: 1280,
            height: 720,
            codec: "h264".to_string(),
            duration: Some(10.0),
            bitrate: None,
        })
    }

    async fn transcode(
        &self,
        source: &Path,
        output: &Path,
        _params: &VideoEncodeParams,
        _duration: Option<f64>,
        progress: &ProgressSink,
    ) -> Result<(), CodecError> {
        self.transcodes.fetch_add(1, Ordering::SeqCst);
        let Some(ratio) = self.ratio else {
            return Err(CodecError::Transcode("encoder exited with 1".to_string()));
        };

        let source_len = tokio::fs::metadata(source).await?.len();
        progress.publish(50);
        tokio::task::yield_now().await;
        tokio::fs::write(output, vec![0u8; (source_len as f64 * ratio) as usize]).await?;
        progress.publish(100);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingUpdater {
    updates: Mutex<Vec<RecordMedia>>,
}

#[async_trait]
impl RecordUpdater for RecordingUpdater {
    async fn update(&self, media: &RecordMedia) -> Result<(), UploadError> {
        self.updates.lock().unwrap().push(media.clone());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

#[async_trait]
impl UploadNotifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

struct Harness {
    orchestrator: UploadOrchestrator,
    transport: Arc<FakeTransport>,
    codec: Arc<LadderCodec>,
    logger: Arc<InMemorySessionLogger>,
    updater: Arc<RecordingUpdater>,
    notifier: Arc<RecordingNotifier>,
}

impl Harness {
    fn new() -> Self {
        Self::with_video_codec(Arc::new(PassthroughVideoCodec))
    }

    fn with_video_codec(video: Arc<dyn VideoCodec>) -> Self {
        let config = PipelineConfig::default();
        let transport = Arc::new(FakeTransport::default());
        let codec = Arc::new(LadderCodec::default());
        let logger = Arc::new(InMemorySessionLogger::new(config.dedup_window));
        let updater = Arc::new(RecordingUpdater::default());
        let notifier = Arc::new(RecordingNotifier::default());

        let codecs = MediaCodecs::new(codec.clone(), video);
        let orchestrator = UploadOrchestrator::new(&config, codecs, transport.clone())
            .with_logger(logger.clone())
            .with_record_updater(updater.clone())
            .with_notifier(notifier.clone());

        Self {
            orchestrator,
            transport,
            codec,
            logger,
            updater,
            notifier,
        }
    }

    fn notifications(&self) -> Vec<Notification> {
        self.notifier.notifications.lock().unwrap().clone()
    }

    fn bytes_sent(&self, file_name: &str) -> u64 {
        self.transport
            .requests_for(file_name)
            .iter()
            .map(|r| r.size as u64)
            .sum()
    }
}

fn video(size: u64) -> UploadTask {
    UploadTask::new(vec![7u8; size as usize], "clip.mp4", "video/mp4", MediaKind::Video)
        .with_target("route-42")
}

fn thumbnail(size: u64) -> UploadTask {
    UploadTask::new(vec![9u8; size as usize], "thumb.jpg", "image/jpeg", MediaKind::Thumbnail)
        .with_target("route-42")
}

fn drain(rx: &mut broadcast::Receiver<ProgressEvent>) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn by_task(events: &[ProgressEvent]) -> HashMap<Uuid, Vec<ProgressEvent>> {
    let mut grouped: HashMap<Uuid, Vec<ProgressEvent>> = HashMap::new();
    for event in events {
        grouped.entry(event.task_id).or_default().push(*event);
    }
    grouped
}

#[tokio::test]
async fn test_small_video_skips_transcode_and_starts_at_zero() {
    let harness = Harness::new();
    let mut rx = harness.orchestrator.progress();
    let mut record = RecordUpload::video(video(15 * MB), None);

    let outcome = harness.orchestrator.upload(&mut record).await.unwrap();
    assert_eq!(
        outcome.media().video_url.as_deref(),
        Some("https://cdn.test/clip.mp4")
    );

    let chunks: Vec<Option<u32>> = harness
        .transport
        .requests_for("clip.mp4")
        .iter()
        .map(|r| r.chunk)
        .collect();
    assert_eq!(chunks, vec![Some(0), Some(1), Some(2)]);

    let events = drain(&mut rx);
    assert_eq!(events[0].overall, 0);
    assert_eq!(events[0].phase, ProgressPhase::Uploading);
    assert!(events.iter().all(|e| e.phase == ProgressPhase::Uploading));
    assert_eq!(events.last().map(|e| e.overall), Some(100));

    let session = record.legs()[0].session().unwrap();
    let stored = harness.logger.get(session).await.unwrap();
    assert_eq!(
        stored.history,
        vec![
            UploadStatus::Pending,
            UploadStatus::Uploading,
            UploadStatus::Completed
        ]
    );
}

#[tokio::test]
async fn test_thumbnail_fits_budget_without_dimension_reduction() {
    let harness = Harness::new();
    let mut rx = harness.orchestrator.progress();
    let mut record = RecordUpload::image(thumbnail(6 * MB));

    let outcome = harness.orchestrator.upload(&mut record).await.unwrap();
    assert_eq!(
        outcome,
        RecordOutcome::Completed(RecordMedia {
            target_entity_id: Some("route-42".to_string()),
            thumbnail_url: Some("https://cdn.test/thumb.jpg".to_string()),
            ..RecordMedia::default()
        })
    );

    let encodes = harness.codec.encodes.lock().unwrap().clone();
    assert!(encodes.len() <= 2);
    assert!(encodes.iter().all(|(w, h, _)| (*w).max(*h) == 800));

    let sent = harness.transport.requests_for("thumb.jpg");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].chunk, None);
    assert!(sent[0].size as u64 <= 5 * MB);

    let events = drain(&mut rx);
    assert_eq!(events.last().map(|e| e.overall), Some(100));
    assert_eq!(record.legs()[0].progress(), Some(100));

    let stored = harness
        .logger
        .get(record.legs()[0].session().unwrap())
        .await
        .unwrap();
    assert_eq!(stored.status, UploadStatus::Completed);
    assert_eq!(stored.progress, 100);
    assert_eq!(
        stored.history,
        vec![
            UploadStatus::Pending,
            UploadStatus::Compressing,
            UploadStatus::Uploading,
            UploadStatus::Completed
        ]
    );
}

#[tokio::test]
async fn test_progress_is_monotonic_per_task() {
    let harness = Harness::new();
    let mut rx = harness.orchestrator.progress();
    let mut record = RecordUpload::video(video(8 * MB), Some(thumbnail(6 * MB)));

    harness.orchestrator.upload(&mut record).await.unwrap();

    let grouped = by_task(&drain(&mut rx));
    assert_eq!(grouped.len(), 2);
    for events in grouped.values() {
        assert!(events.windows(2).all(|w| w[0].overall <= w[1].overall));
        assert_eq!(events.last().map(|e| e.overall), Some(100));
    }
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_exhaust_retries() {
    let harness = Harness::new();
    for _ in 0..4 {
        harness
            .transport
            .fail_next("clip.mp4", TransferError::Network("reset".to_string()));
    }
    let mut record = RecordUpload::video(video(MB), None);

    let err = harness.orchestrator.upload(&mut record).await.unwrap_err();
    assert!(matches!(err, UploadError::Network(_)));
    assert_eq!(harness.transport.requests_for("clip.mp4").len(), 4);

    let leg = &record.legs()[0];
    assert_eq!(leg.status(), UploadStatus::Failed);
    let stored = harness.logger.get(leg.session().unwrap()).await.unwrap();
    assert_eq!(stored.retry_count, 3);
    assert_eq!(stored.status, UploadStatus::Failed);
    assert!(stored.error_message.is_some());

    assert!(harness.updater.updates.lock().unwrap().is_empty());
    assert!(matches!(
        harness.notifications().as_slice(),
        [Notification::Failed { .. }]
    ));
}

#[tokio::test]
async fn test_retry_skips_uploaded_legs() {
    let harness = Harness::new();
    harness.transport.fail_next(
        "thumb.jpg",
        TransferError::Server {
            status: 400,
            message: "bad image".to_string(),
        },
    );
    let mut record = RecordUpload::video(video(MB), Some(thumbnail(6 * MB)));

    let first = harness.orchestrator.upload(&mut record).await.unwrap();
    assert!(first.is_degraded());
    assert!(record.legs()[0].is_uploaded());
    assert!(!record.legs()[1].is_uploaded());
    assert!(matches!(
        record.legs()[1].error(),
        Some(UploadError::Server { status: 400, .. })
    ));
    assert_eq!(harness.transport.requests_for("clip.mp4").len(), 1);

    let second = harness.orchestrator.upload(&mut record).await.unwrap();
    assert!(!second.is_degraded());
    assert!(record.is_complete());
    assert_eq!(harness.transport.requests_for("clip.mp4").len(), 1);
    assert_eq!(harness.transport.requests_for("thumb.jpg").len(), 2);

    let updates = harness.updater.updates.lock().unwrap().clone();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].thumbnail_url, None);
    assert_eq!(
        updates[1].video_url.as_deref(),
        Some("https://cdn.test/clip.mp4")
    );
    assert_eq!(
        updates[1].thumbnail_url.as_deref(),
        Some("https://cdn.test/thumb.jpg")
    );

    let notifications = harness.notifications();
    assert_eq!(notifications.len(), 2);
    assert!(matches!(
        notifications[0],
        Notification::Completed { degraded: true, .. }
    ));
    assert!(matches!(
        notifications[1],
        Notification::Completed { degraded: false, .. }
    ));

    let stored = harness
        .logger
        .get(record.legs()[1].session().unwrap())
        .await
        .unwrap();
    assert_eq!(
        stored.history,
        vec![
            UploadStatus::Pending,
            UploadStatus::Compressing,
            UploadStatus::Uploading,
            UploadStatus::Failed,
            UploadStatus::Pending,
            UploadStatus::Compressing,
            UploadStatus::Uploading,
            UploadStatus::Completed,
        ]
    );
}

#[tokio::test]
async fn test_primary_failure_fails_record_and_keeps_secondary() {
    let harness = Harness::new();
    harness.transport.fail_next(
        "clip.mp4",
        TransferError::Server {
            status: 413,
            message: "too large".to_string(),
        },
    );
    let mut record = RecordUpload::video(video(MB), Some(thumbnail(6 * MB)));

    let err = harness.orchestrator.upload(&mut record).await.unwrap_err();
    assert!(matches!(err, UploadError::Server { status: 413, .. }));
    assert!(record.legs()[1].is_uploaded());
    assert!(harness.updater.updates.lock().unwrap().is_empty());

    harness.orchestrator.upload(&mut record).await.unwrap();
    assert_eq!(harness.transport.requests_for("thumb.jpg").len(), 1);
    assert_eq!(harness.transport.requests_for("clip.mp4").len(), 2);
}

#[tokio::test]
async fn test_duplicate_is_rejected_without_transfer() {
    let harness = Harness::new();
    let mut first = RecordUpload::video(video(MB), None);
    harness.orchestrator.upload(&mut first).await.unwrap();
    assert_eq!(harness.transport.total_requests(), 1);

    let mut second = RecordUpload::video(video(MB), None);
    let err = harness.orchestrator.upload(&mut second).await.unwrap_err();
    assert!(matches!(err, UploadError::Duplicate(_)));
    assert_eq!(harness.transport.total_requests(), 1);
    assert_eq!(second.legs()[0].session(), None);
    assert!(matches!(
        harness.notifications().last(),
        Some(Notification::Failed { .. })
    ));
}

#[tokio::test]
async fn test_invalid_mime_fails_before_any_work() {
    let harness = Harness::new();
    let task = UploadTask::new(vec![1u8; 64], "notes.pdf", "application/pdf", MediaKind::Video);
    let mut record = RecordUpload::video(task, None);

    let err = harness.orchestrator.upload(&mut record).await.unwrap_err();
    assert!(matches!(err, UploadError::Validation(_)));
    assert_eq!(harness.transport.total_requests(), 0);
    assert!(harness.logger.records().await.is_empty());
}

#[tokio::test]
async fn test_cancel_then_retry() {
    let harness = Harness::new();
    harness.transport.stalled.store(true, Ordering::SeqCst);
    let mut record = RecordUpload::video(video(MB), None);
    let cancel = record.cancel_handle();

    let (result, ()) = tokio::join!(harness.orchestrator.upload(&mut record), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
    });
    assert_eq!(result.unwrap_err(), UploadError::Cancelled);
    assert_eq!(record.legs()[0].status(), UploadStatus::Failed);

    harness.transport.stalled.store(false, Ordering::SeqCst);
    assert!(record.cancel_handle().is_cancelled());
    harness.orchestrator.upload(&mut record).await.unwrap();
    assert!(!record.cancel_handle().is_cancelled());
    assert!(record.is_complete());
}

#[tokio::test]
async fn test_delete_failure_is_swallowed() {
    let harness = Harness::new();
    harness
        .orchestrator
        .delete_asset("https://cdn.test/clip.mp4")
        .await;
    assert_eq!(
        harness.transport.deletes.lock().unwrap().as_slice(),
        ["https://cdn.test/clip.mp4".to_string()]
    );
}

#[tokio::test]
async fn test_large_video_is_transcoded_with_weighted_progress() {
    let codec = Arc::new(ShrinkingVideoCodec::shrinking(0.5));
    let harness = Harness::with_video_codec(codec.clone());
    let mut rx = harness.orchestrator.progress();
    let mut record = RecordUpload::video(video(24 * MB), None);

    let outcome = harness.orchestrator.upload(&mut record).await.unwrap();
    assert!(!outcome.is_degraded());
    assert_eq!(codec.transcodes.load(Ordering::SeqCst), 1);

    // 12MB of transcoded output goes out as 5 + 5 + 2
    assert_eq!(harness.bytes_sent("clip.mp4"), 12 * MB);
    let chunks: Vec<Option<u32>> = harness
        .transport
        .requests_for("clip.mp4")
        .iter()
        .map(|r| r.chunk)
        .collect();
    assert_eq!(chunks, vec![Some(0), Some(1), Some(2)]);

    let events = drain(&mut rx);
    let last_compressing = events
        .iter()
        .rposition(|e| e.phase == ProgressPhase::Compressing)
        .unwrap();
    let first_uploading = events
        .iter()
        .position(|e| e.phase == ProgressPhase::Uploading)
        .unwrap();
    assert!(last_compressing < first_uploading);
    assert_eq!(events[0].overall, 0);
    assert!(events[..=last_compressing]
        .iter()
        .any(|e| e.overall > 0 && e.overall < 45));
    assert_eq!(events[last_compressing].overall, 45);
    assert!(events[first_uploading..].iter().all(|e| e.overall > 45));
    assert_eq!(events.last().map(|e| e.overall), Some(100));

    let stored = harness
        .logger
        .get(record.legs()[0].session().unwrap())
        .await
        .unwrap();
    assert_eq!(
        stored.history,
        vec![
            UploadStatus::Pending,
            UploadStatus::Compressing,
            UploadStatus::Uploading,
            UploadStatus::Completed
        ]
    );
}

#[tokio::test]
async fn test_video_barely_smaller_uploads_original() {
    let codec = Arc::new(ShrinkingVideoCodec::shrinking(0.95));
    let harness = Harness::with_video_codec(codec.clone());
    let mut record = RecordUpload::video(video(24 * MB), None);

    harness.orchestrator.upload(&mut record).await.unwrap();

    assert_eq!(codec.transcodes.load(Ordering::SeqCst), 1);
    assert_eq!(harness.bytes_sent("clip.mp4"), 24 * MB);
    assert_eq!(record.legs()[0].status(), UploadStatus::Completed);
    assert_eq!(record.legs()[0].progress(), Some(100));
}

#[tokio::test]
async fn test_failed_video_transcode_uploads_original() {
    let codec = Arc::new(ShrinkingVideoCodec::broken());
    let harness = Harness::with_video_codec(codec.clone());
    let mut rx = harness.orchestrator.progress();
    let mut record = RecordUpload::video(video(24 * MB), None);

    let outcome = harness.orchestrator.upload(&mut record).await.unwrap();
    assert!(!outcome.is_degraded());
    assert_eq!(
        outcome.media().video_url.as_deref(),
        Some("https://cdn.test/clip.mp4")
    );

    assert_eq!(codec.transcodes.load(Ordering::SeqCst), 1);
    assert_eq!(harness.bytes_sent("clip.mp4"), 24 * MB);
    assert!(record.legs()[0].is_uploaded());
    assert_eq!(record.legs()[0].status(), UploadStatus::Completed);

    let events = drain(&mut rx);
    let overall: Vec<u8> = events.iter().map(|e| e.overall).collect();
    assert!(overall.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(overall.last(), Some(&100));

    assert!(matches!(
        harness.notifications().as_slice(),
        [Notification::Completed { degraded: false, .. }]
    ));
}
