//! crux: upload media through the resilient upload pipeline.
//!
//! Configuration comes from the environment (see `PipelineConfig::from_env`); set
//! CRUX_UPLOAD_URL for the chunked endpoint, or S3_BUCKET and S3_REGION for the
//! direct-upload fallback.

use anyhow::Context;
use bytes::Bytes;
use clap::{Parser, Subcommand, ValueEnum};
use crux_cli::{format_progress, init_tracing, load_task, mime_for_path, print_json};
use crux_core::{MediaKind, PipelineConfig, ProgressEvent};
use crux_processing::{FFmpegVideoCodec, ImageCodec, MediaCodecs, NativeImageCodec, VideoCodec};
use crux_storage::{create_transport, Transport};
use crux_upload::{RecordUpload, UploadOrchestrator};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;

#[derive(Parser)]
#[command(name = "crux", about = "Resilient media upload pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a video with an optional thumbnail
    Upload {
        /// Path to the video
        #[arg(long)]
        video: PathBuf,
        /// Path to the thumbnail image
        #[arg(long)]
        thumbnail: Option<PathBuf>,
        /// Server-side record the media belongs to
        #[arg(long)]
        target: Option<String>,
    },
    /// Upload a single image
    UploadImage {
        path: PathBuf,
        #[arg(long, value_enum, default_value = "image")]
        kind: ImageKind,
        #[arg(long)]
        target: Option<String>,
    },
    /// Delete an uploaded asset by URL
    Delete { url: String },
    /// Print dimensions (and codec details for videos) of a local file
    Probe { path: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum ImageKind {
    Thumbnail,
    Image,
}

impl From<ImageKind> for MediaKind {
    fn from(kind: ImageKind) -> Self {
        match kind {
            ImageKind::Thumbnail => MediaKind::Thumbnail,
            ImageKind::Image => MediaKind::Image,
        }
    }
}

fn spawn_progress_printer(mut rx: broadcast::Receiver<ProgressEvent>) {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => eprintln!("{}", format_progress(&event)),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

async fn upload(config: &PipelineConfig, mut record: RecordUpload) -> anyhow::Result<()> {
    let codecs = MediaCodecs::acquire(config).await;
    let transport = create_transport(config).context("Failed to create upload transport")?;
    let orchestrator = UploadOrchestrator::new(config, codecs, transport);
    spawn_progress_printer(orchestrator.progress());

    let cancel = record.cancel_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling upload");
            cancel.cancel();
        }
    });

    let result = orchestrator.upload(&mut record).await;
    interrupt.abort();
    orchestrator.shutdown().await;

    let outcome = result.context("Upload failed")?;
    print_json(&serde_json::json!({
        "record_id": record.id(),
        "degraded": outcome.is_degraded(),
        "media": outcome.media(),
    }))
}

async fn probe(config: &PipelineConfig, path: &Path) -> anyhow::Result<()> {
    let mime = mime_for_path(path)
        .with_context(|| format!("Unsupported file type: {}", path.display()))?;

    if mime.starts_with("image/") {
        let bytes = Bytes::from(
            tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?,
        );
        let decoded = NativeImageCodec.decode(&bytes)?;
        return print_json(&serde_json::json!({
            "width": decoded.image.width(),
            "height": decoded.image.height(),
            "stored_width": decoded.stored_width,
            "stored_height": decoded.stored_height,
            "orientation_applied": decoded.orientation_applied,
            "size_bytes": bytes.len(),
        }));
    }

    let codec = FFmpegVideoCodec::new(config.ffmpeg_path.clone(), config.ffprobe_path.clone())?;
    let metadata = codec.probe(path).await?;
    print_json(&metadata)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Upload {
            video,
            thumbnail,
            target,
        } => {
            let config = PipelineConfig::from_env().context("Invalid configuration")?;
            let video = load_task(&video, MediaKind::Video, target.as_deref()).await?;
            let thumbnail = match thumbnail {
                Some(path) => Some(load_task(&path, MediaKind::Thumbnail, target.as_deref()).await?),
                None => None,
            };
            upload(&config, RecordUpload::video(video, thumbnail)).await?;
        }
        Commands::UploadImage { path, kind, target } => {
            let config = PipelineConfig::from_env().context("Invalid configuration")?;
            let image = load_task(&path, kind.into(), target.as_deref()).await?;
            upload(&config, RecordUpload::image(image)).await?;
        }
        Commands::Delete { url } => {
            let config = PipelineConfig::from_env().context("Invalid configuration")?;
            let transport = create_transport(&config)?;
            transport.delete(&url).await?;
            print_json(&serde_json::json!({ "success": true, "url": url }))?;
        }
        Commands::Probe { path } => {
            // Probing needs no upload backend.
            dotenvy::dotenv().ok();
            let config = PipelineConfig {
                ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
                ffprobe_path: std::env::var("FFPROBE_PATH")
                    .unwrap_or_else(|_| "ffprobe".to_string()),
                ..PipelineConfig::default()
            };
            probe(&config, &path).await?;
        }
    }

    Ok(())
}
