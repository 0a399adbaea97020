//! Helpers for the `crux` binary.

use anyhow::Context;
use crux_core::{MediaKind, ProgressEvent, ProgressPhase, UploadTask};
use serde::Serialize;
use std::path::Path;

/// Initialize tracing for the CLI. `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

/// MIME type from a file extension, for the formats the pipeline accepts.
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        _ => return None,
    };
    Some(mime)
}

/// Read `path` into an upload task.
pub async fn load_task(
    path: &Path,
    kind: MediaKind,
    target: Option<&str>,
) -> anyhow::Result<UploadTask> {
    let mime = mime_for_path(path)
        .with_context(|| format!("Unsupported file type: {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid file name: {}", path.display()))?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let task = UploadTask::new(bytes, file_name, mime, kind);
    Ok(match target {
        Some(target) => task.with_target(target),
        None => task,
    })
}

pub fn format_progress(event: &ProgressEvent) -> String {
    let phase = match event.phase {
        ProgressPhase::Compressing => "compressing",
        ProgressPhase::Uploading => "uploading",
    };
    format!(
        "{} {:>3}% ({} {}%)",
        event.task_id, event.overall, phase, event.phase_value
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use uuid::Uuid;

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path(Path::new("a/b/clip.MOV")), Some("video/quicktime"));
        assert_eq!(mime_for_path(Path::new("thumb.jpeg")), Some("image/jpeg"));
        assert_eq!(mime_for_path(Path::new("notes.pdf")), None);
        assert_eq!(mime_for_path(Path::new("no_extension")), None);
    }

    #[test]
    fn test_format_progress() {
        let event = ProgressEvent {
            task_id: Uuid::nil(),
            overall: 7,
            phase: ProgressPhase::Compressing,
            phase_value: 15,
        };
        assert_eq!(
            format_progress(&event),
            "00000000-0000-0000-0000-000000000000   7% (compressing 15%)"
        );
    }

    #[tokio::test]
    async fn test_load_task() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"not really a video")
            .unwrap();

        let task = load_task(&path, MediaKind::Video, Some("route-3")).await.unwrap();
        assert_eq!(task.file_name(), "clip.mp4");
        assert_eq!(task.mime_type(), "video/mp4");
        assert_eq!(task.source_len(), 18);
        assert_eq!(task.target_entity_id(), Some("route-3"));

        let missing = dir.path().join("missing.mp4");
        assert!(load_task(&missing, MediaKind::Video, None).await.is_err());
        assert!(load_task(&dir.path().join("x.txt"), MediaKind::Image, None).await.is_err());
    }
}
