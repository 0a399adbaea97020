//! FFmpeg-backed video codec (subprocess).

use crate::error::CodecError;
use crate::video::codec::{VideoCodec, VideoEncodeParams, VideoMetadata};
use async_trait::async_trait;
use crux_core::ProgressSink;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

/// Reject executable paths containing shell metacharacters or traversal
fn validate_executable(path: &str) -> Result<(), CodecError> {
    let dangerous_chars = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];
    if path.is_empty() || path.chars().any(|c| dangerous_chars.contains(&c)) {
        return Err(CodecError::Unavailable(format!(
            "invalid executable path: {}",
            path
        )));
    }
    if path.contains("..") {
        return Err(CodecError::Unavailable(format!(
            "executable path contains directory traversal: {}",
            path
        )));
    }
    Ok(())
}

pub struct FFmpegVideoCodec {
    ffmpeg_path: String,
    ffprobe_path: String,
    available: AtomicBool,
}

impl FFmpegVideoCodec {
    pub fn new(ffmpeg_path: String, ffprobe_path: String) -> Result<Self, CodecError> {
        validate_executable(&ffmpeg_path)?;
        validate_executable(&ffprobe_path)?;

        Ok(Self {
            ffmpeg_path,
            ffprobe_path,
            available: AtomicBool::new(false),
        })
    }

    /// Check that ffmpeg runs. Marks the codec available on success.
    pub async fn verify(&self) -> bool {
        let result = Command::new(&self.ffmpeg_path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        let ok = matches!(result, Ok(status) if status.success());
        if ok {
            tracing::info!(ffmpeg_path = %self.ffmpeg_path, "FFmpeg available");
        } else {
            tracing::warn!(
                ffmpeg_path = %self.ffmpeg_path,
                "FFmpeg not available, videos will be uploaded untranscoded"
            );
        }
        self.available.store(ok, Ordering::SeqCst);
        ok
    }

    #[tracing::instrument(skip(self), fields(
        process.executable.name = "ffprobe",
        process.executable.path = %self.ffprobe_path,
        ffmpeg.operation = "probe"
    ))]
    async fn probe_path(&self, video_path: &Path) -> Result<VideoMetadata, CodecError> {
        let start = std::time::Instant::now();

        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                "-select_streams",
                "v:0",
            ])
            .arg(video_path)
            .output()
            .await?;

        if !output.status.success() {
            return Err(CodecError::Probe(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let metadata = parse_probe_output(&output.stdout)?;

        tracing::info!(
            duration_ms = start.elapsed().as_millis(),
            video_duration = ?metadata.duration,
            width = metadata.width,
            height = metadata.height,
            codec = %metadata.codec,
            "Video probe completed"
        );

        Ok(metadata)
    }
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output.
pub fn parse_probe_output(stdout: &[u8]) -> Result<VideoMetadata, CodecError> {
    let probe: serde_json::Value = serde_json::from_slice(stdout)
        .map_err(|e| CodecError::Probe(format!("invalid ffprobe output: {}", e)))?;

    let stream = probe["streams"]
        .get(0)
        .ok_or_else(|| CodecError::Probe("no video stream found".to_string()))?;
    let format = &probe["format"];

    let width = stream["width"]
        .as_u64()
        .ok_or_else(|| CodecError::Probe("could not parse width".to_string()))? as u32;
    let height = stream["height"]
        .as_u64()
        .ok_or_else(|| CodecError::Probe("could not parse height".to_string()))?
        as u32;

    Ok(VideoMetadata {
        width,
        height,
        codec: stream["codec_name"]
            .as_str()
            .unwrap_or("unknown")
            .to_string(),
        duration: format["duration"]
            .as_str()
            .and_then(|d| d.parse::<f64>().ok()),
        bitrate: format["bit_rate"]
            .as_str()
            .and_then(|b| b.parse::<u64>().ok()),
    })
}

/// Percentage from one `-progress pipe:1` line. `out_time_ms` is in microseconds.
pub fn parse_progress_line(line: &str, duration: f64) -> Option<u8> {
    let micros: i64 = line.trim().strip_prefix("out_time_ms=")?.parse().ok()?;
    if duration <= 0.0 || micros < 0 {
        return None;
    }
    let fraction = (micros as f64 / 1_000_000.0 / duration).min(1.0);
    Some((fraction * 100.0) as u8)
}

/// Full ffmpeg argument list for a same-container re-encode.
pub fn build_transcode_args(
    input: &Path,
    output: &Path,
    extension: &str,
    params: &VideoEncodeParams,
) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-c:v".to_string(),
        params.encoder.to_string(),
        "-crf".to_string(),
        params.crf.to_string(),
    ];

    match params.encoder {
        "libx264" | "libx265" => {
            args.extend_from_slice(&[
                "-preset".to_string(),
                "fast".to_string(),
                "-maxrate".to_string(),
                format!("{}k", params.bitrate_kbps),
                "-bufsize".to_string(),
                format!("{}k", params.bitrate_kbps * 2),
            ]);
        }
        "libvpx-vp9" => {
            args.extend_from_slice(&[
                "-b:v".to_string(),
                format!("{}k", params.bitrate_kbps),
                "-deadline".to_string(),
                "good".to_string(),
                "-cpu-used".to_string(),
                "4".to_string(),
            ]);
        }
        "libsvtav1" => {
            args.extend_from_slice(&["-preset".to_string(), "8".to_string()]);
        }
        _ => {}
    }

    if let Some((width, height)) = params.scale {
        args.extend_from_slice(&["-vf".to_string(), format!("scale={}:{}", width, height)]);
    }

    args.extend_from_slice(&["-c:a".to_string(), "copy".to_string()]);

    if matches!(extension, "mp4" | "mov" | "m4v") {
        args.extend_from_slice(&["-movflags".to_string(), "+faststart".to_string()]);
    }

    args.extend_from_slice(&[
        "-progress".to_string(),
        "pipe:1".to_string(),
        "-nostats".to_string(),
        output.to_string_lossy().to_string(),
    ]);

    args
}

#[async_trait]
impl VideoCodec for FFmpegVideoCodec {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn probe(&self, source: &Path) -> Result<VideoMetadata, CodecError> {
        self.probe_path(source).await
    }

    #[tracing::instrument(skip(self, params, progress), fields(
        process.executable.name = "ffmpeg",
        process.executable.path = %self.ffmpeg_path,
        ffmpeg.operation = "transcode"
    ))]
    async fn transcode(
        &self,
        source: &Path,
        output: &Path,
        params: &VideoEncodeParams,
        duration: Option<f64>,
        progress: &ProgressSink,
    ) -> Result<(), CodecError> {
        let start = std::time::Instant::now();
        let extension = output
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp4")
            .to_lowercase();
        let args = build_transcode_args(source, output, &extension, params);

        let mut child = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buffer = String::new();
                let _ = stderr.read_to_string(&mut buffer).await;
                buffer
            })
        });

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                let Some(total) = duration else {
                    continue;
                };
                if let Some(p) = parse_progress_line(&line, total) {
                    progress.publish(p);
                }
            }
        }

        let status = child.wait().await?;
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            return Err(CodecError::Transcode(format!("ffmpeg failed: {}", stderr.trim())));
        }
        progress.publish(100);

        tracing::info!(
            duration_ms = start.elapsed().as_millis(),
            encoder = params.encoder,
            crf = params.crf,
            bitrate_kbps = params.bitrate_kbps,
            "Video transcode completed"
        );

        Ok(())
    }

    async fn release(&self) {
        self.available.store(false, Ordering::SeqCst);
        tracing::debug!("FFmpeg codec released");
    }
}
