use crate::error::CodecError;
use async_trait::async_trait;
use crux_core::constants::{VIDEO_KBPS_PER_1000_PX, VIDEO_MAX_WIDTH, VIDEO_MIN_BITRATE_KBPS};
use crux_core::ProgressSink;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub codec: String,
    pub duration: Option<f64>,
    pub bitrate: Option<u64>,
}

/// Encoder settings for one re-encode. Container and codec family are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoEncodeParams {
    pub encoder: &'static str,
    /// Output size when the source is downscaled.
    pub scale: Option<(u32, u32)>,
    pub bitrate_kbps: u32,
    pub crf: i32,
}

impl VideoEncodeParams {
    /// Derive settings from probed metadata and a quality level (0-100).
    pub fn for_source(metadata: &VideoMetadata, quality: u32) -> Self {
        let encoder = encoder_for_codec(&metadata.codec);
        let scale = scaled_dimensions(metadata.width, metadata.height);
        let output_width = scale.map_or(metadata.width, |(w, _)| w);

        Self {
            encoder,
            scale,
            bitrate_kbps: target_bitrate_kbps(output_width),
            crf: crf_for_encoder(quality, encoder),
        }
    }

    pub fn output_dimensions(&self, metadata: &VideoMetadata) -> (u32, u32) {
        self.scale.unwrap_or((metadata.width, metadata.height))
    }
}

/// Same codec family as the source, falling back to H.264.
pub fn encoder_for_codec(codec: &str) -> &'static str {
    match codec.to_lowercase().as_str() {
        "hevc" | "h265" => "libx265",
        "vp9" => "libvpx-vp9",
        "av1" => "libsvtav1",
        _ => "libx264",
    }
}

/// Cap width at 1920 preserving aspect ratio; height is kept even for the encoder.
pub fn scaled_dimensions(width: u32, height: u32) -> Option<(u32, u32)> {
    if width <= VIDEO_MAX_WIDTH || width == 0 {
        return None;
    }
    let scaled = (height as u64 * VIDEO_MAX_WIDTH as u64 / width as u64) as u32;
    Some((VIDEO_MAX_WIDTH, (scaled & !1).max(2)))
}

pub fn target_bitrate_kbps(output_width: u32) -> u32 {
    let proportional = (output_width as u64 * VIDEO_KBPS_PER_1000_PX as u64 / 1000) as u32;
    proportional.max(VIDEO_MIN_BITRATE_KBPS)
}

fn map_linear_crf(quality: u32, high_crf: i32, low_crf: i32) -> i32 {
    let q = quality.min(100) as f64 / 100.0;
    (low_crf as f64 - q * (low_crf - high_crf) as f64).round() as i32
}

pub fn crf_for_encoder(quality: u32, encoder: &str) -> i32 {
    match encoder {
        "libx265" => map_linear_crf(quality, 28, 51),
        "libsvtav1" => map_linear_crf(quality, 24, 63),
        "libvpx-vp9" => map_linear_crf(quality, 20, 63),
        _ => map_linear_crf(quality, 23, 51),
    }
}

/// Platform capability for video probing and re-encoding.
///
/// Both calls work on files staged by the caller, so a source is written to disk
/// once per transcode.
#[async_trait]
pub trait VideoCodec: Send + Sync {
    /// Whether the codec can transcode at all. Unavailable codecs are skipped.
    fn is_available(&self) -> bool {
        true
    }

    async fn probe(&self, source: &Path) -> Result<VideoMetadata, CodecError>;

    /// Re-encode `source` into `output`, same container. `duration` enables
    /// progress reporting.
    async fn transcode(
        &self,
        source: &Path,
        output: &Path,
        params: &VideoEncodeParams,
        duration: Option<f64>,
        progress: &ProgressSink,
    ) -> Result<(), CodecError>;

    /// Release any process-wide resources.
    async fn release(&self) {}
}

/// Codec used when no video toolchain exists: every video is uploaded as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughVideoCodec;

#[async_trait]
impl VideoCodec for PassthroughVideoCodec {
    fn is_available(&self) -> bool {
        false
    }

    async fn probe(&self, _source: &Path) -> Result<VideoMetadata, CodecError> {
        Err(CodecError::Unavailable("no video codec configured".to_string()))
    }

    async fn transcode(
        &self,
        _source: &Path,
        _output: &Path,
        _params: &VideoEncodeParams,
        _duration: Option<f64>,
        _progress: &ProgressSink,
    ) -> Result<(), CodecError> {
        Err(CodecError::Unavailable("no video codec configured".to_string()))
    }
}
