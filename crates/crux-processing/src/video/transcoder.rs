use crate::error::CodecError;
use crate::video::codec::{VideoCodec, VideoEncodeParams};
use bytes::Bytes;
use crux_core::constants::VIDEO_MAX_OUTPUT_RATIO;
use crux_core::{ProgressSink, TranscodeResult};
use std::sync::Arc;

/// Quality level (0-100) fed into the CRF mapping.
const DEFAULT_VIDEO_QUALITY: u32 = 75;

/// Video MediaTranscoder: downscales past 1920px wide and re-encodes in the source's
/// container and codec family.
#[derive(Clone)]
pub struct VideoTranscoder {
    codec: Arc<dyn VideoCodec>,
    quality: u32,
}

impl VideoTranscoder {
    pub fn new(codec: Arc<dyn VideoCodec>) -> Self {
        Self {
            codec,
            quality: DEFAULT_VIDEO_QUALITY,
        }
    }

    pub fn with_quality(mut self, quality: u32) -> Self {
        self.quality = quality.min(100);
        self
    }

    /// Re-encode `source`. A result that is not at least 10% smaller comes back as
    /// the untouched source with `transcoded == false`.
    ///
    /// The source is staged once to a temp file that serves both the metadata
    /// read and the encode. Both temp files are removed on return.
    pub async fn transcode(
        &self,
        source: Bytes,
        extension: &str,
        progress: &ProgressSink,
    ) -> Result<TranscodeResult, CodecError> {
        if !self.codec.is_available() {
            return Err(CodecError::Unavailable(
                "video transcoding is not available".to_string(),
            ));
        }

        let staged = temp_file("crux-src-", extension)?;
        tokio::fs::write(staged.path(), &source).await?;
        let encoded = temp_file("crux-out-", extension)?;

        let metadata = self.codec.probe(staged.path()).await?;
        let params = VideoEncodeParams::for_source(&metadata, self.quality);
        let (width, height) = params.output_dimensions(&metadata);

        tracing::info!(
            source_bytes = source.len(),
            source_width = metadata.width,
            source_height = metadata.height,
            target_width = width,
            target_height = height,
            bitrate_kbps = params.bitrate_kbps,
            encoder = params.encoder,
            "Transcoding video"
        );

        self.codec
            .transcode(
                staged.path(),
                encoded.path(),
                &params,
                metadata.duration,
                progress,
            )
            .await?;
        let output = Bytes::from(tokio::fs::read(encoded.path()).await?);

        let limit = (source.len() as f64 * VIDEO_MAX_OUTPUT_RATIO) as u64;
        if output.len() as u64 > limit {
            tracing::info!(
                source_bytes = source.len(),
                output_bytes = output.len(),
                "Transcoded video not small enough, keeping original"
            );
            return Ok(TranscodeResult::passthrough(
                source,
                metadata.width,
                metadata.height,
            ));
        }

        Ok(TranscodeResult {
            output,
            width,
            height,
            orientation_corrected: false,
            transcoded: true,
            quality: None,
            max_edge: params.scale.map(|(w, _)| w),
        })
    }
}

fn temp_file(prefix: &str, extension: &str) -> Result<tempfile::NamedTempFile, CodecError> {
    Ok(tempfile::Builder::new()
        .prefix(prefix)
        .suffix(&format!(".{}", extension))
        .tempfile()?)
}
