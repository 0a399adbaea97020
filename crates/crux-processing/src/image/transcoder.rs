use crate::error::CodecError;
use crate::image::codec::ImageCodec;
use crate::image::orientation::ImageOrientation;
use bytes::Bytes;
use crux_core::constants::IMAGE_QUALITY_LADDER;
use crux_core::{ProgressSink, TranscodeResult};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use std::sync::Arc;

/// Image MediaTranscoder: walks a quality × dimension ladder until the encode fits
/// the byte budget.
///
/// Output is never larger than the source; when no rung beats the source the
/// untouched bytes are returned.
#[derive(Clone)]
pub struct ImageTranscoder {
    codec: Arc<dyn ImageCodec>,
    qualities: &'static [f32],
}

struct Candidate {
    output: Vec<u8>,
    width: u32,
    height: u32,
    quality: f32,
    max_edge: u32,
}

impl ImageTranscoder {
    pub fn new(codec: Arc<dyn ImageCodec>) -> Self {
        Self {
            codec,
            qualities: &IMAGE_QUALITY_LADDER,
        }
    }

    /// Transcode on the blocking pool.
    pub async fn transcode(
        &self,
        source: Bytes,
        byte_budget: u64,
        dimension_ladder: &'static [u32],
        progress: ProgressSink,
    ) -> Result<TranscodeResult, CodecError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || {
            this.transcode_blocking(source, byte_budget, dimension_ladder, &progress)
        })
        .await
        .map_err(|e| CodecError::Join(e.to_string()))?
    }

    /// Synchronous core of [`ImageTranscoder::transcode`].
    ///
    /// The first rung within `byte_budget` and no larger than the source wins, else
    /// the smallest encode that beats the source. When no encode beats the source the
    /// original bytes are returned as stored: no orientation is applied and a
    /// landscape source stays landscape.
    pub fn transcode_blocking(
        &self,
        source: Bytes,
        byte_budget: u64,
        dimension_ladder: &[u32],
        progress: &ProgressSink,
    ) -> Result<TranscodeResult, CodecError> {
        let source_len = source.len() as u64;
        let decoded = self.codec.decode(&source)?;
        let (upright, rotated) = ImageOrientation::force_portrait(decoded.image);
        let orientation_corrected = decoded.orientation_applied || rotated;

        let total_steps = (dimension_ladder.len() * self.qualities.len()).max(1);
        let mut step = 0usize;
        let mut best: Option<Candidate> = None;

        for &max_edge in dimension_ladder {
            let resized = fit_within(&upright, max_edge);
            let (width, height) = resized.dimensions();

            for &quality in self.qualities {
                let encoded = self.codec.encode(&resized, quality)?;
                let size = encoded.len() as u64;
                step += 1;
                progress.publish(((step * 100) / total_steps) as u8);

                tracing::debug!(
                    max_edge = max_edge,
                    quality = quality,
                    size_bytes = size,
                    byte_budget = byte_budget,
                    "Image encode attempt"
                );

                let candidate = Candidate {
                    output: encoded,
                    width,
                    height,
                    quality,
                    max_edge,
                };

                if size <= byte_budget && size <= source_len {
                    progress.publish(100);
                    return Ok(candidate.into_result(orientation_corrected));
                }

                let smallest = best
                    .as_ref()
                    .map_or(true, |b| size < b.output.len() as u64);
                if smallest && size < source_len {
                    best = Some(candidate);
                }
            }
        }

        progress.publish(100);

        match best {
            Some(candidate) => {
                tracing::info!(
                    size_bytes = candidate.output.len(),
                    byte_budget = byte_budget,
                    "Image budget not reached, using smallest encode"
                );
                Ok(candidate.into_result(orientation_corrected))
            }
            None => {
                tracing::info!(
                    size_bytes = source_len,
                    "No encode beat the source, keeping original image"
                );
                Ok(TranscodeResult::passthrough(
                    source,
                    decoded.stored_width,
                    decoded.stored_height,
                ))
            }
        }
    }
}

impl Candidate {
    fn into_result(self, orientation_corrected: bool) -> TranscodeResult {
        TranscodeResult {
            output: Bytes::from(self.output),
            width: self.width,
            height: self.height,
            orientation_corrected,
            transcoded: true,
            quality: Some(self.quality),
            max_edge: Some(self.max_edge),
        }
    }
}

/// Downscale so the longer edge is at most `max_edge`, keeping aspect ratio.
fn fit_within(img: &DynamicImage, max_edge: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width.max(height) <= max_edge {
        return img.clone();
    }
    img.resize(max_edge, max_edge, FilterType::Triangle)
}
