use crate::image::{ImageCodec, ImageTranscoder, NativeImageCodec};
use crate::video::{PassthroughVideoCodec, VideoCodec, VideoTranscoder};
use crux_core::PipelineConfig;
use std::sync::Arc;

/// Process-wide codec handle. Acquired once, passed to whoever transcodes, released
/// on shutdown.
#[derive(Clone)]
pub struct MediaCodecs {
    image: Arc<dyn ImageCodec>,
    video: Arc<dyn VideoCodec>,
}

impl MediaCodecs {
    pub fn new(image: Arc<dyn ImageCodec>, video: Arc<dyn VideoCodec>) -> Self {
        Self { image, video }
    }

    /// Native codecs. A missing or broken ffmpeg leaves video transcoding disabled.
    pub async fn acquire(config: &PipelineConfig) -> Self {
        Self::new(Arc::new(NativeImageCodec), Self::acquire_video(config).await)
    }

    #[cfg(feature = "video-ffmpeg")]
    async fn acquire_video(config: &PipelineConfig) -> Arc<dyn VideoCodec> {
        use crate::video::FFmpegVideoCodec;

        match FFmpegVideoCodec::new(config.ffmpeg_path.clone(), config.ffprobe_path.clone()) {
            Ok(codec) => {
                codec.verify().await;
                Arc::new(codec)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Invalid ffmpeg configuration, video transcoding disabled");
                Arc::new(PassthroughVideoCodec)
            }
        }
    }

    #[cfg(not(feature = "video-ffmpeg"))]
    async fn acquire_video(_config: &PipelineConfig) -> Arc<dyn VideoCodec> {
        Arc::new(PassthroughVideoCodec)
    }

    pub fn image_transcoder(&self) -> ImageTranscoder {
        ImageTranscoder::new(Arc::clone(&self.image))
    }

    pub fn video_transcoder(&self) -> VideoTranscoder {
        VideoTranscoder::new(Arc::clone(&self.video))
    }

    pub fn video_available(&self) -> bool {
        self.video.is_available()
    }

    pub async fn shutdown(self) {
        self.video.release().await;
        tracing::debug!("Media codecs released");
    }
}

impl Default for MediaCodecs {
    fn default() -> Self {
        Self::new(Arc::new(NativeImageCodec), Arc::new(PassthroughVideoCodec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_handle_has_no_video() {
        let codecs = MediaCodecs::default();
        assert!(!codecs.video_available());
        codecs.shutdown().await;
    }

    #[tokio::test]
    async fn test_acquire_with_missing_ffmpeg_disables_video() {
        let config = PipelineConfig {
            ffmpeg_path: "/nonexistent/crux-ffmpeg".to_string(),
            ..PipelineConfig::default()
        };
        let codecs = MediaCodecs::acquire(&config).await;
        assert!(!codecs.video_available());
    }
}
