use crux_core::UploadError;

/// Failures raised by codecs and transcoders. Never fatal to an upload: the
/// orchestrator falls back to the original file.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Failed to decode media: {0}")]
    Decode(String),

    #[error("Failed to encode media: {0}")]
    Encode(String),

    #[error("Failed to probe video: {0}")]
    Probe(String),

    #[error("Video transcode failed: {0}")]
    Transcode(String),

    #[error("Codec unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec task aborted: {0}")]
    Join(String),
}

impl From<image::ImageError> for CodecError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Encoding(e) => CodecError::Encode(e.to_string()),
            other => CodecError::Decode(other.to_string()),
        }
    }
}

impl From<CodecError> for UploadError {
    fn from(err: CodecError) -> Self {
        UploadError::Compression(err.to_string())
    }
}
