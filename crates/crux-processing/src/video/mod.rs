//! Video probing and re-encoding.

pub mod codec;
#[cfg(feature = "video-ffmpeg")]
pub mod ffmpeg;
pub mod transcoder;

pub use codec::{PassthroughVideoCodec, VideoCodec, VideoEncodeParams, VideoMetadata};
#[cfg(feature = "video-ffmpeg")]
pub use ffmpeg::FFmpegVideoCodec;
pub use transcoder::VideoTranscoder;
