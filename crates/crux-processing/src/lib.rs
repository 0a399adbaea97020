//! Crux Processing Library
//!
//! Compression planning and media transcoding for the upload pipeline. Platform
//! specifics (pixel decoding, video re-encoding) sit behind the [`ImageCodec`] and
//! [`VideoCodec`] capability traits; [`MediaCodecs`] is the explicit handle that owns
//! them for the lifetime of a process. Stage progress is published to a
//! [`ProgressSink`].

pub mod error;
pub mod handle;
pub mod image;
pub mod planner;
pub mod validator;
pub mod video;

pub use crate::image::{DecodedImage, ImageCodec, ImageTranscoder, NativeImageCodec};
pub use error::CodecError;
pub use handle::MediaCodecs;
pub use planner::CompressionPlanner;
pub use validator::{MediaValidator, ValidationError};
pub use video::{
    PassthroughVideoCodec, VideoCodec, VideoEncodeParams, VideoMetadata, VideoTranscoder,
};

#[cfg(feature = "video-ffmpeg")]
pub use video::FFmpegVideoCodec;

pub use crux_core::ProgressSink;
