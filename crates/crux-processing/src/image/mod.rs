//! Image decoding, orientation and the quality/dimension ladder.

pub mod codec;
pub mod orientation;
pub mod transcoder;

pub use codec::{DecodedImage, ImageCodec, NativeImageCodec};
pub use orientation::ImageOrientation;
pub use transcoder::ImageTranscoder;
