use crate::error::CodecError;
use crate::image::orientation::ImageOrientation;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageReader};
use std::io::Cursor;

/// A decoded image with embedded orientation metadata already applied.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub image: DynamicImage,
    /// Dimensions as stored in the file, before orientation was applied.
    pub stored_width: u32,
    pub stored_height: u32,
    pub orientation_applied: bool,
}

/// Platform capability for pixel decoding and lossy re-encoding.
///
/// Implementations are synchronous and CPU-bound; callers run them on the blocking pool.
pub trait ImageCodec: Send + Sync {
    /// Decode the source and bring it upright according to its orientation metadata.
    fn decode(&self, data: &[u8]) -> Result<DecodedImage, CodecError>;

    /// Encode as JPEG at `quality` in `0.0..=1.0`.
    fn encode(&self, image: &DynamicImage, quality: f32) -> Result<Vec<u8>, CodecError>;
}

/// `image`-crate codec with EXIF orientation read via `kamadak-exif`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeImageCodec;

impl ImageCodec for NativeImageCodec {
    fn decode(&self, data: &[u8]) -> Result<DecodedImage, CodecError> {
        let reader = ImageReader::new(Cursor::new(data)).with_guessed_format()?;
        let image = reader.decode()?;
        let (stored_width, stored_height) = (image.width(), image.height());

        let orientation = ImageOrientation::read_exif_orientation(data);
        let (image, orientation_applied) =
            ImageOrientation::apply_exif_orientation(image, orientation);

        Ok(DecodedImage {
            image,
            stored_width,
            stored_height,
            orientation_applied,
        })
    }

    fn encode(&self, image: &DynamicImage, quality: f32) -> Result<Vec<u8>, CodecError> {
        let quality = (quality.clamp(0.01, 1.0) * 100.0).round() as u8;
        let rgb = image.to_rgb8();

        let mut buffer = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
        encoder.encode_image(&rgb)?;
        Ok(buffer)
    }
}
