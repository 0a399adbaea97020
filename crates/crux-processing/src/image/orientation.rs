use image::{imageops, DynamicImage, GenericImageView};
use std::io::Cursor;

/// Image orientation operations (rotation and flipping)
pub struct ImageOrientation;

impl ImageOrientation {
    /// Read the EXIF orientation tag (1-8). Returns 1 when absent or unreadable.
    pub fn read_exif_orientation(data: &[u8]) -> u8 {
        let mut cursor = Cursor::new(data);
        let exif = match exif::Reader::new().read_from_container(&mut cursor) {
            Ok(exif) => exif,
            Err(_) => return 1,
        };

        exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .and_then(|value| u8::try_from(value).ok())
            .filter(|value| (1..=8).contains(value))
            .unwrap_or(1)
    }

    /// Rotation and flips that bring an image with the given EXIF orientation upright.
    /// Returns (rotate_angle, flip_horizontal, flip_vertical); rotation is applied first.
    pub fn transforms(orientation: u8) -> (Option<u16>, bool, bool) {
        match orientation {
            2 => (None, true, false),
            3 => (Some(180), false, false),
            4 => (None, false, true),
            5 => (Some(90), true, false),
            6 => (Some(90), false, false),
            7 => (Some(270), true, false),
            8 => (Some(270), false, false),
            _ => (None, false, false),
        }
    }

    /// Apply an EXIF orientation. Returns the image and whether anything changed.
    pub fn apply_exif_orientation(mut img: DynamicImage, orientation: u8) -> (DynamicImage, bool) {
        let (rotate, flip_h, flip_v) = Self::transforms(orientation);
        if rotate.is_none() && !flip_h && !flip_v {
            return (img, false);
        }

        tracing::debug!(
            orientation = orientation,
            rotate = ?rotate,
            flip_horizontal = flip_h,
            flip_vertical = flip_v,
            "Applying EXIF orientation"
        );

        if let Some(angle) = rotate {
            img = Self::rotate_by_angle(img, angle);
        }
        if flip_h {
            img = DynamicImage::ImageRgba8(imageops::flip_horizontal(&img.to_rgba8()));
        }
        if flip_v {
            img = DynamicImage::ImageRgba8(imageops::flip_vertical(&img.to_rgba8()));
        }

        (img, true)
    }

    /// Rotate landscape images a quarter turn so stored assets are portrait or square.
    pub fn force_portrait(img: DynamicImage) -> (DynamicImage, bool) {
        let (width, height) = img.dimensions();
        if width > height {
            (Self::rotate_by_angle(img, 90), true)
        } else {
            (img, false)
        }
    }

    /// Rotate image by 90, 180 or 270 degrees clockwise
    pub fn rotate_by_angle(img: DynamicImage, angle: u16) -> DynamicImage {
        match angle {
            90 => DynamicImage::ImageRgba8(imageops::rotate90(&img.to_rgba8())),
            180 => DynamicImage::ImageRgba8(imageops::rotate180(&img.to_rgba8())),
            270 => DynamicImage::ImageRgba8(imageops::rotate270(&img.to_rgba8())),
            _ => img,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn landscape() -> DynamicImage {
        let mut img = RgbaImage::from_pixel(4, 2, Rgba([0, 0, 0, 255]));
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn test_no_exif_reads_as_normal() {
        let mut buffer = Vec::new();
        landscape()
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        assert_eq!(ImageOrientation::read_exif_orientation(&buffer), 1);
        assert_eq!(ImageOrientation::read_exif_orientation(b"garbage"), 1);
    }

    #[test]
    fn test_identity_orientation_is_untouched() {
        let (img, changed) = ImageOrientation::apply_exif_orientation(landscape(), 1);
        assert!(!changed);
        assert_eq!(img.dimensions(), (4, 2));
    }

    #[test]
    fn test_rotate_90_orientation() {
        let (img, changed) = ImageOrientation::apply_exif_orientation(landscape(), 6);
        assert!(changed);
        assert_eq!(img.dimensions(), (2, 4));
        // top-left red pixel ends up top-right after a clockwise quarter turn
        assert_eq!(img.get_pixel(1, 0), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_transpose_orientation() {
        let (img, _) = ImageOrientation::apply_exif_orientation(landscape(), 5);
        assert_eq!(img.dimensions(), (2, 4));
        assert_eq!(img.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_force_portrait() {
        let (img, rotated) = ImageOrientation::force_portrait(landscape());
        assert!(rotated);
        let (w, h) = img.dimensions();
        assert!(h >= w);

        let square = DynamicImage::ImageRgba8(RgbaImage::new(3, 3));
        let (_, rotated) = ImageOrientation::force_portrait(square);
        assert!(!rotated);
    }
}
