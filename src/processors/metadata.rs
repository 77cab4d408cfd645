// webpnorm/src/processors/metadata.rs
use crate::core::{NormalizeError, Result};
use exif::{Exif, In, Reader, Tag};
use image::DynamicImage;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// EXIF orientation handling. Correction is best-effort: anything short of a
/// valid tag leaves the pixels untouched.
pub struct MetadataProcessor;

impl MetadataProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn read_metadata(&self, path: &Path) -> Result<Option<Exif>> {
        let file = File::open(path)?;
        let mut bufreader = BufReader::new(&file);

        match Reader::new().read_from_container(&mut bufreader) {
            Ok(exif) => {
                log::debug!("Found EXIF data in {}", path.display());
                Ok(Some(exif))
            }
            Err(exif::Error::NotFound(_)) => {
                log::debug!("No EXIF data found in {}", path.display());
                Ok(None)
            }
            Err(e) => Err(NormalizeError::Processing(format!("EXIF read error: {}", e))),
        }
    }

    /// Orientation tag value (1-8), `None` when absent or out of range.
    pub fn read_orientation(&self, path: &Path) -> Option<u32> {
        let exif = match self.read_metadata(path) {
            Ok(Some(exif)) => exif,
            Ok(None) => return None,
            Err(e) => {
                log::debug!("Keeping original orientation of {}: {}", path.display(), e);
                return None;
            }
        };

        let value = exif
            .get_field(Tag::Orientation, In::PRIMARY)
            .and_then(|field| field.value.get_uint(0));

        match value {
            Some(v @ 1..=8) => Some(v),
            Some(v) => {
                log::warn!("Unknown EXIF orientation {} in {}, ignoring", v, path.display());
                None
            }
            None => {
                log::debug!("No orientation tag in {}", path.display());
                None
            }
        }
    }

    /// Re-reads the orientation from `path` and applies it to `image`.
    pub fn correct_orientation(&self, image: DynamicImage, path: &Path) -> DynamicImage {
        match self.read_orientation(path) {
            Some(orientation) => {
                log::debug!("EXIF orientation {} for {}", orientation, path.display());
                apply_orientation(image, orientation)
            }
            None => image,
        }
    }
}

impl Default for MetadataProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Map an EXIF orientation value to the transform that makes the image upright.
pub fn apply_orientation(image: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().flipv(),
        6 => image.rotate90(),
        7 => image.rotate90().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba, RgbaImage};

    /// 3x2 image with a distinct value per pixel.
    fn sample() -> DynamicImage {
        let mut img = RgbaImage::new(3, 2);
        for (x, y, px) in img.enumerate_pixels_mut() {
            *px = Rgba([(x * 10 + y) as u8, 0, 0, 255]);
        }
        DynamicImage::ImageRgba8(img)
    }

    fn at(image: &DynamicImage, x: u32, y: u32) -> u8 {
        image.get_pixel(x, y)[0]
    }

    #[test]
    fn test_identity_and_unknown() {
        let img = sample();
        assert_eq!(apply_orientation(img.clone(), 1).as_bytes(), img.as_bytes());
        assert_eq!(apply_orientation(img.clone(), 42).as_bytes(), img.as_bytes());
    }

    #[test]
    fn test_orientation_6_rotates_clockwise() {
        let img = sample();
        let out = apply_orientation(img.clone(), 6);

        assert_eq!(out.dimensions(), (2, 3));
        assert_eq!(out.as_bytes(), img.rotate90().as_bytes());
        // Bottom-left source pixel lands top-left.
        assert_eq!(at(&out, 0, 0), at(&img, 0, 1));
    }

    #[test]
    fn test_orientation_8_rotates_counter_clockwise() {
        let img = sample();
        let out = apply_orientation(img.clone(), 8);

        assert_eq!(out.dimensions(), (2, 3));
        assert_eq!(at(&out, 0, 0), at(&img, 2, 0));
    }

    #[test]
    fn test_orientation_5_and_7() {
        let img = sample();

        // 5: clockwise quarter turn, then a vertical flip.
        let five = apply_orientation(img.clone(), 5);
        assert_eq!(five.dimensions(), (2, 3));
        assert_eq!(five.as_bytes(), img.rotate90().flipv().as_bytes());
        for y in 0..2 {
            for x in 0..3 {
                assert_eq!(at(&five, 1 - y, 2 - x), at(&img, x, y));
            }
        }

        // 7: clockwise quarter turn, then a horizontal flip.
        let seven = apply_orientation(img.clone(), 7);
        assert_eq!(seven.dimensions(), (2, 3));
        assert_eq!(seven.as_bytes(), img.rotate90().fliph().as_bytes());
        for y in 0..2 {
            for x in 0..3 {
                assert_eq!(at(&seven, y, x), at(&img, x, y));
            }
        }
    }

    #[test]
    fn test_flips() {
        let img = sample();
        assert_eq!(at(&apply_orientation(img.clone(), 2), 0, 0), at(&img, 2, 0));
        assert_eq!(at(&apply_orientation(img.clone(), 3), 0, 0), at(&img, 2, 1));
        assert_eq!(at(&apply_orientation(img.clone(), 4), 0, 0), at(&img, 0, 1));
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let processor = MetadataProcessor::new();
        let img = sample();
        let out = processor.correct_orientation(img.clone(), Path::new("/no/such/file.jpg"));
        assert_eq!(out.as_bytes(), img.as_bytes());
    }
}
