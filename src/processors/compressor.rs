// webpnorm/src/processors/compressor.rs
use crate::core::{NormalizeError, Result, DEFAULT_QUALITY};
use image::DynamicImage;

/// Lossy WebP encoder. Only raw pixels reach libwebp, so EXIF, ICC and XMP
/// chunks never make it into the output.
pub struct Compressor {
    quality: u8,
}

impl Compressor {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn compress_to_bytes(&self, image: &DynamicImage) -> Result<Vec<u8>> {
        let (width, height) = (image.width(), image.height());

        let encoded = if image.color().has_alpha() {
            let rgba = image.to_rgba8();
            let encoder = webp::Encoder::from_rgba(&rgba, width, height);
            encoder.encode_simple(false, self.quality as f32)
        } else {
            let rgb = image.to_rgb8();
            let encoder = webp::Encoder::from_rgb(&rgb, width, height);
            encoder.encode_simple(false, self.quality as f32)
        }
        .map_err(|e| NormalizeError::Encode(format!("WebP encode failed: {:?}", e)))?;

        log::debug!(
            "Encoded {}x{} image to {} bytes of WebP at quality {}",
            width,
            height,
            encoded.len(),
            self.quality
        );

        Ok(encoded.to_vec())
    }

    pub fn calculate_savings(&self, original_size: u64, compressed_size: u64) -> f64 {
        if original_size == 0 {
            return 0.0;
        }

        let savings = (original_size as f64 - compressed_size as f64) / original_size as f64 * 100.0;
        savings.max(0.0)
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new(DEFAULT_QUALITY)
    }
}
