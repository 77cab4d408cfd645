// webpnorm/src/processors/resizer.rs
use image::{imageops::FilterType, DynamicImage, GenericImageView};

pub const LANDSCAPE_BOX: BoundingBox = BoundingBox {
    width: 1280,
    height: 720,
};

pub const PORTRAIT_BOX: BoundingBox = BoundingBox {
    width: 600,
    height: 900,
};

/// The (max width, max height) an output must fit inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Explicit bounds win; a zero on either axis means "auto", which picks
    /// the landscape box for wider-than-tall images and the portrait box
    /// otherwise (squares included).
    pub fn select(src_width: u32, src_height: u32, max_width: u32, max_height: u32) -> Self {
        if max_width > 0 && max_height > 0 {
            return Self {
                width: max_width,
                height: max_height,
            };
        }

        if src_width > src_height {
            log::debug!("Landscape source {}x{}, using {:?}", src_width, src_height, LANDSCAPE_BOX);
            LANDSCAPE_BOX
        } else {
            log::debug!("Portrait source {}x{}, using {:?}", src_width, src_height, PORTRAIT_BOX);
            PORTRAIT_BOX
        }
    }

    /// Uniform scale that fits `(src_width, src_height)` inside the box.
    /// Sources smaller than the box get a scale above 1 and are upscaled.
    pub fn fit(&self, src_width: u32, src_height: u32) -> (u32, u32) {
        if src_width == 0 || src_height == 0 {
            return (src_width, src_height);
        }

        let scale_w = self.width as f64 / src_width as f64;
        let scale_h = self.height as f64 / src_height as f64;
        let scale = scale_w.min(scale_h);

        let new_w = (src_width as f64 * scale).round() as u32;
        let new_h = (src_height as f64 * scale).round() as u32;

        (new_w.clamp(1, self.width), new_h.clamp(1, self.height))
    }
}

pub struct Resizer {
    filter: FilterType,
}

impl Resizer {
    pub fn new() -> Self {
        Self {
            filter: FilterType::Lanczos3,
        }
    }

    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    /// Target dimensions for `image` under the requested bounds.
    pub fn target_dimensions(&self, image: &DynamicImage, max_width: u32, max_height: u32) -> (u32, u32) {
        let (width, height) = image.dimensions();
        BoundingBox::select(width, height, max_width, max_height).fit(width, height)
    }

    pub fn resize(&self, image: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
        let (width, height) = self.target_dimensions(&image, max_width, max_height);

        if width == image.width() && height == image.height() {
            log::debug!("Image dimensions unchanged, skipping resize");
            return image;
        }

        log::debug!(
            "Resizing image from {}x{} to {}x{}",
            image.width(),
            image.height(),
            width,
            height
        );

        image.resize_exact(width, height, self.filter)
    }
}

impl Default for Resizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn assert_fits(src: (u32, u32), bbox: BoundingBox) {
        let (w, h) = bbox.fit(src.0, src.1);
        assert!(w <= bbox.width && h <= bbox.height, "{:?} -> {}x{} overflows {:?}", src, w, h, bbox);

        // Within one pixel of rounding on the derived axis.
        let expected_h = w as f64 * src.1 as f64 / src.0 as f64;
        let expected_w = h as f64 * src.0 as f64 / src.1 as f64;
        assert!(
            (h as f64 - expected_h).abs() <= 1.0 || (w as f64 - expected_w).abs() <= 1.0,
            "{:?} -> {}x{} distorts aspect ratio",
            src,
            w,
            h
        );
    }

    #[test]
    fn test_auto_box_selection() {
        assert_eq!(BoundingBox::select(1920, 1080, 0, 0), LANDSCAPE_BOX);
        assert_eq!(BoundingBox::select(800, 1200, 0, 0), PORTRAIT_BOX);
        assert_eq!(BoundingBox::select(500, 500, 0, 0), PORTRAIT_BOX);
        // One explicit axis is not enough to override the policy.
        assert_eq!(BoundingBox::select(1920, 1080, 300, 0), LANDSCAPE_BOX);
        assert_eq!(
            BoundingBox::select(1920, 1080, 300, 200),
            BoundingBox { width: 300, height: 200 }
        );
    }

    #[test]
    fn test_policy_examples() {
        assert_eq!(LANDSCAPE_BOX.fit(1920, 1080), (1280, 720));
        assert_eq!(PORTRAIT_BOX.fit(800, 1200), (600, 900));
        assert_eq!(PORTRAIT_BOX.fit(1000, 3000), (300, 900));
    }

    #[test]
    fn test_small_sources_are_upscaled() {
        assert_eq!(LANDSCAPE_BOX.fit(640, 360), (1280, 720));
        assert_eq!(PORTRAIT_BOX.fit(100, 100), (600, 600));
    }

    #[test]
    fn test_aspect_ratio_is_preserved() {
        let sources = [
            (1, 1),
            (1, 5000),
            (5000, 1),
            (333, 777),
            (4032, 3024),
            (3024, 4032),
            (1281, 719),
            (12345, 6789),
        ];
        let boxes = [LANDSCAPE_BOX, PORTRAIT_BOX, BoundingBox { width: 17, height: 999 }];

        for src in sources {
            for bbox in boxes {
                assert_fits(src, bbox);
            }
        }
    }

    #[test]
    fn test_resize_output_matches_target() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(400, 100));
        let resizer = Resizer::new().with_filter(FilterType::Triangle);

        let out = resizer.resize(image, 0, 0);
        assert_eq!(out.dimensions(), (1280, 320));
    }

    #[test]
    fn test_resize_skips_when_unchanged() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(1280, 720));
        let out = Resizer::new().resize(image, 0, 0);
        assert_eq!(out.dimensions(), (1280, 720));
    }
}
