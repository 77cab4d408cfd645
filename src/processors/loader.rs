// webpnorm/src/processors/loader.rs
use crate::core::{NormalizeError, Result, SourceDescriptor};
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use std::fs::File;
use std::io::BufReader;

/// Outcome of a single decode strategy.
enum Attempt {
    Decoded(DynamicImage),
    Failed(String),
    /// The strategy had no hint to work with.
    Skipped,
}

type Strategy = fn(&SourceDescriptor) -> Attempt;

/// Tried in order; the first decoded image wins.
const STRATEGIES: &[(&str, Strategy)] = &[
    ("generic", decode_generic),
    ("sniffed", decode_sniffed),
    ("extension", decode_by_extension),
    ("buffered", decode_buffered),
];

fn open(source: &SourceDescriptor) -> std::result::Result<BufReader<File>, String> {
    File::open(&source.path)
        .map(BufReader::new)
        .map_err(|e| e.to_string())
}

fn decode_generic(source: &SourceDescriptor) -> Attempt {
    let reader = match open(source) {
        Ok(reader) => reader,
        Err(e) => return Attempt::Failed(e),
    };

    match ImageReader::new(reader)
        .with_guessed_format()
        .map_err(|e| e.to_string())
        .and_then(|r| r.decode().map_err(|e| e.to_string()))
    {
        Ok(image) => Attempt::Decoded(image),
        Err(e) => Attempt::Failed(e),
    }
}

fn decode_as(source: &SourceDescriptor, format: ImageFormat) -> Attempt {
    let reader = match open(source) {
        Ok(reader) => reader,
        Err(e) => return Attempt::Failed(e),
    };

    match image::load(reader, format) {
        Ok(image) => Attempt::Decoded(image),
        Err(e) => Attempt::Failed(e.to_string()),
    }
}

fn decode_sniffed(source: &SourceDescriptor) -> Attempt {
    match source.format.image_format() {
        Some(format) => decode_as(source, format),
        None => Attempt::Skipped,
    }
}

fn extension_format(source: &SourceDescriptor) -> Option<ImageFormat> {
    source
        .extension()
        .and_then(|ext| ImageFormat::from_extension(ext.as_str()))
}

fn decode_by_extension(source: &SourceDescriptor) -> Attempt {
    match extension_format(source) {
        // Same decoder as the sniffed attempt would fail the same way.
        Some(format) if Some(format) == source.format.image_format() => Attempt::Skipped,
        Some(format) => decode_as(source, format),
        None => Attempt::Skipped,
    }
}

fn decode_buffered(source: &SourceDescriptor) -> Attempt {
    let bytes = match std::fs::read(&source.path) {
        Ok(bytes) => bytes,
        Err(e) => return Attempt::Failed(e.to_string()),
    };

    match image::load_from_memory(&bytes) {
        Ok(image) => Attempt::Decoded(image),
        Err(e) => Attempt::Failed(e.to_string()),
    }
}

/// Decoder chain for files whose claimed and real formats may disagree.
#[derive(Clone)]
pub struct Loader {
    max_dimensions: Option<(u32, u32)>,
}

impl Loader {
    pub fn new() -> Self {
        Self {
            max_dimensions: Some((100_000, 100_000)),
        }
    }

    pub fn with_max_dimensions(mut self, width: u32, height: u32) -> Self {
        self.max_dimensions = Some((width, height));
        self
    }

    pub fn load(&self, source: &SourceDescriptor) -> Result<DynamicImage> {
        log::debug!(
            "Loading {} (sniffed: {}, {} bytes)",
            source.path.display(),
            source.format,
            source.byte_len
        );

        let mut attempted = Vec::new();

        for (name, strategy) in STRATEGIES {
            match strategy(source) {
                Attempt::Decoded(image) => {
                    if !attempted.is_empty() {
                        log::info!(
                            "Decoded {} with {} decoder after {} failed attempt(s)",
                            source.path.display(),
                            name,
                            attempted.len()
                        );
                    }
                    return self.check_dimensions(image);
                }
                Attempt::Failed(cause) => {
                    log::debug!("{} decoder failed for {}: {}", name, source.path.display(), cause);
                    attempted.push(*name);
                }
                Attempt::Skipped => {
                    log::debug!("{} decoder skipped for {}", name, source.path.display());
                }
            }
        }

        if !source.format.is_known() && extension_format(source).is_none() {
            return Err(NormalizeError::UnsupportedFormat(format!(
                "{} is not a recognized image",
                source.path.display()
            )));
        }

        Err(NormalizeError::Decode {
            path: source.path.clone(),
            attempted,
        })
    }

    pub fn get_dimensions(&self, source: &SourceDescriptor) -> Result<(u32, u32)> {
        let reader = ImageReader::new(BufReader::new(File::open(&source.path)?))
            .with_guessed_format()?;
        Ok(reader.into_dimensions()?)
    }

    fn check_dimensions(&self, image: DynamicImage) -> Result<DynamicImage> {
        let (width, height) = image.dimensions();

        if let Some((max_w, max_h)) = self.max_dimensions {
            if width > max_w || height > max_h {
                return Err(NormalizeError::InvalidParameter(format!(
                    "Image dimensions {}x{} exceed maximum {}x{}",
                    width, height, max_w, max_h
                )));
            }
        }

        if width == 0 || height == 0 {
            return Err(NormalizeError::InvalidParameter(
                "Image has no pixels".to_string(),
            ));
        }

        log::debug!("Loaded image: {}x{} pixels, color: {:?}", width, height, image.color());

        Ok(image)
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}
