// webpnorm/src/core/processor.rs
use super::{ConversionRequest, ConvertOptions, NormalizeError, PipelineConfig, Result, SourceDescriptor};
use crate::processors::animated::is_animated_gif;
use crate::processors::writer::write_atomic;
use crate::processors::{AnimatedHandler, AnimatedOutcome, Compressor, Loader, MetadataProcessor, Resizer};
use crate::utils::{output_path_for, resolve_source};
use image::DynamicImage;
use std::path::{Path, PathBuf};

/// Single-image pipeline: sniff, decode, orient, resize, encode, replace.
pub struct Normalizer {
    config: PipelineConfig,
    loader: Loader,
    resizer: Resizer,
    compressor: Compressor,
    metadata_processor: MetadataProcessor,
    animated: AnimatedHandler,
}

impl Normalizer {
    pub fn new(config: PipelineConfig) -> Self {
        let compressor = Compressor::new(config.quality);
        let animated = AnimatedHandler::new(config.tool.clone(), config.quality);

        Self {
            config,
            loader: Loader::new(),
            resizer: Resizer::new(),
            compressor,
            metadata_processor: MetadataProcessor::new(),
            animated,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    pub fn metadata(&self) -> &MetadataProcessor {
        &self.metadata_processor
    }

    /// Convert one request and return the path of the produced file.
    pub fn convert(&self, request: &ConversionRequest) -> Result<PathBuf> {
        let source_path = resolve_source(&request.source, &self.config.asset_root)?;
        self.convert_path(&source_path, &request.options)
    }

    /// Where `request` will be written, without touching the source.
    pub fn target_for(&self, request: &ConversionRequest) -> Result<PathBuf> {
        let source_path = resolve_source(&request.source, &self.config.asset_root)?;
        Ok(output_path_for(&source_path, &request.options))
    }

    /// Same as [`convert`](Self::convert) for an already resolved path.
    pub fn convert_path(&self, source_path: &Path, options: &ConvertOptions) -> Result<PathBuf> {
        options.validate()?;

        if !source_path.is_file() {
            return Err(NormalizeError::SourceNotFound(source_path.to_path_buf()));
        }

        let source = SourceDescriptor::inspect(source_path)?;
        let target = output_path_for(&source.path, options);

        if self.is_animated(&source) {
            log::info!("{} is an animated GIF", source.path.display());
            let outcome = self
                .animated
                .convert(&source, &target, || self.render_still(&source, options))?;
            if outcome == AnimatedOutcome::StaticFallback {
                log::debug!("{} kept only its first frame", target.display());
            }
        } else {
            let (bytes, (width, height)) = self.render(&source, options)?;
            write_atomic(&target, &bytes)?;

            log::info!(
                "Converted {} to WebP {} ({}x{}, {} bytes, {:.1}% smaller)",
                source.path.display(),
                target.display(),
                width,
                height,
                bytes.len(),
                self.compressor.calculate_savings(source.byte_len, bytes.len() as u64)
            );
        }

        self.discard_original(&source.path, &target, options);

        Ok(target)
    }

    /// Decode, orient and resize into an in-memory image.
    pub fn prepare(&self, source: &SourceDescriptor, options: &ConvertOptions) -> Result<DynamicImage> {
        let image = self.loader.load(source)?;
        let image = self.metadata_processor.correct_orientation(image, &source.path);
        Ok(self
            .resizer
            .resize(image, options.max_width, options.max_height))
    }

    fn render(&self, source: &SourceDescriptor, options: &ConvertOptions) -> Result<(Vec<u8>, (u32, u32))> {
        let image = self.prepare(source, options)?;
        let bytes = self.compressor.compress_to_bytes(&image)?;
        Ok((bytes, (image.width(), image.height())))
    }

    fn render_still(&self, source: &SourceDescriptor, options: &ConvertOptions) -> Result<Vec<u8>> {
        self.render(source, options).map(|(bytes, _)| bytes)
    }

    fn is_animated(&self, source: &SourceDescriptor) -> bool {
        if !source.looks_like_gif() {
            return false;
        }

        match is_animated_gif(&source.path) {
            Ok(animated) => animated,
            Err(e) => {
                log::warn!(
                    "Could not count frames of {}, treating it as a still image: {}",
                    source.path.display(),
                    e
                );
                false
            }
        }
    }

    /// Only a distinct sidecar output makes the original redundant.
    fn discard_original(&self, source: &Path, target: &Path, options: &ConvertOptions) {
        if options.keep_original || !options.use_sidecar_extension || source == target {
            return;
        }

        log::info!("Removing original {}", source.display());
        if let Err(e) = std::fs::remove_file(source) {
            log::warn!("Failed to remove original {}: {}", source.display(), e);
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, ImageFormat, Rgb, RgbImage};
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32) {
        RgbImage::from_pixel(width, height, Rgb([30, 90, 150]))
            .save_with_format(path, ImageFormat::Png)
            .unwrap();
    }

    fn sidecar(keep_original: bool) -> ConvertOptions {
        ConvertOptions {
            keep_original,
            use_sidecar_extension: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_overwrite_keeps_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cover.png");
        write_png(&path, 1920, 1080);

        let out = Normalizer::default()
            .convert_path(&path, &ConvertOptions::default())
            .unwrap();

        assert_eq!(out, path);
        let bytes = std::fs::read(&out).unwrap();
        assert_eq!(&bytes[8..12], b"WEBP");
        assert_eq!(image::load_from_memory(&bytes).unwrap().dimensions(), (1280, 720));
    }

    #[test]
    fn test_sidecar_discards_original_when_asked() {
        let dir = TempDir::new().unwrap();
        let keep = dir.path().join("keep.png");
        let drop = dir.path().join("drop.png");
        write_png(&keep, 100, 200);
        write_png(&drop, 100, 200);

        let normalizer = Normalizer::default();
        let kept = normalizer.convert_path(&keep, &sidecar(true)).unwrap();
        let dropped = normalizer.convert_path(&drop, &sidecar(false)).unwrap();

        assert_eq!(kept, dir.path().join("keep.webp"));
        assert!(keep.exists());
        assert_eq!(dropped, dir.path().join("drop.webp"));
        assert!(!drop.exists());
        assert!(dropped.exists());
    }

    #[test]
    fn test_overwrite_never_deletes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("in-place.png");
        write_png(&path, 10, 10);

        let options = ConvertOptions {
            keep_original: false,
            ..Default::default()
        };
        let out = Normalizer::default().convert_path(&path, &options).unwrap();
        assert!(out.exists());
    }

    #[test]
    fn test_explicit_bounds() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wide.png");
        write_png(&path, 1000, 500);

        let options = ConvertOptions {
            max_width: 200,
            max_height: 200,
            use_sidecar_extension: true,
            ..Default::default()
        };
        let out = Normalizer::default().convert_path(&path, &options).unwrap();
        assert_eq!(image::open(&out).unwrap().dimensions(), (200, 100));
    }

    #[test]
    fn test_missing_source() {
        let dir = TempDir::new().unwrap();
        let result = Normalizer::default()
            .convert_path(&dir.path().join("ghost.jpg"), &ConvertOptions::default());
        assert!(matches!(result, Err(NormalizeError::SourceNotFound(_))));
    }
}
