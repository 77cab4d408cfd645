mod cli;
mod core;
mod processors;
mod utils;

pub use cli::{Cli, Commands, ConversionFlags};
pub use self::core::{
    BatchJob, BatchReport, BatchState, ConversionRequest, ConversionResult, ConvertOptions,
    ItemFailure, NormalizeError, Normalizer, PipelineConfig, Result, SniffedFormat,
    SourceDescriptor, ToolConfig, CANONICAL_EXTENSION, DEFAULT_CONCURRENCY, DEFAULT_QUALITY,
};
pub use processors::animated::{is_animated_gif, AnimatedOutcome, MIN_OUTPUT_BYTES};
pub use processors::sniffer::{sniff_bytes, sniff_path, sniff_reader};
pub use processors::writer::{commit_with, temp_path_for, write_atomic};
pub use processors::{
    apply_orientation, convert_json_list, AnimatedHandler, BatchProcessor, BoundingBox,
    Compressor, Loader, MetadataProcessor, Resizer, LANDSCAPE_BOX, PORTRAIT_BOX,
};
pub use utils::{
    calculate_aspect_ratio, format_file_size, is_supported_format, output_path_for,
    resolve_source, resolve_source_in, SUPPORTED_EXTENSIONS,
};

// Re-export commonly used types
pub use image::DynamicImage;
