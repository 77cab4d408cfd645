// webpnorm/src/core/mod.rs
pub mod processor;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub use processor::Normalizer;

/// Extension of every file the pipeline produces in sidecar mode.
pub const CANONICAL_EXTENSION: &str = "webp";

/// Fixed lossy quality for the canonical encoding.
pub const DEFAULT_QUALITY: u8 = 80;

/// Worker count used when a batch does not ask for one.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Real image type as seen in the leading bytes of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SniffedFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
    Unknown,
}

impl SniffedFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SniffedFormat::Jpeg => "jpeg",
            SniffedFormat::Png => "png",
            SniffedFormat::Gif => "gif",
            SniffedFormat::WebP => "webp",
            SniffedFormat::Unknown => "unknown",
        }
    }

    pub fn image_format(&self) -> Option<image::ImageFormat> {
        match self {
            SniffedFormat::Jpeg => Some(image::ImageFormat::Jpeg),
            SniffedFormat::Png => Some(image::ImageFormat::Png),
            SniffedFormat::Gif => Some(image::ImageFormat::Gif),
            SniffedFormat::WebP => Some(image::ImageFormat::WebP),
            SniffedFormat::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        *self != SniffedFormat::Unknown
    }
}

impl fmt::Display for SniffedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What we know about a source file before decoding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub path: PathBuf,
    pub format: SniffedFormat,
    pub byte_len: u64,
}

/// Per-request knobs. Zero bounds mean "pick the box from the image orientation".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertOptions {
    pub max_width: u32,
    pub max_height: u32,
    pub keep_original: bool,
    pub use_sidecar_extension: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            max_width: 0,
            max_height: 0,
            keep_original: true,
            use_sidecar_extension: false,
        }
    }
}

impl ConvertOptions {
    pub fn validate(&self) -> Result<()> {
        if self.max_width > 100_000 || self.max_height > 100_000 {
            return Err(NormalizeError::InvalidParameter(
                "Dimensions too large (max 100,000 pixels)".to_string(),
            ));
        }
        Ok(())
    }
}

/// External converter used for animated GIF sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    pub program: String,
    pub timeout: Duration,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            program: "gif2webp".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Settings shared by every conversion a [`Normalizer`] performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Root for request paths that contain a separator but are not absolute.
    pub asset_root: PathBuf,
    pub quality: u8,
    pub tool: ToolConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("..").join("assets"),
            quality: DEFAULT_QUALITY,
            tool: ToolConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.quality == 0 || self.quality > 100 {
            return Err(NormalizeError::InvalidParameter(
                "Quality must be between 1 and 100".to_string(),
            ));
        }

        if self.tool.program.trim().is_empty() {
            return Err(NormalizeError::InvalidParameter(
                "External tool name cannot be empty".to_string(),
            ));
        }

        if self.tool.timeout.is_zero() {
            return Err(NormalizeError::InvalidParameter(
                "External tool timeout must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    /// Absolute, asset-root relative, or a bare file name.
    pub source: String,
    pub options: ConvertOptions,
}

impl ConversionRequest {
    pub fn new(source: impl Into<String>, options: ConvertOptions) -> Self {
        Self {
            source: source.into(),
            options,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub source: String,
    pub output: Option<PathBuf>,
    pub error: Option<NormalizeError>,
}

impl ConversionResult {
    pub fn pending(source: &str) -> Self {
        Self {
            source: source.to_string(),
            output: None,
            error: None,
        }
    }

    pub fn from_outcome(source: &str, outcome: Result<PathBuf>) -> Self {
        match outcome {
            Ok(path) => Self {
                source: source.to_string(),
                output: Some(path),
                error: None,
            },
            Err(e) => Self {
                source: source.to_string(),
                output: None,
                error: Some(e),
            },
        }
    }

    pub fn success(&self) -> bool {
        self.output.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Pending,
    Running,
    Completed,
}

#[derive(Debug, Clone)]
pub struct BatchJob {
    pub requests: Vec<ConversionRequest>,
    pub concurrency: usize,
    state: BatchState,
}

impl BatchJob {
    /// A zero concurrency falls back to [`DEFAULT_CONCURRENCY`].
    pub fn new(requests: Vec<ConversionRequest>, concurrency: usize) -> Self {
        Self {
            requests,
            concurrency: if concurrency == 0 {
                DEFAULT_CONCURRENCY
            } else {
                concurrency
            },
            state: BatchState::Pending,
        }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: BatchState) {
        log::debug!("Batch state {:?} -> {:?}", self.state, state);
        self.state = state;
    }
}

/// One failed batch item.
#[derive(Debug, Clone)]
pub struct ItemFailure {
    pub source: String,
    pub cause: String,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.cause)
    }
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    /// `results[i]` always belongs to `requests[i]`.
    pub results: Vec<ConversionResult>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn empty() -> Self {
        Self {
            results: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn outputs(&self) -> Vec<PathBuf> {
        self.results
            .iter()
            .filter_map(|r| r.output.clone())
            .collect()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    /// Aggregate error for every failed item, `None` when all succeeded.
    pub fn failure(&self) -> Option<NormalizeError> {
        let failures: Vec<ItemFailure> = self
            .results
            .iter()
            .filter(|r| !r.success())
            .map(|r| ItemFailure {
                source: r.source.clone(),
                cause: r
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "not processed".to_string()),
            })
            .collect();

        if failures.is_empty() {
            None
        } else {
            Some(NormalizeError::PartialBatchFailure(failures))
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum NormalizeError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Source file does not exist: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to decode {} (tried: {})", .path.display(), .attempted.join(", "))]
    Decode {
        path: PathBuf,
        attempted: Vec<&'static str>,
    },

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Output {} is already claimed by {first}", .target.display())]
    OutputConflict { target: PathBuf, first: String },

    #[error("External tool error: {0}")]
    ExternalTool(String),

    #[error("{} item(s) failed: {}", .0.len(), join_failures(.0))]
    PartialBatchFailure(Vec<ItemFailure>),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

fn join_failures(failures: &[ItemFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

// Batch results are cloned into pre-sized slots, so the error carries
// rendered causes rather than the non-Clone source errors.
impl From<std::io::Error> for NormalizeError {
    fn from(e: std::io::Error) -> Self {
        NormalizeError::Io(e.to_string())
    }
}

impl From<image::ImageError> for NormalizeError {
    fn from(e: image::ImageError) -> Self {
        NormalizeError::Image(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NormalizeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = ConvertOptions::default();
        assert_eq!(options.max_width, 0);
        assert_eq!(options.max_height, 0);
        assert!(options.keep_original);
        assert!(!options.use_sidecar_extension);
    }

    #[test]
    fn test_config_validation() {
        assert!(PipelineConfig::default().validate().is_ok());

        let config = PipelineConfig {
            quality: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            tool: ToolConfig {
                program: "gif2webp".to_string(),
                timeout: Duration::ZERO,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let options = ConvertOptions {
            max_width: 200_000,
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_batch_job_default_concurrency() {
        let job = BatchJob::new(Vec::new(), 0);
        assert_eq!(job.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(job.state(), BatchState::Pending);
    }

    #[test]
    fn test_report_failure_lists_every_item() {
        let report = BatchReport {
            results: vec![
                ConversionResult::from_outcome("a.jpg", Ok(PathBuf::from("a.webp"))),
                ConversionResult::from_outcome(
                    "b.jpg",
                    Err(NormalizeError::SourceNotFound(PathBuf::from("b.jpg"))),
                ),
                ConversionResult::from_outcome(
                    "c.jpg",
                    Err(NormalizeError::Encode("boom".to_string())),
                ),
            ],
            elapsed: Duration::ZERO,
        };

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 2);
        assert_eq!(report.outputs(), vec![PathBuf::from("a.webp")]);

        match report.failure() {
            Some(NormalizeError::PartialBatchFailure(items)) => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[0].source, "b.jpg");
                assert!(items[1].cause.contains("boom"));
            }
            other => panic!("unexpected failure summary: {:?}", other),
        }
    }

    #[test]
    fn test_decode_error_lists_strategies() {
        let err = NormalizeError::Decode {
            path: PathBuf::from("x.png"),
            attempted: vec!["generic", "buffered"],
        };
        assert_eq!(err.to_string(), "Failed to decode x.png (tried: generic, buffered)");
    }
}
