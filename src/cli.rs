// webpnorm/src/cli.rs
use crate::core::{ConvertOptions, PipelineConfig, ToolConfig, DEFAULT_CONCURRENCY, DEFAULT_QUALITY};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "webpnorm")]
#[command(version, about = "Normalize uploaded images into oriented, resized WebP", long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Root for sources given as relative paths with a directory part
    #[arg(long, env = "WEBPNORM_ASSET_ROOT", default_value = "../assets", global = true)]
    pub asset_root: PathBuf,

    /// Converter used for animated GIFs
    #[arg(long, env = "WEBPNORM_GIF2WEBP", default_value = "gif2webp", global = true)]
    pub tool: String,

    /// Seconds before a converter run is killed
    #[arg(long, default_value_t = 120, global = true)]
    pub tool_timeout: u64,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every converting command.
#[derive(Args, Debug, Clone, Copy)]
pub struct ConversionFlags {
    /// Write <name>.webp next to the source instead of overwriting it in place
    #[arg(long)]
    pub webp: bool,

    /// Delete the source once a separate .webp file was written
    #[arg(long)]
    pub discard_original: bool,
}

impl ConversionFlags {
    pub fn options(&self, max_width: u32, max_height: u32) -> ConvertOptions {
        ConvertOptions {
            max_width,
            max_height,
            keep_original: !self.discard_original,
            use_sidecar_extension: self.webp,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert a single image
    Convert {
        /// Absolute path, asset-relative path, or bare file name
        path: String,

        /// Maximum width (0 = landscape 1280 / portrait 600)
        #[arg(short = 'W', long, default_value_t = 0)]
        max_width: u32,

        /// Maximum height (0 = landscape 720 / portrait 900)
        #[arg(short = 'H', long, default_value_t = 0)]
        max_height: u32,

        #[command(flatten)]
        flags: ConversionFlags,
    },

    /// Convert images listed in a JSON array, e.g. '["a.jpg","imgs/1/b.png"]'
    List {
        json: String,

        /// Number of images converted at the same time
        #[arg(short, long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,

        #[command(flatten)]
        flags: ConversionFlags,
    },

    /// Convert every jpg/png/gif/webp file in a directory
    Dir {
        dir: PathBuf,

        /// Only look at the top level of the directory
        #[arg(long)]
        no_recursive: bool,

        /// Convert one image at a time
        #[arg(long)]
        sync: bool,

        /// Number of images converted at the same time
        #[arg(short, long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,

        #[command(flatten)]
        flags: ConversionFlags,
    },

    /// Show what the pipeline sees in an image
    Info { path: PathBuf },
}

impl Cli {
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            asset_root: self.asset_root.clone(),
            quality: DEFAULT_QUALITY,
            tool: ToolConfig {
                program: self.tool.clone(),
                timeout: Duration::from_secs(self.tool_timeout),
            },
        }
    }
}
