use anyhow::{bail, Context};
use clap::Parser;
use log::LevelFilter;
use std::path::{Path, PathBuf};
use webpnorm::{
    calculate_aspect_ratio, convert_json_list, format_file_size, is_animated_gif, BatchProcessor,
    BatchReport, Cli, Commands, ConversionFlags, ConversionRequest, Normalizer, SourceDescriptor,
};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    env_logger::Builder::new()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .init();

    let config = cli.pipeline_config();
    config.validate()?;
    let normalizer = Normalizer::new(config);

    match cli.command {
        Commands::Convert {
            path,
            max_width,
            max_height,
            flags,
        } => process_convert(&normalizer, path, max_width, max_height, flags),
        Commands::List {
            json,
            concurrency,
            flags,
        } => process_list(normalizer, &json, concurrency, flags),
        Commands::Dir {
            dir,
            no_recursive,
            sync,
            concurrency,
            flags,
        } => {
            let concurrency = if sync { 1 } else { concurrency };
            process_dir(normalizer, &dir, !no_recursive, concurrency, flags)
        }
        Commands::Info { path } => process_info(&normalizer, &path),
    }
}

fn process_convert(
    normalizer: &Normalizer,
    path: String,
    max_width: u32,
    max_height: u32,
    flags: ConversionFlags,
) -> anyhow::Result<()> {
    let request = ConversionRequest::new(path, flags.options(max_width, max_height));
    let output = normalizer
        .convert(&request)
        .with_context(|| format!("Failed to convert {}", request.source))?;

    println!("Source: {}", request.source);
    if flags.webp {
        println!("WebP image saved to: {}", output.display());
    } else {
        println!("Converted in place (WebP content, original name): {}", output.display());
    }
    if let Ok(metadata) = std::fs::metadata(&output) {
        println!("Output size: {}", format_file_size(metadata.len()));
    }

    Ok(())
}

fn process_list(
    normalizer: Normalizer,
    json: &str,
    concurrency: usize,
    flags: ConversionFlags,
) -> anyhow::Result<()> {
    let processor = BatchProcessor::new(normalizer).with_progress(true);
    let report = convert_json_list(&processor, json, flags.options(0, 0), concurrency)?;

    print_summary(&report, None)
}

fn process_dir(
    normalizer: Normalizer,
    dir: &Path,
    recursive: bool,
    concurrency: usize,
    flags: ConversionFlags,
) -> anyhow::Result<()> {
    let dir = std::fs::canonicalize(dir)
        .with_context(|| format!("Directory does not exist: {}", dir.display()))?;

    let processor = BatchProcessor::new(normalizer).with_progress(true);
    let report = processor.process_directory(&dir, recursive, flags.options(0, 0), concurrency)?;

    print_summary(&report, Some(&dir))
}

fn print_summary(report: &BatchReport, dir: Option<&PathBuf>) -> anyhow::Result<()> {
    if let Some(failure) = report.failure() {
        log::warn!("Some images could not be converted: {}", failure);
    }

    println!("\nBatch conversion complete in {:.2?}", report.elapsed);
    if let Some(dir) = dir {
        println!("Directory: {}", dir.display());
    }
    println!("Converted: {}, failed: {}", report.succeeded(), report.failed());

    let outputs = report.outputs();
    if !outputs.is_empty() {
        println!("\nOutput files:");
        for (i, path) in outputs.iter().enumerate() {
            if i < 10 || i == outputs.len() - 1 {
                println!("  {}", path.display());
            } else if i == 10 {
                println!("  ... and {} more", outputs.len() - 11);
            }
        }
    }

    if report.succeeded() == 0 && report.failed() > 0 {
        bail!("No image could be converted");
    }

    Ok(())
}

fn process_info(normalizer: &Normalizer, input: &Path) -> anyhow::Result<()> {
    if !input.exists() {
        bail!("File does not exist: {}", input.display());
    }

    let source = SourceDescriptor::inspect(input)?;
    let (width, height) = normalizer.loader().get_dimensions(&source)?;
    let aspect_ratio = calculate_aspect_ratio(width, height);
    let orientation = normalizer.metadata().read_orientation(input);

    println!("=== Image Information ===");
    println!("File: {}", input.display());
    println!("Size: {}", format_file_size(source.byte_len));
    println!("Detected format: {}", source.format);
    println!("Dimensions: {} x {} pixels", width, height);
    println!("Aspect Ratio: {:.2}:1", aspect_ratio);
    match orientation {
        Some(o) => println!("EXIF orientation: {}", o),
        None => println!("EXIF orientation: none"),
    }
    if source.looks_like_gif() {
        let animated = is_animated_gif(input).unwrap_or(false);
        println!("Animated: {}", animated);
    }

    Ok(())
}
