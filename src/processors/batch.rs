// webpnorm/src/processors/batch.rs
use crate::core::{
    BatchJob, BatchReport, BatchState, ConversionRequest, ConversionResult, ConvertOptions,
    NormalizeError, Normalizer, Result,
};
use crate::utils::{is_supported_format, normalize_lexically};
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

/// Runs the single-image pipeline over many requests on a bounded pool.
pub struct BatchProcessor {
    normalizer: Normalizer,
    show_progress: bool,
}

impl BatchProcessor {
    pub fn new(normalizer: Normalizer) -> Self {
        Self {
            normalizer,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Every request runs to completion or failure; one bad item never
    /// aborts the rest. `report.results[i]` belongs to `job.requests[i]`.
    pub fn run(&self, job: &mut BatchJob) -> Result<BatchReport> {
        let started = Instant::now();
        let total = job.requests.len();

        if total == 0 {
            job.set_state(BatchState::Completed);
            return Ok(BatchReport::empty());
        }

        // The pool size is the cap on simultaneously running pipelines.
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(job.concurrency)
            .build()
            .map_err(|e| NormalizeError::Processing(format!("Failed to create thread pool: {}", e)))?;

        log::info!(
            "Converting {} image(s) with concurrency {}",
            total,
            job.concurrency
        );
        job.set_state(BatchState::Running);

        let mut results: Vec<ConversionResult> = job
            .requests
            .iter()
            .map(|r| ConversionResult::pending(&r.source))
            .collect();

        let conflicts = self.claim_targets(&job.requests);
        let pb = self.create_progress_bar(total);

        // Each worker owns exactly one slot; `install` returns once all are done.
        pool.install(|| {
            results
                .par_iter_mut()
                .zip(job.requests.par_iter())
                .enumerate()
                .progress_with(pb.clone())
                .for_each(|(i, (slot, request))| {
                    if let Some(conflict) = &conflicts[i] {
                        log::warn!("Skipped [{}/{}] {}: {}", i + 1, total, request.source, conflict);
                        *slot = ConversionResult::from_outcome(&request.source, Err(conflict.clone()));
                        return;
                    }

                    log::debug!("Processing [{}/{}]: {}", i + 1, total, request.source);
                    let outcome = self.normalizer.convert(request);
                    if let Err(e) = &outcome {
                        log::warn!("Failed [{}/{}] {}: {}", i + 1, total, request.source, e);
                    }
                    *slot = ConversionResult::from_outcome(&request.source, outcome);
                })
        });

        job.set_state(BatchState::Completed);

        let report = BatchReport {
            results,
            elapsed: started.elapsed(),
        };

        pb.finish_with_message(format!("{} converted, {} failed", report.succeeded(), report.failed()));
        log::info!(
            "Batch finished: {} succeeded, {} failed in {:?}",
            report.succeeded(),
            report.failed(),
            report.elapsed
        );

        Ok(report)
    }

    /// The first request for an output path owns it. Later requests for the
    /// same path get an `OutputConflict` and never run.
    fn claim_targets(&self, requests: &[ConversionRequest]) -> Vec<Option<NormalizeError>> {
        let mut owners: HashMap<PathBuf, &str> = HashMap::new();

        requests
            .iter()
            .map(|request| {
                // Unresolvable sources fail on their own inside the pipeline.
                let target = normalize_lexically(&self.normalizer.target_for(request).ok()?);

                match owners.entry(target) {
                    Entry::Occupied(owner) => Some(NormalizeError::OutputConflict {
                        target: owner.key().clone(),
                        first: owner.get().to_string(),
                    }),
                    Entry::Vacant(slot) => {
                        slot.insert(&request.source);
                        None
                    }
                }
            })
            .collect()
    }

    /// Convert every supported image under `input_dir`.
    pub fn process_directory(
        &self,
        input_dir: &Path,
        recursive: bool,
        options: ConvertOptions,
        concurrency: usize,
    ) -> Result<BatchReport> {
        self.validate_directory(input_dir)?;

        // Walked paths become absolute requests so they are never re-resolved
        // against the asset root.
        let input_dir = std::fs::canonicalize(input_dir)?;
        let input_dir = input_dir.as_path();

        let image_paths = self.collect_image_paths(input_dir, recursive);

        if image_paths.is_empty() {
            log::warn!("No image files found in {}", input_dir.display());
            return Ok(BatchReport::empty());
        }

        log::info!(
            "Found {} image(s) in {} (recursive: {})",
            image_paths.len(),
            input_dir.display(),
            recursive
        );

        let requests = image_paths
            .iter()
            .map(|p| ConversionRequest::new(p.to_string_lossy(), options))
            .collect();

        self.run(&mut BatchJob::new(requests, concurrency))
    }

    fn collect_image_paths(&self, input_dir: &Path, recursive: bool) -> Vec<PathBuf> {
        let walker = if recursive {
            WalkDir::new(input_dir)
        } else {
            WalkDir::new(input_dir).max_depth(1)
        };

        walker
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    log::warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| is_supported_format(entry.path()))
            .map(|entry| entry.into_path())
            .collect()
    }

    fn create_progress_bar(&self, total: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }

    pub fn validate_directory(&self, input_dir: &Path) -> Result<()> {
        if !input_dir.exists() {
            return Err(NormalizeError::InvalidParameter(format!(
                "Input directory does not exist: {}",
                input_dir.display()
            )));
        }

        if !input_dir.is_dir() {
            return Err(NormalizeError::InvalidParameter(format!(
                "Input path is not a directory: {}",
                input_dir.display()
            )));
        }

        Ok(())
    }
}

/// Batch entry point for a JSON array of source paths.
pub fn convert_json_list(
    processor: &BatchProcessor,
    image_list: &str,
    options: ConvertOptions,
    concurrency: usize,
) -> Result<BatchReport> {
    let sources: Vec<String> = serde_json::from_str(image_list)
        .map_err(|e| NormalizeError::InvalidParameter(format!("Invalid image list JSON: {}", e)))?;

    let requests = sources
        .into_iter()
        .map(|source| ConversionRequest::new(source, options))
        .collect();

    processor.run(&mut BatchJob::new(requests, concurrency))
}
