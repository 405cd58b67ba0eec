//! bam-prep: region and mapping-quality filtering of alignment files
//!
//! For every (sample, region) pair in a run, filters the sample's alignment file
//! to the region and a minimum mapping quality, indexes the result, and reports
//! which jobs produced usable output.
//!
//! # Architecture
//!
//! - **Input**: sample manifest and region set parsing
//! - **Job**: expansion of samples × regions into typed, independent jobs
//! - **Tools**: samtools invocation and installation checks
//! - **Pipeline**: bounded-concurrency scheduling, per-job workers, metrics and
//!   the run-level verdict
//!
//! # Usage
//!
//! ```no_run
//! use bam_prep::{run_pipeline, Config};
//! use std::path::Path;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_file(Path::new("config.yaml"))?;
//!     let outcome = run_pipeline(config, CancellationToken::new()).await?;
//!     println!("{}", outcome);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod input;
pub mod job;
pub mod pipeline;
pub mod tools;

pub use config::Config;
pub use error::{PipelineError, Result};
pub use input::SampleRecord;
pub use job::{build_jobs, FilterJob, JobId, Region};
pub use pipeline::{
    FailedJob, FilterWorker, JobResult, Metrics, PipelineOutcome, Scheduler, SchedulerConfig, Stage,
};
pub use tools::{AlignmentTools, FailureCause, Samtools};

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Validate the configuration, read the inputs and build the job list.
///
/// Any error here happens before a single job is dispatched.
pub fn plan_jobs(config: &Config) -> Result<Vec<FilterJob>> {
    config.validate()?;
    config.check_tool_path()?;

    let regions = config.regions()?;
    let manifest = config
        .input
        .manifest
        .as_deref()
        .ok_or_else(|| PipelineError::config("input.manifest is not set"))?;
    let samples = input::read_manifest(manifest)?;

    build_jobs(&samples, &regions, &config.job_settings())
}

/// Run the preprocessing pipeline with samtools.
///
/// Returns the outcome when every job succeeded and
/// [`PipelineError::Aggregate`] listing every failed job otherwise.
pub async fn run_pipeline(config: Config, cancel: CancellationToken) -> Result<PipelineOutcome> {
    run_pipeline_with(config, Arc::new(Samtools::default()), cancel).await
}

/// Run the pipeline against an arbitrary tool implementation.
pub async fn run_pipeline_with(
    config: Config,
    tools: Arc<dyn AlignmentTools>,
    cancel: CancellationToken,
) -> Result<PipelineOutcome> {
    tracing::info!("Performing data preprocess before variant calling...");

    let jobs = plan_jobs(&config)?;
    tracing::info!(
        "Planned {} jobs into {}",
        jobs.len(),
        config
            .output
            .directory
            .as_ref()
            .map(|d| d.display().to_string())
            .unwrap_or_default()
    );

    let metrics = Metrics::new();
    let worker = Arc::new(FilterWorker::new(tools, metrics.clone()));
    let scheduler = Scheduler::new(worker, metrics, cancel, config.scheduler_config());

    let results = scheduler.run(jobs).await;
    let outcome = PipelineOutcome::from_results(&results);
    outcome.log_summary();

    if let Some(path) = &config.output.report_path {
        if let Err(e) = outcome.save_to_file(path) {
            tracing::warn!("Failed to save run report to {}: {}", path.display(), e);
        }
    }

    tracing::info!("Pipeline complete: {}", outcome);
    outcome.into_result()
}

/// Build a Tokio runtime with the specified configuration.
pub fn build_runtime(worker_threads: Option<usize>) -> anyhow::Result<tokio::runtime::Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();

    if let Some(threads) = worker_threads {
        builder.worker_threads(threads);
    }

    builder.enable_all();

    Ok(builder.build()?)
}
