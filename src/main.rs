//! bam-prep CLI
//!
//! Filters and indexes alignment files per (sample, region) ahead of variant calling.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bam_prep::{
    build_runtime, plan_jobs, run_pipeline_with, tools, Config, PipelineError, Region, Samtools,
};

/// Exit status when one or more jobs failed.
const EXIT_JOBS_FAILED: u8 = 1;

/// Exit status for manifest/configuration problems (nothing dispatched).
const EXIT_BAD_INPUT: u8 = 2;

#[derive(Parser)]
#[command(name = "bam-prep")]
#[command(
    about = "Filter alignment files by region and mapping quality, then index them",
    long_about = None
)]
struct Cli {
    /// Path to configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override concurrency level
    #[arg(short = 't', long, global = true)]
    concurrency: Option<usize>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Command-line values that take precedence over the configuration file.
#[derive(Args, Debug, Default)]
struct Overrides {
    /// Sample manifest (format: sample_id,bam_path)
    #[arg(short = 'b', long, global = true)]
    manifest: Option<PathBuf>,

    /// Output directory
    #[arg(short, long = "output-dir", global = true)]
    output_dir: Option<PathBuf>,

    /// Directory containing the samtools binary
    #[arg(short = 'a', long = "tool-path", global = true)]
    tool_path: Option<PathBuf>,

    /// Region to filter to (repeatable); replaces configured inline regions
    #[arg(short, long = "region", global = true)]
    regions: Vec<String>,

    /// Region list file, one region per line
    #[arg(long, global = true)]
    region_file: Option<PathBuf>,

    /// Minimum mapping quality
    #[arg(short, long, global = true)]
    quality: Option<u8>,

    /// Per-invocation tool timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Write a JSON run report here
    #[arg(long, global = true)]
    report: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Filter and index every (sample, region) pair (default if no command specified)
    Preprocess,

    /// Validate configuration and inputs without running any job
    Validate,

    /// Check that the external tools are installed and working
    Verify,

    /// Generate a sample configuration file
    GenerateConfig {
        /// Output path for configuration file
        #[arg(long, default_value = "config.yaml")]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        None | Some(Commands::Preprocess) => {
            preprocess_command(cli.config.as_deref(), cli.concurrency, cli.overrides)
        }
        Some(Commands::Validate) => {
            validate_command(cli.config.as_deref(), cli.concurrency, cli.overrides)
        }
        Some(Commands::Verify) => verify_command(cli.config.as_deref(), cli.overrides),
        Some(Commands::GenerateConfig { output }) => generate_config_command(&output),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(exit_status_for(&e))
        }
    }
}

/// Map a top-level error onto the process exit status.
///
/// Anything that is not a pipeline error (config file, runtime) happened
/// before dispatch as well.
fn exit_status_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<PipelineError>() {
        Some(e) if !e.is_fatal_input() => EXIT_JOBS_FAILED,
        _ => EXIT_BAD_INPUT,
    }
}

fn load_config(
    config_path: Option<&Path>,
    concurrency: Option<usize>,
    overrides: Overrides,
) -> Result<Config> {
    let mut config = match config_path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };

    // Apply overrides
    if let Some(c) = concurrency {
        config.processing.concurrency = c;
    }
    if let Some(manifest) = overrides.manifest {
        config.input.manifest = Some(manifest);
    }
    if let Some(dir) = overrides.output_dir {
        config.output.directory = Some(dir);
    }
    if let Some(path) = overrides.tool_path {
        config.tools.path = Some(path);
    }
    if !overrides.regions.is_empty() {
        config.input.regions = overrides
            .regions
            .into_iter()
            .map(Region::new)
            .collect::<bam_prep::Result<Vec<_>>>()?;
    }
    if let Some(file) = overrides.region_file {
        config.input.region_file = Some(file);
    }
    if let Some(q) = overrides.quality {
        config.processing.quality_threshold = q;
    }
    if let Some(secs) = overrides.timeout {
        config.processing.tool_timeout_secs = Some(secs);
    }
    if let Some(report) = overrides.report {
        config.output.report_path = Some(report);
    }

    Ok(config)
}

fn preprocess_command(
    config_path: Option<&Path>,
    concurrency: Option<usize>,
    overrides: Overrides,
) -> Result<ExitCode> {
    let config = load_config(config_path, concurrency, overrides)?;
    config.validate()?;

    let runtime = build_runtime(config.processing.worker_threads)?;
    let outcome = runtime.block_on(async {
        let cancel = CancellationToken::new();
        let abort = CancellationToken::new();

        tokio::spawn(handle_interrupts(cancel.clone(), abort.clone()));

        let tools = Arc::new(Samtools::new(abort));
        run_pipeline_with(config, tools, cancel).await
    })?;

    println!("{}", outcome);
    Ok(ExitCode::SUCCESS)
}

/// First Ctrl-C stops dispatch and lets running jobs finish; the second kills
/// the running tools.
async fn handle_interrupts(cancel: CancellationToken, abort: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    tracing::warn!(
        "Interrupt received: finishing running jobs, not starting new ones \
         (press Ctrl-C again to stop them)"
    );
    cancel.cancel();

    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    tracing::warn!("Second interrupt: killing running jobs");
    abort.cancel();
}

fn validate_command(
    config_path: Option<&Path>,
    concurrency: Option<usize>,
    overrides: Overrides,
) -> Result<ExitCode> {
    let config = load_config(config_path, concurrency, overrides)?;
    let jobs = plan_jobs(&config)?;
    println!("Configuration is valid: {} jobs", jobs.len());
    Ok(ExitCode::SUCCESS)
}

fn verify_command(config_path: Option<&Path>, overrides: Overrides) -> Result<ExitCode> {
    let config = load_config(config_path, None, overrides)?;
    let tool_dir = config
        .tools
        .path
        .clone()
        .ok_or_else(|| PipelineError::config("tools.path is not set (use --tool-path)"))?;

    let runtime = build_runtime(Some(1))?;
    let report = runtime.block_on(tools::verify_setup(&tool_dir, &config.tools.samtools));

    println!("{}", report);
    Ok(if report.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_JOBS_FAILED)
    })
}

fn generate_config_command(output: &Path) -> Result<ExitCode> {
    // Generate a commented YAML config
    let yaml = r#"# bam-prep configuration

# === INPUT ===
input:
  # Sample manifest: one "sample_id,bam_path" per line, no header, no blank lines
  manifest: "samples.csv"

  # Regions each sample is filtered to (chromosomes or intervals)
  regions:
    - chr20

  # Optional region list file (one region per line, '#' comments allowed);
  # its regions are appended to the list above
  # region_file: "region.lst"

# === OUTPUT ===
output:
  # Filtered files land in <directory>/Bam/<sample>_<region>.filter.bam
  directory: "out"

  # Optional JSON report of succeeded and failed jobs
  # report_path: "out/report.json"

# === PROCESSING ===
processing:
  # Number of jobs run concurrently
  concurrency: 1

  # Minimum mapping quality kept by the filter stage
  quality_threshold: 20

  # Kill a samtools call that runs longer than this (seconds)
  # tool_timeout_secs: 3600

  # Tokio worker threads (null = num CPUs)
  # worker_threads: 8

  # Print progress during processing
  enable_metrics: true

  # Progress reporting interval in seconds
  metrics_interval_secs: 10

  # Optional path to save metrics JSON after the run
  # metrics_output_path: "out/metrics.json"

# === TOOLS ===
tools:
  # Directory containing the samtools binary
  path: "apps"

  # Binary name inside that directory
  samtools: "samtools"
"#;

    std::fs::write(output, yaml)?;
    println!("Generated sample configuration at: {}", output.display());

    Ok(ExitCode::SUCCESS)
}
