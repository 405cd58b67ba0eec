//! Run-level verdict from per-job results.

use crate::error::{PipelineError, Result};
use crate::job::JobId;
use crate::pipeline::{JobResult, Stage};
use crate::tools::FailureCause;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// A job that did not produce a usable output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedJob {
    pub job: JobId,
    /// `None` when the job never reached a stage (cancelled, aborted)
    pub stage: Option<Stage>,
    pub cause: FailureCause,
}

impl fmt::Display for FailedJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stage {
            Some(stage) => write!(f, "{} [{}]: {}", self.job, stage, self.cause),
            None => write!(f, "{}: {}", self.job, self.cause),
        }
    }
}

/// A job whose filtered output and index are in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SucceededJob {
    pub job: JobId,
    pub output_path: PathBuf,
}

/// Aggregate of one run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub total_jobs: usize,
    pub succeeded: Vec<SucceededJob>,
    /// In job order
    pub failed_jobs: Vec<FailedJob>,
}

impl PipelineOutcome {
    /// Scan every result; nothing is dropped or short-circuited.
    pub fn from_results(results: &[JobResult]) -> Self {
        let mut succeeded = Vec::new();
        let mut failed_jobs = Vec::new();

        for result in results {
            match result {
                JobResult::Success { job, output_path } => succeeded.push(SucceededJob {
                    job: job.clone(),
                    output_path: output_path.clone(),
                }),
                JobResult::Failure { job, stage, cause } => failed_jobs.push(FailedJob {
                    job: job.clone(),
                    stage: Some(*stage),
                    cause: cause.clone(),
                }),
                JobResult::Incomplete { job, cause } => failed_jobs.push(FailedJob {
                    job: job.clone(),
                    stage: None,
                    cause: cause.clone(),
                }),
            }
        }

        Self {
            total_jobs: results.len(),
            succeeded,
            failed_jobs,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed_jobs.is_empty()
    }

    /// Log the verdict, one error line per failed job.
    pub fn log_summary(&self) {
        if self.is_success() {
            tracing::info!(
                "Preprocessing completed successfully: {} jobs filtered and indexed",
                self.total_jobs
            );
            return;
        }

        tracing::error!(
            "{} of {} jobs failed",
            self.failed_jobs.len(),
            self.total_jobs
        );
        for failed in &self.failed_jobs {
            let stage = failed
                .stage
                .map_or_else(|| "none".to_string(), |s| s.to_string());
            tracing::error!(
                sample = %failed.job.sample_id,
                region = %failed.job.region,
                stage = %stage,
                "Failed job {}",
                failed
            );
        }
    }

    /// `Ok(self)` when every job succeeded, otherwise an aggregate error naming each failure.
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(PipelineError::Aggregate {
                total: self.total_jobs,
                failures: self.failed_jobs,
            })
        }
    }

    /// Save the outcome as a JSON report.
    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!("Run report saved to {}", path.display());
        Ok(())
    }
}

impl fmt::Display for PipelineOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Succeeded: {}, Failed: {}, Total: {}",
            self.succeeded.len(),
            self.failed_jobs.len(),
            self.total_jobs
        )
    }
}
