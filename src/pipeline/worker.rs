//! Per-job filter and index execution.

use crate::job::{FilterJob, JobId};
use crate::pipeline::Metrics;
use crate::tools::{AlignmentTools, FailureCause};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// External step a job failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Filter,
    Index,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filter => f.write_str("filter"),
            Self::Index => f.write_str("index"),
        }
    }
}

/// Outcome of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobResult {
    /// Filtered and indexed; the output is usable
    Success { job: JobId, output_path: PathBuf },

    /// A stage failed; anything written for this job is unusable
    Failure {
        job: JobId,
        stage: Stage,
        cause: FailureCause,
    },

    /// No stage verdict: cancelled before dispatch or the worker task died
    Incomplete { job: JobId, cause: FailureCause },
}

impl JobResult {
    pub fn job(&self) -> &JobId {
        match self {
            Self::Success { job, .. }
            | Self::Failure { job, .. }
            | Self::Incomplete { job, .. } => job,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Runs jobs against a set of external tools.
pub struct FilterWorker {
    tools: Arc<dyn AlignmentTools>,
    metrics: Arc<Metrics>,
}

impl FilterWorker {
    pub fn new(tools: Arc<dyn AlignmentTools>, metrics: Arc<Metrics>) -> Self {
        Self { tools, metrics }
    }

    /// Filter then index one job. Never retries.
    pub async fn run(&self, job: FilterJob) -> JobResult {
        let id = job.id();
        self.metrics.add_job_started();

        tracing::debug!(
            sample = %id.sample_id,
            region = %id.region,
            "Filtering {} -> {}",
            job.source_path().display(),
            job.output_path().display()
        );

        // An existing directory (a sibling job, an earlier run) is not an error.
        if let Err(e) = tokio::fs::create_dir_all(job.bam_dir()).await {
            let cause = FailureCause::Io {
                message: format!("creating {}: {}", job.bam_dir().display(), e),
            };
            return self.fail(id, Stage::Filter, cause);
        }

        let filter_start = Instant::now();
        let filtered = self.tools.filter(&job).await;
        self.metrics.add_filter_time(filter_start.elapsed());
        if let Err(cause) = filtered {
            return self.fail(id, Stage::Filter, cause);
        }

        let index_start = Instant::now();
        let indexed = self.tools.index(&job).await;
        self.metrics.add_index_time(index_start.elapsed());
        if let Err(cause) = indexed {
            return self.fail(id, Stage::Index, cause);
        }

        self.metrics.add_job_succeeded();
        tracing::debug!(
            sample = %id.sample_id,
            region = %id.region,
            "Filtered and indexed {}",
            job.output_path().display()
        );

        JobResult::Success {
            job: id,
            output_path: job.output_path(),
        }
    }

    fn fail(&self, job: JobId, stage: Stage, cause: FailureCause) -> JobResult {
        self.metrics.add_job_failed();
        tracing::error!(
            sample = %job.sample_id,
            region = %job.region,
            stage = %stage,
            "Job {} failed at {} stage: {}",
            job,
            stage,
            cause
        );
        JobResult::Failure { job, stage, cause }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::ScriptedTools;
    use super::*;
    use crate::input::SampleRecord;
    use crate::job::{build_jobs, JobSettings, Region};
    use std::path::Path;
    use tempfile::TempDir;

    fn jobs(out: &Path, samples: usize) -> Vec<FilterJob> {
        let samples: Vec<_> = (0..samples)
            .map(|i| SampleRecord {
                sample_id: format!("S{}", i),
                source_path: PathBuf::from(format!("/data/{}.bam", i)),
            })
            .collect();
        let settings = JobSettings {
            output_directory: out.to_path_buf(),
            quality_threshold: 20,
            tool_path: Some(PathBuf::from("/apps/samtools")),
            timeout: None,
        };
        build_jobs(&samples, &[Region::new("chr20").unwrap()], &settings).unwrap()
    }

    #[tokio::test]
    async fn test_success_writes_output_and_index() {
        let dir = TempDir::new().unwrap();
        let job = jobs(dir.path(), 1).remove(0);
        let metrics = Metrics::new();
        let worker = FilterWorker::new(Arc::new(ScriptedTools::default()), metrics.clone());

        let result = worker.run(job.clone()).await;

        assert_eq!(
            result,
            JobResult::Success {
                job: job.id(),
                output_path: dir.path().join("Bam/S0_chr20.filter.bam"),
            }
        );
        assert!(job.output_path().exists());
        assert!(job.index_path().exists());
        assert_eq!(metrics.snapshot().jobs_succeeded, 1);
    }

    #[tokio::test]
    async fn test_filter_failure_skips_index() {
        let dir = TempDir::new().unwrap();
        let job = jobs(dir.path(), 1).remove(0);
        let tools = Arc::new(ScriptedTools::failing([(0, Stage::Filter)]));
        let worker = FilterWorker::new(tools.clone(), Metrics::new());

        let result = worker.run(job).await;

        assert!(matches!(
            result,
            JobResult::Failure {
                stage: Stage::Filter,
                ..
            }
        ));
        assert_eq!(*tools.calls.lock().unwrap(), vec![(0, Stage::Filter)]);
    }

    #[tokio::test]
    async fn test_index_failure_is_never_success() {
        let dir = TempDir::new().unwrap();
        let job = jobs(dir.path(), 1).remove(0);
        let metrics = Metrics::new();
        let worker = FilterWorker::new(
            Arc::new(ScriptedTools::failing([(0, Stage::Index)])),
            metrics.clone(),
        );

        let result = worker.run(job.clone()).await;

        // The filtered file exists but must not be reported as usable.
        assert!(job.output_path().exists());
        assert_eq!(
            result,
            JobResult::Failure {
                job: job.id(),
                stage: Stage::Index,
                cause: FailureCause::ExitCode {
                    code: 1,
                    stderr: String::new(),
                },
            }
        );
        assert!(!result.is_success());
        assert_eq!(metrics.snapshot().jobs_failed, 1);
    }

    #[tokio::test]
    async fn test_existing_output_directory_is_fine() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("Bam")).unwrap();
        let job = jobs(dir.path(), 1).remove(0);
        let worker = FilterWorker::new(Arc::new(ScriptedTools::default()), Metrics::new());

        assert!(worker.run(job.clone()).await.is_success());
        // Second run over the same outputs.
        assert!(worker.run(job).await.is_success());
    }

    #[tokio::test]
    async fn test_unwritable_output_directory_fails_filter_stage() {
        let dir = TempDir::new().unwrap();
        // A file where the output root should be.
        let blocker = dir.path().join("out");
        std::fs::write(&blocker, b"").unwrap();
        let job = jobs(&blocker, 1).remove(0);
        let tools = Arc::new(ScriptedTools::default());
        let worker = FilterWorker::new(tools.clone(), Metrics::new());

        let result = worker.run(job).await;

        assert!(matches!(
            result,
            JobResult::Failure {
                stage: Stage::Filter,
                cause: FailureCause::Io { .. },
                ..
            }
        ));
        assert!(tools.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Filter.to_string(), "filter");
        assert_eq!(Stage::Index.to_string(), "index");
    }
}
