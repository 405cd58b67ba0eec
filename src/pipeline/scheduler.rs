//! Work distribution for filter jobs.
//!
//! The scheduler runs jobs as tokio tasks with at most `concurrency` in flight
//! and hands back one result per job in job order, whatever order they finish in.

use crate::job::FilterJob;
use crate::pipeline::{FilterWorker, JobResult, Metrics, MetricsReporter};
use crate::tools::FailureCause;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Configuration for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum concurrently running jobs (values below 1 are treated as 1)
    pub concurrency: usize,

    /// Enable progress reporting
    pub enable_metrics: bool,

    /// Metrics reporting interval in seconds
    pub metrics_interval_secs: u64,

    /// Optional path to save metrics JSON after run completes
    pub metrics_output_path: Option<PathBuf>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            enable_metrics: true,
            metrics_interval_secs: 10,
            metrics_output_path: None,
        }
    }
}

/// Scheduler for distributing filter jobs across worker tasks.
pub struct Scheduler {
    /// Worker shared by every task
    worker: Arc<FilterWorker>,

    /// Metrics
    metrics: Arc<Metrics>,

    /// Stops dispatch of jobs not yet started
    cancel: CancellationToken,

    /// Configuration
    config: SchedulerConfig,
}

impl Scheduler {
    /// Create a new scheduler.
    pub fn new(
        worker: Arc<FilterWorker>,
        metrics: Arc<Metrics>,
        cancel: CancellationToken,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            worker,
            metrics,
            cancel,
            config,
        }
    }

    /// Run every job; returns `results[i]` for `jobs[i]`.
    ///
    /// Does not stop at the first failure. After cancellation, in-flight jobs
    /// finish and the rest come back as [`JobResult::Incomplete`].
    pub async fn run(&self, jobs: Vec<FilterJob>) -> Vec<JobResult> {
        let total_jobs = jobs.len();
        let concurrency = self.config.concurrency.max(1);

        tracing::info!(
            "Scheduling {} jobs for processing ({} concurrent)",
            total_jobs,
            concurrency
        );

        // Start metrics reporter if enabled
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let reporter_handle = if self.config.enable_metrics {
            let reporter = MetricsReporter::new(
                self.metrics.clone(),
                self.config.metrics_interval_secs,
                total_jobs as u64,
            );
            Some(tokio::spawn(reporter.run(shutdown_rx)))
        } else {
            drop(shutdown_rx);
            None
        };

        let mut results: Vec<(usize, JobResult)> = stream::iter(jobs.into_iter().enumerate())
            .map(|(position, job)| {
                let worker = self.worker.clone();
                let metrics = self.metrics.clone();
                let cancel = self.cancel.clone();
                async move { (position, dispatch(worker, metrics, cancel, job).await) }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        results.sort_unstable_by_key(|(position, _)| *position);

        // Shutdown metrics reporter
        let _ = shutdown_tx.send(()).await;
        if let Some(handle) = reporter_handle {
            let _ = handle.await;
        }

        if self.config.enable_metrics {
            let reporter = MetricsReporter::new(
                self.metrics.clone(),
                self.config.metrics_interval_secs,
                total_jobs as u64,
            );
            reporter.print_summary();

            if let Some(ref path) = self.config.metrics_output_path {
                if let Err(e) = self.metrics.snapshot().save_to_file(path) {
                    tracing::warn!("Failed to save metrics to {}: {}", path.display(), e);
                }
            }
        }

        results.into_iter().map(|(_, result)| result).collect()
    }
}

/// Run one job in its own task, unless the run has been cancelled.
async fn dispatch(
    worker: Arc<FilterWorker>,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
    job: FilterJob,
) -> JobResult {
    let id = job.id();

    if cancel.is_cancelled() {
        metrics.add_job_cancelled();
        tracing::debug!("Job {} not started: run cancelled", id);
        return JobResult::Incomplete {
            job: id,
            cause: FailureCause::Cancelled,
        };
    }

    match tokio::spawn(async move { worker.run(job).await }).await {
        Ok(result) => result,
        Err(e) => {
            metrics.add_job_failed();
            tracing::error!("Worker for job {} ended abnormally: {}", id, e);
            JobResult::Incomplete {
                job: id,
                cause: FailureCause::Aborted {
                    message: e.to_string(),
                },
            }
        }
    }
}
