//! Job progress and stage timing metrics.

use serde::{Serialize, Serializer};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::interval;

fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Metrics for the pipeline.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Jobs handed to a worker
    pub jobs_started: AtomicU64,

    /// Jobs that were filtered and indexed
    pub jobs_succeeded: AtomicU64,

    /// Jobs that failed at either stage or were aborted
    pub jobs_failed: AtomicU64,

    /// Jobs never started because the run was cancelled
    pub jobs_cancelled: AtomicU64,

    /// Start time
    start_time: Option<Instant>,

    /// Time spent in the filter stage (microseconds, summed across workers)
    pub filter_us: AtomicU64,

    /// Time spent in the index stage (microseconds, summed across workers)
    pub index_us: AtomicU64,
}

impl Metrics {
    /// Create new metrics.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        })
    }

    pub fn add_job_started(&self) {
        self.jobs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_job_succeeded(&self) {
        self.jobs_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_job_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_job_cancelled(&self) {
        self.jobs_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Record time spent filtering (in microseconds).
    pub fn add_filter_time(&self, duration: Duration) {
        self.filter_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record time spent indexing (in microseconds).
    pub fn add_index_time(&self, duration: Duration) {
        self.index_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Get elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.start_time.map_or(Duration::ZERO, |t| t.elapsed())
    }

    /// Jobs finished (either way) per second.
    pub fn jobs_per_second(&self) -> f64 {
        let done = self.jobs_succeeded.load(Ordering::Relaxed)
            + self.jobs_failed.load(Ordering::Relaxed);
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            done as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_started: self.jobs_started.load(Ordering::Relaxed),
            jobs_succeeded: self.jobs_succeeded.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            jobs_cancelled: self.jobs_cancelled.load(Ordering::Relaxed),
            elapsed: self.elapsed(),
            jobs_per_second: self.jobs_per_second(),
            filter_secs: self.filter_us.load(Ordering::Relaxed) as f64 / 1_000_000.0,
            index_secs: self.index_us.load(Ordering::Relaxed) as f64 / 1_000_000.0,
        }
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub jobs_started: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub jobs_cancelled: u64,
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
    pub jobs_per_second: f64,
    /// Total time spent filtering (seconds, summed across workers)
    pub filter_secs: f64,
    /// Total time spent indexing (seconds, summed across workers)
    pub index_secs: f64,
}

impl MetricsSnapshot {
    /// Jobs with a final verdict.
    pub fn jobs_finished(&self) -> u64 {
        self.jobs_succeeded + self.jobs_failed + self.jobs_cancelled
    }

    /// Save metrics to a JSON file.
    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!("Metrics saved to {}", path.display());
        Ok(())
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let total_stage = self.filter_secs + self.index_secs;
        let (filter_pct, index_pct) = if total_stage > 0.0 {
            (
                self.filter_secs / total_stage * 100.0,
                self.index_secs / total_stage * 100.0,
            )
        } else {
            (0.0, 0.0)
        };

        write!(
            f,
            "Jobs: {} succeeded, {} failed, {} cancelled, {} in flight | \
             Rate: {:.2} jobs/s | Elapsed: {:.1}s | Time: filter {:.0}% | index {:.0}%",
            self.jobs_succeeded,
            self.jobs_failed,
            self.jobs_cancelled,
            self.jobs_started
                .saturating_sub(self.jobs_succeeded + self.jobs_failed),
            self.jobs_per_second,
            self.elapsed.as_secs_f64(),
            filter_pct,
            index_pct,
        )
    }
}

/// Periodic metrics reporter.
pub struct MetricsReporter {
    metrics: Arc<Metrics>,
    interval_secs: u64,
    total_jobs: u64,
}

impl MetricsReporter {
    /// Create a new metrics reporter.
    pub fn new(metrics: Arc<Metrics>, interval_secs: u64, total_jobs: u64) -> Self {
        Self {
            metrics,
            interval_secs: interval_secs.max(1),
            total_jobs,
        }
    }

    /// Start the periodic reporter.
    pub async fn run(self, mut shutdown: mpsc::Receiver<()>) {
        let mut ticker = interval(Duration::from_secs(self.interval_secs));
        // First tick fires immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let snapshot = self.metrics.snapshot();
                    tracing::info!(
                        "[{:.1}%] {}",
                        self.progress(&snapshot),
                        snapshot
                    );
                }
                _ = shutdown.recv() => {
                    let snapshot = self.metrics.snapshot();
                    tracing::info!("Final: {}", snapshot);
                    break;
                }
            }
        }
    }

    fn progress(&self, snapshot: &MetricsSnapshot) -> f64 {
        if self.total_jobs > 0 {
            snapshot.jobs_finished() as f64 / self.total_jobs as f64 * 100.0
        } else {
            0.0
        }
    }

    /// Print a final summary.
    pub fn print_summary(&self) {
        let snapshot = self.metrics.snapshot();

        println!("\n=== Preprocessing Summary ===");
        println!("Total time: {:.1}s", snapshot.elapsed.as_secs_f64());
        println!("Jobs: {}", self.total_jobs);
        println!("Succeeded: {}", snapshot.jobs_succeeded);
        println!("Failed: {}", snapshot.jobs_failed);
        if snapshot.jobs_cancelled > 0 {
            println!("Cancelled: {}", snapshot.jobs_cancelled);
        }
        println!("Processing rate: {:.2} jobs/s", snapshot.jobs_per_second);

        let total_stage = snapshot.filter_secs + snapshot.index_secs;
        if total_stage > 0.0 {
            println!("\n--- Stage Time Breakdown ---");
            println!(
                "Filter: {:>7.1}s ({:>5.1}%)",
                snapshot.filter_secs,
                snapshot.filter_secs / total_stage * 100.0
            );
            println!(
                "Index:  {:>7.1}s ({:>5.1}%)",
                snapshot.index_secs,
                snapshot.index_secs / total_stage * 100.0
            );
        }
        println!("=============================\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_snapshot() {
        let metrics = Metrics::new();

        metrics.add_job_started();
        metrics.add_job_started();
        metrics.add_job_started();
        metrics.add_job_succeeded();
        metrics.add_job_failed();
        metrics.add_job_cancelled();

        let snapshot = metrics.snapshot();

        assert_eq!(snapshot.jobs_started, 3);
        assert_eq!(snapshot.jobs_succeeded, 1);
        assert_eq!(snapshot.jobs_failed, 1);
        assert_eq!(snapshot.jobs_cancelled, 1);
        assert_eq!(snapshot.jobs_finished(), 3);
    }

    #[test]
    fn test_timing_metrics() {
        let metrics = Metrics::new();

        metrics.add_filter_time(Duration::from_millis(300));
        metrics.add_index_time(Duration::from_millis(100));

        let snapshot = metrics.snapshot();

        assert!((snapshot.filter_secs - 0.3).abs() < 0.001);
        assert!((snapshot.index_secs - 0.1).abs() < 0.001);

        let display = format!("{}", snapshot);
        assert!(display.contains("filter 75%"));
        assert!(display.contains("index 25%"));
    }

    #[test]
    fn test_snapshot_display_in_flight() {
        let snapshot = MetricsSnapshot {
            jobs_started: 10,
            jobs_succeeded: 6,
            jobs_failed: 1,
            jobs_cancelled: 0,
            elapsed: Duration::from_secs(4),
            jobs_per_second: 1.75,
            filter_secs: 0.0,
            index_secs: 0.0,
        };

        let display = format!("{}", snapshot);
        assert!(display.contains("6 succeeded"));
        assert!(display.contains("1 failed"));
        assert!(display.contains("3 in flight"));
    }

    #[test]
    fn test_zero_elapsed_no_panic() {
        let metrics = Metrics {
            start_time: None,
            ..Default::default()
        };
        metrics.add_job_succeeded();
        assert_eq!(metrics.jobs_per_second(), 0.0);
    }

    #[test]
    fn test_save_to_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("metrics.json");
        let metrics = Metrics::new();
        metrics.add_job_succeeded();

        metrics.snapshot().save_to_file(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["jobs_succeeded"], 1);
    }

    #[test]
    fn test_metrics_reporter_new() {
        let reporter = MetricsReporter::new(Metrics::new(), 0, 40);
        assert_eq!(reporter.interval_secs, 1);
        assert_eq!(reporter.total_jobs, 40);
    }

    #[tokio::test]
    async fn test_reporter_stops_on_shutdown() {
        let reporter = MetricsReporter::new(Metrics::new(), 60, 1);
        let (tx, rx) = mpsc::channel(1);
        let handle = tokio::spawn(reporter.run(rx));
        tx.send(()).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
