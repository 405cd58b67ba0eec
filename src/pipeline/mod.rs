//! Pipeline orchestration: workers, scheduling and result aggregation.

mod metrics;
mod outcome;
mod scheduler;
pub(crate) mod worker;


pub use crate::tools::FailureCause;
pub use metrics::{Metrics, MetricsReporter, MetricsSnapshot};
pub use outcome::{FailedJob, PipelineOutcome, SucceededJob};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use worker::{FilterWorker, JobResult, Stage};
