//! External tool invocation.
//!
//! Workers talk to the filtering and indexing tools through [`AlignmentTools`],
//! so the pipeline can be driven by a scripted stand-in in tests.

mod samtools;
mod verify;

pub use samtools::{filter_args, index_args, run_tool, Samtools};
pub use verify::{verify_setup, CheckStatus, SetupCheck, SetupReport};

use crate::job::FilterJob;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

/// Why an external step did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureCause {
    /// Tool exited with a non-zero status
    ExitCode {
        code: i32,
        /// Last lines of the tool's stderr
        #[serde(skip_serializing_if = "String::is_empty")]
        stderr: String,
    },

    /// Tool was terminated by a signal
    Signalled {
        #[serde(skip_serializing_if = "String::is_empty")]
        stderr: String,
    },

    /// Tool could not be started
    Launch { message: String },

    /// Tool exceeded the per-invocation timeout and was killed
    TimedOut { millis: u64 },

    /// Local filesystem failure around the invocation
    Io { message: String },

    /// Worker task ended without reporting a result, or the tool was
    /// killed on a forced shutdown
    Aborted { message: String },

    /// Job was never started because the run was cancelled
    Cancelled,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExitCode { code, stderr } => {
                write!(f, "exit code {}", code)?;
                write_stderr(f, stderr)
            }
            Self::Signalled { stderr } => {
                write!(f, "terminated by signal")?;
                write_stderr(f, stderr)
            }
            Self::Launch { message } => write!(f, "could not launch: {}", message),
            Self::TimedOut { millis } => {
                write!(f, "timed out after {:.1}s", *millis as f64 / 1000.0)
            }
            Self::Io { message } => write!(f, "I/O error: {}", message),
            Self::Aborted { message } => write!(f, "aborted: {}", message),
            Self::Cancelled => write!(f, "cancelled before dispatch"),
        }
    }
}

fn write_stderr(f: &mut fmt::Formatter<'_>, stderr: &str) -> fmt::Result {
    if stderr.is_empty() {
        Ok(())
    } else {
        write!(f, " ({})", stderr)
    }
}

/// The two external operations a job performs.
#[async_trait]
pub trait AlignmentTools: Send + Sync {
    /// Write the region/quality-filtered file to `job.output_path()`.
    async fn filter(&self, job: &FilterJob) -> Result<(), FailureCause>;

    /// Build the companion index for `job.output_path()`.
    async fn index(&self, job: &FilterJob) -> Result<(), FailureCause>;
}
