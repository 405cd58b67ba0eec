//! Error types for the preprocessing pipeline.
//!
//! Only run-level problems are errors. A single job failing at the filter or
//! index stage is data (see [`crate::pipeline::JobResult`]) and only becomes an
//! error once the whole run has been aggregated.

use std::path::PathBuf;
use thiserror::Error;

use crate::pipeline::FailedJob;

/// Main error type for pipeline operations.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Malformed manifest line (wrong field count, empty field, duplicate sample)
    #[error("Manifest error at line {line}: {message}")]
    ManifestParse { line: usize, message: String },

    /// Missing or invalid run configuration (tool path, output directory, regions)
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// I/O failure reading an input file
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// One or more jobs failed; every failure is listed
    #[error("{} of {total} jobs failed: {}", failures.len(), format_failures(failures))]
    Aggregate {
        total: usize,
        failures: Vec<FailedJob>,
    },
}

/// Type alias for Results using PipelineError
pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    /// Create a manifest parse error for a 1-based line number
    pub fn manifest(line: usize, message: impl Into<String>) -> Self {
        Self::ManifestParse {
            line,
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors raised before any job was dispatched.
    pub fn is_fatal_input(&self) -> bool {
        matches!(
            self,
            Self::ManifestParse { .. } | Self::Configuration { .. } | Self::Io { .. }
        )
    }
}

fn format_failures(failures: &[FailedJob]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
