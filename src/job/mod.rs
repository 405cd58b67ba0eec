//! Filter jobs: one (sample, region) unit of filter + index work.

mod builder;

pub use builder::{build_jobs, JobSettings};

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Subdirectory of the output root that receives filtered alignments.
pub const BAM_SUBDIR: &str = "Bam";

/// Suffix appended to `{sample}_{region}` for filtered outputs.
pub const FILTERED_SUFFIX: &str = ".filter.bam";

/// Suffix the indexing tool appends to the file it indexes.
pub const INDEX_SUFFIX: &str = ".bai";

/// A region name passed verbatim to the filtering tool (`chr20`, `chr1:1-5000`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Region(String);

impl Region {
    /// Validate and wrap a region name.
    ///
    /// The name ends up in the output file name, so it must be non-empty and
    /// free of whitespace and path separators.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(PipelineError::config("region name is empty"));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(PipelineError::config(format!(
                "region '{}' contains whitespace",
                name
            )));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(PipelineError::config(format!(
                "region '{}' contains a path separator",
                name
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Region {
    type Error = PipelineError;

    fn try_from(value: String) -> Result<Self> {
        Region::new(value)
    }
}

impl From<Region> for String {
    fn from(region: Region) -> Self {
        region.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lightweight reference to a job, kept in results and reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobId {
    /// Position of the job in the run's job sequence
    pub index: usize,
    pub sample_id: String,
    pub region: Region,
}

impl JobId {
    pub fn new(index: usize, sample_id: impl Into<String>, region: Region) -> Self {
        Self {
            index,
            sample_id: sample_id.into(),
            region,
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.sample_id, self.region)
    }
}

/// Everything a worker needs to filter and index one sample over one region.
///
/// Built only by [`build_jobs`]; fields are read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterJob {
    index: usize,
    sample_id: String,
    source_path: PathBuf,
    region: Region,
    output_directory: PathBuf,
    quality_threshold: u8,
    tool_path: PathBuf,
    timeout: Option<Duration>,
}

impl FilterJob {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn sample_id(&self) -> &str {
        &self.sample_id
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    /// Minimum mapping quality a record needs to be kept.
    pub fn quality_threshold(&self) -> u8 {
        self.quality_threshold
    }

    /// Path of the samtools binary used for both stages.
    pub fn tool_path(&self) -> &Path {
        &self.tool_path
    }

    /// Per-invocation limit for each external tool call.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn id(&self) -> JobId {
        JobId::new(self.index, self.sample_id.clone(), self.region.clone())
    }

    /// Directory the filtered file is written into (`{out}/Bam`).
    pub fn bam_dir(&self) -> PathBuf {
        self.output_directory.join(BAM_SUBDIR)
    }

    /// `{out}/Bam/{sample}_{region}.filter.bam`
    pub fn output_path(&self) -> PathBuf {
        self.bam_dir().join(format!(
            "{}_{}{}",
            self.sample_id, self.region, FILTERED_SUFFIX
        ))
    }

    /// Index the indexing tool writes next to the output.
    pub fn index_path(&self) -> PathBuf {
        let mut path = self.output_path().into_os_string();
        path.push(INDEX_SUFFIX);
        PathBuf::from(path)
    }
}
