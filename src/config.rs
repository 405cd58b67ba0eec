//! Configuration for the preprocessing pipeline.

use crate::error::{PipelineError, Result};
use crate::input::{combine_regions, read_region_file};
use crate::job::{JobSettings, Region};
use crate::pipeline::SchedulerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for a preprocessing run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Input configuration
    #[serde(default)]
    pub input: InputConfig,

    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,

    /// Processing configuration
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// External tool configuration
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Input data configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputConfig {
    /// Sample manifest (`sample_id,source_path` per line)
    #[serde(default)]
    pub manifest: Option<PathBuf>,

    /// Regions to filter each sample to
    #[serde(default)]
    pub regions: Vec<Region>,

    /// Optional region list file, one region per line; appended to `regions`
    #[serde(default)]
    pub region_file: Option<PathBuf>,
}

/// Output configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root for filtered/indexed outputs (written under `Bam/`)
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Optional path for the JSON run report
    #[serde(default)]
    pub report_path: Option<PathBuf>,
}

/// Processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Number of jobs run concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Minimum mapping quality kept by the filter stage
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: u8,

    /// Per-invocation timeout for external tools (unset = wait forever)
    #[serde(default)]
    pub tool_timeout_secs: Option<u64>,

    /// Number of Tokio worker threads
    #[serde(default)]
    pub worker_threads: Option<usize>,

    /// Enable metrics reporting
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    /// Metrics reporting interval in seconds
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: u64,

    /// Optional path to save metrics JSON after run completes
    #[serde(default)]
    pub metrics_output_path: Option<PathBuf>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            quality_threshold: 20,
            tool_timeout_secs: None,
            worker_threads: None,
            enable_metrics: true,
            metrics_interval_secs: 10,
            metrics_output_path: None,
        }
    }
}

/// External tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Directory holding the tool binaries
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// samtools binary name inside `path`
    #[serde(default = "default_samtools")]
    pub samtools: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            path: None,
            samtools: default_samtools(),
        }
    }
}

impl ToolsConfig {
    /// Full path of the samtools binary, if the tool directory is set.
    pub fn samtools_path(&self) -> Option<PathBuf> {
        self.path.as_ref().map(|dir| dir.join(&self.samtools))
    }
}

impl Config {
    /// Load configuration from a YAML or JSON file.
    /// Format is auto-detected from file extension (.yaml, .yml, or .json).
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let config: Config = match ext {
            "json" => serde_json::from_str(&contents)?,
            // YAML is a superset of JSON
            _ => serde_yaml::from_str(&contents)?,
        };
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Load configuration from a JSON string.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Serialize configuration to YAML.
    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate the configuration structure. Does not touch the filesystem.
    pub fn validate(&self) -> Result<()> {
        if self.input.manifest.is_none() {
            return Err(PipelineError::config("input.manifest is not set"));
        }
        if self.input.regions.is_empty() && self.input.region_file.is_none() {
            return Err(PipelineError::config(
                "no regions configured (set input.regions, input.region_file or --region)",
            ));
        }
        match &self.output.directory {
            None => return Err(PipelineError::config("output.directory is not set")),
            Some(dir) if dir.as_os_str().is_empty() => {
                return Err(PipelineError::config("output.directory is empty"))
            }
            Some(_) => {}
        }
        if self.tools.path.is_none() {
            return Err(PipelineError::config("tools.path is not set"));
        }
        if self.tools.samtools.is_empty() {
            return Err(PipelineError::config("tools.samtools is empty"));
        }
        if self.processing.concurrency == 0 {
            return Err(PipelineError::config("Concurrency must be > 0"));
        }
        if self.processing.worker_threads == Some(0) {
            return Err(PipelineError::config("worker_threads must be > 0"));
        }
        if self.processing.tool_timeout_secs == Some(0) {
            return Err(PipelineError::config("tool_timeout_secs must be > 0"));
        }
        Ok(())
    }

    /// Check that the samtools binary exists where the configuration says.
    pub fn check_tool_path(&self) -> Result<PathBuf> {
        let samtools = self
            .tools
            .samtools_path()
            .ok_or_else(|| PipelineError::config("tools.path is not set"))?;
        if !samtools.is_file() {
            return Err(PipelineError::config(format!(
                "samtools not found at expected path: {}",
                samtools.display()
            )));
        }
        Ok(samtools)
    }

    /// Inline regions followed by those from `input.region_file`.
    pub fn regions(&self) -> Result<Vec<Region>> {
        let from_file = match &self.input.region_file {
            Some(path) => read_region_file(path)?,
            None => Vec::new(),
        };
        combine_regions([self.input.regions.clone(), from_file])
    }

    /// Per-job parameters shared by the whole run.
    pub fn job_settings(&self) -> JobSettings {
        JobSettings {
            output_directory: self.output.directory.clone().unwrap_or_default(),
            quality_threshold: self.processing.quality_threshold,
            tool_path: self.tools.samtools_path(),
            timeout: self.processing.tool_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            concurrency: self.processing.concurrency,
            enable_metrics: self.processing.enable_metrics,
            metrics_interval_secs: self.processing.metrics_interval_secs,
            metrics_output_path: self.processing.metrics_output_path.clone(),
        }
    }
}

// Default value functions for serde
fn default_concurrency() -> usize { 1 }
fn default_quality_threshold() -> u8 { 20 }
fn default_true() -> bool { true }
fn default_metrics_interval() -> u64 { 10 }
fn default_samtools() -> String { "samtools".to_string() }

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            input: InputConfig {
                manifest: Some(PathBuf::from("samples.csv")),
                regions: vec![Region::new("chr20").unwrap()],
                region_file: None,
            },
            output: OutputConfig {
                directory: Some(PathBuf::from("out")),
                report_path: None,
            },
            processing: ProcessingConfig::default(),
            tools: ToolsConfig {
                path: Some(PathBuf::from("apps")),
                samtools: "samtools".to_string(),
            },
        }
    }

    #[test]
    fn test_processing_defaults() {
        let processing = ProcessingConfig::default();
        assert_eq!(processing.concurrency, 1);
        assert_eq!(processing.quality_threshold, 20);
        assert!(processing.tool_timeout_secs.is_none());
        assert!(processing.enable_metrics);
    }

    #[test]
    fn test_from_yaml_minimal() {
        let config = Config::from_yaml(
            r#"
input:
  manifest: samples.csv
  regions: [chr20, chr21]
output:
  directory: out
tools:
  path: apps
"#,
        )
        .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.input.regions.len(), 2);
        assert_eq!(config.processing.concurrency, 1);
        assert_eq!(config.processing.quality_threshold, 20);
        assert_eq!(
            config.tools.samtools_path(),
            Some(PathBuf::from("apps/samtools"))
        );
    }

    #[test]
    fn test_from_json() {
        let config = Config::from_json(
            r#"{"input": {"manifest": "m.csv", "regions": ["chr1"]},
                "output": {"directory": "/tmp/out"},
                "processing": {"concurrency": 8, "quality_threshold": 30},
                "tools": {"path": "/opt/apps"}}"#,
        )
        .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.processing.concurrency, 8);
        assert_eq!(config.job_settings().quality_threshold, 30);
    }

    #[test]
    fn test_invalid_region_in_yaml_rejected() {
        let result = Config::from_yaml("input:\n  regions: ['chr 1']\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_yaml_roundtrip_keeps_regions() {
        let config = valid_config();
        let yaml = config.to_yaml().unwrap();
        let back = Config::from_yaml(&yaml).unwrap();
        assert_eq!(back.input.regions, config.input.regions);
    }

    #[test]
    fn test_validation_errors() {
        assert!(valid_config().validate().is_ok());

        let mut c = valid_config();
        c.tools.path = None;
        assert!(matches!(c.validate(), Err(PipelineError::Configuration { .. })));

        let mut c = valid_config();
        c.output.directory = None;
        assert!(c.validate().is_err());

        let mut c = valid_config();
        c.output.directory = Some(PathBuf::new());
        assert!(c.validate().is_err());

        let mut c = valid_config();
        c.input.manifest = None;
        assert!(c.validate().is_err());

        let mut c = valid_config();
        c.input.regions.clear();
        assert!(c.validate().is_err());

        let mut c = valid_config();
        c.processing.concurrency = 0;
        assert!(c.validate().is_err());

        let mut c = valid_config();
        c.processing.tool_timeout_secs = Some(0);
        assert!(c.validate().is_err());

        let mut c = valid_config();
        c.processing.worker_threads = Some(0);
        assert!(matches!(c.validate(), Err(PipelineError::Configuration { .. })));
    }

    #[test]
    fn test_zero_worker_threads_in_yaml_rejected() {
        let mut config = Config::from_yaml("processing:\n  worker_threads: 0\n").unwrap();
        config.input = valid_config().input;
        config.output = valid_config().output;
        config.tools = valid_config().tools;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("worker_threads"));
    }

    #[test]
    fn test_check_tool_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut c = valid_config();
        c.tools.path = Some(dir.path().to_path_buf());
        assert!(c.check_tool_path().is_err());

        std::fs::write(dir.path().join("samtools"), "").unwrap();
        assert_eq!(c.check_tool_path().unwrap(), dir.path().join("samtools"));
    }

    #[test]
    fn test_regions_merge_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let region_file = dir.path().join("region.lst");
        std::fs::write(&region_file, "chr21\nchr22\n").unwrap();

        let mut c = valid_config();
        c.input.region_file = Some(region_file);
        let names: Vec<String> = c.regions().unwrap().iter().map(|r| r.to_string()).collect();
        assert_eq!(names, vec!["chr20", "chr21", "chr22"]);
    }

    #[test]
    fn test_job_settings_timeout() {
        let mut c = valid_config();
        c.processing.tool_timeout_secs = Some(90);
        let settings = c.job_settings();
        assert_eq!(settings.timeout, Some(Duration::from_secs(90)));
        assert_eq!(settings.output_directory, PathBuf::from("out"));
        assert_eq!(settings.tool_path, Some(PathBuf::from("apps/samtools")));
    }
}
