//! Expansion of samples × regions into the run's job sequence.

use super::{FilterJob, Region};
use crate::error::{PipelineError, Result};
use crate::input::SampleRecord;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Per-run parameters shared by every job.
#[derive(Debug, Clone, Default)]
pub struct JobSettings {
    /// Root of all filtered/indexed outputs
    pub output_directory: PathBuf,

    /// Minimum mapping quality
    pub quality_threshold: u8,

    /// samtools binary; unset is a configuration error
    pub tool_path: Option<PathBuf>,

    /// Optional limit on each external tool invocation
    pub timeout: Option<Duration>,
}

/// Build one job per (sample, region), sample-major and region-minor.
///
/// Pure: no filesystem access. Fails before producing any job if the settings
/// are structurally invalid or two jobs would write the same output file.
pub fn build_jobs(
    samples: &[SampleRecord],
    regions: &[Region],
    settings: &JobSettings,
) -> Result<Vec<FilterJob>> {
    let tool_path = settings
        .tool_path
        .clone()
        .ok_or_else(|| PipelineError::config("tool path is not set"))?;

    if settings.output_directory.as_os_str().is_empty() {
        return Err(PipelineError::config("output directory is not set"));
    }
    if regions.is_empty() {
        return Err(PipelineError::config("region set is empty"));
    }

    let mut jobs = Vec::with_capacity(samples.len() * regions.len());
    for sample in samples {
        for region in regions {
            jobs.push(FilterJob {
                index: jobs.len(),
                sample_id: sample.sample_id.clone(),
                source_path: sample.source_path.clone(),
                region: region.clone(),
                output_directory: settings.output_directory.clone(),
                quality_threshold: settings.quality_threshold,
                tool_path: tool_path.clone(),
                timeout: settings.timeout,
            });
        }
    }

    check_unique_outputs(&jobs)?;

    tracing::debug!(
        "Built {} jobs ({} samples x {} regions)",
        jobs.len(),
        samples.len(),
        regions.len()
    );

    Ok(jobs)
}

/// `S_1` × `x` and `S` × `1_x` both map to `S_1_x.filter.bam`.
fn check_unique_outputs(jobs: &[FilterJob]) -> Result<()> {
    let mut seen: HashMap<PathBuf, usize> = HashMap::with_capacity(jobs.len());
    for job in jobs {
        if let Some(&first) = seen.get(&job.output_path()) {
            return Err(PipelineError::config(format!(
                "jobs {} and {} both write {}",
                jobs[first].id(),
                job.id(),
                job.output_path().display()
            )));
        }
        seen.insert(job.output_path(), job.index);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn sample(id: &str, path: &str) -> SampleRecord {
        SampleRecord {
            sample_id: id.to_string(),
            source_path: PathBuf::from(path),
        }
    }

    fn regions(names: &[&str]) -> Vec<Region> {
        names.iter().map(|n| Region::new(*n).unwrap()).collect()
    }

    fn settings() -> JobSettings {
        JobSettings {
            output_directory: PathBuf::from("/out"),
            quality_threshold: 20,
            tool_path: Some(PathBuf::from("/apps/samtools")),
            timeout: None,
        }
    }

    #[test]
    fn test_cross_product_sample_major() {
        let samples = vec![sample("S1", "/a.bam"), sample("S2", "/b.bam"), sample("S3", "/c.bam")];
        let regions = regions(&["chr1", "chr2"]);

        let jobs = build_jobs(&samples, &regions, &settings()).unwrap();

        assert_eq!(jobs.len(), 6);
        let order: Vec<(String, String)> = jobs
            .iter()
            .map(|j| (j.sample_id().to_string(), j.region().to_string()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("S1".into(), "chr1".into()),
                ("S1".into(), "chr2".into()),
                ("S2".into(), "chr1".into()),
                ("S2".into(), "chr2".into()),
                ("S3".into(), "chr1".into()),
                ("S3".into(), "chr2".into()),
            ]
        );
        for (i, job) in jobs.iter().enumerate() {
            assert_eq!(job.index(), i);
        }
    }

    #[test]
    fn test_output_paths_unique_and_deterministic() {
        let samples: Vec<_> = (0..5)
            .map(|i| sample(&format!("S{}", i), &format!("/data/{}.bam", i)))
            .collect();
        let regions = regions(&["chr1", "chr2", "chr20", "chrX"]);

        let jobs = build_jobs(&samples, &regions, &settings()).unwrap();
        assert_eq!(jobs.len(), 20);

        let paths: HashSet<_> = jobs.iter().map(|j| j.output_path()).collect();
        assert_eq!(paths.len(), 20);

        assert_eq!(
            jobs[2].output_path(),
            PathBuf::from("/out/Bam/S0_chr20.filter.bam")
        );
        assert_eq!(
            jobs[2].index_path(),
            PathBuf::from("/out/Bam/S0_chr20.filter.bam.bai")
        );
    }

    #[test]
    fn test_settings_carried_into_jobs() {
        let mut s = settings();
        s.quality_threshold = 30;
        s.timeout = Some(Duration::from_secs(5));

        let jobs = build_jobs(&[sample("S1", "/a.bam")], &regions(&["chr20"]), &s).unwrap();

        assert_eq!(jobs[0].quality_threshold(), 30);
        assert_eq!(jobs[0].timeout(), Some(Duration::from_secs(5)));
        assert_eq!(jobs[0].tool_path(), PathBuf::from("/apps/samtools"));
        assert_eq!(jobs[0].source_path(), PathBuf::from("/a.bam"));
    }

    #[test]
    fn test_missing_tool_path_is_config_error() {
        let mut s = settings();
        s.tool_path = None;

        let err = build_jobs(&[sample("S1", "/a.bam")], &regions(&["chr20"]), &s).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration { .. }));
    }

    #[test]
    fn test_empty_regions_is_config_error() {
        let err = build_jobs(&[sample("S1", "/a.bam")], &[], &settings()).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration { .. }));
    }

    #[test]
    fn test_colliding_output_paths_rejected() {
        let samples = vec![sample("S_1", "/a.bam"), sample("S", "/b.bam")];
        let regions = regions(&["x", "1_x"]);

        let err = build_jobs(&samples, &regions, &settings()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("S_1/x"));
        assert!(msg.contains("S/1_x"));
    }

    #[test]
    fn test_no_samples_yields_no_jobs() {
        let jobs = build_jobs(&[], &regions(&["chr20"]), &settings()).unwrap();
        assert!(jobs.is_empty());
    }
}
