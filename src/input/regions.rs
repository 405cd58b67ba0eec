//! Region set assembly.

use crate::error::{PipelineError, Result};
use crate::job::Region;
use std::collections::HashSet;
use std::path::Path;

/// Read a region list: one region per line, blank lines and `#` comments skipped.
pub fn read_region_file(path: &Path) -> Result<Vec<Region>> {
    let contents = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
    parse_region_list(&contents).map_err(|e| prefix_config_error(e, &path.display().to_string()))
}

/// Parse region list text.
pub fn parse_region_list(contents: &str) -> Result<Vec<Region>> {
    contents
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line_no, line)| {
            Region::new(line).map_err(|e| prefix_config_error(e, &format!("line {}", line_no)))
        })
        .collect()
}

fn prefix_config_error(err: PipelineError, prefix: &str) -> PipelineError {
    match err {
        PipelineError::Configuration { message } => {
            PipelineError::config(format!("{}: {}", prefix, message))
        }
        other => other,
    }
}

/// Concatenate region sources (in order) into the run's region set.
///
/// The result must be non-empty and free of duplicates.
pub fn combine_regions(sources: impl IntoIterator<Item = Vec<Region>>) -> Result<Vec<Region>> {
    let mut seen = HashSet::new();
    let mut regions = Vec::new();

    for region in sources.into_iter().flatten() {
        if !seen.insert(region.clone()) {
            return Err(PipelineError::config(format!(
                "region '{}' is listed more than once",
                region
            )));
        }
        regions.push(region);
    }

    if regions.is_empty() {
        return Err(PipelineError::config(
            "no regions configured (set input.regions, input.region_file or --region)",
        ));
    }
    Ok(regions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(regions: &[Region]) -> Vec<&str> {
        regions.iter().map(Region::as_str).collect()
    }

    #[test]
    fn test_parse_region_list_skips_comments() {
        let regions =
            parse_region_list("# autosomes\nchr1\n\n  chr2  \nchr20:1-2000000\n").unwrap();
        assert_eq!(names(&regions), vec!["chr1", "chr2", "chr20:1-2000000"]);
    }

    #[test]
    fn test_parse_region_list_bad_line() {
        let err = parse_region_list("chr1\nchr 2\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_combine_preserves_order() {
        let a = vec![Region::new("chr20").unwrap()];
        let b = vec![Region::new("chr1").unwrap(), Region::new("chrX").unwrap()];
        let regions = combine_regions([a, b]).unwrap();
        assert_eq!(names(&regions), vec!["chr20", "chr1", "chrX"]);
    }

    #[test]
    fn test_combine_rejects_duplicates() {
        let a = vec![Region::new("chr20").unwrap()];
        let b = vec![Region::new("chr20").unwrap()];
        assert!(combine_regions([a, b]).is_err());
    }

    #[test]
    fn test_combine_rejects_empty() {
        assert!(combine_regions([Vec::new(), Vec::new()]).is_err());
    }

    #[test]
    fn test_read_region_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("region.lst");
        std::fs::write(&path, "chr20\nchr21\n").unwrap();

        let regions = read_region_file(&path).unwrap();
        assert_eq!(names(&regions), vec!["chr20", "chr21"]);
    }
}
