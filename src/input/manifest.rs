//! Sample manifest parsing.
//!
//! A manifest is plain text with one `sample_id,source_path` record per line
//! and no header. Every line is a record: a blank line (including a trailing
//! one) is a format error, so a damaged manifest never yields a partial job set.

use crate::error::{PipelineError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Field delimiter.
const DELIMITER: char = ',';

/// One manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRecord {
    /// Non-empty, unique within the manifest
    pub sample_id: String,

    /// Alignment file to filter
    pub source_path: PathBuf,
}

/// Read and parse a manifest file.
pub fn read_manifest(path: &Path) -> Result<Vec<SampleRecord>> {
    let contents = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
    let records = parse_manifest(&contents)?;
    tracing::info!(
        "Read {} samples from manifest {}",
        records.len(),
        path.display()
    );
    Ok(records)
}

/// Parse manifest text. Line numbers in errors are 1-based.
pub fn parse_manifest(contents: &str) -> Result<Vec<SampleRecord>> {
    // A single final newline terminates the last record; anything after it is a line.
    let body = contents.strip_suffix('\n').unwrap_or(contents);
    if body.is_empty() {
        return Err(PipelineError::manifest(1, "manifest contains no records"));
    }

    let mut records = Vec::new();
    let mut first_seen: HashMap<String, usize> = HashMap::new();

    for (idx, raw) in body.split('\n').enumerate() {
        let line_no = idx + 1;
        let record = parse_line(raw.trim_end_matches('\r'), line_no)?;

        if let Some(first) = first_seen.insert(record.sample_id.clone(), line_no) {
            return Err(PipelineError::manifest(
                line_no,
                format!(
                    "duplicate sample id '{}' (first defined at line {})",
                    record.sample_id, first
                ),
            ));
        }
        records.push(record);
    }

    Ok(records)
}

fn parse_line(line: &str, line_no: usize) -> Result<SampleRecord> {
    let fields: Vec<&str> = line.split(DELIMITER).map(str::trim).collect();

    if fields.len() != 2 {
        return Err(PipelineError::manifest(
            line_no,
            format!(
                "expected 2 comma-separated fields (sample_id,source_path), found {}",
                if line.trim().is_empty() { 0 } else { fields.len() }
            ),
        ));
    }

    let (sample_id, source_path) = (fields[0], fields[1]);
    if sample_id.is_empty() {
        return Err(PipelineError::manifest(line_no, "sample id is empty"));
    }
    // The id becomes part of the output file name.
    if sample_id.chars().any(char::is_whitespace) {
        return Err(PipelineError::manifest(
            line_no,
            format!("sample id '{}' contains whitespace", sample_id),
        ));
    }
    if sample_id.contains('/') || sample_id.contains('\\') {
        return Err(PipelineError::manifest(
            line_no,
            format!("sample id '{}' contains a path separator", sample_id),
        ));
    }
    if source_path.is_empty() {
        return Err(PipelineError::manifest(line_no, "source path is empty"));
    }

    Ok(SampleRecord {
        sample_id: sample_id.to_string(),
        source_path: PathBuf::from(source_path),
    })
}
