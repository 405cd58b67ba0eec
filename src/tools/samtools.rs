//! samtools-backed filter and index stages.

use super::{AlignmentTools, FailureCause};
use crate::job::FilterJob;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Lines of tool stderr kept in failure logs.
const STDERR_TAIL_LINES: usize = 5;

/// Runs `samtools view` and `samtools index` from each job's tool path.
///
/// Cancelling the abort token kills every invocation still running.
#[derive(Debug, Clone, Default)]
pub struct Samtools {
    abort: CancellationToken,
}

impl Samtools {
    pub fn new(abort: CancellationToken) -> Self {
        Self { abort }
    }
}

#[async_trait]
impl AlignmentTools for Samtools {
    async fn filter(&self, job: &FilterJob) -> Result<(), FailureCause> {
        run_tool(job.tool_path(), &filter_args(job), job.timeout(), &self.abort).await
    }

    async fn index(&self, job: &FilterJob) -> Result<(), FailureCause> {
        run_tool(job.tool_path(), &index_args(job), job.timeout(), &self.abort).await
    }
}

/// `view -b -q <Q> -h -o <out> <in> <region>`
pub fn filter_args(job: &FilterJob) -> Vec<OsString> {
    vec![
        "view".into(),
        "-b".into(),
        "-q".into(),
        job.quality_threshold().to_string().into(),
        "-h".into(),
        "-o".into(),
        job.output_path().into_os_string(),
        job.source_path().as_os_str().to_owned(),
        job.region().as_str().into(),
    ]
}

/// `index <out>`
pub fn index_args(job: &FilterJob) -> Vec<OsString> {
    vec!["index".into(), job.output_path().into_os_string()]
}

/// Run one external command to completion.
///
/// stdout is discarded, stderr is captured for diagnostics. The child is killed
/// once `timeout` passes or `abort` is cancelled.
pub async fn run_tool(
    program: &Path,
    args: &[OsString],
    timeout: Option<Duration>,
    abort: &CancellationToken,
) -> Result<(), FailureCause> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Own process group: a terminal Ctrl-C interrupts bam-prep, not the running tools.
    #[cfg(unix)]
    cmd.process_group(0);

    tracing::debug!("Executing {} {:?}", program.display(), args);

    let child = cmd.spawn().map_err(|e| FailureCause::Launch {
        message: format!("{}: {}", program.display(), e),
    })?;

    // Dropping this future drops the child, which kills it.
    let wait = async move {
        let output = match timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| FailureCause::TimedOut {
                    millis: limit.as_millis() as u64,
                })?,
            None => child.wait_with_output().await,
        };
        output.map_err(|e| FailureCause::Io {
            message: format!("waiting for {}: {}", program.display(), e),
        })
    };

    let output = tokio::select! {
        output = wait => output?,
        _ = abort.cancelled() => {
            return Err(FailureCause::Aborted {
                message: format!("{} killed on shutdown", program.display()),
            });
        }
    };

    if output.status.success() {
        return Ok(());
    }

    let stderr = stderr_tail(&String::from_utf8_lossy(&output.stderr));
    Err(match output.status.code() {
        Some(code) => FailureCause::ExitCode { code, stderr },
        None => FailureCause::Signalled { stderr },
    })
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}
