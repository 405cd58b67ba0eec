//! Installation checks for the external tools.

use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Limit for `--version` probes.
const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Ok,
    Failed,
}

/// Result of a single check.
#[derive(Debug, Clone)]
pub struct SetupCheck {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

impl SetupCheck {
    fn ok(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Ok,
            detail: detail.into(),
        }
    }

    fn failed(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Failed,
            detail: detail.into(),
        }
    }
}

/// All checks from one verification run.
#[derive(Debug, Clone, Default)]
pub struct SetupReport {
    pub checks: Vec<SetupCheck>,
}

impl SetupReport {
    pub fn is_ok(&self) -> bool {
        self.checks.iter().all(|c| c.status == CheckStatus::Ok)
    }

    pub fn failures(&self) -> impl Iterator<Item = &SetupCheck> {
        self.checks.iter().filter(|c| c.status == CheckStatus::Failed)
    }

    fn push(&mut self, check: SetupCheck) {
        match check.status {
            CheckStatus::Ok => tracing::info!("{} - {}", check.name, check.detail),
            CheckStatus::Failed => tracing::error!("{} - {}", check.name, check.detail),
        }
        self.checks.push(check);
    }
}

impl fmt::Display for SetupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for check in &self.checks {
            let mark = match check.status {
                CheckStatus::Ok => "ok",
                CheckStatus::Failed => "FAILED",
            };
            writeln!(f, "[{:>6}] {}: {}", mark, check.name, check.detail)?;
        }
        if self.is_ok() {
            write!(f, "Setup verification passed")
        } else {
            write!(
                f,
                "Setup verification failed ({} problem(s))",
                self.failures().count()
            )
        }
    }
}

/// Check that `tool_dir/binary` exists, is executable and answers `--version`.
///
/// Later checks are skipped once an earlier one fails.
pub async fn verify_setup(tool_dir: &Path, binary: &str) -> SetupReport {
    let mut report = SetupReport::default();

    if !tool_dir.is_dir() {
        report.push(SetupCheck::failed(
            "tool directory",
            format!("{} is not a directory", tool_dir.display()),
        ));
        return report;
    }
    report.push(SetupCheck::ok("tool directory", tool_dir.display().to_string()));

    let tool = tool_dir.join(binary);
    if !tool.is_file() {
        report.push(SetupCheck::failed(
            binary,
            format!("not found at {}", tool.display()),
        ));
        return report;
    }

    if !is_executable(&tool) {
        report.push(SetupCheck::failed(
            binary,
            format!("{} is not executable (chmod +x)", tool.display()),
        ));
        return report;
    }
    report.push(SetupCheck::ok(binary, tool.display().to_string()));

    let mut probe = Command::new(&tool);
    probe
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let check_name = format!("{} --version", binary);
    match tokio::time::timeout(VERSION_TIMEOUT, probe.output()).await {
        Ok(Ok(output)) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let version = stdout.lines().next().unwrap_or("unknown version").trim().to_string();
            report.push(SetupCheck::ok(check_name, version));
        }
        Ok(Ok(output)) => {
            report.push(SetupCheck::failed(
                check_name,
                format!("exited with {}", output.status),
            ));
        }
        Ok(Err(e)) => report.push(SetupCheck::failed(check_name, e.to_string())),
        Err(_) => report.push(SetupCheck::failed(
            check_name,
            format!("no answer within {}s", VERSION_TIMEOUT.as_secs()),
        )),
    }

    report
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
