//! External process execution.
//!
//! Every command the orchestrator runs (git, the build executor, drush, mysql)
//! goes through a [`ProcessRunner`] so tests can substitute a fake.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Result of one external process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was killed by a signal or timed out.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn succeeded() -> Self {
        Self {
            exit_code: Some(0),
            ..Default::default()
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stderr: stderr.into(),
            ..Default::default()
        }
    }

    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Short description of why the process failed, for error messages.
    pub fn failure_reason(&self) -> String {
        if self.timed_out {
            return "timed out".to_string();
        }
        let status = match self.exit_code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        };
        let detail = self.stderr.trim();
        if detail.is_empty() {
            status
        } else {
            format!("{}: {}", status, last_lines(detail, 5))
        }
    }
}

fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

/// Runs external processes with a timeout.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `argv[0]` with the remaining arguments in `cwd`.
    async fn run(&self, argv: &[String], cwd: &Path, limit: Duration) -> Result<ProcessOutput>;

    /// Run `command` through `sh -c` in `cwd`.
    async fn run_shell(&self, command: &str, cwd: &Path, limit: Duration)
    -> Result<ProcessOutput>;
}

/// [`ProcessRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct TokioProcessRunner {
    verbose: bool,
}

impl TokioProcessRunner {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    async fn execute(
        &self,
        mut command: Command,
        command_line: &str,
        cwd: &Path,
        limit: Duration,
    ) -> Result<ProcessOutput> {
        if self.verbose {
            eprintln!("[exec] {} (in {})", command_line, cwd.display());
        }
        tracing::debug!(command = %command_line, cwd = %cwd.display(), "spawning process");

        let child = command
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn '{}'", command_line))?;

        // The child is killed when the timed-out future drops it.
        let output = match timeout(limit, child.wait_with_output()).await {
            Ok(result) => {
                result.with_context(|| format!("Failed to wait for '{}'", command_line))?
            }
            Err(_) => {
                tracing::warn!(
                    command = %command_line,
                    secs = limit.as_secs(),
                    "process timed out"
                );
                return Ok(ProcessOutput {
                    exit_code: None,
                    timed_out: true,
                    ..Default::default()
                });
            }
        };

        let result = ProcessOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            timed_out: false,
        };
        tracing::debug!(command = %command_line, exit_code = ?result.exit_code, "process finished");
        Ok(result)
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, argv: &[String], cwd: &Path, limit: Duration) -> Result<ProcessOutput> {
        let (program, args) = argv
            .split_first()
            .context("Cannot run an empty command line")?;
        let mut command = Command::new(program);
        command.args(args);
        self.execute(command, &argv.join(" "), cwd, limit).await
    }

    async fn run_shell(
        &self,
        command: &str,
        cwd: &Path,
        limit: Duration,
    ) -> Result<ProcessOutput> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        self.execute(cmd, command, cwd, limit).await
    }
}

/// Build an argv from string slices.
pub fn argv<I, S>(parts: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    parts.into_iter().map(Into::into).collect()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let dir = tempdir().unwrap();
        let runner = TokioProcessRunner::default();
        let out = runner
            .run(&argv(["echo", "hello"]), dir.path(), Duration::from_secs(10))
            .await
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_shell_reports_exit_code() {
        let dir = tempdir().unwrap();
        let runner = TokioProcessRunner::default();
        let out = runner
            .run_shell("echo oops >&2; exit 3", dir.path(), Duration::from_secs(10))
            .await
            .unwrap();
        assert!(!out.success());
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.failure_reason(), "exit code 3: oops");
    }

    #[tokio::test]
    async fn test_run_in_cwd() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let runner = TokioProcessRunner::default();
        let out = runner
            .run_shell("ls", dir.path(), Duration::from_secs(10))
            .await
            .unwrap();
        assert!(out.stdout.contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_timeout_is_failure() {
        let dir = tempdir().unwrap();
        let runner = TokioProcessRunner::default();
        let out = runner
            .run_shell("sleep 5", dir.path(), Duration::from_millis(100))
            .await
            .unwrap();
        assert!(out.timed_out);
        assert!(!out.success());
        assert_eq!(out.failure_reason(), "timed out");
    }

    #[tokio::test]
    async fn test_empty_argv_is_error() {
        let dir = tempdir().unwrap();
        let runner = TokioProcessRunner::default();
        assert!(
            runner
                .run(&[], dir.path(), Duration::from_secs(1))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_missing_program_is_error() {
        let dir = tempdir().unwrap();
        let runner = TokioProcessRunner::default();
        let result = runner
            .run(
                &argv(["definitely-not-a-real-binary-xyz"]),
                dir.path(),
                Duration::from_secs(1),
            )
            .await;
        assert!(result.is_err());
    }
}
