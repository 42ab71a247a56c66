//! Deploy hooks declared by the application.
//!
//! The hook list is the newline-delimited `hooks.deploy` script of
//! `.platform.app.yaml`. Locally the site is served from the web root, so the
//! `cd public` line that hosted deployments need is dropped.
//!
//! Database update commands (`drush updb`) are run through the shell; every
//! other line is split on whitespace and executed directly.

use crate::errors::DeployError;
use crate::process::ProcessRunner;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const SKIPPED_LINE: &str = "cd public";
const SHELL_MARKER: &str = "updb";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookCommand {
    Shell(String),
    Argv(Vec<String>),
}

impl HookCommand {
    pub fn display(&self) -> String {
        match self {
            HookCommand::Shell(line) => line.clone(),
            HookCommand::Argv(args) => args.join(" "),
        }
    }
}

pub fn parse_hooks(list: &str) -> Vec<HookCommand> {
    list.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && *line != SKIPPED_LINE)
        .map(|line| {
            if line.to_lowercase().contains(SHELL_MARKER) {
                HookCommand::Shell(line.to_string())
            } else {
                HookCommand::Argv(line.split_whitespace().map(str::to_string).collect())
            }
        })
        .collect()
}

pub struct HookRunner {
    runner: Arc<dyn ProcessRunner>,
    timeout: Duration,
}

impl HookRunner {
    pub fn new(runner: Arc<dyn ProcessRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    /// Run every hook in `list` from `cwd`, stopping at the first failure.
    ///
    /// Returns how many hooks ran.
    pub async fn run(&self, list: &str, cwd: &Path) -> Result<usize, DeployError> {
        let hooks = parse_hooks(list);
        if hooks.is_empty() {
            tracing::info!("no deploy hooks to run");
            return Ok(0);
        }

        for hook in &hooks {
            let command = hook.display();
            tracing::info!(hook = %command, "running deploy hook");

            let output = match hook {
                HookCommand::Shell(line) => self.runner.run_shell(line, cwd, self.timeout).await,
                HookCommand::Argv(args) => self.runner.run(args, cwd, self.timeout).await,
            }
            .map_err(|e| DeployError::HookFailed {
                command: command.clone(),
                reason: format!("{:#}", e),
            })?;

            if !output.success() {
                return Err(DeployError::HookFailed {
                    command,
                    reason: output.failure_reason(),
                });
            }
        }
        Ok(hooks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessOutput;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeRunner {
        calls: Mutex<Vec<String>>,
        failing: Option<&'static str>,
    }

    impl FakeRunner {
        fn record(&self, call: String) -> ProcessOutput {
            let fail = self.failing.is_some_and(|f| call.ends_with(f));
            self.calls.lock().unwrap().push(call);
            if fail {
                ProcessOutput::failed(1, "Database update failed")
            } else {
                ProcessOutput::succeeded()
            }
        }
    }

    #[async_trait]
    impl ProcessRunner for FakeRunner {
        async fn run(&self, argv: &[String], _: &Path, _: Duration) -> Result<ProcessOutput> {
            Ok(self.record(format!("argv:{}", argv.join(" "))))
        }

        async fn run_shell(&self, command: &str, _: &Path, _: Duration) -> Result<ProcessOutput> {
            Ok(self.record(format!("shell:{}", command)))
        }
    }

    #[test]
    fn test_parse_hooks_dispatch() {
        let hooks = parse_hooks("cd public\nupdb -y\ncc all");
        assert_eq!(
            hooks,
            vec![
                HookCommand::Shell("updb -y".to_string()),
                HookCommand::Argv(vec!["cc".to_string(), "all".to_string()]),
            ]
        );
    }

    #[test]
    fn test_parse_hooks_trims_and_skips_blank() {
        let hooks = parse_hooks("\n  drush UPDB -y  \n\n   \n  cd public \ndrush  cc   all\n");
        assert_eq!(
            hooks,
            vec![
                HookCommand::Shell("drush UPDB -y".to_string()),
                HookCommand::Argv(vec!["drush".into(), "cc".into(), "all".into()]),
            ]
        );
    }

    #[tokio::test]
    async fn test_run_in_order() {
        let runner = Arc::new(FakeRunner::default());
        let hooks = HookRunner::new(runner.clone(), Duration::from_secs(5));
        let ran = hooks
            .run("cd public\nupdb -y\ncc all", Path::new("/tmp"))
            .await
            .unwrap();

        assert_eq!(ran, 2);
        assert_eq!(
            *runner.calls.lock().unwrap(),
            vec!["shell:updb -y", "argv:cc all"]
        );
    }

    #[tokio::test]
    async fn test_failing_hook_stops_list() {
        let runner = Arc::new(FakeRunner {
            failing: Some("updb -y"),
            ..Default::default()
        });
        let hooks = HookRunner::new(runner.clone(), Duration::from_secs(5));
        let err = hooks
            .run("cd public\nupdb -y\ncc all", Path::new("/tmp"))
            .await
            .unwrap_err();

        match err {
            DeployError::HookFailed { command, reason } => {
                assert_eq!(command, "updb -y");
                assert!(reason.contains("exit code 1"));
            }
            other => panic!("Expected HookFailed, got {other:?}"),
        }
        assert_eq!(*runner.calls.lock().unwrap(), vec!["shell:updb -y"]);
    }

    #[tokio::test]
    async fn test_empty_list_runs_nothing() {
        let runner = Arc::new(FakeRunner::default());
        let hooks = HookRunner::new(runner.clone(), Duration::from_secs(5));
        assert_eq!(hooks.run("", Path::new("/tmp")).await.unwrap(), 0);
        assert!(runner.calls.lock().unwrap().is_empty());
    }
}
