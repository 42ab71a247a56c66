//! The external build executor that assembles a web root from a repository.

use crate::manifest::is_drush_make_project;
use crate::process::ProcessRunner;
use anyhow::{Result, bail};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const DRUSH_CONCURRENCY: u32 = 4;

/// Options passed to the build executor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    pub no_archive: bool,
    pub copy: bool,
    pub absolute_links: bool,
    /// Only set for drush-make projects.
    pub drush_concurrency: Option<u32>,
}

impl BuildOptions {
    /// Probe `repository_dir` for the options its toolstack supports.
    pub fn probe(
        repository_dir: &Path,
        no_archive: bool,
        copy: bool,
        absolute_links: bool,
    ) -> Self {
        let drush_concurrency = is_drush_make_project(repository_dir).then_some(DRUSH_CONCURRENCY);
        Self {
            no_archive,
            copy,
            absolute_links,
            drush_concurrency,
        }
    }

    /// Command-line flags for the given source directory and destination.
    pub fn to_args(&self, source_dir: &Path, dest_dir: &Path) -> Vec<String> {
        let mut args = vec![
            "--yes".to_string(),
            "--source".to_string(),
            source_dir.to_string_lossy().into_owned(),
            "--destination".to_string(),
            dest_dir.to_string_lossy().into_owned(),
        ];
        if self.no_archive {
            args.push("--no-archive".to_string());
        }
        if self.copy {
            args.push("--copy".to_string());
        }
        if self.absolute_links {
            args.push("--abslinks".to_string());
        }
        if let Some(concurrency) = self.drush_concurrency {
            args.push("--concurrency".to_string());
            args.push(concurrency.to_string());
        }
        args
    }
}

#[async_trait]
pub trait BuildExecutor: Send + Sync {
    /// Build `source_dir` into `dest_dir`. `Ok(false)` means the build ran and failed.
    async fn build(&self, source_dir: &Path, dest_dir: &Path, options: &BuildOptions)
    -> Result<bool>;
}

/// [`BuildExecutor`] that runs a configured command line (`platform local:build`).
pub struct CommandBuildExecutor {
    runner: Arc<dyn ProcessRunner>,
    command: String,
    timeout: Duration,
}

impl CommandBuildExecutor {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        command: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            command: command.into(),
            timeout,
        }
    }
}

#[async_trait]
impl BuildExecutor for CommandBuildExecutor {
    async fn build(
        &self,
        source_dir: &Path,
        dest_dir: &Path,
        options: &BuildOptions,
    ) -> Result<bool> {
        if source_dir.starts_with(dest_dir) {
            bail!(
                "Build destination {} conflicts with source {}",
                dest_dir.display(),
                source_dir.display()
            );
        }

        let mut argv: Vec<String> = self.command.split_whitespace().map(str::to_string).collect();
        if argv.is_empty() {
            bail!("No build command configured");
        }
        argv.extend(options.to_args(source_dir, dest_dir));

        let output = self.runner.run(&argv, source_dir, self.timeout).await?;
        if !output.success() {
            tracing::warn!(
                command = %argv.join(" "),
                reason = %output.failure_reason(),
                "build command failed"
            );
        }
        Ok(output.success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessOutput;
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct RecordingRunner {
        argv: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ProcessRunner for RecordingRunner {
        async fn run(&self, argv: &[String], _: &Path, _: Duration) -> Result<ProcessOutput> {
            *self.argv.lock().unwrap() = argv.to_vec();
            Ok(ProcessOutput::succeeded())
        }

        async fn run_shell(&self, _: &str, _: &Path, _: Duration) -> Result<ProcessOutput> {
            unreachable!()
        }
    }

    #[test]
    fn test_probe_drush_make_project() {
        let dir = tempdir().unwrap();
        assert_eq!(
            BuildOptions::probe(dir.path(), false, false, false).drush_concurrency,
            None
        );
        std::fs::write(dir.path().join("project.make"), "core = 7.x\n").unwrap();
        assert_eq!(
            BuildOptions::probe(dir.path(), true, false, false).drush_concurrency,
            Some(4)
        );
    }

    #[tokio::test]
    async fn test_command_line() {
        let runner = Arc::new(RecordingRunner::default());
        let executor = CommandBuildExecutor::new(
            runner.clone(),
            "platform local:build",
            Duration::from_secs(5),
        );
        let options = BuildOptions {
            no_archive: true,
            copy: false,
            absolute_links: true,
            drush_concurrency: Some(4),
        };

        let ok = executor
            .build(Path::new("/sites/acme"), Path::new("/sites/acme/_www"), &options)
            .await
            .unwrap();
        assert!(ok);
        assert_eq!(
            *runner.argv.lock().unwrap(),
            vec![
                "platform",
                "local:build",
                "--yes",
                "--source",
                "/sites/acme",
                "--destination",
                "/sites/acme/_www",
                "--no-archive",
                "--abslinks",
                "--concurrency",
                "4",
            ]
        );
    }

    #[tokio::test]
    async fn test_destination_containing_source_rejected() {
        let runner = Arc::new(RecordingRunner::default());
        let executor =
            CommandBuildExecutor::new(runner, "platform local:build", Duration::from_secs(5));
        let result = executor
            .build(
                Path::new("/sites/acme/www/src"),
                Path::new("/sites/acme/www"),
                &BuildOptions::default(),
            )
            .await;
        assert!(result.is_err());
    }
}
