//! Imports the remote database backup into the local stack.
//!
//! Backups are cached per day in the configured cache directory:
//! `<cache>/<YYYY-MM-DD>_<site slug>.sql`. A cache hit skips the download.

use crate::api::ApiClient;
use crate::app_config::AppConfig;
use crate::config::{DataSyncSection, StackSection};
use crate::errors::DeployError;
use crate::layout::PathLayout;
use crate::process::{ProcessRunner, argv};
use crate::settings_file::{DatabaseSettings, site_slug};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::Local;
use devsite_common::Project;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Where a database comes from and where it is used.
#[derive(Debug, Clone)]
pub struct SyncTarget {
    pub project: Project,
    pub environment: String,
    pub app: String,
    /// Drupal root used for drush commands.
    pub www_dir: PathBuf,
}

impl SyncTarget {
    /// Resolve the backup source for a project laid out at `layout`.
    ///
    /// An explicit `environment` must exist in the project; otherwise the
    /// default branch is used. The app name comes from the application
    /// definition unless given.
    pub async fn resolve(
        api: &dyn ApiClient,
        project: &Project,
        layout: &PathLayout,
        environment: Option<&str>,
        app: Option<&str>,
        default_branch: &str,
    ) -> Result<Self, DeployError> {
        let environment = match environment {
            Some(id) => {
                api.get_environment(project, id)
                    .await?
                    .ok_or_else(|| {
                        DeployError::Configuration(format!(
                            "Environment '{}' not found in project {}",
                            id, project.id
                        ))
                    })?
                    .id
            }
            None => default_branch.to_string(),
        };
        let app = match app {
            Some(app) => app.to_string(),
            None => AppConfig::load(&layout.app_config_path())?.name,
        };

        Ok(Self {
            project: project.clone(),
            environment,
            app,
            www_dir: layout.www_dir.clone(),
        })
    }
}

#[async_trait]
pub trait DataSync: Send + Sync {
    /// Replace the local database with the latest backup, then sanitize it
    /// unless `no_sanitize`.
    async fn sync(&self, target: &SyncTarget, no_sanitize: bool) -> Result<()>;

    /// Scrub user data from the local database.
    async fn sanitize(&self, target: &SyncTarget) -> Result<()>;
}

/// [`DataSync`] backed by scp, gunzip, the mysql CLI and drush.
pub struct MysqlDataSync {
    runner: Arc<dyn ProcessRunner>,
    stack: StackSection,
    settings: DataSyncSection,
    cache_dir: PathBuf,
    timeout: Duration,
}

impl MysqlDataSync {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        stack: StackSection,
        settings: DataSyncSection,
        cache_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            stack,
            settings,
            cache_dir: cache_dir.into(),
            timeout,
        }
    }

    pub fn backup_path(&self, project: &Project) -> PathBuf {
        self.cache_dir.join(format!(
            "{}_{}.sql",
            Local::now().format("%Y-%m-%d"),
            site_slug(project)
        ))
    }

    fn expand(&self, template: &str, target: &SyncTarget) -> String {
        template
            .replace("{project}", &target.project.id)
            .replace("{environment}", &target.environment)
            .replace("{app}", &target.app)
            .replace("{region}", &target.project.region)
    }

    /// Fetch today's backup into the cache unless it is already there.
    async fn fetch_backup(&self, target: &SyncTarget, backup: &Path) -> Result<()> {
        if backup.exists() {
            tracing::info!(backup = %backup.display(), "using cached backup");
            return Ok(());
        }
        std::fs::create_dir_all(&self.cache_dir)
            .with_context(|| format!("Failed to create {}", self.cache_dir.display()))?;

        let compressed = PathBuf::from(format!("{}.gz", backup.display()));
        let remote = format!(
            "{}:{}",
            self.expand(&self.settings.ssh_target_template, target),
            self.expand(&self.settings.remote_backup_path, target)
        );
        tracing::info!(remote = %remote, backup = %backup.display(), "downloading backup");

        let scp = argv(["scp".to_string(), remote, compressed.to_string_lossy().into_owned()]);
        let copied = self.runner.run(&scp, &self.cache_dir, self.timeout).await?;
        if copied.success() {
            let gunzip = argv(["gunzip".to_string(), compressed.to_string_lossy().into_owned()]);
            let unpacked = self.runner.run(&gunzip, &self.cache_dir, self.timeout).await?;
            if !unpacked.success() {
                tracing::warn!(reason = %unpacked.failure_reason(), "gunzip failed");
            }
        } else {
            tracing::warn!(reason = %copied.failure_reason(), "backup download failed");
        }

        if !backup.exists() {
            let mut dump: Vec<String> = self
                .settings
                .dump_command
                .split_whitespace()
                .map(str::to_string)
                .collect();
            dump.extend(argv([
                "--project".to_string(),
                target.project.id.clone(),
                "--environment".to_string(),
                target.environment.clone(),
                "--app".to_string(),
                target.app.clone(),
                "--file".to_string(),
                backup.to_string_lossy().into_owned(),
            ]));
            tracing::info!("falling back to a fresh database dump");
            let dumped = self.runner.run(&dump, &self.cache_dir, self.timeout).await?;
            if !dumped.success() {
                tracing::warn!(reason = %dumped.failure_reason(), "database dump failed");
            }
        }
        Ok(())
    }

    fn mysql_root_args(&self) -> Vec<String> {
        let mut args = vec![
            "mysql".to_string(),
            format!("-h{}", self.stack.mysql_host),
            format!("-P{}", self.stack.mysql_port),
            format!("-u{}", self.stack.mysql_root_user),
        ];
        // A bare `-p` would prompt.
        if !self.stack.mysql_root_password.is_empty() {
            args.push(format!("-p{}", self.stack.mysql_root_password));
        }
        args
    }

    async fn recreate_database(&self, db: &DatabaseSettings) -> Result<()> {
        let account = format!("'{}'@'{}'", db.username, db.host);
        let statements = [
            format!("DROP DATABASE IF EXISTS `{}`", db.database),
            format!("CREATE DATABASE IF NOT EXISTS `{}`", db.database),
            format!(
                "CREATE USER IF NOT EXISTS {} IDENTIFIED BY '{}'",
                account, db.password
            ),
            format!(
                "GRANT SELECT, INSERT, UPDATE, DELETE, CREATE, DROP, INDEX, ALTER ON `{}`.* TO {}",
                db.database, account
            ),
        ];

        let mut args = self.mysql_root_args();
        args.push("-e".to_string());
        args.push(statements.join("; "));
        let output = self.runner.run(&args, &self.cache_dir, self.timeout).await?;
        if !output.success() {
            bail!(
                "Could not prepare database {}: {}",
                db.database,
                output.failure_reason()
            );
        }
        Ok(())
    }

    async fn import(&self, db: &DatabaseSettings, backup: &Path) -> Result<()> {
        let mut args = self.mysql_root_args();
        args.push("--database".to_string());
        args.push(db.database.clone());
        let command = format!(
            "{} < {}",
            args.iter()
                .map(|a| shell_quote(a))
                .collect::<Vec<_>>()
                .join(" "),
            shell_quote(&backup.to_string_lossy())
        );

        tracing::info!(database = %db.database, backup = %backup.display(), "importing backup");
        let output = self
            .runner
            .run_shell(&command, &self.cache_dir, self.timeout)
            .await?;
        if !output.success() {
            bail!("Import into {} failed: {}", db.database, output.failure_reason());
        }
        Ok(())
    }
}

#[async_trait]
impl DataSync for MysqlDataSync {
    async fn sync(&self, target: &SyncTarget, no_sanitize: bool) -> Result<()> {
        let backup = self.backup_path(&target.project);
        self.fetch_backup(target, &backup).await?;

        let size = std::fs::metadata(&backup).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            bail!(
                "Backup for {} could not be downloaded. Try again later.",
                target.project.id
            );
        }

        let db = DatabaseSettings::for_project(&self.stack, &target.project);
        self.recreate_database(&db).await?;
        self.import(&db, &backup).await?;

        if !no_sanitize {
            self.sanitize(target).await?;
        }
        Ok(())
    }

    async fn sanitize(&self, target: &SyncTarget) -> Result<()> {
        let args = argv(["drush", "-y", "sql-sanitize", "--sanitize-password=password"]);
        tracing::info!(project = %target.project.id, "sanitizing database");
        let output = self.runner.run(&args, &target.www_dir, self.timeout).await?;
        if !output.success() {
            bail!("Sanitization failed: {}", output.failure_reason());
        }
        Ok(())
    }
}

/// Single-quote `value` for `sh`.
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@%+".contains(c))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}
