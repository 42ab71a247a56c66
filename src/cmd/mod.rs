//! CLI command implementations.
//!
//! | Module     | Commands handled         |
//! |------------|--------------------------|
//! | `deploy`   | `Deploy`                 |
//! | `database` | `DbSync`, `DbSanitize`   |
//! | `clean`    | `Clean`                  |
//! | `config`   | `Config`                 |

pub mod clean;
pub mod config;
pub mod database;
pub mod deploy;

pub use clean::cmd_clean;
pub use config::cmd_config;
pub use database::{cmd_db_sanitize, cmd_db_sync};
pub use deploy::cmd_deploy;

use anyhow::{Context, Result};
use devsite::api::{ApiClient, RestApiClient};
use devsite::builder::CommandBuildExecutor;
use devsite::config::DeployConfig;
use devsite::datasync::MysqlDataSync;
use devsite::layout::PathLayout;
use devsite::orchestrator::Collaborators;
use devsite::process::TokioProcessRunner;
use devsite::scm::GitCli;
use devsite::search::ElasticsearchClient;
use devsite_common::Project;
use std::path::Path;
use std::sync::Arc;

/// Wire the process- and HTTP-backed collaborators from configuration.
pub fn collaborators(config: &DeployConfig) -> Collaborators {
    let timeout = config.process_timeout();
    let runner = Arc::new(TokioProcessRunner::new(config.verbose));
    let toml = &config.toml;

    Collaborators {
        api: Arc::new(RestApiClient::from_env(toml.api.base_url.clone())),
        scm: Arc::new(GitCli::new(runner.clone(), timeout)),
        builder: Arc::new(CommandBuildExecutor::new(
            runner.clone(),
            toml.deploy.build_command.clone(),
            timeout,
        )),
        data_sync: Arc::new(MysqlDataSync::new(
            runner.clone(),
            toml.stack.clone(),
            toml.datasync.clone(),
            toml.paths.db_backup_cache.clone(),
            timeout,
        )),
        search: Arc::new(ElasticsearchClient::new()),
        runner,
    }
}

/// Layout of an existing project directory given on the command line.
pub fn project_layout(directory: &Path) -> Result<PathLayout> {
    let root = directory
        .canonicalize()
        .with_context(|| format!("Project directory {} not found", directory.display()))?;
    Ok(PathLayout::from_root(&root)?)
}

pub async fn fetch_project(api: &dyn ApiClient, id: &str) -> Result<Project> {
    api.get_project(id)
        .await
        .with_context(|| format!("Failed to load project '{}'", id))
}
