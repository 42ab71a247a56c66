//! `devsite db-sync` and `devsite db-sanitize`

use anyhow::Result;
use devsite::config::DeployConfig;
use devsite::datasync::SyncTarget;
use devsite::ui::DeployUI;
use std::path::Path;

use super::{collaborators, fetch_project, project_layout};

pub struct DbSyncOptions<'a> {
    pub directory: &'a Path,
    pub project: &'a str,
    pub environment: Option<&'a str>,
    pub app: Option<&'a str>,
    pub no_sanitize: bool,
}

pub async fn cmd_db_sync(config: DeployConfig, opts: DbSyncOptions<'_>) -> Result<()> {
    let services = collaborators(&config);
    let ui = DeployUI::new(config.verbose);
    let layout = project_layout(opts.directory)?;
    let project = fetch_project(services.api.as_ref(), opts.project).await?;

    let target = SyncTarget::resolve(
        services.api.as_ref(),
        &project,
        &layout,
        opts.environment,
        opts.app,
        config.git_default_branch(),
    )
    .await?;

    let spinner = ui.spinner(format!(
        "Importing {} database backup for {}-{}",
        target.environment, project.id, target.app
    ));
    match services.data_sync.sync(&target, opts.no_sanitize).await {
        Ok(()) => spinner.finish_ok(),
        Err(e) => {
            spinner.finish_err("import failed");
            return Err(e);
        }
    }
    ui.success(format!("Database of {} is up to date", project.label()));
    Ok(())
}

pub async fn cmd_db_sanitize(
    config: DeployConfig,
    directory: &Path,
    project_id: &str,
    app: Option<&str>,
) -> Result<()> {
    let services = collaborators(&config);
    let ui = DeployUI::new(config.verbose);
    let layout = project_layout(directory)?;
    let project = fetch_project(services.api.as_ref(), project_id).await?;

    let target = SyncTarget::resolve(
        services.api.as_ref(),
        &project,
        &layout,
        None,
        app,
        config.git_default_branch(),
    )
    .await?;

    ui.step(format!("Sanitizing database of {}", project.label()));
    services.data_sync.sanitize(&target).await?;
    ui.success("Database sanitized");
    Ok(())
}
