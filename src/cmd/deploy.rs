//! `devsite deploy`

use anyhow::{Result, bail};
use console::style;
use devsite::config::DeployConfig;
use devsite::orchestrator::{BuildOrchestrator, BuildSettings, DeployReport};
use devsite::ui::DeployUI;

use super::super::DeployArgs;
use super::{collaborators, fetch_project};

impl DeployArgs {
    pub fn to_settings(&self) -> BuildSettings {
        BuildSettings {
            db_sync: self.db_sync,
            core_branch: self.core_branch.clone(),
            environment: self.environment.clone(),
            no_archive: self.no_archive,
            no_deploy_hooks: self.no_deploy_hooks,
            no_git_pull: self.no_git_pull,
            no_reindex: self.no_reindex,
            no_sanitize: self.no_sanitize,
            no_unclean_features: self.no_unclean_features,
            copy: self.copy,
            absolute_links: self.abslinks,
        }
    }
}

pub async fn cmd_deploy(config: DeployConfig, args: &DeployArgs) -> Result<()> {
    let services = collaborators(&config);
    let project = fetch_project(services.api.as_ref(), &args.project).await?;
    let settings = args.to_settings();
    let verbose = config.verbose;
    let orchestrator = BuildOrchestrator::new(config, services, DeployUI::new(verbose));

    // Dropping the deploy future on Ctrl-C restores a patched manifest.
    let result = tokio::select! {
        result = orchestrator.run(&project, &settings) => result,
        _ = tokio::signal::ctrl_c() => {
            bail!("Deployment of {} interrupted", project.label());
        }
    };

    let report = match result {
        Ok(report) => report,
        Err(failure) => {
            orchestrator.ui().failure(format!("{:#}", anyhow::Error::from(failure)));
            bail!("Deployment of {} failed", project.label());
        }
    };
    print_summary(&report);
    Ok(())
}

fn print_summary(report: &DeployReport) {
    println!();
    println!("{}", style("Deployment complete").green().bold());
    if let Some(profile) = &report.profile {
        println!("  profile:       {}", profile);
        println!("  links created: {}", report.links_created);
    }
    println!("  database:      {}", if report.db_synced { "synced" } else { "unchanged" });
    println!("  hooks run:     {}", report.hooks_run);
    println!("  old builds:    {} removed", report.builds_removed);
    if !report.warnings.is_empty() {
        println!("  warnings:      {}", report.warnings.len());
    }
    println!("  url:           {}", style(&report.site_url).cyan());
    println!();
}
