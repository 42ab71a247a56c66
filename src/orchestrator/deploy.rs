//! The ten-step local deployment.
//!
//! Steps run strictly in order; each is awaited before the next starts. A
//! fatal error stops the run and is reported with the step it happened in.
//! Anything the site can be served without (search indices, the remote file
//! mount, the unclean-features report) only produces a warning.

use super::context::DeploymentContext;
use super::settings::BuildSettings;
use crate::api::ApiClient;
use crate::app_config::AppConfig;
use crate::builder::{BuildExecutor, BuildOptions};
use crate::clean::clean_builds;
use crate::config::DeployConfig;
use crate::datasync::{DataSync, SyncTarget};
use crate::errors::{AtStep, DeployError, DeployFailure, DeployStep};
use crate::fetch::FetchCoordinator;
use crate::hooks::HookRunner;
use crate::layout::{self, PathLayout};
use crate::manifest::{self, ManifestGuard};
use crate::process::ProcessRunner;
use crate::scm::ScmClient;
use crate::search::{ELASTICSEARCH_MODULE, IndexProvisioner, SearchIndex};
use crate::settings_file::{DatabaseSettings, write_settings_file};
use crate::symlinks;
use crate::ui::DeployUI;
use crate::updater::RepositoryUpdater;
use anyhow::Context;
use devsite_common::Project;
use std::sync::Arc;

/// Builds to keep after a successful deploy.
const BUILDS_TO_KEEP: usize = 1;

/// External services a deployment talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub api: Arc<dyn ApiClient>,
    pub scm: Arc<dyn ScmClient>,
    pub runner: Arc<dyn ProcessRunner>,
    pub builder: Arc<dyn BuildExecutor>,
    pub data_sync: Arc<dyn DataSync>,
    pub search: Arc<dyn SearchIndex>,
}

/// Summary of a successful deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployReport {
    pub site_url: String,
    pub site_fetched: bool,
    pub profile: Option<String>,
    pub profile_fetched: bool,
    pub legacy: bool,
    pub db_synced: bool,
    pub sanitized: bool,
    pub links_created: usize,
    pub indices_created: Vec<String>,
    pub hooks_run: usize,
    pub builds_removed: usize,
    pub warnings: Vec<String>,
}

pub struct BuildOrchestrator {
    config: DeployConfig,
    services: Collaborators,
    ui: DeployUI,
}

impl BuildOrchestrator {
    pub fn new(config: DeployConfig, services: Collaborators, ui: DeployUI) -> Self {
        Self {
            config,
            services,
            ui,
        }
    }

    pub fn ui(&self) -> &DeployUI {
        &self.ui
    }

    fn fetcher(&self) -> FetchCoordinator {
        FetchCoordinator::new(
            self.services.scm.clone(),
            self.config.profiles_root(),
            self.config.git_default_branch(),
        )
    }

    fn warn(&self, report: &mut DeployReport, step: DeployStep, msg: String) {
        tracing::warn!(step = %step, "{}", msg);
        let msg = format!("{}: {}", step, msg);
        self.ui.warn(&msg);
        report.warnings.push(msg);
    }

    pub async fn run(
        &self,
        project: &Project,
        settings: &BuildSettings,
    ) -> Result<DeployReport, DeployFailure> {
        let mut report = DeployReport::default();
        self.ui
            .step(format!("Deployment started for {}", project.label()));
        tracing::info!(project = %project.id, ?settings, "deployment started");

        // 1. Layout
        let (site_code, root_dir) = self.prepare_roots(project).at_step(DeployStep::Layout)?;

        // 2. First-time check
        let mut ctx = self
            .first_time_check(project, settings, &site_code, &root_dir)
            .await
            .at_step(DeployStep::FirstTimeCheck)?;
        report.site_fetched = ctx.site_just_fetched;
        report.legacy = ctx.legacy();

        // 3. Profile discovery
        self.discover_profile(&mut ctx)
            .await
            .at_step(DeployStep::ProfileDiscovery)?;
        report.profile = ctx.profile.as_ref().map(|p| p.name.clone());
        report.profile_fetched = ctx.profile_just_fetched;

        // 4. Repository refresh
        if settings.no_git_pull {
            tracing::info!("git pulls suppressed");
        } else {
            self.refresh_repositories(&ctx, settings)
                .await
                .at_step(DeployStep::RepositoryRefresh)?;
        }

        // 5. Data sync, sanitized later
        if ctx.db_sync {
            self.sync_database(project, settings, &mut ctx)
                .await
                .at_step(DeployStep::DataSync)?;
            report.db_synced = true;
        }

        // 6. Build
        report.links_created = self
            .build(project, settings, &ctx)
            .await
            .at_step(DeployStep::Build)?;

        // 7. Search indices
        report.indices_created = self.provision_indices(project, settings, &ctx, &mut report).await;

        // 8. Sanitize
        if ctx.db_sync && !settings.no_sanitize {
            self.sanitize(&ctx).await.at_step(DeployStep::Sanitize)?;
            report.sanitized = true;
        }

        // 9. Deploy hooks
        if settings.no_deploy_hooks {
            tracing::info!("deploy hooks suppressed");
        } else {
            report.hooks_run = self
                .run_hooks(project, &ctx)
                .await
                .at_step(DeployStep::Hooks)?;
        }

        // 10. Finalize
        report.builds_removed = self
            .finalize(settings, &ctx, &mut report)
            .await
            .at_step(DeployStep::Finalize)?;
        report.site_url = self.config.site_url(&ctx.site_code);
        self.ui.site_ready(&report.site_url);
        tracing::info!(project = %project.id, url = %report.site_url, "deployment finished");

        Ok(report)
    }

    fn prepare_roots(
        &self,
        project: &Project,
    ) -> Result<(String, std::path::PathBuf), DeployError> {
        for dir in [self.config.profiles_root(), self.config.sites_root()] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let site_code = self.config.site_code(&project.id);
        let root_dir = layout::project_root(self.config.sites_root(), &site_code)?;
        Ok((site_code, root_dir))
    }

    async fn first_time_check(
        &self,
        project: &Project,
        settings: &BuildSettings,
        site_code: &str,
        root_dir: &std::path::Path,
    ) -> Result<DeploymentContext, DeployError> {
        let mut db_sync = settings.db_sync;
        let mut fetched = false;

        if !layout::is_deployed(root_dir) {
            self.ui
                .step(format!("Fetching {} for the first time", project.label()));
            let git_url = self.config.git_url_for(project);
            fetched = self
                .fetcher()
                .ensure_site(project, &git_url, root_dir)
                .await?
                .fetched();
            if !db_sync {
                tracing::info!("first deploy of this site, database sync forced");
            }
            db_sync = true;
        }

        let layout = PathLayout::resolve(
            self.config.sites_root(),
            site_code,
            layout::detect_legacy(root_dir),
        )?;
        tracing::debug!(?layout, "resolved project layout");

        let mut ctx = DeploymentContext::new(site_code, layout, db_sync);
        ctx.site_just_fetched = fetched;
        Ok(ctx)
    }

    async fn discover_profile(&self, ctx: &mut DeploymentContext) -> Result<(), DeployError> {
        let Some(profile) = manifest::read_profile(&ctx.layout.manifest_path())? else {
            tracing::info!("project declares no distribution profile");
            return Ok(());
        };

        let fetcher = self.fetcher();
        let profile_dir = fetcher.profile_dir(&profile);
        if !profile_dir.exists() {
            self.ui
                .step(format!("Checking out {} for the first time", profile.name));
        }
        ctx.profile_just_fetched = fetcher.ensure_profile(&profile).await?.fetched();
        ctx.profile_dir = Some(profile_dir);
        ctx.profile = Some(profile);
        Ok(())
    }

    async fn refresh_repositories(
        &self,
        ctx: &DeploymentContext,
        settings: &BuildSettings,
    ) -> Result<(), DeployError> {
        let updater =
            RepositoryUpdater::new(self.services.scm.clone(), self.config.git_default_branch());

        if let Some((profile, profile_dir)) = ctx.profile_checkout() {
            if let Some(branch) = &settings.core_branch {
                self.ui.step(format!(
                    "Ignoring local {} repository. Using remote with branch {}",
                    profile.name, branch
                ));
            } else if !ctx.profile_just_fetched {
                let label = updater.update(profile_dir).await?;
                self.ui.step(format!("Updated {}", label));
            }
        }

        if !ctx.site_just_fetched {
            let label = updater.update(&ctx.layout.repository_dir).await?;
            self.ui.step(format!("Updated {}", label));
        }
        Ok(())
    }

    async fn sync_database(
        &self,
        project: &Project,
        settings: &BuildSettings,
        ctx: &mut DeploymentContext,
    ) -> Result<(), DeployError> {
        let target = SyncTarget::resolve(
            self.services.api.as_ref(),
            project,
            &ctx.layout,
            settings.environment.as_deref(),
            None,
            self.config.git_default_branch(),
        )
        .await?;
        let spinner = self.ui.spinner(format!(
            "Importing {} database backup for {}-{}",
            target.environment, project.id, target.app
        ));
        match self.services.data_sync.sync(&target, true).await {
            Ok(()) => spinner.finish_ok(),
            Err(e) => {
                let reason = format!("{:#}", e);
                spinner.finish_err(&reason);
                return Err(DeployError::DataSyncFailed(reason));
            }
        }
        ctx.sync_target = Some(target);
        Ok(())
    }

    /// Patch, build, restore, then link the profile. Returns the link count.
    async fn build(
        &self,
        project: &Project,
        settings: &BuildSettings,
        ctx: &DeploymentContext,
    ) -> Result<usize, DeployError> {
        let layout = &ctx.layout;
        let options = BuildOptions::probe(
            &layout.repository_dir,
            settings.no_archive,
            settings.copy,
            settings.absolute_links,
        );

        let guard = match ctx.profile_checkout() {
            Some((profile, profile_dir)) => {
                let guard = ManifestGuard::acquire(&layout.manifest_path())?;
                guard.apply(profile, &settings.patch_mode(profile_dir))?;
                Some(guard)
            }
            None => None,
        };

        let spinner = self.ui.spinner(format!("Building {}", project.label()));
        let built = self
            .services
            .builder
            .build(&layout.root_dir, &layout.www_dir, &options)
            .await;

        // The manifest goes back before any build error is reported.
        let restored = guard.map(ManifestGuard::restore).transpose();

        let failure = match built {
            Ok(true) => None,
            Ok(false) => Some("build command reported failure".to_string()),
            Err(e) => Some(format!("{:#}", e)),
        };
        let Some(reason) = failure else {
            spinner.finish_ok();
            restored?;
            return self.finish_build(project, settings, ctx);
        };

        spinner.finish_err("build failed");
        let reason = match restored {
            Ok(_) => reason,
            Err(e) => {
                tracing::error!(error = %e, "manifest restore failed after a failed build");
                format!("{}; manifest left unrestored: {}", reason, e)
            }
        };
        Err(DeployError::BuildExecutorFailed(reason))
    }

    /// Settings file and profile links for a successful build. Returns the link count.
    fn finish_build(
        &self,
        project: &Project,
        settings: &BuildSettings,
        ctx: &DeploymentContext,
    ) -> Result<usize, DeployError> {
        let layout = &ctx.layout;

        let db = DatabaseSettings::for_project(&self.config.toml.stack, project);
        write_settings_file(
            &layout.shared_dir(),
            self.config.toml.deploy.settings_template.as_deref(),
            &db,
        )?;

        let Some((profile, profile_dir)) = ctx.profile_checkout() else {
            return Ok(0);
        };
        if !settings.links_profile() {
            return Ok(0);
        }

        let built_profile = layout.profile_in_www(&profile.name);
        let git_dir = built_profile.join(".git");
        symlinks::remove_path(&git_dir)
            .with_context(|| format!("Failed to remove {}", git_dir.display()))?;

        let map = symlinks::plan(&profile.name, profile_dir, &layout.www_dir)
            .with_context(|| format!("Failed to plan links for {}", profile.name))?;
        let links = symlinks::apply(&map)?;
        self.ui.detail(format!(
            "Linked {} paths of {} into the web root",
            links, profile.name
        ));
        Ok(links)
    }

    async fn provision_indices(
        &self,
        project: &Project,
        settings: &BuildSettings,
        ctx: &DeploymentContext,
        report: &mut DeployReport,
    ) -> Vec<String> {
        let Some(profile) = &ctx.profile else {
            return Vec::new();
        };
        let module = ctx
            .layout
            .profile_in_www(&profile.name)
            .join("modules")
            .join("contrib")
            .join(ELASTICSEARCH_MODULE);
        if !module.exists() {
            return Vec::new();
        }

        let provisioner = IndexProvisioner::new(
            self.services.runner.clone(),
            self.services.search.clone(),
            self.config.toml.stack.clone(),
            self.config.process_timeout(),
        );
        let db = DatabaseSettings::for_project(&self.config.toml.stack, project);
        let created = match provisioner.provision(&db.database, &ctx.layout.www_dir).await {
            Ok(created) => created,
            Err(e) => {
                self.warn(
                    report,
                    DeployStep::Indexing,
                    format!("Search index provisioning failed: {:#}", e),
                );
                return Vec::new();
            }
        };

        for index in &created {
            self.ui.step(format!("Created empty search index {}", index));
        }
        if !created.is_empty() && !settings.no_reindex {
            self.ui.step("Reindexing content");
            if let Err(e) = provisioner.reindex(&ctx.layout.www_dir).await {
                self.warn(report, DeployStep::Indexing, format!("{:#}", e));
            }
        }
        created
    }

    async fn sanitize(&self, ctx: &DeploymentContext) -> Result<(), DeployError> {
        let target = ctx.sync_target.as_ref().ok_or_else(|| {
            DeployError::DataSyncFailed("database was not synced in this run".to_string())
        })?;
        self.ui.step("Sanitizing database");
        self.services
            .data_sync
            .sanitize(target)
            .await
            .map_err(|e| DeployError::DataSyncFailed(format!("{:#}", e)))
    }

    async fn run_hooks(
        &self,
        project: &Project,
        ctx: &DeploymentContext,
    ) -> Result<usize, DeployError> {
        let app = AppConfig::load(&ctx.layout.app_config_path())?;
        self.ui
            .step(format!("Executing deployment hooks for {}", project.label()));
        HookRunner::new(self.services.runner.clone(), self.config.process_timeout())
            .run(app.deploy_hooks(), &ctx.layout.www_dir)
            .await
    }

    async fn finalize(
        &self,
        settings: &BuildSettings,
        ctx: &DeploymentContext,
        report: &mut DeployReport,
    ) -> Result<usize, DeployError> {
        let timeout = self.config.process_timeout();
        let runner = &self.services.runner;

        if let Some(command) = &self.config.toml.deploy.mount_command {
            self.ui.step("Mounting remote file share");
            match runner.run_shell(command, &ctx.layout.root_dir, timeout).await {
                Ok(out) if out.success() => {}
                Ok(out) => self.warn(
                    report,
                    DeployStep::Finalize,
                    format!("Mount failed: {}", out.failure_reason()),
                ),
                Err(e) => self.warn(
                    report,
                    DeployStep::Finalize,
                    format!("Mount failed: {:#}", e),
                ),
            }
        }

        if !settings.no_unclean_features {
            let command = &self.config.toml.deploy.unclean_features_command;
            match runner.run_shell(command, &ctx.layout.www_dir, timeout).await {
                Ok(out) if out.success() => {
                    let listing = out.stdout.trim();
                    if !listing.is_empty() {
                        self.ui.step("Unclean features:");
                        for line in listing.lines() {
                            self.ui.step(format!("  {}", line));
                        }
                    }
                }
                Ok(out) => self.warn(
                    report,
                    DeployStep::Finalize,
                    format!("Could not list unclean features: {}", out.failure_reason()),
                ),
                Err(e) => self.warn(
                    report,
                    DeployStep::Finalize,
                    format!("Could not list unclean features: {:#}", e),
                ),
            }
        }

        self.ui.step("Deleting old builds");
        let cleaned = clean_builds(&ctx.layout.builds_dir(), BUILDS_TO_KEEP)?;
        Ok(cleaned.removed.len())
    }
}
