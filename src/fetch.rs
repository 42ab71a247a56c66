//! First-time checkout of sites and profiles.

use crate::errors::DeployError;
use crate::layout;
use crate::scm::ScmClient;
use devsite_common::{Profile, Project};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    AlreadyPresent,
    Fetched,
}

impl FetchOutcome {
    pub fn fetched(self) -> bool {
        self == FetchOutcome::Fetched
    }
}

/// Clones a site or profile when it is not yet present locally.
pub struct FetchCoordinator {
    scm: Arc<dyn ScmClient>,
    profiles_root: PathBuf,
    default_branch: String,
}

impl FetchCoordinator {
    pub fn new(
        scm: Arc<dyn ScmClient>,
        profiles_root: impl Into<PathBuf>,
        default_branch: impl Into<String>,
    ) -> Self {
        Self {
            scm,
            profiles_root: profiles_root.into(),
            default_branch: default_branch.into(),
        }
    }

    pub fn profile_dir(&self, profile: &Profile) -> PathBuf {
        self.profiles_root.join(&profile.name)
    }

    /// Clone the project repository into `root_dir` unless a web root exists.
    pub async fn ensure_site(
        &self,
        project: &Project,
        git_url: &str,
        root_dir: &Path,
    ) -> Result<FetchOutcome, DeployError> {
        if layout::is_deployed(root_dir) {
            return Ok(FetchOutcome::AlreadyPresent);
        }

        tracing::info!(project = %project.id, url = git_url, "fetching site");
        self.scm
            .clone_repo(git_url, root_dir, Some(&self.default_branch))
            .await
            .map_err(|e| DeployError::FetchFailed {
                what: format!("site {}", project.id),
                url: git_url.to_string(),
                reason: format!("{:#}", e),
            })?;
        Ok(FetchOutcome::Fetched)
    }

    /// Clone `profile` into the profiles root unless its directory exists.
    ///
    /// The profile's branch (or the default branch) is cloned; a declared tag
    /// is then force-checked-out.
    pub async fn ensure_profile(&self, profile: &Profile) -> Result<FetchOutcome, DeployError> {
        let dest = self.profile_dir(profile);
        if dest.exists() {
            return Ok(FetchOutcome::AlreadyPresent);
        }

        let fetch_failed = |e: anyhow::Error| DeployError::FetchFailed {
            what: format!("profile {}", profile.name),
            url: profile.url.clone(),
            reason: format!("{:#}", e),
        };

        let branch = profile.branch.as_deref().unwrap_or(&self.default_branch);
        tracing::info!(profile = %profile.name, url = %profile.url, branch, "fetching profile");
        self.scm
            .clone_repo(&profile.url, &dest, Some(branch))
            .await
            .map_err(fetch_failed)?;

        if let Some(tag) = &profile.tag {
            self.scm
                .checkout(tag, &dest, true)
                .await
                .map_err(fetch_failed)?;
        }
        Ok(FetchOutcome::Fetched)
    }
}
