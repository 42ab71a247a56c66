//! Refreshes existing checkouts from their remotes.

use crate::errors::DeployError;
use crate::scm::{ScmClient, repository_name};
use std::path::Path;
use std::sync::Arc;

pub struct RepositoryUpdater {
    scm: Arc<dyn ScmClient>,
    default_branch: String,
}

impl RepositoryUpdater {
    pub fn new(scm: Arc<dyn ScmClient>, default_branch: impl Into<String>) -> Self {
        Self {
            scm,
            default_branch: default_branch.into(),
        }
    }

    /// Pull the current branch, then merge `origin/<default branch>` into it.
    ///
    /// Returns the `<repo>/<branch>` label of what was updated.
    pub async fn update(&self, path: &Path) -> Result<String, DeployError> {
        let failed = |e: anyhow::Error| DeployError::RepositoryUpdateFailed {
            path: path.to_path_buf(),
            reason: format!("{:#}", e),
        };

        let url = self.scm.remote_url(path).await.map_err(failed)?;
        let branch = self.scm.current_branch(path).await.map_err(failed)?;
        let label = format!("{}/{}", repository_name(&url), branch);
        tracing::info!(repository = %label, path = %path.display(), "updating repository");

        self.scm.pull(path, None).await.map_err(failed)?;
        let upstream = format!("origin/{}", self.default_branch);
        self.scm.pull(path, Some(&upstream)).await.map_err(failed)?;
        Ok(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, bail};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeScm {
        pulls: Mutex<Vec<Option<String>>>,
        fail_second_pull: bool,
    }

    #[async_trait]
    impl ScmClient for FakeScm {
        async fn clone_repo(&self, _: &str, _: &Path, _: Option<&str>) -> Result<()> {
            Ok(())
        }

        async fn checkout(&self, _: &str, _: &Path, _: bool) -> Result<()> {
            Ok(())
        }

        async fn pull(&self, _: &Path, remote_ref: Option<&str>) -> Result<()> {
            let mut pulls = self.pulls.lock().unwrap();
            pulls.push(remote_ref.map(str::to_string));
            if self.fail_second_pull && pulls.len() == 2 {
                bail!("CONFLICT (content): Merge conflict in acme.info");
            }
            Ok(())
        }

        async fn current_branch(&self, _: &Path) -> Result<String> {
            Ok("feature-x".to_string())
        }

        async fn remote_url(&self, _: &Path) -> Result<String> {
            Ok("git@github.com:acme/acme_core.git".to_string())
        }
    }

    #[tokio::test]
    async fn test_update_pulls_branch_then_default() {
        let scm = Arc::new(FakeScm::default());
        let updater = RepositoryUpdater::new(scm.clone(), "master");
        let label = updater.update(Path::new("/tmp/acme")).await.unwrap();

        assert_eq!(label, "acme_core/feature-x");
        assert_eq!(
            *scm.pulls.lock().unwrap(),
            vec![None, Some("origin/master".to_string())]
        );
    }

    #[tokio::test]
    async fn test_update_failure_names_path() {
        let scm = Arc::new(FakeScm {
            fail_second_pull: true,
            ..Default::default()
        });
        let updater = RepositoryUpdater::new(scm, "master");
        let err = updater.update(Path::new("/tmp/acme")).await.unwrap_err();
        match err {
            DeployError::RepositoryUpdateFailed { path, reason } => {
                assert_eq!(path, Path::new("/tmp/acme"));
                assert!(reason.contains("Merge conflict"));
            }
            other => panic!("Expected RepositoryUpdateFailed, got {other:?}"),
        }
    }
}
