//! Source control access.
//!
//! Network operations (clone, checkout, pull) shell out to `git` so the
//! user's SSH agent and credential helpers apply. Local queries go through
//! `git2`.

use crate::process::{ProcessRunner, argv};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use git2::Repository;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait ScmClient: Send + Sync {
    /// Clone `url` into `dest`, checking out `reference` when given.
    async fn clone_repo(&self, url: &str, dest: &Path, reference: Option<&str>) -> Result<()>;

    async fn checkout(&self, reference: &str, path: &Path, force: bool) -> Result<()>;

    /// Pull the tracked upstream, or `remote_ref` (`<remote>/<branch>`) when given.
    async fn pull(&self, path: &Path, remote_ref: Option<&str>) -> Result<()>;

    async fn current_branch(&self, path: &Path) -> Result<String>;

    async fn remote_url(&self, path: &Path) -> Result<String>;
}

/// [`ScmClient`] using the `git` binary and libgit2.
pub struct GitCli {
    runner: Arc<dyn ProcessRunner>,
    timeout: Duration,
}

impl GitCli {
    pub fn new(runner: Arc<dyn ProcessRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    async fn git(&self, args: Vec<String>, cwd: &Path) -> Result<()> {
        let mut command = argv(["git"]);
        command.extend(args);
        let output = self.runner.run(&command, cwd, self.timeout).await?;
        if !output.success() {
            bail!("'{}' failed: {}", command.join(" "), output.failure_reason());
        }
        Ok(())
    }
}

#[async_trait]
impl ScmClient for GitCli {
    async fn clone_repo(&self, url: &str, dest: &Path, reference: Option<&str>) -> Result<()> {
        let parent = dest
            .parent()
            .with_context(|| format!("Clone destination {} has no parent", dest.display()))?;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;

        let mut args = argv(["clone"]);
        if let Some(reference) = reference {
            args.extend(argv(["--branch", reference]));
        }
        args.push(url.to_string());
        args.push(dest.to_string_lossy().into_owned());
        self.git(args, parent).await
    }

    async fn checkout(&self, reference: &str, path: &Path, force: bool) -> Result<()> {
        let mut args = argv(["checkout"]);
        if force {
            args.push("--force".to_string());
        }
        args.push(reference.to_string());
        self.git(args, path).await
    }

    async fn pull(&self, path: &Path, remote_ref: Option<&str>) -> Result<()> {
        let mut args = argv(["pull"]);
        if let Some(remote_ref) = remote_ref {
            match remote_ref.split_once('/') {
                Some((remote, branch)) => args.extend(argv([remote, branch])),
                None => args.push(remote_ref.to_string()),
            }
        }
        self.git(args, path).await
    }

    async fn current_branch(&self, path: &Path) -> Result<String> {
        current_branch(path)
    }

    async fn remote_url(&self, path: &Path) -> Result<String> {
        remote_url(path)
    }
}

/// Short name of the checked-out branch, or `HEAD` when detached or unborn.
pub fn current_branch(path: &Path) -> Result<String> {
    let repo = Repository::open(path)
        .with_context(|| format!("Failed to open git repository at {}", path.display()))?;
    let Ok(head) = repo.head() else {
        return Ok("HEAD".to_string());
    };
    if !head.is_branch() {
        return Ok("HEAD".to_string());
    }
    Ok(head.shorthand().unwrap_or("HEAD").to_string())
}

/// URL of the `origin` remote.
pub fn remote_url(path: &Path) -> Result<String> {
    let repo = Repository::open(path)
        .with_context(|| format!("Failed to open git repository at {}", path.display()))?;
    let remote = repo
        .find_remote("origin")
        .context("Repository has no 'origin' remote")?;
    remote
        .url()
        .map(str::to_string)
        .context("Remote 'origin' URL is not valid UTF-8")
}

/// Display name for a remote URL: its last path segment without `.git`.
///
/// `git@host:team/repo.git` -> `repo`.
pub fn repository_name(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let base = trimmed.rsplit(['/', ':']).next().unwrap_or(trimmed);
    base.strip_suffix(".git").unwrap_or(base).to_string()
}
