//! Typed error hierarchy for the deployment orchestrator.
//!
//! `DeployError` covers the individual failure kinds; `DeployFailure` wraps one
//! with the orchestration step that was running when it happened.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by orchestration components.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Failed to fetch {what} from {url}: {reason}")]
    FetchFailed {
        what: String,
        url: String,
        reason: String,
    },

    #[error("Failed to update repository at {path}: {reason}")]
    RepositoryUpdateFailed { path: PathBuf, reason: String },

    #[error("Manifest unavailable at {path}: {source}")]
    ManifestUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Build executor failed: {0}")]
    BuildExecutorFailed(String),

    #[error("Failed to create symlink at {path}: {source}")]
    SymlinkApply {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Deploy hook '{command}' failed: {reason}")]
    HookFailed { command: String, reason: String },

    #[error("Database sync failed: {0}")]
    DataSyncFailed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The ordered steps of a deployment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStep {
    Layout,
    FirstTimeCheck,
    ProfileDiscovery,
    RepositoryRefresh,
    DataSync,
    Build,
    Indexing,
    Sanitize,
    Hooks,
    Finalize,
}

impl DeployStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeployStep::Layout => "layout",
            DeployStep::FirstTimeCheck => "first-time check",
            DeployStep::ProfileDiscovery => "profile discovery",
            DeployStep::RepositoryRefresh => "repository refresh",
            DeployStep::DataSync => "data sync",
            DeployStep::Build => "build",
            DeployStep::Indexing => "indexing",
            DeployStep::Sanitize => "sanitize",
            DeployStep::Hooks => "deploy hooks",
            DeployStep::Finalize => "finalize",
        }
    }
}

impl fmt::Display for DeployStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fatal orchestration error, tagged with the step that failed.
#[derive(Debug, Error)]
#[error("Deployment step '{step}' failed")]
pub struct DeployFailure {
    pub step: DeployStep,
    #[source]
    pub source: DeployError,
}

impl DeployFailure {
    pub fn new(step: DeployStep, source: impl Into<DeployError>) -> Self {
        Self {
            step,
            source: source.into(),
        }
    }
}

/// Attach a step to a fallible orchestration result.
pub trait AtStep<T> {
    fn at_step(self, step: DeployStep) -> Result<T, DeployFailure>;
}

impl<T, E: Into<DeployError>> AtStep<T> for Result<T, E> {
    fn at_step(self, step: DeployStep) -> Result<T, DeployFailure> {
        self.map_err(|e| DeployFailure::new(step, e))
    }
}
