//! The application definition (`.platform.app.yaml`) of a project repository.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_APP_NAME: &str = "app";

fn default_app_name() -> String {
    DEFAULT_APP_NAME.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AppHooks {
    #[serde(default)]
    pub build: Option<String>,
    #[serde(default)]
    pub deploy: Option<String>,
}

/// The subset of the application definition used for local deployments.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default)]
    pub hooks: AppHooks,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            hooks: AppHooks::default(),
        }
    }
}

impl AppConfig {
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).context("Failed to parse application definition")
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                Self::parse(&content).with_context(|| format!("Invalid {}", path.display()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no application definition");
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    pub fn deploy_hooks(&self) -> &str {
        self.hooks.deploy.as_deref().unwrap_or("")
    }
}
