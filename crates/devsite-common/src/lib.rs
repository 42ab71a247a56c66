//! Shared domain types for devsite.
//!
//! These types are owned by the remote project API or parsed from a project's
//! manifest. The deployment orchestrator only reads them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A hosted project as reported by the project API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub region: String,
    /// Git remote of the project repository, when the API reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_url: Option<String>,
}

impl Project {
    pub fn new(id: impl Into<String>, title: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            region: region.into(),
            git_url: None,
        }
    }

    pub fn with_git_url(mut self, url: impl Into<String>) -> Self {
        self.git_url = Some(url.into());
        self
    }

    /// Human-readable label used in status lines: `Title (id)`.
    pub fn label(&self) -> String {
        if self.title.is_empty() {
            self.id.clone()
        } else {
            format!("{} ({})", self.title, self.id)
        }
    }
}

/// A deployable environment (branch) of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

/// How a manifest entry is downloaded by the build executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadType {
    Git,
    Copy,
}

impl DownloadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadType::Git => "git",
            DownloadType::Copy => "copy",
        }
    }
}

impl fmt::Display for DownloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unsupported download type '{0}'. Valid values: git, copy")]
pub struct UnknownDownloadType(pub String);

impl FromStr for DownloadType {
    type Err = UnknownDownloadType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "git" => Ok(DownloadType::Git),
            "copy" => Ok(DownloadType::Copy),
            other => Err(UnknownDownloadType(other.to_string())),
        }
    }
}

/// A distribution profile declared in a project's manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Profile name; also the checkout directory name under the profiles root.
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub download_type: DownloadType,
}
