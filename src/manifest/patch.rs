//! Temporary manifest rewrites for building against a local profile checkout.
//!
//! The manifest is tracked by the project repository, so any rewrite must be
//! undone once the build has run. `ManifestGuard` holds the original text and
//! writes it back on `restore()` or, failing that, on drop.

use super::parser::parse_project_line;
use crate::errors::DeployError;
use devsite_common::Profile;
use std::path::{Path, PathBuf};

/// How the profile entry is rewritten for a local build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchMode {
    /// Build against a remote branch: only `[download][branch]` changes.
    BranchOverride(String),
    /// Build against the local checkout: `copy` download from this path.
    LocalCopy(PathBuf),
}

fn split_line_ending(line: &str) -> (&str, &str) {
    let body = line.trim_end_matches(['\n', '\r']);
    (body, &line[body.len()..])
}

fn with_value(body: &str, value: &str) -> String {
    match body.find('=') {
        Some(eq) => format!("{} {}", &body[..=eq], value),
        None => body.to_string(),
    }
}

/// Rewrite the declaration of `profile` in manifest `text`.
pub fn patch_for_local_build(text: &str, profile: &Profile, mode: &PatchMode) -> String {
    let mut patched = String::with_capacity(text.len());

    for line in text.split_inclusive('\n') {
        let (body, ending) = split_line_ending(line);
        let Some(entry) = parse_project_line(body).filter(|e| e.name == profile.name) else {
            patched.push_str(line);
            continue;
        };

        let is = |keys: &[&str]| entry.is_key(&profile.name, keys);
        match mode {
            PatchMode::BranchOverride(branch) if is(&["download", "branch"]) => {
                patched.push_str(&with_value(body, branch));
                patched.push_str(ending);
            }
            PatchMode::LocalCopy(_) if is(&["download", "branch"]) => {}
            PatchMode::LocalCopy(_) if is(&["download", "type"]) => {
                patched.push_str(&with_value(body, "copy"));
                patched.push_str(ending);
            }
            PatchMode::LocalCopy(path) if is(&["download", "url"]) => {
                patched.push_str(&with_value(body, &path.to_string_lossy()));
                patched.push_str(ending);
            }
            _ => patched.push_str(line),
        }
    }

    patched
}

/// Write the original manifest content back.
pub fn restore(manifest_path: &Path, original: &str) -> std::io::Result<()> {
    std::fs::write(manifest_path, original)
}

/// Scoped ownership of a manifest's original content.
///
/// Dropping an unrestored guard writes the original back; errors at that
/// point can only be logged.
#[derive(Debug)]
pub struct ManifestGuard {
    path: PathBuf,
    original: String,
    restored: bool,
}

impl ManifestGuard {
    pub fn acquire(path: &Path) -> Result<Self, DeployError> {
        let original =
            std::fs::read_to_string(path).map_err(|source| DeployError::ManifestUnavailable {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            original,
            restored: false,
        })
    }

    /// Write the patched manifest. The guard restores on drop if this fails halfway.
    pub fn apply(&self, profile: &Profile, mode: &PatchMode) -> Result<(), DeployError> {
        let patched = patch_for_local_build(&self.original, profile, mode);
        if patched == self.original {
            tracing::warn!(
                profile = %profile.name,
                manifest = %self.path.display(),
                "manifest patch changed nothing"
            );
        }
        std::fs::write(&self.path, patched).map_err(|source| DeployError::ManifestUnavailable {
            path: self.path.clone(),
            source,
        })
    }

    pub fn restore(mut self) -> Result<(), DeployError> {
        self.restored = true;
        restore(&self.path, &self.original).map_err(|source| DeployError::ManifestUnavailable {
            path: self.path.clone(),
            source,
        })
    }
}

impl Drop for ManifestGuard {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        match restore(&self.path, &self.original) {
            Ok(()) => tracing::debug!(manifest = %self.path.display(), "manifest restored on drop"),
            Err(e) => tracing::error!(
                manifest = %self.path.display(),
                error = %e,
                "failed to restore manifest"
            ),
        }
    }
}
