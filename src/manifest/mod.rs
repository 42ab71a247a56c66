//! Drush-make manifest handling: profile discovery and temporary patching.

pub mod parser;
pub mod patch;

pub use parser::{MakeProject, extract_profile_declaration, parse_projects};
pub use patch::{ManifestGuard, PatchMode, patch_for_local_build, restore};

use crate::errors::DeployError;
use devsite_common::Profile;
use std::path::Path;

/// Read the profile declared by the manifest at `path`.
///
/// A missing manifest means the project declares no profile.
pub fn read_profile(path: &Path) -> Result<Option<Profile>, DeployError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(extract_profile_declaration(&text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(DeployError::ManifestUnavailable {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Whether the repository is built from a drush-make manifest.
pub fn is_drush_make_project(repository_dir: &Path) -> bool {
    repository_dir.join(crate::layout::MANIFEST_FILE).is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_read_profile_missing_manifest() {
        let dir = tempdir().unwrap();
        assert!(read_profile(&dir.path().join("project.make")).unwrap().is_none());
        assert!(!is_drush_make_project(dir.path()));
    }

    #[test]
    fn test_read_profile_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("project.make");
        std::fs::write(
            &path,
            "projects[core][type] = profile\nprojects[core][download][type] = git\n",
        )
        .unwrap();
        let profile = read_profile(&path).unwrap().unwrap();
        assert_eq!(profile.name, "core");
        assert!(is_drush_make_project(dir.path()));
    }
}
