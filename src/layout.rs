//! Canonical on-disk layout of a locally deployed project.
//!
//! Two generations of layout exist:
//!
//! | Layout | Repository          | Web root     | Shared files                  |
//! |--------|---------------------|--------------|-------------------------------|
//! | legacy | `<root>/repository` | `<root>/www` | `<root>/shared`               |
//! | modern | `<root>`            | `<root>/_www`| `<root>/.platform/local/shared` |

use crate::errors::DeployError;
use std::path::{Path, PathBuf};

pub const LEGACY_WEB_ROOT: &str = "www";
pub const WEB_ROOT: &str = "_www";
pub const LEGACY_REPOSITORY_DIR: &str = "repository";
pub const MANIFEST_FILE: &str = "project.make";
pub const APP_CONFIG_FILE: &str = ".platform.app.yaml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathLayout {
    pub root_dir: PathBuf,
    pub repository_dir: PathBuf,
    pub www_dir: PathBuf,
    pub legacy: bool,
}

impl PathLayout {
    pub fn resolve(sites_root: &Path, site_code: &str, legacy: bool) -> Result<Self, DeployError> {
        let root_dir = project_root(sites_root, site_code)?;
        let (repository_dir, www_dir) = if legacy {
            (
                root_dir.join(LEGACY_REPOSITORY_DIR),
                root_dir.join(LEGACY_WEB_ROOT),
            )
        } else {
            (root_dir.clone(), root_dir.join(WEB_ROOT))
        };

        Ok(Self {
            root_dir,
            repository_dir,
            www_dir,
            legacy,
        })
    }

    /// Resolve using the layout detected on disk.
    pub fn detect(sites_root: &Path, site_code: &str) -> Result<Self, DeployError> {
        let root = project_root(sites_root, site_code)?;
        Self::resolve(sites_root, site_code, detect_legacy(&root))
    }

    /// Detect the layout of an existing project root directory.
    pub fn from_root(root_dir: &Path) -> Result<Self, DeployError> {
        let (Some(sites_root), Some(code)) = (root_dir.parent(), root_dir.file_name()) else {
            return Err(DeployError::Configuration(format!(
                "'{}' is not a project directory",
                root_dir.display()
            )));
        };
        Self::detect(sites_root, &code.to_string_lossy())
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.repository_dir.join(MANIFEST_FILE)
    }

    pub fn app_config_path(&self) -> PathBuf {
        self.repository_dir.join(APP_CONFIG_FILE)
    }

    pub fn shared_dir(&self) -> PathBuf {
        if self.legacy {
            self.root_dir.join("shared")
        } else {
            self.root_dir.join(".platform").join("local").join("shared")
        }
    }

    pub fn builds_dir(&self) -> PathBuf {
        if self.legacy {
            self.root_dir.join("builds")
        } else {
            self.root_dir.join(".platform").join("local").join("builds")
        }
    }

    /// The built copy of a profile inside the web root.
    pub fn profile_in_www(&self, profile_name: &str) -> PathBuf {
        self.www_dir.join("profiles").join(profile_name)
    }
}

/// `<sites_root>/<site_code>`, rejecting codes that are empty or not a single path segment.
pub fn project_root(sites_root: &Path, site_code: &str) -> Result<PathBuf, DeployError> {
    let code = site_code.trim();
    if code.is_empty() {
        return Err(DeployError::Configuration(
            "Project site code must not be empty".to_string(),
        ));
    }
    if code.contains('/') || code.contains('\\') || code == "." || code == ".." {
        return Err(DeployError::Configuration(format!(
            "Project site code '{}' must be a single directory name",
            code
        )));
    }
    Ok(sites_root.join(code))
}

/// Both names a web root may have under a project root (legacy first).
pub fn web_root_candidates(root_dir: &Path) -> [PathBuf; 2] {
    [root_dir.join(LEGACY_WEB_ROOT), root_dir.join(WEB_ROOT)]
}

/// A project has been deployed before if either web root exists.
pub fn is_deployed(root_dir: &Path) -> bool {
    web_root_candidates(root_dir).iter().any(|p| p.is_dir())
}

pub fn detect_legacy(root_dir: &Path) -> bool {
    root_dir.join(LEGACY_REPOSITORY_DIR).is_dir()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_modern_layout() {
        let layout = PathLayout::resolve(Path::new("/sites"), "acme", false).unwrap();
        assert_eq!(layout.root_dir, PathBuf::from("/sites/acme"));
        assert_eq!(layout.repository_dir, PathBuf::from("/sites/acme"));
        assert_eq!(layout.www_dir, PathBuf::from("/sites/acme/_www"));
        assert_eq!(
            layout.manifest_path(),
            PathBuf::from("/sites/acme/project.make")
        );
        assert_eq!(
            layout.shared_dir(),
            PathBuf::from("/sites/acme/.platform/local/shared")
        );
    }

    #[test]
    fn test_legacy_layout() {
        let layout = PathLayout::resolve(Path::new("/sites"), "acme", true).unwrap();
        assert_eq!(layout.repository_dir, PathBuf::from("/sites/acme/repository"));
        assert_eq!(layout.www_dir, PathBuf::from("/sites/acme/www"));
        assert_eq!(layout.builds_dir(), PathBuf::from("/sites/acme/builds"));
        assert_eq!(
            layout.profile_in_www("core"),
            PathBuf::from("/sites/acme/www/profiles/core")
        );
    }

    #[test]
    fn test_empty_code_is_configuration_error() {
        let err = PathLayout::resolve(Path::new("/sites"), "  ", false).unwrap_err();
        assert!(matches!(err, DeployError::Configuration(_)));
        let err = PathLayout::resolve(Path::new("/sites"), "../etc", false).unwrap_err();
        assert!(matches!(err, DeployError::Configuration(_)));
    }

    #[test]
    fn test_detect_and_deployed() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("acme");
        std::fs::create_dir_all(&root).unwrap();
        assert!(!is_deployed(&root));
        assert!(!detect_legacy(&root));

        std::fs::create_dir_all(root.join("repository")).unwrap();
        std::fs::create_dir_all(root.join("www")).unwrap();
        assert!(is_deployed(&root));

        let layout = PathLayout::detect(dir.path(), "acme").unwrap();
        assert!(layout.legacy);
        assert_eq!(layout.www_dir, root.join("www"));
        assert_eq!(PathLayout::from_root(&root).unwrap(), layout);
    }

    #[test]
    fn test_from_root_rejects_filesystem_root() {
        assert!(PathLayout::from_root(Path::new("/")).is_err());
    }
}
