use crate::manifest::PatchMode;
use std::path::Path;

/// Per-run deployment switches, resolved from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSettings {
    /// Import the remote database (forced on a first deploy).
    pub db_sync: bool,
    /// Build against this remote profile branch instead of the local checkout.
    pub core_branch: Option<String>,
    /// Environment the database backup is taken from (default branch when unset).
    pub environment: Option<String>,
    pub no_archive: bool,
    pub no_deploy_hooks: bool,
    pub no_git_pull: bool,
    pub no_reindex: bool,
    pub no_sanitize: bool,
    pub no_unclean_features: bool,
    pub copy: bool,
    pub absolute_links: bool,
}

impl BuildSettings {
    /// How the manifest's profile entry is rewritten for this run.
    pub fn patch_mode(&self, profile_checkout: &Path) -> PatchMode {
        match &self.core_branch {
            Some(branch) => PatchMode::BranchOverride(branch.clone()),
            None => PatchMode::LocalCopy(profile_checkout.to_path_buf()),
        }
    }

    /// Whether built profile files are replaced with links into the checkout.
    pub fn links_profile(&self) -> bool {
        self.core_branch.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_patch_mode() {
        let checkout = Path::new("/home/dev/profiles/acme_core");
        let local = BuildSettings::default();
        assert_eq!(
            local.patch_mode(checkout),
            PatchMode::LocalCopy(PathBuf::from("/home/dev/profiles/acme_core"))
        );
        assert!(local.links_profile());

        let remote = BuildSettings {
            core_branch: Some("release-2.0".to_string()),
            ..Default::default()
        };
        assert_eq!(
            remote.patch_mode(checkout),
            PatchMode::BranchOverride("release-2.0".to_string())
        );
        assert!(!remote.links_profile());
    }
}
