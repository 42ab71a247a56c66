use crate::datasync::SyncTarget;
use crate::layout::PathLayout;
use devsite_common::Profile;
use std::path::PathBuf;

/// State accumulated while a single deployment runs. Never persisted.
#[derive(Debug, Clone)]
pub struct DeploymentContext {
    pub site_code: String,
    pub layout: PathLayout,
    pub site_just_fetched: bool,
    pub profile_just_fetched: bool,
    /// Requested db-sync, or forced by a first deploy.
    pub db_sync: bool,
    pub profile: Option<Profile>,
    pub profile_dir: Option<PathBuf>,
    /// Resolved once the database has been synced.
    pub sync_target: Option<SyncTarget>,
}

impl DeploymentContext {
    pub fn new(site_code: impl Into<String>, layout: PathLayout, db_sync: bool) -> Self {
        Self {
            site_code: site_code.into(),
            layout,
            site_just_fetched: false,
            profile_just_fetched: false,
            db_sync,
            profile: None,
            profile_dir: None,
            sync_target: None,
        }
    }

    pub fn legacy(&self) -> bool {
        self.layout.legacy
    }

    /// The declared profile together with its local checkout.
    pub fn profile_checkout(&self) -> Option<(&Profile, &PathBuf)> {
        self.profile.as_ref().zip(self.profile_dir.as_ref())
    }
}
