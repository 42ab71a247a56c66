//! Configuration for devsite.
//!
//! Settings are read from `devsite.toml` (by default in the user's config
//! directory), then environment variables, then CLI flags.
//!
//! # Configuration File Format
//!
//! ```toml
//! [paths]
//! profiles_root = "/home/dev/profiles"
//! sites_root = "/home/dev/sites"
//!
//! [deploy]
//! git_default_branch = "master"
//! local_domain = ".local"
//! external_process_timeout_secs = 3600
//! build_command = "platform local:build"
//!
//! [stack]
//! mysql_host = "127.0.0.1"
//! mysql_user = "drupal"
//! mysql_db_prefix = "dev_"
//!
//! [site_codes]
//! abcdef123456 = "acme"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "devsite.toml";

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Filesystem roots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsSection {
    /// Where profile checkouts live, one directory per profile name
    #[serde(default = "default_profiles_root")]
    pub profiles_root: PathBuf,
    /// Where project roots live, one directory per site code
    #[serde(default = "default_sites_root")]
    pub sites_root: PathBuf,
    /// Local cache for downloaded database backups
    #[serde(default = "default_db_backup_cache")]
    pub db_backup_cache: PathBuf,
}

fn default_profiles_root() -> PathBuf {
    home_dir().join("profiles")
}

fn default_sites_root() -> PathBuf {
    home_dir().join("sites")
}

fn default_db_backup_cache() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| home_dir().join(".cache"))
        .join("devsite")
        .join("backups")
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            profiles_root: default_profiles_root(),
            sites_root: default_sites_root(),
            db_backup_cache: default_db_backup_cache(),
        }
    }
}

/// Deployment behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploySection {
    #[serde(default = "default_git_branch")]
    pub git_default_branch: String,
    /// Suffix appended to the site code to form the local hostname
    #[serde(default = "default_local_domain")]
    pub local_domain: String,
    /// Timeout applied to every external process
    #[serde(default = "default_process_timeout")]
    pub external_process_timeout_secs: u64,
    /// Command that builds a project tree into its web root
    #[serde(default = "default_build_command")]
    pub build_command: String,
    /// Optional shell command mounting the remote file share
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_command: Option<String>,
    /// Shell command listing overridden features, run in the web root
    #[serde(default = "default_unclean_features_command")]
    pub unclean_features_command: String,
    /// Clone URL template; `{project}` and `{region}` are substituted
    #[serde(default = "default_git_url_template")]
    pub git_url_template: String,
    /// Optional path to a `settings.local.php` template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_template: Option<PathBuf>,
}

fn default_git_branch() -> String {
    "master".to_string()
}

fn default_local_domain() -> String {
    ".local".to_string()
}

fn default_process_timeout() -> u64 {
    3600
}

fn default_build_command() -> String {
    "platform local:build".to_string()
}

fn default_unclean_features_command() -> String {
    "drush features-list --status=overridden".to_string()
}

fn default_git_url_template() -> String {
    "{project}@git.{region}.platform.sh:{project}.git".to_string()
}

impl Default for DeploySection {
    fn default() -> Self {
        Self {
            git_default_branch: default_git_branch(),
            local_domain: default_local_domain(),
            external_process_timeout_secs: default_process_timeout(),
            build_command: default_build_command(),
            mount_command: None,
            unclean_features_command: default_unclean_features_command(),
            git_url_template: default_git_url_template(),
            settings_template: None,
        }
    }
}

/// Local service stack credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackSection {
    #[serde(default = "default_mysql_host")]
    pub mysql_host: String,
    #[serde(default = "default_mysql_port")]
    pub mysql_port: u16,
    #[serde(default = "default_mysql_user")]
    pub mysql_user: String,
    #[serde(default)]
    pub mysql_password: String,
    #[serde(default = "default_mysql_root_user")]
    pub mysql_root_user: String,
    #[serde(default)]
    pub mysql_root_password: String,
    #[serde(default)]
    pub mysql_db_prefix: String,
    #[serde(default = "default_mysql_host")]
    pub elasticsearch_host: String,
    #[serde(default = "default_elasticsearch_port")]
    pub elasticsearch_port: u16,
}

fn default_mysql_host() -> String {
    "127.0.0.1".to_string()
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_mysql_user() -> String {
    "drupal".to_string()
}

fn default_mysql_root_user() -> String {
    "root".to_string()
}

fn default_elasticsearch_port() -> u16 {
    9200
}

impl Default for StackSection {
    fn default() -> Self {
        Self {
            mysql_host: default_mysql_host(),
            mysql_port: default_mysql_port(),
            mysql_user: default_mysql_user(),
            mysql_password: String::new(),
            mysql_root_user: default_mysql_root_user(),
            mysql_root_password: String::new(),
            mysql_db_prefix: String::new(),
            elasticsearch_host: default_mysql_host(),
            elasticsearch_port: default_elasticsearch_port(),
        }
    }
}

impl StackSection {
    pub fn elasticsearch_base_url(&self) -> String {
        format!(
            "http://{}:{}/",
            self.elasticsearch_host, self.elasticsearch_port
        )
    }
}

/// Database backup retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSyncSection {
    /// SSH target template; `{project}`, `{environment}`, `{app}`, `{region}`
    #[serde(default = "default_ssh_target_template")]
    pub ssh_target_template: String,
    /// Path of the compressed nightly backup on the remote host
    #[serde(default = "default_remote_backup_path")]
    pub remote_backup_path: String,
    /// Fallback dump command used when the nightly backup cannot be copied
    #[serde(default = "default_dump_command")]
    pub dump_command: String,
}

fn default_ssh_target_template() -> String {
    "{project}-{environment}--{app}@ssh.{region}.platform.sh".to_string()
}

fn default_remote_backup_path() -> String {
    "~/private/{project}.sql.gz".to_string()
}

fn default_dump_command() -> String {
    "platform db:dump".to_string()
}

impl Default for DataSyncSection {
    fn default() -> Self {
        Self {
            ssh_target_template: default_ssh_target_template(),
            remote_backup_path: default_remote_backup_path(),
            dump_command: default_dump_command(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSection {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
}

fn default_api_base_url() -> String {
    "https://api.platform.sh/api".to_string()
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Directory for daily-rolling log files; stderr only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

/// The complete devsite.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployToml {
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub deploy: DeploySection,
    #[serde(default)]
    pub stack: StackSection,
    #[serde(default)]
    pub datasync: DataSyncSection,
    #[serde(default)]
    pub api: ApiSection,
    /// Project id -> internal site code
    #[serde(default)]
    pub site_codes: BTreeMap<String, String>,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl DeployToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse devsite.toml")
    }

    /// Returns defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize devsite.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("DEVSITE_MYSQL_PASSWORD") {
            self.stack.mysql_password = v;
        }
        if let Some(v) = lookup("DEVSITE_MYSQL_ROOT_PASSWORD") {
            self.stack.mysql_root_password = v;
        }
        if let Some(v) = lookup("DEVSITE_SITES_ROOT") {
            self.paths.sites_root = PathBuf::from(v);
        }
        if let Some(v) = lookup("DEVSITE_PROFILES_ROOT") {
            self.paths.profiles_root = PathBuf::from(v);
        }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.deploy.build_command.split_whitespace().next().is_none() {
            warnings.push("deploy.build_command is empty".to_string());
        }
        if self.deploy.external_process_timeout_secs == 0 {
            warnings.push(
                "deploy.external_process_timeout_secs is 0: every external process will time out"
                    .to_string(),
            );
        }
        for (name, path) in [
            ("paths.profiles_root", &self.paths.profiles_root),
            ("paths.sites_root", &self.paths.sites_root),
        ] {
            if path.is_relative() {
                warnings.push(format!(
                    "{} '{}' is relative; it will resolve against the working directory",
                    name,
                    path.display()
                ));
            }
        }
        for (project, code) in &self.site_codes {
            if code.is_empty() || code.contains('/') {
                warnings.push(format!(
                    "Invalid site code '{}' for project '{}'",
                    code, project
                ));
            }
        }

        warnings
    }
}

/// Default config file location: `<config dir>/devsite/devsite.toml`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| home_dir().join(".config"))
        .join("devsite")
        .join(CONFIG_FILE_NAME)
}

/// Resolved, immutable configuration threaded through a run.
#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub toml: DeployToml,
    pub verbose: bool,
}

impl DeployConfig {
    /// Load from `path` (or the default location), then apply environment overrides.
    pub fn load(path: Option<&Path>, verbose: bool) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(default_config_path);
        let mut toml = DeployToml::load_or_default(&path)?;
        toml.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(Self { toml, verbose })
    }

    pub fn from_toml(toml: DeployToml) -> Self {
        Self {
            toml,
            verbose: false,
        }
    }

    pub fn profiles_root(&self) -> &Path {
        &self.toml.paths.profiles_root
    }

    pub fn sites_root(&self) -> &Path {
        &self.toml.paths.sites_root
    }

    pub fn git_default_branch(&self) -> &str {
        &self.toml.deploy.git_default_branch
    }

    pub fn process_timeout(&self) -> Duration {
        Duration::from_secs(self.toml.deploy.external_process_timeout_secs)
    }

    /// Internal site code for a project (configured mapping, else the project id).
    pub fn site_code(&self, project_id: &str) -> String {
        self.toml
            .site_codes
            .get(project_id)
            .cloned()
            .unwrap_or_else(|| project_id.to_string())
    }

    pub fn site_url(&self, site_code: &str) -> String {
        format!("http://{}{}", site_code, self.toml.deploy.local_domain)
    }

    pub fn git_url_for(&self, project: &devsite_common::Project) -> String {
        if let Some(url) = &project.git_url {
            return url.clone();
        }
        self.toml
            .deploy
            .git_url_template
            .replace("{project}", &project.id)
            .replace("{region}", &project.region)
    }
}
