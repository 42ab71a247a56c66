//! Local database settings (`settings.local.php`) for a deployed site.
//!
//! The file lives in the shared directory and is linked into every build, so
//! it is rewritten on each deploy from the current stack configuration.

use crate::config::StackSection;
use anyhow::{Context, Result};
use devsite_common::Project;
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE: &str = "settings.local.php";

const DEFAULT_TEMPLATE: &str = r#"<?php

// Generated by devsite on every deploy. Local changes are overwritten.

$databases['default']['default'] = array(
  'driver' => 'mysql',
  'database' => '{database}',
  'username' => '{username}',
  'password' => '{password}',
  'host' => '{host}',
  'port' => '{port}',
  'prefix' => '',
);
"#;

/// Lowercase ASCII slug with runs of other characters collapsed to `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Machine name of a project: its slugged title with `_` separators, or the
/// project id when the title is empty.
pub fn site_slug(project: &Project) -> String {
    let slug = slugify(&project.title).replace('-', "_");
    if slug.is_empty() {
        project.id.clone()
    } else {
        slug
    }
}

/// Local database name: the configured prefix plus the site slug.
pub fn database_name(prefix: &str, project: &Project) -> String {
    format!("{}{}", prefix, site_slug(project))
}

/// Connection parameters for one project's local database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    pub database: String,
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: u16,
}

impl DatabaseSettings {
    pub fn for_project(stack: &StackSection, project: &Project) -> Self {
        Self {
            database: database_name(&stack.mysql_db_prefix, project),
            username: stack.mysql_user.clone(),
            password: stack.mysql_password.clone(),
            host: stack.mysql_host.clone(),
            port: stack.mysql_port,
        }
    }
}

pub fn render(template: &str, db: &DatabaseSettings) -> String {
    template
        .replace("{database}", &db.database)
        .replace("{username}", &db.username)
        .replace("{password}", &db.password)
        .replace("{host}", &db.host)
        .replace("{port}", &db.port.to_string())
}

/// Render and write `settings.local.php` into `shared_dir`, replacing any
/// existing file.
pub fn write_settings_file(
    shared_dir: &Path,
    template: Option<&Path>,
    db: &DatabaseSettings,
) -> Result<PathBuf> {
    let template = match template {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings template {}", path.display()))?,
        None => DEFAULT_TEMPLATE.to_string(),
    };

    std::fs::create_dir_all(shared_dir)
        .with_context(|| format!("Failed to create {}", shared_dir.display()))?;
    let path = shared_dir.join(SETTINGS_FILE);
    std::fs::write(&path, render(&template, db))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::debug!(path = %path.display(), database = %db.database, "settings file written");
    Ok(path)
}
