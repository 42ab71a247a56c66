//! Parser for drush-make manifests (`project.make`).
//!
//! Only the `projects[...]` declarations are interpreted:
//!
//! ```text
//! core = 7.x
//! api = 2
//! ; The distribution profile
//! projects[acme_core][type] = profile
//! projects[acme_core][download][type] = git
//! projects[acme_core][download][url] = git@example.com:acme/acme_core.git
//! projects[acme_core][download][branch] = 7.x-2.x
//! projects[views] = 3.18
//! ```

use devsite_common::{DownloadType, Profile};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static PROJECT_LINE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*projects\[([^\]]*)\]((?:\[[^\]]*\])*)\s*=\s*(.*?)\s*$").unwrap()
});

static SUBKEY_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\]]*)\]").unwrap());

/// One parsed `projects[name]...` assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLine {
    pub name: String,
    /// Nested keys after the project name, e.g. `["download", "branch"]`.
    pub keys: Vec<String>,
    pub value: String,
}

impl ProjectLine {
    pub fn is_key(&self, name: &str, keys: &[&str]) -> bool {
        self.name == name && self.keys.iter().map(String::as_str).eq(keys.iter().copied())
    }
}

/// Parse a single manifest line. Comments, blank lines and anonymous
/// `projects[] = ...` entries yield `None`.
pub fn parse_project_line(line: &str) -> Option<ProjectLine> {
    let trimmed = line.trim_start();
    if trimmed.starts_with(';') || trimmed.starts_with('#') {
        return None;
    }
    let caps = PROJECT_LINE_REGEX.captures(line)?;
    let name = caps[1].trim().to_string();
    if name.is_empty() {
        return None;
    }
    let keys = SUBKEY_REGEX
        .captures_iter(&caps[2])
        .map(|c| c[1].trim().to_string())
        .collect();

    Some(ProjectLine {
        name,
        keys,
        value: unquote(&caps[3]).to_string(),
    })
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// A project declaration with its flattened attributes (`"download.type"` etc.).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MakeProject {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
}

impl MakeProject {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// Parse all project declarations, in order of first appearance.
pub fn parse_projects(text: &str) -> Vec<MakeProject> {
    let mut projects: Vec<MakeProject> = Vec::new();

    for line in text.lines().filter_map(parse_project_line) {
        let key = if line.keys.is_empty() {
            "version".to_string()
        } else {
            line.keys.join(".")
        };
        match projects.iter_mut().find(|p| p.name == line.name) {
            Some(project) => {
                project.attributes.insert(key, line.value);
            }
            None => {
                let mut project = MakeProject {
                    name: line.name,
                    ..Default::default()
                };
                project.attributes.insert(key, line.value);
                projects.push(project);
            }
        }
    }

    projects
}

/// Find the first profile fetched by git or copy.
pub fn extract_profile_declaration(text: &str) -> Option<Profile> {
    parse_projects(text).into_iter().find_map(|project| {
        if project.get("type") != Some("profile") {
            return None;
        }
        let download_type = project.get("download.type")?.parse::<DownloadType>().ok()?;
        Some(Profile {
            url: project.get("download.url").unwrap_or_default().to_string(),
            branch: project.get("download.branch").map(str::to_string),
            tag: project.get("download.tag").map(str::to_string),
            download_type,
            name: project.name,
        })
    })
}
