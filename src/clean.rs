//! Retires old local builds.

use crate::symlinks::remove_path;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub kept: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

/// Remove all but the `keep` most recently modified entries of `builds_dir`.
///
/// A missing builds directory has nothing to clean.
pub fn clean_builds(builds_dir: &Path, keep: usize) -> Result<CleanReport> {
    let read_dir = match std::fs::read_dir(builds_dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(CleanReport::default()),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to list {}", builds_dir.display()));
        }
    };

    let mut builds: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in read_dir {
        let entry = entry.with_context(|| format!("Failed to list {}", builds_dir.display()))?;
        let path = entry.path();
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .with_context(|| format!("Failed to stat {}", path.display()))?;
        builds.push((modified, path));
    }

    // Newest first; names break ties so the order is stable.
    builds.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));

    let mut report = CleanReport::default();
    for (index, (_, path)) in builds.into_iter().enumerate() {
        if index < keep {
            report.kept.push(path);
            continue;
        }
        remove_path(&path).with_context(|| format!("Failed to remove {}", path.display()))?;
        tracing::debug!(build = %path.display(), "removed old build");
        report.removed.push(path);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    fn make_build(dir: &Path, name: &str, age_secs: u64) -> PathBuf {
        let path = dir.join(name);
        fs::create_dir_all(path.join("public")).unwrap();
        fs::write(path.join("public/index.php"), "<?php").unwrap();
        let time = SystemTime::now() - Duration::from_secs(age_secs);
        fs::File::open(&path).unwrap().set_modified(time).unwrap();
        path
    }

    #[test]
    fn test_keeps_newest() {
        let dir = tempdir().unwrap();
        let oldest = make_build(dir.path(), "build-a", 300);
        let newest = make_build(dir.path(), "build-b", 10);
        let middle = make_build(dir.path(), "build-c", 100);

        let report = clean_builds(dir.path(), 1).unwrap();
        assert_eq!(report.kept, vec![newest.clone()]);
        assert_eq!(report.removed, vec![middle.clone(), oldest.clone()]);
        assert!(newest.exists());
        assert!(!middle.exists());
        assert!(!oldest.exists());
    }

    #[test]
    fn test_keep_more_than_present() {
        let dir = tempdir().unwrap();
        make_build(dir.path(), "build-a", 10);
        let report = clean_builds(dir.path(), 5).unwrap();
        assert_eq!(report.kept.len(), 1);
        assert!(report.removed.is_empty());
    }

    #[test]
    fn test_missing_builds_dir() {
        let dir = tempdir().unwrap();
        let report = clean_builds(&dir.path().join("builds"), 1).unwrap();
        assert_eq!(report, CleanReport::default());
    }
}
