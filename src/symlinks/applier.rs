//! Replaces built profile files with relative links into the profile checkout.
//!
//! Links are relative to the real location of their parent directory so the
//! built tree can be moved or archived without breaking them.

use super::planner::SymlinkMap;
use crate::errors::DeployError;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Remove every key of `map`, then link each key to its target.
///
/// Not atomic: a failure leaves earlier links in place. Re-running with a
/// fresh map converges to the same state.
pub fn apply(map: &SymlinkMap) -> Result<usize, DeployError> {
    for original in map.keys() {
        remove_path(original).map_err(|source| DeployError::SymlinkApply {
            path: original.clone(),
            source,
        })?;
    }

    for (original, target) in map {
        link_one(original, target).map_err(|source| DeployError::SymlinkApply {
            path: original.clone(),
            source,
        })?;
    }

    tracing::debug!(links = map.len(), "profile symlinks applied");
    Ok(map.len())
}

fn link_one(original: &Path, target: &Path) -> io::Result<()> {
    let parent = original.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "link path has no parent directory")
    })?;
    let parent = parent.canonicalize()?;
    let target = canonicalize_lenient(target);
    let relative = relative_path(&parent, &target);
    create_symlink(&relative, original)
}

/// Remove a file, link or directory tree. Missing paths are fine; links are
/// removed without following them.
pub fn remove_path(path: &Path) -> io::Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Canonicalize the longest existing prefix of `path` and append the rest.
fn canonicalize_lenient(path: &Path) -> PathBuf {
    if let Ok(real) = path.canonicalize() {
        return real;
    }
    let mut missing = Vec::new();
    let mut current = path;
    while let Some(parent) = current.parent() {
        if let Some(name) = current.file_name() {
            missing.push(name.to_os_string());
        }
        if let Ok(real) = parent.canonicalize() {
            let mut resolved = real;
            for name in missing.iter().rev() {
                resolved.push(name);
            }
            return resolved;
        }
        current = parent;
    }
    path.to_path_buf()
}

/// Path that leads from directory `from` to `to`. Both should be absolute.
pub fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component<'_>> = from.components().collect();
    let to: Vec<Component<'_>> = to.components().collect();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..from.len() {
        relative.push("..");
    }
    for component in &to[common..] {
        relative.push(component.as_os_str());
    }
    if relative.as_os_str().is_empty() {
        relative.push(".");
    }
    relative
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn create_symlink(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are only supported on unix hosts",
    ))
}
