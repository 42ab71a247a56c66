//! Computes which files of a built profile should be replaced by links into
//! the profile's own checkout.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

/// Original path inside the web root -> authoritative path inside the profile checkout.
pub type SymlinkMap = BTreeMap<PathBuf, PathBuf>;

pub const PROFILE_EXTENSIONS: [&str; 4] = [".info", ".profile", ".install", ".make"];

/// Code fetched by the build executor itself; never shadowed by the checkout.
pub const CONTRIB_DIR: &str = "contrib";

pub const SETTINGS_DIR: &str = "settings";
pub const TEST_OBJECT_FILE: &str = "sureroute-test-object.html";
pub const HUMANS_FILE: &str = "humans.txt";

/// Plan the link map for `profile_name`, whose checkout is `checkout_dir`,
/// inside the web root `www_dir`.
pub fn plan(profile_name: &str, checkout_dir: &Path, www_dir: &Path) -> io::Result<SymlinkMap> {
    let built_dir = www_dir.join("profiles").join(profile_name);
    let mut map = SymlinkMap::new();

    for ext in PROFILE_EXTENSIONS {
        let file = format!("{}{}", profile_name, ext);
        map.insert(built_dir.join(&file), checkout_dir.join(&file));
    }

    for category in ["modules", "themes"] {
        for entry in list_entries(&checkout_dir.join(category))? {
            if entry == CONTRIB_DIR {
                continue;
            }
            map.insert(
                built_dir.join(category).join(&entry),
                checkout_dir.join(category).join(&entry),
            );
        }
    }

    // Newer profiles keep their resources one level down.
    let (built_resources, checkout_resources) = if built_dir.join("resources").is_dir() {
        (built_dir.join("resources"), checkout_dir.join("resources"))
    } else {
        (built_dir.clone(), checkout_dir.to_path_buf())
    };

    for name in [SETTINGS_DIR, TEST_OBJECT_FILE, HUMANS_FILE] {
        map.insert(built_resources.join(name), checkout_resources.join(name));
    }
    for name in [TEST_OBJECT_FILE, HUMANS_FILE] {
        map.insert(www_dir.join(name), checkout_resources.join(name));
    }

    Ok(map)
}

/// Entry names directly under `dir`; a missing directory has none.
fn list_entries(dir: &Path) -> io::Result<Vec<String>> {
    let read_dir = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut names = Vec::new();
    for entry in read_dir {
        names.push(entry?.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn make_checkout(root: &Path, modules: &[&str], themes: &[&str]) -> PathBuf {
        let checkout = root.join("profiles").join("acme");
        for m in modules {
            fs::create_dir_all(checkout.join("modules").join(m)).unwrap();
        }
        for t in themes {
            fs::create_dir_all(checkout.join("themes").join(t)).unwrap();
        }
        fs::create_dir_all(&checkout).unwrap();
        checkout
    }

    #[test]
    fn test_key_count_excludes_contrib() {
        let dir = tempdir().unwrap();
        let checkout = make_checkout(
            dir.path(),
            &["custom", "features", "contrib"],
            &["acme_theme", "contrib"],
        );
        let www = dir.path().join("_www");

        let map = plan("acme", &checkout, &www).unwrap();
        assert_eq!(map.len(), 4 + 2 + 1 + 5);
        assert!(!map.keys().any(|k| k.ends_with("contrib")));
        assert_eq!(
            map.get(&www.join("profiles/acme/modules/custom")),
            Some(&checkout.join("modules/custom"))
        );
        assert_eq!(
            map.get(&www.join("profiles/acme/acme.info")),
            Some(&checkout.join("acme.info"))
        );
    }

    #[test]
    fn test_missing_modules_and_themes_tolerated() {
        let dir = tempdir().unwrap();
        let checkout = make_checkout(dir.path(), &[], &[]);
        let map = plan("acme", &checkout, &dir.path().join("_www")).unwrap();
        assert_eq!(map.len(), 4 + 5);
    }

    #[test]
    fn test_legacy_resources_at_profile_root() {
        let dir = tempdir().unwrap();
        let checkout = make_checkout(dir.path(), &[], &[]);
        let www = dir.path().join("_www");
        fs::create_dir_all(www.join("profiles/acme")).unwrap();

        let map = plan("acme", &checkout, &www).unwrap();
        assert_eq!(
            map.get(&www.join("profiles/acme/settings")),
            Some(&checkout.join("settings"))
        );
        assert_eq!(
            map.get(&www.join("humans.txt")),
            Some(&checkout.join("humans.txt"))
        );
    }

    #[test]
    fn test_resources_directory_layout() {
        let dir = tempdir().unwrap();
        let checkout = make_checkout(dir.path(), &[], &[]);
        let www = dir.path().join("_www");
        fs::create_dir_all(www.join("profiles/acme/resources")).unwrap();

        let map = plan("acme", &checkout, &www).unwrap();
        assert_eq!(
            map.get(&www.join("profiles/acme/resources/settings")),
            Some(&checkout.join("resources/settings"))
        );
        assert_eq!(
            map.get(&www.join("sureroute-test-object.html")),
            Some(&checkout.join("resources/sureroute-test-object.html"))
        );
        assert!(!map.contains_key(&www.join("profiles/acme/settings")));
    }

    #[test]
    fn test_plan_is_deterministic() {
        let dir = tempdir().unwrap();
        let checkout = make_checkout(dir.path(), &["b", "a", "c"], &["z", "y"]);
        let www = dir.path().join("_www");
        let first = plan("acme", &checkout, &www).unwrap();
        let second = plan("acme", &checkout, &www).unwrap();
        assert_eq!(first, second);
    }
}
