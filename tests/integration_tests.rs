//! Integration tests for the devsite binary.
//!
//! These exercise argument parsing and the commands that need no network
//! access or external tools.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn devsite() -> Command {
    let mut cmd = cargo_bin_cmd!("devsite");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn config_path(dir: &TempDir) -> PathBuf {
    dir.path().join("devsite.toml")
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_devsite_help() {
        devsite()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("deploy"))
            .stdout(predicate::str::contains("db-sync"))
            .stdout(predicate::str::contains("clean"));
    }

    #[test]
    fn test_devsite_version() {
        devsite()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::starts_with("devsite"));
    }

    #[test]
    fn test_deploy_requires_project() {
        devsite()
            .arg("deploy")
            .assert()
            .failure()
            .stderr(predicate::str::contains("--project"));
    }

    #[test]
    fn test_deploy_help_lists_switches() {
        devsite()
            .args(["deploy", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--core-branch"))
            .stdout(predicate::str::contains("--no-git-pull"))
            .stdout(predicate::str::contains("--abslinks"));
    }

    #[test]
    fn test_unknown_command_fails() {
        devsite().arg("frobnicate").assert().failure();
    }
}

// =============================================================================
// Config Command Tests
// =============================================================================

mod config_command {
    use super::*;

    #[test]
    fn test_config_init_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = config_path(&dir);

        devsite()
            .args(["config", "init", "--config"])
            .arg(&path)
            .assert()
            .success()
            .stdout(predicate::str::contains("Created devsite.toml"));

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("[paths]"));
        assert!(content.contains("[deploy]"));
    }

    #[test]
    fn test_config_init_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = config_path(&dir);
        fs::write(&path, "[deploy]\ngit_default_branch = \"main\"\n").unwrap();

        devsite()
            .args(["config", "init", "--config"])
            .arg(&path)
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));

        assert!(fs::read_to_string(&path).unwrap().contains("main"));
    }

    #[test]
    fn test_config_show_masks_passwords() {
        let dir = TempDir::new().unwrap();
        let path = config_path(&dir);
        fs::write(&path, "[stack]\nmysql_root_password = \"hunter2\"\n").unwrap();

        devsite()
            .args(["config", "show", "--config"])
            .arg(&path)
            .assert()
            .success()
            .stdout(predicate::str::contains("********"))
            .stdout(predicate::str::contains("hunter2").not());
    }

    #[test]
    fn test_config_show_without_file_uses_defaults() {
        let dir = TempDir::new().unwrap();

        devsite()
            .args(["config", "--config"])
            .arg(config_path(&dir))
            .assert()
            .success()
            .stdout(predicate::str::contains("Using default configuration"));
    }

    #[test]
    fn test_config_validate_missing_file_is_valid() {
        let dir = TempDir::new().unwrap();

        devsite()
            .args(["config", "validate", "--config"])
            .arg(config_path(&dir))
            .assert()
            .success()
            .stdout(predicate::str::contains("valid"));
    }

    #[test]
    fn test_config_validate_rejects_bad_toml() {
        let dir = TempDir::new().unwrap();
        let path = config_path(&dir);
        fs::write(&path, "[deploy\n").unwrap();

        devsite()
            .args(["config", "validate", "--config"])
            .arg(&path)
            .assert()
            .failure();
    }
}

// =============================================================================
// Clean Command Tests
// =============================================================================

mod clean_command {
    use super::*;

    fn make_build(builds: &std::path::Path, name: &str, age_secs: u64) {
        let path = builds.join(name);
        fs::create_dir_all(&path).unwrap();
        let mtime = SystemTime::now() - Duration::from_secs(age_secs);
        fs::File::open(&path).unwrap().set_modified(mtime).unwrap();
    }

    #[test]
    fn test_clean_keeps_newest_builds() {
        let dir = TempDir::new().unwrap();
        let site = dir.path().join("sites").join("acme");
        let builds = site.join(".platform/local/builds");
        make_build(&builds, "build-1", 300);
        make_build(&builds, "build-2", 200);
        make_build(&builds, "build-3", 10);

        devsite()
            .args(["clean", "--keep", "2", "--config"])
            .arg(config_path(&dir))
            .arg(&site)
            .assert()
            .success();

        assert!(!builds.join("build-1").exists());
        assert!(builds.join("build-2").exists());
        assert!(builds.join("build-3").exists());
    }

    #[test]
    fn test_clean_missing_directory_fails() {
        let dir = TempDir::new().unwrap();

        devsite()
            .args(["clean", "--config"])
            .arg(config_path(&dir))
            .arg(dir.path().join("nope"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("not found"));
    }
}
