//! Integration tests for `ecsup config`.
//!
//! Every test points `ECSUP_CONFIG` at a temp path so `~/.ecsup/config.yaml`
//! is never read or written.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn ecsup() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ecsup"));
    cmd.env("NO_COLOR", "1");
    cmd
}

fn temp_config_path() -> (TempDir, String) {
    let dir = TempDir::new().expect("temp dir");
    let path = dir
        .path()
        .join("config.yaml")
        .to_string_lossy()
        .into_owned();
    (dir, path)
}

// --- show ---

#[test]
fn test_config_show_without_file_uses_defaults() {
    let (_dir, path) = temp_config_path();
    ecsup()
        .args(["config", "show"])
        .env("ECSUP_CONFIG", &path)
        .assert()
        .success()
        .stdout(predicate::str::contains("cn-hongkong-b"))
        .stdout(predicate::str::contains("ecs.t5-lc1m2.small"));
}

#[test]
fn test_config_show_never_prints_secrets() {
    let (_dir, path) = temp_config_path();
    ecsup()
        .args(["config", "show"])
        .env("ECSUP_CONFIG", &path)
        .env("ECS_ROOT_PWD", "hunter2-secret")
        .env("ECS_ACCESS_KEY_SECRET", "very-secret-key")
        .assert()
        .success()
        .stdout(predicate::str::contains("hunter2-secret").not())
        .stdout(predicate::str::contains("very-secret-key").not());
}

#[test]
fn test_config_show_json_includes_path_and_values() {
    let (_dir, path) = temp_config_path();
    let assert = ecsup()
        .args(["config", "show", "--json"])
        .env("ECSUP_CONFIG", &path)
        .assert()
        .success();
    let parsed: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("valid JSON");
    assert_eq!(parsed["path"], path.as_str());
    assert_eq!(parsed["config"]["zone"], "cn-hongkong-b");
    assert_eq!(parsed["config"]["ssh_port"], 22);
}

#[test]
fn test_config_show_rejects_malformed_file() {
    let (_dir, path) = temp_config_path();
    std::fs::write(&path, "zone: [unterminated\n").unwrap();
    ecsup()
        .args(["config", "show"])
        .env("ECSUP_CONFIG", &path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot parse"));
}

// --- set ---

#[test]
fn test_config_set_persists_value() {
    let (_dir, path) = temp_config_path();
    ecsup()
        .args(["config", "set", "zone", "cn-hangzhou-b"])
        .env("ECSUP_CONFIG", &path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Set zone = cn-hangzhou-b"));

    let content = std::fs::read_to_string(&path).expect("config written");
    assert!(content.contains("zone: cn-hangzhou-b"), "{content}");

    ecsup()
        .args(["config", "show"])
        .env("ECSUP_CONFIG", &path)
        .assert()
        .success()
        .stdout(predicate::str::contains("cn-hangzhou-b in cn-hangzhou"));
}

#[test]
fn test_config_set_keeps_other_settings() {
    let (_dir, path) = temp_config_path();
    std::fs::write(&path, "instance_name: web-01\ninit_cmds:\n  - apt-get update\n").unwrap();
    ecsup()
        .args(["config", "set", "ssh_port", "2222"])
        .env("ECSUP_CONFIG", &path)
        .assert()
        .success();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("ssh_port: 2222"), "{content}");
    assert!(content.contains("instance_name: web-01"), "{content}");
    assert!(content.contains("apt-get update"), "{content}");
}

#[cfg(unix)]
#[test]
fn test_config_file_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let (_dir, path) = temp_config_path();
    ecsup()
        .args(["config", "set", "instance_name", "web-01"])
        .env("ECSUP_CONFIG", &path)
        .assert()
        .success();
    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn test_config_set_unknown_key_lists_valid_keys() {
    let (_dir, path) = temp_config_path();
    ecsup()
        .args(["config", "set", "colour", "blue"])
        .env("ECSUP_CONFIG", &path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown setting 'colour'"))
        .stderr(predicate::str::contains("poll_interval_ms"));
    assert!(!std::path::Path::new(&path).exists());
}

#[test]
fn test_config_set_unknown_zone_fails() {
    let (_dir, path) = temp_config_path();
    ecsup()
        .args(["config", "set", "zone", "mars-north-1a"])
        .env("ECSUP_CONFIG", &path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown zone 'mars-north-1a'"));
}

#[test]
fn test_config_set_invalid_number_fails() {
    let (_dir, path) = temp_config_path();
    ecsup()
        .args(["config", "set", "ssh_port", "ssh"])
        .env("ECSUP_CONFIG", &path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected a port number"));
}
