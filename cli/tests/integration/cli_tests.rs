//! Integration tests for argument parsing and early failures.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// The binary with a private config location and no credentials.
fn ecsup(config_dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ecsup"));
    cmd.env("NO_COLOR", "1")
        .env("ECSUP_CONFIG", config_dir.path().join("config.yaml"))
        .env_remove("ECS_ACCESS_KEY_ID")
        .env_remove("ECS_ACCESS_KEY_SECRET")
        .env_remove("ECS_ROOT_PWD")
        .env_remove("ECS_KEY_PAIR_NAME")
        .env_remove("RUST_LOG");
    cmd
}

fn tmp() -> TempDir {
    TempDir::new().expect("temp dir")
}

// --- Help and version ---

#[test]
fn test_no_args_shows_help() {
    let dir = tmp();
    ecsup(&dir)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Provision, bootstrap and tear down"));
}

#[test]
fn test_help_lists_every_command() {
    let dir = tmp();
    let assert = ecsup(&dir).arg("--help").assert().success();
    let out = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    for cmd in [
        "up", "down", "delete", "reboot", "list", "run", "push", "pull", "proxy", "domain",
        "config",
    ] {
        assert!(out.contains(cmd), "help is missing `{cmd}`:\n{out}");
    }
}

#[test]
fn test_version_flag() {
    let dir = tmp();
    ecsup(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ecsup 0.1.0"));
}

// --- Argument validation ---

#[test]
fn test_name_and_ip_are_mutually_exclusive() {
    let dir = tmp();
    ecsup(&dir)
        .args(["down", "--name", "web", "--ip", "203.0.113.5"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_invalid_instance_name_is_rejected() {
    let dir = tmp();
    ecsup(&dir)
        .args(["down", "--name", "9 lives"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid instance name '9 lives'"));
}

#[test]
fn test_push_requires_local_and_remote() {
    let dir = tmp();
    ecsup(&dir)
        .args(["push", "./only-one"])
        .assert()
        .code(2);
}

#[test]
fn test_no_color_accepts_any_non_empty_value() {
    let dir = tmp();
    for value in ["1", "yes", "true"] {
        ecsup(&dir)
            .env("NO_COLOR", value)
            .args(["config", "show"])
            .assert()
            .success();
    }
    ecsup(&dir)
        .env("NO_COLOR", "")
        .args(["config", "show"])
        .assert()
        .success();
}

// --- Failures before any provider call ---

#[test]
fn test_list_without_api_keys_names_the_variable() {
    let dir = tmp();
    ecsup(&dir)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("ECS_ACCESS_KEY_ID"));
}

#[test]
fn test_json_errors_are_objects() {
    let dir = tmp();
    ecsup(&dir)
        .args(["list", "--json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(r#""error": true"#))
        .stderr(predicate::str::contains("ECS_ACCESS_KEY_ID"));
}

#[test]
fn test_run_with_nothing_to_run() {
    let dir = tmp();
    ecsup(&dir)
        .args(["run", "--ip", "203.0.113.5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nothing to run"));
}

#[test]
fn test_run_by_address_without_login_credentials() {
    let dir = tmp();
    ecsup(&dir)
        .args(["run", "--ip", "203.0.113.5", "uptime"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no password or private key"));
}

#[test]
fn test_up_without_login_credentials_fails_before_provider_calls() {
    let dir = tmp();
    ecsup(&dir)
        .args(["up", "--name", "build-01"])
        .env("ECS_ACCESS_KEY_ID", "id")
        .env("ECS_ACCESS_KEY_SECRET", "secret")
        .env("ECSUP_CONFIG", write_config(&dir, "init_cmds:\n  - echo hi\n"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("no password or private key"));
}

#[test]
fn test_proxy_without_login_credentials() {
    let dir = tmp();
    ecsup(&dir)
        .args(["proxy", "--ip", "203.0.113.5", "--port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no password or private key"));
}

#[test]
fn test_domain_list_without_api_keys() {
    let dir = tmp();
    ecsup(&dir)
        .args(["domain", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ECS_ACCESS_KEY_ID"));
}

#[test]
fn test_domain_check_rejects_malformed_names_before_provider_calls() {
    let dir = tmp();
    ecsup(&dir)
        .args(["domain", "check", "not a domain"])
        .env("ECS_ACCESS_KEY_ID", "id")
        .env("ECS_ACCESS_KEY_SECRET", "secret")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid domain name 'not a domain'"));
}

fn write_config(dir: &TempDir, yaml: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, yaml).expect("write config");
    path
}
