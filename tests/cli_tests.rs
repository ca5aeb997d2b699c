//! CLI integration tests
//!
//! These tests run the `netdiag` binary and only exercise paths that finish
//! without touching the network.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn netdiag() -> Command {
    let mut cmd = Command::cargo_bin("netdiag").unwrap();
    cmd.env_remove("NETDIAG_TARGET").current_dir(std::env::temp_dir());
    cmd
}

#[test]
fn test_help_lists_options() {
    netdiag()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--tests"))
        .stdout(predicate::str::contains("--dns-types"))
        .stdout(predicate::str::contains("--json"));
}

#[test]
fn test_version() {
    netdiag()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_env_help() {
    netdiag()
        .arg("--env-help")
        .assert()
        .success()
        .stdout(predicate::str::contains("NETDIAG_TIMEOUT_MS"));
}

#[test]
fn test_empty_target_json_envelope() {
    let output = netdiag().args(["", "--json"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["engine"], "network");
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("目标主机"));
    assert!(json["results"].as_object().unwrap().is_empty());
}

#[test]
fn test_invalid_target_plain_output() {
    netdiag()
        .args(["bad host!", "--no-color"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("ERROR: 无效的目标主机"));
}

#[test]
fn test_missing_target() {
    netdiag()
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Must specify a target"));
}

#[test]
fn test_conflicting_color_flags() {
    netdiag()
        .args(["example.com", "--color", "--no-color"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--color and --no-color"));
}

#[test]
fn test_timeout_out_of_range() {
    netdiag()
        .args(["example.com", "--timeout", "301"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("300 seconds"));
}

#[test]
fn test_invalid_dns_type_is_validation_error() {
    netdiag()
        .args(["example.com", "--dns-types", "SOA", "--no-color"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("VALIDATION"));
}

#[test]
fn test_request_file_with_empty_target() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("request.json");
    fs::write(&path, r#"{"target":"","tests":["port"],"portOptions":{"ports":[80]}}"#).unwrap();

    let output = netdiag()
        .arg("--request")
        .arg(&path)
        .arg("--json")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["success"], false);
}

#[test]
fn test_malformed_request_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("request.json");
    fs::write(&path, "{ not json").unwrap();

    netdiag()
        .arg("--request")
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::is_empty());
}
