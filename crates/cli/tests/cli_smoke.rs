//! CLI smoke tests for byoa.
//!
//! These cover the commands that work without terraform or cloud
//! credentials, and check exit codes and the shape of their output.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn byoa_cmd() -> Command {
  cargo_bin_cmd!("byoa")
}

fn temp_manifest(content: &str) -> TempDir {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join("byoa.yaml"), content).unwrap();
  temp
}

const VALID_MANIFEST: &str = r#"
name: orders-api
runtime: node20
start_command: node server.js
port: 3000
endpoints:
  - GET /orders
  - POST /orders
scaling:
  min: 1
  max: 4
"#;

const INVALID_MANIFEST: &str = r#"
name: Orders_API
runtime: cobol
start_command: ""
port: 70000
endpoints:
  - FETCH /orders
"#;

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  byoa_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  byoa_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("byoa"));
}

#[test]
fn subcommand_help_works() {
  for cmd in &["validate", "plan", "deploy", "destroy", "status", "doctor"] {
    byoa_cmd()
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

#[test]
fn deploy_help_lists_shared_flags() {
  byoa_cmd()
    .args(["deploy", "--help"])
    .assert()
    .success()
    .stdout(predicate::str::contains("--env"))
    .stdout(predicate::str::contains("--keep-workdir"))
    .stdout(predicate::str::contains("--image"));
}

// =============================================================================
// validate
// =============================================================================

#[test]
fn validate_accepts_valid_manifest() {
  let temp = temp_manifest(VALID_MANIFEST);

  byoa_cmd()
    .arg("validate")
    .arg("-f")
    .arg(temp.path().join("byoa.yaml"))
    .assert()
    .success()
    .stdout(predicate::str::contains("is valid"))
    .stdout(predicate::str::contains("node:20-alpine"));
}

#[test]
fn validate_uses_default_file_name() {
  let temp = temp_manifest(VALID_MANIFEST);

  byoa_cmd()
    .current_dir(temp.path())
    .arg("validate")
    .assert()
    .success();
}

#[test]
fn validate_lists_every_problem() {
  let temp = temp_manifest(INVALID_MANIFEST);

  byoa_cmd()
    .arg("validate")
    .arg("-f")
    .arg(temp.path().join("byoa.yaml"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("name:"))
    .stderr(predicate::str::contains("runtime:"))
    .stderr(predicate::str::contains("start_command:"))
    .stderr(predicate::str::contains("port:"))
    .stderr(predicate::str::contains("endpoints[0]:"));
}

#[test]
fn validate_json_output() {
  let temp = temp_manifest(INVALID_MANIFEST);

  let output = byoa_cmd()
    .args(["--output", "json", "validate", "-f"])
    .arg(temp.path().join("byoa.yaml"))
    .output()
    .unwrap();

  assert!(!output.status.success());
  let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(value["valid"], false);
  assert_eq!(value["violations"].as_array().unwrap().len(), 5);
  assert_eq!(value["violations"][0]["field"], "name");
}

#[test]
fn validate_missing_file_fails() {
  let temp = TempDir::new().unwrap();

  byoa_cmd()
    .arg("validate")
    .arg("-f")
    .arg(temp.path().join("missing.yaml"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("failed to read manifest"));
}

// =============================================================================
// plan / deploy argument handling
// =============================================================================

#[test]
fn plan_with_missing_manifest_fails_before_cloud_calls() {
  let temp = TempDir::new().unwrap();

  byoa_cmd()
    .arg("plan")
    .arg("-f")
    .arg(temp.path().join("missing.yaml"))
    .env("PATH", temp.path())
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to load manifest"));
}

#[test]
fn unknown_output_format_is_rejected() {
  byoa_cmd()
    .args(["--output", "yaml", "status"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("invalid value"));
}

// =============================================================================
// status
// =============================================================================

#[test]
fn status_with_no_records() {
  let temp = TempDir::new().unwrap();

  byoa_cmd()
    .arg("status")
    .env("BYOA_CONFIG_DIR", temp.path())
    .assert()
    .success()
    .stdout(predicate::str::contains("No deployments recorded"));
}

#[test]
fn status_lists_records() {
  let temp = TempDir::new().unwrap();
  std::fs::write(
    temp.path().join("deployments.json"),
    r#"{
  "version": 1,
  "deployments": {
    "orders-api": {
      "type": "byoa",
      "account_id": "123456789012",
      "region": "eu-west-1",
      "environment": "staging",
      "endpoint": "https://orders.example.com",
      "timestamp": "2026-02-01T10:00:00Z"
    }
  }
}"#,
  )
  .unwrap();

  byoa_cmd()
    .arg("status")
    .env("BYOA_CONFIG_DIR", temp.path())
    .assert()
    .success()
    .stdout(predicate::str::contains("orders-api (staging)"))
    .stdout(predicate::str::contains("https://orders.example.com"));

  let output = byoa_cmd()
    .args(["-o", "json", "status"])
    .env("BYOA_CONFIG_DIR", temp.path())
    .output()
    .unwrap();
  let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(value["orders-api"]["region"], "eu-west-1");
}

#[test]
fn status_with_corrupt_records_fails() {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join("deployments.json"), "{ not json").unwrap();

  byoa_cmd()
    .arg("status")
    .env("BYOA_CONFIG_DIR", temp.path())
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to load deployment records"));
}
