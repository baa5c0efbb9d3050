//! End-to-end CLI tests for the songbridge binary.

#![allow(clippy::unwrap_used)]

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;

fn songbridge() -> Command {
    let mut cmd = Command::cargo_bin("songbridge").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    songbridge()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--adapters"))
        .stdout(predicate::str::contains("--headless"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    songbridge()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("songbridge"));
}

/// Test that a missing link is a usage error.
#[test]
fn test_binary_without_link_is_usage_error() {
    songbridge()
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

/// Test that an unknown service tag is rejected by argument parsing.
#[test]
fn test_binary_unknown_adapter_rejected() {
    songbridge()
        .args(["https://open.spotify.com/track/1", "--adapters", "napster"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("napster"));
}

/// Test that an unrecognized link prints an error body and exits with 1.
#[test]
fn test_binary_unrecognized_link_prints_error_json() {
    songbridge()
        .args(["-q", "https://example.com/not-music"])
        .assert()
        .code(1)
        .stdout(predicate::str::starts_with(r#"{"error":"#))
        .stdout(predicate::str::contains("unrecognized link"));
}

/// Test that an undecodable search id prints an error body and exits with 1.
#[test]
fn test_binary_invalid_search_id_prints_error_json() {
    songbridge()
        .args(["-q", "--search-id", "%%%"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(r#""error""#));
}

/// Test that a malformed config file is reported before any resolution.
#[test]
fn test_binary_bad_config_prints_error_json() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "this line has no equals sign").unwrap();

    songbridge()
        .args(["-q", "https://open.spotify.com/track/1", "--config"])
        .arg(file.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("configuration"));
}
