//! CLI tests for the swimlane binary.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const ENV_VARS: [&str; 6] = [
    "PORT",
    "SWIMLANE_STORE",
    "SQL_PROXY_URL",
    "SQL_PROXY_API_KEY",
    "SWIMLANE_DB_PATH",
    "SWIMLANE_LOG_FORMAT",
];

/// A swimlane command isolated from the caller's environment.
fn swimlane(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("swimlane");
    cmd.current_dir(dir.path());
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    swimlane(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("verify"))
        .stdout(predicate::str::contains("show"));
}

#[test]
fn test_version() {
    let dir = TempDir::new().unwrap();
    swimlane(&dir).arg("--version").assert().success();
}

#[test]
fn test_init_creates_database_and_default_board() {
    let dir = TempDir::new().unwrap();

    swimlane(&dir)
        .args(["init", "--db-path", "data/board.db"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Board database initialized"))
        .stdout(predicate::str::contains("Default Board"));

    assert!(dir.path().join("data/board.db").exists());
}

#[test]
fn test_init_is_idempotent() {
    let dir = TempDir::new().unwrap();

    swimlane(&dir).args(["init", "--db-path", "board.db"]).assert().success();

    // The second run finds the existing board and creates nothing.
    swimlane(&dir)
        .args(["init", "--db-path", "board.db"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Default Board").not());
}

#[test]
fn test_init_reads_db_path_from_config_file() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("swimlane.toml"),
        "[store]\ndb_path = \"from-config.db\"\n",
    )
    .unwrap();

    swimlane(&dir).arg("init").assert().success();
    assert!(dir.path().join("from-config.db").exists());
}

#[test]
fn test_http_backend_without_url_is_rejected() {
    let dir = TempDir::new().unwrap();
    swimlane(&dir)
        .env("SWIMLANE_STORE", "http")
        .args(["serve", "--port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("requires store.url"));
}

#[test]
fn test_verify_against_unreachable_server_fails() {
    let dir = TempDir::new().unwrap();
    swimlane(&dir)
        .args(["verify", "--url", "http://127.0.0.1:9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not reach"));
}

#[test]
fn test_init_ignores_configured_http_backend() {
    let dir = TempDir::new().unwrap();
    swimlane(&dir)
        .env("SWIMLANE_STORE", "http")
        .args(["init", "--db-path", "local.db"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Board database initialized"));
    assert!(dir.path().join("local.db").exists());
}

#[test]
fn test_verify_does_not_need_store_url() {
    let dir = TempDir::new().unwrap();
    // Fails on the unreachable server, not on the store configuration.
    swimlane(&dir)
        .env("SWIMLANE_STORE", "http")
        .args(["verify", "--url", "http://127.0.0.1:9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not reach"))
        .stderr(predicate::str::contains("requires store.url").not());
}
