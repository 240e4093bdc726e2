//! Command-line behavior of the built binary.
//!
//! Every invocation gets its own temporary home so no real configuration,
//! lock or checkout is touched.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cli(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("openclaw-update").unwrap();
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("OPENCLAW_CONFIG_PATH", home.path().join("config.toml"))
        .env("OPENCLAW_GIT_DIR", home.path().join("checkout"))
        .env("OPENCLAW_NO_PROGRESS", "1")
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().unwrap();
    cli(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn test_invalid_channel_is_rejected() {
    let home = TempDir::new().unwrap();
    cli(&home)
        .args(["update", "--channel", "nightly", "--root"])
        .arg(home.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--channel must be"));
    assert!(!home.path().join("config.toml").exists());
}

#[test]
fn test_zero_timeout_is_rejected() {
    let home = TempDir::new().unwrap();
    cli(&home)
        .args(["update", "--timeout", "0", "--root"])
        .arg(home.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--timeout must be a positive integer"));
}

#[test]
fn test_update_outside_an_install_is_skipped() {
    let home = TempDir::new().unwrap();
    let root = home.path().join("empty");
    std::fs::create_dir_all(&root).unwrap();

    let output = cli(&home)
        .args(["update", "--json", "--no-restart", "--root"])
        .arg(&root)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["status"], "skipped");
    assert_eq!(json["reason"], "not-git-install");
    assert_eq!(json["mode"], "other");
    assert_eq!(json["steps"].as_array().map(Vec::len), Some(0));
}

#[test]
fn test_update_outside_an_install_human_output() {
    let home = TempDir::new().unwrap();
    let root = home.path().join("empty");
    std::fs::create_dir_all(&root).unwrap();

    cli(&home)
        .args(["update", "--no-restart", "--root"])
        .arg(&root)
        .assert()
        .success()
        .stdout(predicate::str::contains("Update Result: SKIPPED"))
        .stdout(predicate::str::contains("not-git-install"));
}

#[test]
fn test_status_json_for_unknown_install() {
    let home = TempDir::new().unwrap();
    let root = home.path().join("empty");
    std::fs::create_dir_all(&root).unwrap();

    let output = cli(&home).args(["status", "--json", "--root"]).arg(&root).output().unwrap();

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["install"]["kind"], "unknown");
    assert_eq!(json["update"]["state"], "unknown");
    assert_eq!(json["channel"]["channel"], "stable");
}
