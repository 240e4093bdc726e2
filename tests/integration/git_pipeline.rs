//! Checkout updates: dev rebases and release-tag checkouts.

use std::fs;

use openclaw_update::process::CommandOutput;
use openclaw_update::test_utils::{FakeRegistry, InstallFixture, write_package_json};
use openclaw_update::update::engine::GIT_TAG_IGNORED_NOTE;
use openclaw_update::update::{UpdateMode, UpdateStatus};

use crate::common::{self, HEAD_SHA};

#[tokio::test]
async fn test_dev_update_runs_full_pipeline() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.git_install("1.0.0").unwrap();
    let rebased = root.clone();
    let runner = common::git_runner().on("rebase @{upstream}", CommandOutput::ok(""), move |_| {
        write_package_json(&rebased, "openclaw", "1.1.0").unwrap();
    });
    let engine = common::engine(&fixture, &runner, FakeRegistry::new());

    let report = common::run(&engine, &common::options(&fixture, root.clone())).await;

    assert_eq!(report.result.status, UpdateStatus::Ok);
    assert_eq!(report.result.mode, UpdateMode::Git);
    assert_eq!(
        common::step_names(&report),
        vec![
            "clean check",
            "upstream check",
            "git fetch",
            "git rebase",
            "deps install",
            "build",
            "openclaw doctor"
        ]
    );
    assert_eq!(report.result.before.version.as_deref(), Some("1.0.0"));
    assert_eq!(report.result.before.sha.as_deref(), Some(HEAD_SHA));
    assert_eq!(report.result.after.version.as_deref(), Some("1.1.0"));

    let doctor = report.result.steps.last().unwrap();
    assert!(doctor.command.starts_with("node "));
    assert!(doctor.command.ends_with("openclaw.mjs doctor --non-interactive"));
    assert_eq!(doctor.cwd.as_deref(), Some(root.as_path()));
    assert!(runner.ran("npm install"));
    assert!(runner.ran("npm run build"));
    assert!(!runner.ran("ui:build"));

    assert!(report.plugins.is_some());
    assert!(report.restart.as_ref().is_some_and(|r| r.restarted));
    assert_eq!(engine.service().restart_calls(), 1);
    assert!(common::lock_path(&fixture).exists());
    assert!(!report.channel_persisted);
    assert_eq!(engine.registry().calls(), 0);
}

#[tokio::test]
async fn test_dirty_tree_is_skipped_before_anything_runs() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.git_install("1.0.0").unwrap();
    let runner =
        common::git_runner().respond("status --porcelain", CommandOutput::ok(" M src/index.ts\n"));
    let engine = common::engine(&fixture, &runner, FakeRegistry::new());

    let report = common::run(&engine, &common::options(&fixture, root)).await;

    assert_eq!(report.result.status, UpdateStatus::Skipped);
    assert_eq!(report.result.reason.as_deref(), Some("dirty"));
    assert!(report.result.steps.is_empty());
    assert_eq!(report.result.before, report.result.after);
    assert!(!runner.ran("fetch"));
    assert!(report.plugins.is_none());
    assert!(report.restart.is_none());
    assert_eq!(report.result.exit_code(), 0);
}

#[tokio::test]
async fn test_missing_upstream_is_skipped() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.git_install("1.0.0").unwrap();
    let runner = common::git_runner()
        .respond("symbolic-full-name", CommandOutput::failed(128, "fatal: no upstream configured"));
    let engine = common::engine(&fixture, &runner, FakeRegistry::new());

    let report = common::run(&engine, &common::options(&fixture, root)).await;

    assert_eq!(report.result.status, UpdateStatus::Skipped);
    assert_eq!(report.result.reason.as_deref(), Some("no-upstream"));
    assert!(!runner.ran("fetch"));
    assert!(!runner.ran("rebase"));
}

#[tokio::test]
async fn test_rebase_failure_stops_pipeline() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.git_install("1.0.0").unwrap();
    let runner = common::git_runner()
        .respond("rebase @{upstream}", CommandOutput::failed(1, "CONFLICT (content): src/a.ts"));
    let engine = common::engine(&fixture, &runner, FakeRegistry::new());

    let report = common::run(&engine, &common::options(&fixture, root)).await;

    assert_eq!(report.result.status, UpdateStatus::Error);
    assert_eq!(report.result.reason.as_deref(), Some("git rebase"));
    assert_eq!(report.result.exit_code(), 1);

    let failed = report.result.failed_step().unwrap();
    assert_eq!(failed.name, "git rebase");
    assert_eq!(failed.exit_code, Some(1));
    assert!(failed.stderr_tail.as_deref().unwrap().contains("CONFLICT"));

    assert!(!runner.ran("npm install"));
    assert!(report.plugins.is_none());
    assert!(report.restart.is_none());
    assert_eq!(engine.service().restart_calls(), 0);
}

#[tokio::test]
async fn test_timed_out_step_stops_pipeline() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.git_install("1.0.0").unwrap();
    let runner = common::git_runner()
        .respond("npm install", CommandOutput::timed_out("timed out after 1200s"));
    let engine = common::engine(&fixture, &runner, FakeRegistry::new());

    let report = common::run(&engine, &common::options(&fixture, root)).await;

    assert_eq!(report.result.status, UpdateStatus::Error);
    assert_eq!(report.result.reason.as_deref(), Some("deps install"));
    assert_eq!(report.result.exit_code(), 1);
    assert_eq!(common::step_names(&report).last(), Some(&"deps install"));

    let failed = report.result.failed_step().unwrap();
    assert_eq!(failed.exit_code, None);
    assert!(failed.stderr_tail.as_deref().unwrap().contains("timed out"));

    let json = serde_json::to_value(&report.result).unwrap();
    let last = json["steps"].as_array().unwrap().last().unwrap().clone();
    assert!(last["exitCode"].is_null());

    assert!(!runner.ran("npm run build"));
    assert!(!runner.ran("doctor"));
    assert!(report.restart.is_none());
}

#[tokio::test]
async fn test_stable_channel_checks_out_newest_release() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.git_install("1.0.0").unwrap();
    fixture.write_config("[update]\nchannel = \"stable\"\n").unwrap();
    let runner = common::git_runner()
        .respond("tag --list", CommandOutput::ok("v1.0.0\nv1.2.0-beta.1\nv1.1.0\n"));
    let engine = common::engine(&fixture, &runner, FakeRegistry::new());

    let report = common::run(&engine, &common::options(&fixture, root)).await;

    assert_eq!(report.result.status, UpdateStatus::Ok);
    assert_eq!(
        common::step_names(&report),
        vec!["clean check", "git fetch", "git checkout", "deps install", "build", "openclaw doctor"]
    );
    assert!(runner.ran("checkout --detach v1.1.0"));
    assert!(!runner.ran("rebase"));
    assert!(!runner.ran("symbolic-full-name"));
}

#[tokio::test]
async fn test_beta_channel_accepts_beta_tags() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.git_install("1.0.0").unwrap();
    fixture.write_config("[update]\nchannel = \"beta\"\n").unwrap();
    let runner = common::git_runner()
        .respond("tag --list", CommandOutput::ok("v1.0.0\nv1.2.0-beta.1\nv1.1.0\nv1.3.0-rc.1\n"));
    let engine = common::engine(&fixture, &runner, FakeRegistry::new());

    let report = common::run(&engine, &common::options(&fixture, root)).await;

    assert_eq!(report.result.status, UpdateStatus::Ok);
    assert!(runner.ran("checkout --detach v1.2.0-beta.1"));
    assert_eq!(engine.plugins().sync_calls().len(), 1);
}

#[tokio::test]
async fn test_no_release_tag_is_skipped() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.git_install("1.0.0").unwrap();
    fixture.write_config("[update]\nchannel = \"stable\"\n").unwrap();
    let runner = common::git_runner().respond("tag --list", CommandOutput::ok("v2.0.0-beta.1\n"));
    let engine = common::engine(&fixture, &runner, FakeRegistry::new());

    let report = common::run(&engine, &common::options(&fixture, root)).await;

    assert_eq!(report.result.status, UpdateStatus::Skipped);
    assert_eq!(report.result.reason.as_deref(), Some("no-release-tag"));
    assert_eq!(common::step_names(&report), vec!["clean check", "git fetch"]);
    assert!(!runner.ran("checkout --detach"));
}

#[tokio::test]
async fn test_failed_tag_listing_is_an_error() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.git_install("1.0.0").unwrap();
    fixture.write_config("[update]\nchannel = \"stable\"\n").unwrap();
    let runner = common::git_runner()
        .respond("tag --list", CommandOutput::failed(128, "fatal: not a git repository"));
    let engine = common::engine(&fixture, &runner, FakeRegistry::new());

    let report = common::run(&engine, &common::options(&fixture, root)).await;

    assert_eq!(report.result.status, UpdateStatus::Error);
    assert_eq!(report.result.reason.as_deref(), Some("git tag list"));
    assert_eq!(common::step_names(&report), vec!["clean check", "git fetch", "git tag list"]);
    let failed = report.result.failed_step().unwrap();
    assert_eq!(failed.exit_code, Some(128));
    assert!(failed.stderr_tail.as_deref().unwrap().contains("not a git repository"));
    assert!(!runner.ran("checkout --detach"));
}

#[tokio::test]
async fn test_ui_build_and_lockfile_manager() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.git_install("1.0.0").unwrap();
    fs::write(root.join("pnpm-lock.yaml"), "lockfileVersion: '9.0'\n").unwrap();
    write_package_json(&root.join("ui"), "openclaw-ui", "1.0.0").unwrap();
    let runner = common::git_runner();
    let engine = common::engine(&fixture, &runner, FakeRegistry::new());

    let report = common::run(&engine, &common::options(&fixture, root)).await;

    assert_eq!(report.result.status, UpdateStatus::Ok);
    assert_eq!(
        &common::step_names(&report)[4..],
        &["deps install", "build", "ui:build", "openclaw doctor"]
    );
    assert!(runner.ran("pnpm install"));
    assert!(runner.ran("pnpm run build"));
    assert!(runner.ran("pnpm run ui:build"));
    assert!(!runner.calls().iter().any(|c| c.starts_with("npm ")));
}

#[tokio::test]
async fn test_tag_is_ignored_for_checkouts() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.git_install("1.0.0").unwrap();
    let runner = common::git_runner();
    let engine = common::engine(&fixture, &runner, FakeRegistry::new().with_tag("latest", "9.9.9"));
    let mut options = common::options(&fixture, root);
    options.tag = Some("1.2.3".to_string());

    let report = common::run(&engine, &options).await;

    assert_eq!(report.result.status, UpdateStatus::Ok);
    assert!(report.notes.iter().any(|n| n == GIT_TAG_IGNORED_NOTE));
    assert!(report.target.is_none());
    assert_eq!(engine.registry().calls(), 0);
    assert!(!runner.ran("1.2.3"));
}
