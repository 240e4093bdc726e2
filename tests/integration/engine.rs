//! Engine-level behavior: detection fallbacks, locking, config handling and
//! the post-update phases.

use std::fs;
use std::time::Duration;

use openclaw_update::channel::{ChannelSource, UpdateChannel};
use openclaw_update::core::UpdateError;
use openclaw_update::process::CommandOutput;
use openclaw_update::test_utils::{
    FakePluginSync, FakePrompter, FakeRegistry, FakeService, InstallFixture, RecordingObserver,
};
use openclaw_update::update::{UpdateLock, UpdateMode, UpdateOutcome, UpdateStatus};

use crate::common;

#[tokio::test]
async fn test_unknown_install_is_skipped_without_lock() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.path().join("somewhere");
    fs::create_dir_all(&root).unwrap();
    let runner = common::git_runner();
    let engine = common::engine(&fixture, &runner, FakeRegistry::new().with_tag("latest", "1.0.0"));

    let report = common::run(&engine, &common::options(&fixture, root.clone())).await;

    assert_eq!(report.result.status, UpdateStatus::Skipped);
    assert_eq!(report.result.mode, UpdateMode::Other);
    assert_eq!(report.result.reason.as_deref(), Some("not-git-install"));
    assert_eq!(report.result.root, root);
    assert!(report.result.steps.is_empty());
    assert_eq!(report.result.exit_code(), 0);
    assert_eq!(report.channel.channel, UpdateChannel::Stable);
    assert_eq!(report.channel.source, ChannelSource::InstallDefault);
    assert!(report.target.is_none());
    assert_eq!(engine.registry().calls(), 0);
    assert!(!common::lock_path(&fixture).exists());
    assert!(report.plugins.is_none());
    assert!(report.restart.is_none());
}

#[tokio::test]
async fn test_held_lock_rejects_second_run() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.git_install("1.0.0").unwrap();
    let runner = common::git_runner();
    let engine = common::engine(&fixture, &runner, FakeRegistry::new());
    let mut options = common::options(&fixture, root);
    options.lock_timeout = Duration::from_millis(100);

    let _held = UpdateLock::acquire(&fixture.state_dir(), Duration::from_secs(1)).await.unwrap();
    let err = engine.run(&options, &RecordingObserver::default()).await.unwrap_err();

    assert!(
        matches!(err.downcast_ref::<UpdateError>(), Some(UpdateError::LockHeld { .. })),
        "{err:#}"
    );
    assert!(!runner.ran("status --porcelain"));
}

#[tokio::test]
async fn test_lock_is_released_after_a_run() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.git_install("1.0.0").unwrap();
    let runner = common::git_runner();
    let engine = common::engine(&fixture, &runner, FakeRegistry::new());
    let options = common::options(&fixture, root);

    common::run(&engine, &options).await;
    let lock = UpdateLock::acquire(&fixture.state_dir(), Duration::from_millis(100)).await;

    assert!(lock.is_ok());
}

#[tokio::test]
async fn test_invalid_config_blocks_channel_switch() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.git_install("1.0.0").unwrap();
    fixture.write_config("[update\nchannel = ").unwrap();
    let runner = common::git_runner();
    let engine = common::engine(&fixture, &runner, FakeRegistry::new());
    let mut options = common::options(&fixture, root);
    options.requested_channel = Some(UpdateChannel::Beta);

    let err = engine.run(&options, &RecordingObserver::default()).await.unwrap_err();

    match err.downcast_ref::<UpdateError>() {
        Some(UpdateError::ConfigInvalid { path, issues }) => {
            assert_eq!(path, &fixture.config_path());
            assert!(!issues.is_empty());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(runner.calls().is_empty());
    assert_eq!(fs::read_to_string(fixture.config_path()).unwrap(), "[update\nchannel = ");
}

#[tokio::test]
async fn test_invalid_config_still_updates_core() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.git_install("1.0.0").unwrap();
    fixture.write_config("[update\nchannel = ").unwrap();
    let runner = common::git_runner();
    let engine = common::engine_with(
        &fixture,
        &runner,
        FakeRegistry::new(),
        FakePrompter::non_interactive(),
        FakePluginSync::switching_to_bundled(&["voice-call"]),
        FakeService::healthy(),
    );

    let report = common::run(&engine, &common::options(&fixture, root)).await;

    assert_eq!(report.result.status, UpdateStatus::Ok);
    assert_eq!(report.channel.channel, UpdateChannel::Dev);
    assert!(report.plugins.is_none());
    assert!(report.notes.iter().any(|n| n.contains("config is invalid")));
    assert!(engine.plugins().sync_calls().is_empty());
    assert_eq!(fs::read_to_string(fixture.config_path()).unwrap(), "[update\nchannel = ");
}

#[tokio::test]
async fn test_persisting_channel_keeps_comments() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.package_install("1.0.0").unwrap();
    fixture
        .write_config("# managed by hand\n[gateway]\nport = 8080 # keep this\n")
        .unwrap();
    let runner = common::package_runner(&fixture);
    let engine = common::engine(&fixture, &runner, FakeRegistry::new().with_tag("latest", "1.2.0"));
    let mut options = common::options(&fixture, root);
    options.requested_channel = Some(UpdateChannel::Stable);

    let report = common::run(&engine, &options).await;

    assert_eq!(report.channel.source, ChannelSource::Explicit);
    assert!(report.channel_persisted);
    let config = fs::read_to_string(fixture.config_path()).unwrap();
    assert!(config.contains("# managed by hand"));
    assert!(config.contains("port = 8080 # keep this"));
    assert!(config.contains("[update]"));
    assert!(config.contains("channel = \"stable\""));
}

#[tokio::test]
async fn test_stored_channel_is_used_without_request() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.package_install("1.0.0").unwrap();
    fixture.write_config("[update]\nchannel = \"beta\"\n").unwrap();
    let runner = common::package_runner(&fixture);
    let engine = common::engine(
        &fixture,
        &runner,
        FakeRegistry::new().with_tag("latest", "1.2.0").with_tag("beta", "1.3.0-beta.2"),
    );

    let report = common::run(&engine, &common::options(&fixture, root)).await;

    assert_eq!(report.channel.channel, UpdateChannel::Beta);
    assert_eq!(report.channel.source, ChannelSource::StoredConfig);
    assert!(!report.channel_persisted);
    assert!(runner.ran("npm i -g openclaw@beta"));
}

#[tokio::test]
async fn test_plugin_reconcile_persists_records() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.git_install("1.0.0").unwrap();
    fixture
        .write_config(
            "[plugins.installs.voice-call]\nsource = \"npm\"\nspec = \"@openclaw/voice-call\"\n\n\
             [plugins.installs.matrix]\nsource = \"npm\"\nspec = \"@openclaw/matrix\"\n",
        )
        .unwrap();
    let runner = common::git_runner();
    let engine = common::engine_with(
        &fixture,
        &runner,
        FakeRegistry::new(),
        FakePrompter::non_interactive(),
        FakePluginSync::switching_to_bundled(&["voice-call"]),
        FakeService::healthy(),
    );

    let report = common::run(&engine, &common::options(&fixture, root.clone())).await;

    let plugins = report.plugins.as_ref().unwrap();
    assert_eq!(plugins.sync.switched_to_bundled, vec!["voice-call".to_string()]);
    assert!(plugins.persisted);
    assert_eq!(plugins.counts.unchanged, 1);
    assert_eq!(plugins.outcomes[0].id, "matrix");
    assert_eq!(engine.plugins().sync_calls(), vec![UpdateChannel::Dev]);
    assert_eq!(engine.plugins().skip_ids_seen(), vec![vec!["voice-call".to_string()]]);

    let config = fs::read_to_string(fixture.config_path()).unwrap();
    let parsed: toml::Table = toml::from_str(&config).unwrap();
    let voice = &parsed["plugins"]["installs"]["voice-call"];
    assert_eq!(voice["source"].as_str(), Some("bundled"));
    let expected = root.join("extensions").join("voice-call");
    assert_eq!(voice["install_path"].as_str(), expected.to_str());
    assert_eq!(parsed["plugins"]["installs"]["matrix"]["source"].as_str(), Some("npm"));
}

#[tokio::test]
async fn test_plugin_failures_are_warnings() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.git_install("1.0.0").unwrap();
    let runner = common::git_runner();
    let engine = common::engine_with(
        &fixture,
        &runner,
        FakeRegistry::new(),
        FakePrompter::non_interactive(),
        FakePluginSync::failing(),
        FakeService::healthy(),
    );

    let report = common::run(&engine, &common::options(&fixture, root)).await;

    assert_eq!(report.result.status, UpdateStatus::Ok);
    let plugins = report.plugins.as_ref().unwrap();
    assert_eq!(plugins.warnings.len(), 2);
    assert!(!plugins.persisted);
    assert!(!fixture.config_path().exists());
    assert!(report.restart.as_ref().is_some_and(|r| r.restarted));
}

#[tokio::test]
async fn test_restart_failure_is_a_warning() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.git_install("1.0.0").unwrap();
    let runner = common::git_runner();
    let engine = common::engine_with(
        &fixture,
        &runner,
        FakeRegistry::new(),
        FakePrompter::non_interactive(),
        FakePluginSync::quiet(),
        FakeService::restart_fails(),
    );

    let report = common::run(&engine, &common::options(&fixture, root)).await;

    assert_eq!(report.result.status, UpdateStatus::Ok);
    assert_eq!(report.result.exit_code(), 0);
    let restart = report.restart.as_ref().unwrap();
    assert!(restart.attempted);
    assert!(!restart.restarted);
    assert!(restart.warnings[0].contains("openclaw gateway restart"));
    assert_eq!(engine.service().verify_calls(), 0);
}

#[tokio::test]
async fn test_verify_failure_is_a_warning() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.git_install("1.0.0").unwrap();
    let runner = common::git_runner();
    let engine = common::engine_with(
        &fixture,
        &runner,
        FakeRegistry::new(),
        FakePrompter::non_interactive(),
        FakePluginSync::quiet(),
        FakeService::verify_fails(),
    );

    let report = common::run(&engine, &common::options(&fixture, root)).await;

    let restart = report.restart.as_ref().unwrap();
    assert!(restart.restarted);
    assert_eq!(restart.verified, Some(false));
    assert_eq!(restart.warnings.len(), 1);
    assert_eq!(report.result.exit_code(), 0);
}

#[tokio::test]
async fn test_no_restart_skips_service() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.git_install("1.0.0").unwrap();
    let runner = common::git_runner();
    let engine = common::engine(&fixture, &runner, FakeRegistry::new());
    let mut options = common::options(&fixture, root);
    options.restart = false;

    let report = common::run(&engine, &options).await;

    assert_eq!(report.result.status, UpdateStatus::Ok);
    assert!(report.restart.is_none());
    assert_eq!(engine.service().restart_calls(), 0);
    assert!(report.plugins.is_some());
}

#[tokio::test]
async fn test_observer_sees_every_recorded_step() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.git_install("1.0.0").unwrap();
    let runner = common::git_runner();
    let engine = common::engine(&fixture, &runner, FakeRegistry::new());
    let observer = RecordingObserver::default();

    let outcome = engine.run(&common::options(&fixture, root), &observer).await.unwrap();

    let UpdateOutcome::Finished(report) = outcome else {
        panic!("update was cancelled");
    };
    let names: Vec<String> = report.result.steps.iter().map(|s| s.name.clone()).collect();
    assert_eq!(observer.started(), names);
    assert_eq!(observer.completed(), names);
}

#[tokio::test]
async fn test_observer_sees_nothing_for_dirty_tree() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.git_install("1.0.0").unwrap();
    let runner =
        common::git_runner().respond("status --porcelain", CommandOutput::ok("?? notes.txt\n"));
    let engine = common::engine(&fixture, &runner, FakeRegistry::new());
    let observer = RecordingObserver::default();

    let outcome = engine.run(&common::options(&fixture, root), &observer).await.unwrap();

    let report = outcome.report().unwrap();
    assert_eq!(report.result.reason.as_deref(), Some("dirty"));
    assert!(runner.ran("status --porcelain"));
    assert!(observer.started().is_empty());
    assert!(observer.completed().is_empty());
}

#[tokio::test]
async fn test_report_json_shape() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.git_install("1.0.0").unwrap();
    let runner = common::git_runner()
        .respond("npm run build", CommandOutput::failed(2, "error TS2304: Cannot find name"));
    let engine = common::engine(&fixture, &runner, FakeRegistry::new());

    let report = common::run(&engine, &common::options(&fixture, root)).await;
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["status"], "error");
    assert_eq!(json["mode"], "git");
    assert_eq!(json["reason"], "build");
    assert_eq!(json["before"]["version"], "1.0.0");
    assert_eq!(json["before"]["sha"], common::HEAD_SHA);
    assert_eq!(json["channel"]["channel"], "dev");
    assert_eq!(json["channel"]["source"], "install-default");
    assert_eq!(json["channelPersisted"], false);
    assert!(json["durationMs"].is_u64());
    assert!(json.get("plugins").is_none());
    assert!(json.get("restart").is_none());

    let steps = json["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 6);
    assert_eq!(steps[0]["name"], "clean check");
    assert_eq!(steps[5]["name"], "build");
    assert_eq!(steps[5]["exitCode"], 2);
    assert!(steps[5]["stderrTail"].as_str().unwrap().contains("TS2304"));
    assert!(steps[5]["durationMs"].is_u64());
}
