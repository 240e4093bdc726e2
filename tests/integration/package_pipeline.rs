//! Global package updates and the downgrade confirmation gate.

use std::fs;

use openclaw_update::channel::UpdateChannel;
use openclaw_update::core::UpdateError;
use openclaw_update::process::CommandOutput;
use openclaw_update::test_utils::{
    FakePluginSync, FakePrompter, FakeRegistry, FakeService, InstallFixture, write_package_json,
};
use openclaw_update::update::{NoopObserver, UpdateMode, UpdateOutcome, UpdateStatus};

use crate::common;

fn confirmation_required(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<UpdateError>(), Some(UpdateError::ConfirmationRequired { .. }))
}

#[tokio::test]
async fn test_latest_update_reinstalls_package() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.package_install("1.0.0").unwrap();
    let installed = root.clone();
    let runner = common::package_runner(&fixture).on(
        "i -g openclaw@",
        CommandOutput::ok("added 1 package"),
        move |_| write_package_json(&installed, "openclaw", "1.2.0").unwrap(),
    );
    let engine = common::engine(&fixture, &runner, FakeRegistry::new().with_tag("latest", "1.2.0"));

    let report = common::run(&engine, &common::options(&fixture, root.clone())).await;

    assert_eq!(report.result.status, UpdateStatus::Ok);
    assert_eq!(report.result.mode, UpdateMode::Npm);
    assert_eq!(report.result.root, root);
    assert_eq!(common::step_names(&report), vec!["global update"]);
    assert_eq!(report.result.steps[0].command, "npm i -g openclaw@latest");
    assert_eq!(report.result.before.version.as_deref(), Some("1.0.0"));
    assert_eq!(report.result.after.version.as_deref(), Some("1.2.0"));
    assert!(report.result.after.sha.is_none());

    let target = report.target.as_ref().unwrap();
    assert_eq!(target.tag, "latest");
    assert_eq!(target.version.as_deref(), Some("1.2.0"));
    assert_eq!(report.channel.channel, UpdateChannel::Stable);
    assert!(engine.prompter().asked().is_empty());
    assert!(common::lock_path(&fixture).exists());
}

#[tokio::test]
async fn test_doctor_runs_when_entry_exists() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.package_install("1.0.0").unwrap();
    fs::create_dir_all(root.join("dist")).unwrap();
    fs::write(root.join("dist").join("entry.js"), "").unwrap();
    let runner = common::package_runner(&fixture);
    let engine = common::engine(&fixture, &runner, FakeRegistry::new().with_tag("latest", "1.2.0"));

    let report = common::run(&engine, &common::options(&fixture, root)).await;

    assert_eq!(report.result.status, UpdateStatus::Ok);
    assert_eq!(common::step_names(&report), vec!["global update", "openclaw doctor"]);
    assert!(report.result.steps[1].command.ends_with("entry.js doctor --non-interactive"));
}

#[tokio::test]
async fn test_failed_doctor_fails_the_update() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.package_install("1.0.0").unwrap();
    fs::create_dir_all(root.join("dist")).unwrap();
    fs::write(root.join("dist").join("entry.js"), "").unwrap();
    let runner = common::package_runner(&fixture)
        .respond("entry.js doctor", CommandOutput::failed(1, "gateway config is invalid"));
    let engine = common::engine(&fixture, &runner, FakeRegistry::new().with_tag("latest", "1.2.0"));

    let report = common::run(&engine, &common::options(&fixture, root)).await;

    assert_eq!(report.result.status, UpdateStatus::Error);
    assert_eq!(report.result.reason.as_deref(), Some("openclaw doctor"));
    assert!(report.restart.is_none());
}

#[tokio::test]
async fn test_json_downgrade_requires_confirmation() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.package_install("2.0.0").unwrap();
    let runner = common::package_runner(&fixture);
    let engine = common::engine(&fixture, &runner, FakeRegistry::new().with_tag("latest", "1.5.0"));
    let mut options = common::options(&fixture, root);
    options.json = true;

    let err = engine.run(&options, &NoopObserver).await.unwrap_err();

    assert!(confirmation_required(&err), "{err:#}");
    assert!(!runner.ran("i -g"));
    assert!(!common::lock_path(&fixture).exists());
}

#[tokio::test]
async fn test_declined_downgrade_is_cancelled() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.package_install("2.0.0").unwrap();
    let runner = common::package_runner(&fixture);
    let engine = common::engine_with(
        &fixture,
        &runner,
        FakeRegistry::new().with_tag("latest", "1.5.0"),
        FakePrompter::interactive(false),
        FakePluginSync::quiet(),
        FakeService::healthy(),
    );

    let outcome = engine.run(&common::options(&fixture, root), &NoopObserver).await.unwrap();

    assert_eq!(outcome, UpdateOutcome::Cancelled);
    assert_eq!(outcome.exit_code(), 0);
    let asked = engine.prompter().asked();
    assert_eq!(asked.len(), 1);
    assert!(asked[0].contains("2.0.0"));
    assert!(asked[0].contains("1.5.0"));
    assert!(!runner.ran("i -g"));
}

#[tokio::test]
async fn test_accepted_downgrade_proceeds() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.package_install("2.0.0").unwrap();
    let runner = common::package_runner(&fixture);
    let engine = common::engine_with(
        &fixture,
        &runner,
        FakeRegistry::new().with_tag("latest", "1.5.0"),
        FakePrompter::interactive(true),
        FakePluginSync::quiet(),
        FakeService::healthy(),
    );

    let report = common::run(&engine, &common::options(&fixture, root)).await;

    assert_eq!(report.result.status, UpdateStatus::Ok);
    assert_eq!(engine.prompter().asked().len(), 1);
    assert!(runner.ran("npm i -g openclaw@latest"));
}

#[tokio::test]
async fn test_yes_skips_the_prompt() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.package_install("2.0.0").unwrap();
    let runner = common::package_runner(&fixture);
    let engine = common::engine(&fixture, &runner, FakeRegistry::new().with_tag("latest", "1.5.0"));
    let mut options = common::options(&fixture, root);
    options.assume_yes = true;
    options.json = true;

    let report = common::run(&engine, &options).await;

    assert_eq!(report.result.status, UpdateStatus::Ok);
    assert!(runner.ran("npm i -g openclaw@latest"));
}

#[tokio::test]
async fn test_explicit_version_skips_registry() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.package_install("1.0.0").unwrap();
    let runner = common::package_runner(&fixture);
    let engine = common::engine(&fixture, &runner, FakeRegistry::new().with_tag("latest", "9.0.0"));
    let mut options = common::options(&fixture, root);
    options.tag = Some("1.1.0".to_string());

    let report = common::run(&engine, &options).await;

    assert_eq!(report.result.status, UpdateStatus::Ok);
    assert_eq!(report.result.steps[0].command, "npm i -g openclaw@1.1.0");
    assert_eq!(report.target.as_ref().unwrap().version.as_deref(), Some("1.1.0"));
    assert_eq!(engine.registry().calls(), 0);
}

#[tokio::test]
async fn test_beta_fallback_does_not_prompt() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.package_install("2.0.0-beta.3").unwrap();
    let runner = common::package_runner(&fixture);
    let engine = common::engine(&fixture, &runner, FakeRegistry::new().with_tag("latest", "1.9.0"));
    let mut options = common::options(&fixture, root);
    options.requested_channel = Some(UpdateChannel::Beta);
    options.json = true;

    let report = common::run(&engine, &options).await;

    assert_eq!(report.result.status, UpdateStatus::Ok);
    assert_eq!(report.target.as_ref().unwrap().tag, "latest");
    assert!(runner.ran("npm i -g openclaw@latest"));
    assert!(report.channel_persisted);
    let config = fs::read_to_string(fixture.config_path()).unwrap();
    assert!(config.contains("channel = \"beta\""));
}

#[tokio::test]
async fn test_offline_registry_requires_confirmation() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.package_install("1.0.0").unwrap();
    let runner = common::package_runner(&fixture);
    let engine = common::engine(&fixture, &runner, FakeRegistry::offline());
    let mut options = common::options(&fixture, root);
    options.json = true;

    let err = engine.run(&options, &NoopObserver).await.unwrap_err();

    assert!(confirmation_required(&err), "{err:#}");
    assert_eq!(engine.registry().calls(), 1);
    assert!(!runner.ran("i -g"));
}

#[tokio::test]
async fn test_non_interactive_downgrade_fails_closed() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.package_install("2.0.0").unwrap();
    let runner = common::package_runner(&fixture);
    let engine = common::engine(&fixture, &runner, FakeRegistry::new().with_tag("latest", "1.5.0"));

    let err = engine.run(&common::options(&fixture, root), &NoopObserver).await.unwrap_err();

    assert!(confirmation_required(&err), "{err:#}");
    assert!(engine.prompter().asked().is_empty());
}
