//! Switching between checkout and package installs with `--channel`.

use std::fs;

use openclaw_update::channel::UpdateChannel;
use openclaw_update::core::UpdateError;
use openclaw_update::process::CommandOutput;
use openclaw_update::test_utils::{FakeRegistry, InstallFixture, write_package_json};
use openclaw_update::update::{NoopObserver, UpdateMode, UpdateStatus};

use crate::common::{self, HEAD_SHA};

#[tokio::test]
async fn test_dev_on_package_install_clones_checkout() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.package_install("1.0.0").unwrap();
    let checkout = fixture.checkout_dir();
    let cloned = checkout.clone();
    let runner = common::package_runner(&fixture).on(
        "git clone",
        CommandOutput::ok("Cloning into 'checkout'..."),
        move |_| {
            write_package_json(&cloned, "openclaw", "1.3.0-dev").unwrap();
            fs::create_dir_all(cloned.join(".git")).unwrap();
        },
    );
    let engine = common::engine(&fixture, &runner, FakeRegistry::new().with_tag("latest", "1.2.0"));
    let mut options = common::options(&fixture, root);
    options.requested_channel = Some(UpdateChannel::Dev);

    let report = common::run(&engine, &options).await;

    assert_eq!(report.result.status, UpdateStatus::Ok);
    assert_eq!(report.result.mode, UpdateMode::Git);
    assert_eq!(report.result.root, checkout);
    assert_eq!(
        common::step_names(&report),
        vec!["git clone", "deps install", "build", "openclaw doctor", "global install"]
    );
    assert!(report.result.steps[0].command.starts_with("git clone https://"));
    assert_eq!(
        report.result.steps[4].command,
        format!("npm i -g {}", checkout.display())
    );
    assert_eq!(report.result.before.version.as_deref(), Some("1.0.0"));
    assert!(report.result.before.sha.is_none());
    assert_eq!(report.result.after.version.as_deref(), Some("1.3.0-dev"));
    assert_eq!(report.result.after.sha.as_deref(), Some(HEAD_SHA));
    assert!(!runner.ran("status --porcelain"));

    assert!(report.target.is_none());
    assert_eq!(engine.registry().calls(), 0);
    assert!(report.channel_persisted);
    let config = fs::read_to_string(fixture.config_path()).unwrap();
    assert!(config.contains("channel = \"dev\""));
    assert_eq!(engine.plugins().sync_calls(), vec![UpdateChannel::Dev]);
}

#[tokio::test]
async fn test_clone_failure_is_an_error() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.package_install("1.0.0").unwrap();
    let runner = common::package_runner(&fixture)
        .respond("git clone", CommandOutput::failed(128, "fatal: unable to access"));
    let engine = common::engine(&fixture, &runner, FakeRegistry::new());
    let mut options = common::options(&fixture, root);
    options.requested_channel = Some(UpdateChannel::Dev);

    let report = common::run(&engine, &options).await;

    assert_eq!(report.result.status, UpdateStatus::Error);
    assert_eq!(report.result.reason.as_deref(), Some("git clone"));
    assert_eq!(common::step_names(&report), vec!["git clone"]);
    assert!(!runner.ran("i -g"));
    assert!(report.plugins.is_none());
}

#[tokio::test]
async fn test_existing_checkout_is_synced_and_installed() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.package_install("1.0.0").unwrap();
    let checkout = fixture.git_install("1.1.0").unwrap();
    let runner = common::package_runner(&fixture);
    let engine = common::engine(&fixture, &runner, FakeRegistry::new());
    let mut options = common::options(&fixture, root);
    options.requested_channel = Some(UpdateChannel::Dev);

    let report = common::run(&engine, &options).await;

    assert_eq!(report.result.status, UpdateStatus::Ok);
    assert_eq!(
        common::step_names(&report),
        vec![
            "clean check",
            "upstream check",
            "git fetch",
            "git rebase",
            "deps install",
            "build",
            "openclaw doctor",
            "global install"
        ]
    );
    assert!(!runner.ran("git clone"));
    assert_eq!(report.result.before.sha.as_deref(), Some(HEAD_SHA));
    assert_eq!(report.result.after.version.as_deref(), Some("1.1.0"));
    assert_eq!(report.result.root, checkout);
}

#[tokio::test]
async fn test_non_checkout_git_dir_is_rejected() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.package_install("1.0.0").unwrap();
    fs::create_dir_all(fixture.checkout_dir()).unwrap();
    fs::write(fixture.checkout_dir().join("notes.txt"), "keep me").unwrap();
    let runner = common::package_runner(&fixture);
    let engine = common::engine(&fixture, &runner, FakeRegistry::new());
    let mut options = common::options(&fixture, root);
    options.requested_channel = Some(UpdateChannel::Dev);

    let err = engine.run(&options, &NoopObserver).await.unwrap_err();

    assert!(
        matches!(err.downcast_ref::<UpdateError>(), Some(UpdateError::GitDirNotCheckout { .. })),
        "{err:#}"
    );
    assert!(!fixture.config_path().exists());
    assert!(!runner.ran("git clone"));
    assert!(!common::lock_path(&fixture).exists());
}

#[tokio::test]
async fn test_foreign_checkout_is_rejected() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.package_install("1.0.0").unwrap();
    write_package_json(&fixture.checkout_dir(), "some-other-app", "3.0.0").unwrap();
    fs::create_dir_all(fixture.checkout_dir().join(".git")).unwrap();
    let runner = common::package_runner(&fixture);
    let engine = common::engine(&fixture, &runner, FakeRegistry::new());
    let mut options = common::options(&fixture, root);
    options.requested_channel = Some(UpdateChannel::Dev);

    let err = engine.run(&options, &NoopObserver).await.unwrap_err();

    assert!(
        matches!(err.downcast_ref::<UpdateError>(), Some(UpdateError::GitDirNotCore { .. })),
        "{err:#}"
    );
    assert!(!fixture.config_path().exists());
}

#[tokio::test]
async fn test_empty_git_dir_is_cloned_into() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.package_install("1.0.0").unwrap();
    fs::create_dir_all(fixture.checkout_dir()).unwrap();
    let runner = common::package_runner(&fixture);
    let engine = common::engine(&fixture, &runner, FakeRegistry::new());
    let mut options = common::options(&fixture, root);
    options.requested_channel = Some(UpdateChannel::Dev);

    let report = common::run(&engine, &options).await;

    assert_eq!(report.result.steps[0].name, "git clone");
}

#[tokio::test]
async fn test_stable_on_checkout_switches_to_package() {
    let fixture = InstallFixture::new().unwrap();
    let root = fixture.git_install("1.3.0-dev").unwrap();
    let runner = common::package_runner(&fixture);
    let engine = common::engine(&fixture, &runner, FakeRegistry::new().with_tag("latest", "1.2.0"));
    let mut options = common::options(&fixture, root);
    options.requested_channel = Some(UpdateChannel::Stable);

    let report = common::run(&engine, &options).await;

    assert_eq!(report.result.status, UpdateStatus::Ok);
    assert_ne!(report.result.mode, UpdateMode::Git);
    assert_eq!(common::step_names(&report), vec!["global update"]);
    assert!(report.result.steps[0].command.ends_with("openclaw@latest"));
    assert!(!runner.ran("status --porcelain"));
    assert!(!runner.ran("rebase"));
    // The checkout's version is not the installed package's, so no downgrade prompt.
    assert!(engine.prompter().asked().is_empty());
    assert!(report.channel_persisted);
    let config = fs::read_to_string(fixture.config_path()).unwrap();
    assert!(config.contains("channel = \"stable\""));
}
