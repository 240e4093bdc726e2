//! Shared helpers for engine-level tests.
#![allow(dead_code)]

use std::path::PathBuf;

use openclaw_update::config::ConfigStore;
use openclaw_update::process::CommandOutput;
use openclaw_update::test_utils::{
    FakePluginSync, FakePrompter, FakeRegistry, FakeService, InstallFixture, ScriptedRunner,
    init_test_logging,
};
use openclaw_update::update::lock::UPDATE_LOCK_FILE;
use openclaw_update::update::{
    NoopObserver, UpdateEngine, UpdateOptions, UpdateOutcome, UpdateReport,
};

/// Engine wired entirely to fakes.
pub type TestEngine =
    UpdateEngine<ScriptedRunner, FakeRegistry, FakePrompter, FakePluginSync, FakeService>;

/// HEAD reported by [`git_runner`].
pub const HEAD_SHA: &str = "0123456789abcdef0123456789abcdef01234567";

/// Engine with a non-interactive prompter, quiet plugins and a healthy service.
pub fn engine(fixture: &InstallFixture, runner: &ScriptedRunner, registry: FakeRegistry) -> TestEngine {
    engine_with(
        fixture,
        runner,
        registry,
        FakePrompter::non_interactive(),
        FakePluginSync::quiet(),
        FakeService::healthy(),
    )
}

/// Engine with every collaborator chosen by the caller.
pub fn engine_with(
    fixture: &InstallFixture,
    runner: &ScriptedRunner,
    registry: FakeRegistry,
    prompter: FakePrompter,
    plugins: FakePluginSync,
    service: FakeService,
) -> TestEngine {
    init_test_logging(None);
    UpdateEngine::new(
        runner.clone(),
        registry,
        prompter,
        plugins,
        service,
        ConfigStore::new(fixture.config_path()),
    )
}

/// Default options for updating `root` inside `fixture`.
pub fn options(fixture: &InstallFixture, root: PathBuf) -> UpdateOptions {
    UpdateOptions::new(root, fixture.checkout_dir(), fixture.state_dir())
}

/// Run to completion and return the report; panics on cancellation or error.
pub async fn run(engine: &TestEngine, options: &UpdateOptions) -> UpdateReport {
    match engine.run(options, &NoopObserver).await {
        Ok(UpdateOutcome::Finished(report)) => *report,
        Ok(UpdateOutcome::Cancelled) => panic!("update was cancelled"),
        Err(e) => panic!("update failed: {e:#}"),
    }
}

/// Names of the executed steps.
pub fn step_names(report: &UpdateReport) -> Vec<&str> {
    report.result.steps.iter().map(|s| s.name.as_str()).collect()
}

/// Runner for checkouts: HEAD resolves to [`HEAD_SHA`], everything else succeeds.
pub fn git_runner() -> ScriptedRunner {
    ScriptedRunner::new().respond("rev-parse HEAD", CommandOutput::ok(HEAD_SHA))
}

/// Runner whose package managers report the fixture's global root.
pub fn package_runner(fixture: &InstallFixture) -> ScriptedRunner {
    ScriptedRunner::new()
        .respond("rev-parse HEAD", CommandOutput::ok(HEAD_SHA))
        .respond("root -g", CommandOutput::ok(fixture.global_root().display().to_string()))
}

/// Path of the update lock file.
pub fn lock_path(fixture: &InstallFixture) -> PathBuf {
    fixture.state_dir().join(UPDATE_LOCK_FILE)
}
