//! Recording fakes for the engine's collaborators.

use anyhow::{Result, anyhow, bail};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::channel::{RegistryClient, UpdateChannel};
use crate::config::{AppConfig, PluginInstallRecord, PluginSource};
use crate::update::plugins::{
    PluginSyncOutput, PluginSyncSummary, PluginSynchronizer, PluginUpdateOutcome,
    PluginUpdateReport, PluginUpdateStatus,
};
use crate::update::{Prompter, ServiceController, StepObserver, UpdateStep, UpdateStepResult};

fn snapshot<T: Clone>(cell: &Mutex<T>) -> Option<T> {
    cell.lock().ok().map(|v| v.clone())
}

/// Registry with fixed dist-tags.
#[derive(Debug, Default)]
pub struct FakeRegistry {
    tags: BTreeMap<String, String>,
    offline: bool,
    calls: AtomicUsize,
}

impl FakeRegistry {
    /// Registry publishing no tags.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `version` under `tag`.
    pub fn with_tag(mut self, tag: &str, version: &str) -> Self {
        self.tags.insert(tag.to_string(), version.to_string());
        self
    }

    /// Registry whose every lookup fails.
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    /// Number of dist-tag lookups.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RegistryClient for FakeRegistry {
    async fn dist_tags(&self, package: &str) -> Result<BTreeMap<String, String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline {
            bail!("registry unreachable for {package}");
        }
        Ok(self.tags.clone())
    }
}

/// Prompter with a canned answer.
#[derive(Debug, Default)]
pub struct FakePrompter {
    interactive: bool,
    answer: bool,
    asked: Mutex<Vec<String>>,
}

impl FakePrompter {
    /// A terminal user who answers `answer`.
    pub fn interactive(answer: bool) -> Self {
        Self {
            interactive: true,
            answer,
            asked: Mutex::default(),
        }
    }

    /// No terminal attached.
    pub fn non_interactive() -> Self {
        Self::default()
    }

    /// Questions asked so far.
    pub fn asked(&self) -> Vec<String> {
        snapshot(&self.asked).unwrap_or_default()
    }
}

impl Prompter for FakePrompter {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn confirm(&self, message: &str) -> Result<bool> {
        if !self.interactive {
            bail!("prompted without a terminal");
        }
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(message.to_string());
        }
        Ok(self.answer)
    }
}

/// Observer that records step names.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    started: Mutex<Vec<String>>,
    completed: Mutex<Vec<String>>,
}

impl RecordingObserver {
    /// Names of started steps.
    pub fn started(&self) -> Vec<String> {
        snapshot(&self.started).unwrap_or_default()
    }

    /// Names of completed steps.
    pub fn completed(&self) -> Vec<String> {
        snapshot(&self.completed).unwrap_or_default()
    }
}

impl StepObserver for RecordingObserver {
    fn on_step_start(&self, step: &UpdateStep, _index: usize) {
        if let Ok(mut started) = self.started.lock() {
            started.push(step.name.clone());
        }
    }

    fn on_step_complete(&self, result: &UpdateStepResult) {
        if let Ok(mut completed) = self.completed.lock() {
            completed.push(result.name.clone());
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum PluginBehavior {
    #[default]
    Quiet,
    SwitchToBundled,
    Fail,
}

/// Plugin synchronizer with scripted behavior.
#[derive(Debug, Default)]
pub struct FakePluginSync {
    behavior: PluginBehavior,
    ids: Vec<String>,
    sync_calls: Mutex<Vec<UpdateChannel>>,
    skip_ids_seen: Mutex<Vec<Vec<String>>>,
}

impl FakePluginSync {
    /// Changes nothing; every npm plugin is reported unchanged.
    pub fn quiet() -> Self {
        Self::default()
    }

    /// `sync` moves `ids` to bundled sources.
    pub fn switching_to_bundled(ids: &[&str]) -> Self {
        Self {
            behavior: PluginBehavior::SwitchToBundled,
            ids: ids.iter().map(|id| (*id).to_string()).collect(),
            ..Self::default()
        }
    }

    /// Both passes fail.
    pub fn failing() -> Self {
        Self {
            behavior: PluginBehavior::Fail,
            ..Self::default()
        }
    }

    /// Channels `sync` was called with.
    pub fn sync_calls(&self) -> Vec<UpdateChannel> {
        snapshot(&self.sync_calls).unwrap_or_default()
    }

    /// Skip sets passed to `update_installed`, sorted.
    pub fn skip_ids_seen(&self) -> Vec<Vec<String>> {
        snapshot(&self.skip_ids_seen).unwrap_or_default()
    }
}

impl PluginSynchronizer for FakePluginSync {
    async fn sync(
        &self,
        mut config: AppConfig,
        channel: UpdateChannel,
        workspace_root: &Path,
    ) -> Result<PluginSyncOutput> {
        if let Ok(mut calls) = self.sync_calls.lock() {
            calls.push(channel);
        }
        let mut summary = PluginSyncSummary::default();
        match self.behavior {
            PluginBehavior::Fail => bail!("plugin sync exploded"),
            PluginBehavior::Quiet => {}
            PluginBehavior::SwitchToBundled => {
                for id in &self.ids {
                    config.plugins.installs.insert(
                        id.clone(),
                        PluginInstallRecord {
                            source: PluginSource::Bundled,
                            spec: None,
                            version: None,
                            install_path: Some(workspace_root.join("extensions").join(id)),
                        },
                    );
                    summary.switched_to_bundled.push(id.clone());
                }
                summary.changed = !self.ids.is_empty();
            }
        }
        Ok(PluginSyncOutput {
            config,
            summary,
        })
    }

    async fn update_installed(
        &self,
        config: AppConfig,
        skip_ids: &BTreeSet<String>,
    ) -> Result<PluginUpdateReport> {
        if let Ok(mut seen) = self.skip_ids_seen.lock() {
            seen.push(skip_ids.iter().cloned().collect());
        }
        if self.behavior == PluginBehavior::Fail {
            return Err(anyhow!("plugin update exploded"));
        }
        let outcomes = config
            .plugins
            .installs
            .iter()
            .filter(|(id, record)| record.source == PluginSource::Npm && !skip_ids.contains(*id))
            .map(|(id, _)| PluginUpdateOutcome {
                id: id.clone(),
                status: PluginUpdateStatus::Unchanged,
                message: None,
            })
            .collect();
        Ok(PluginUpdateReport {
            config,
            outcomes,
            changed: false,
        })
    }
}

/// Gateway service with scripted health.
#[derive(Debug, Default)]
pub struct FakeService {
    restart_ok: bool,
    verify_ok: bool,
    restart_calls: AtomicUsize,
    verify_calls: AtomicUsize,
}

impl FakeService {
    /// Restarts and verifies.
    pub fn healthy() -> Self {
        Self {
            restart_ok: true,
            verify_ok: true,
            ..Self::default()
        }
    }

    /// Restart command fails.
    pub fn restart_fails() -> Self {
        Self {
            verify_ok: true,
            ..Self::default()
        }
    }

    /// Restarts, but the health check reports problems.
    pub fn verify_fails() -> Self {
        Self {
            restart_ok: true,
            ..Self::default()
        }
    }

    /// Number of restarts attempted.
    pub fn restart_calls(&self) -> usize {
        self.restart_calls.load(Ordering::SeqCst)
    }

    /// Number of health checks run.
    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

impl ServiceController for FakeService {
    async fn restart(&self) -> Result<bool> {
        self.restart_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.restart_ok)
    }

    async fn verify(&self) -> Result<bool> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.verify_ok)
    }
}
