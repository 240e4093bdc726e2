//! Post-update plugin reconciliation.
//!
//! After a successful core update the plugin install records in config must
//! match the new channel: a git checkout on `dev` ships plugins under
//! `extensions/<id>`, while release channels install them from the registry.
//!
//! The engine talks to a [`PluginSynchronizer`] and owns only the
//! bookkeeping: merge the two config patches, persist once if anything
//! changed, count outcomes. Plugin problems are reported and never change the
//! status of the core update.

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::channel::UpdateChannel;
use crate::config::{AppConfig, ConfigSnapshot, ConfigStore, PluginSource};
use crate::constants::PLUGIN_LIST_LIMIT;
use crate::install::{GlobalInstallManager, package_name_from_spec, read_package_version};
use crate::process::{CommandRunner, CommandSpec};

/// Registry scope of first-party plugins.
pub const PLUGIN_SCOPE: &str = "@openclaw";

/// What `sync` changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSyncSummary {
    /// Plugins now loaded from the checkout
    pub switched_to_bundled: Vec<String>,
    /// Plugins now installed from the registry
    pub switched_to_npm: Vec<String>,
    /// Non-fatal problems
    pub warnings: Vec<String>,
    /// Failed switches
    pub errors: Vec<String>,
    /// Whether the config needs saving
    pub changed: bool,
}

/// Per-plugin outcome of `update_installed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginUpdateStatus {
    /// A newer version was installed
    Updated,
    /// Already current
    Unchanged,
    /// The install command failed
    Failed,
    /// Not updatable (no spec)
    Skipped,
}

/// One plugin's update outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginUpdateOutcome {
    /// Plugin id
    pub id: String,
    /// Outcome
    pub status: PluginUpdateStatus,
    /// Explanation for failed or skipped plugins
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Config and summary returned by `sync`.
#[derive(Debug, Clone)]
pub struct PluginSyncOutput {
    /// Patched config
    pub config: AppConfig,
    /// What changed
    pub summary: PluginSyncSummary,
}

/// Config and outcomes returned by `update_installed`.
#[derive(Debug, Clone)]
pub struct PluginUpdateReport {
    /// Patched config
    pub config: AppConfig,
    /// Per-plugin outcomes
    pub outcomes: Vec<PluginUpdateOutcome>,
    /// Whether the config needs saving
    pub changed: bool,
}

/// Plugin collaborator used after a successful core update.
pub trait PluginSynchronizer: Send + Sync {
    /// Align plugin sources with `channel`.
    fn sync(
        &self,
        config: AppConfig,
        channel: UpdateChannel,
        workspace_root: &Path,
    ) -> impl Future<Output = Result<PluginSyncOutput>> + Send;

    /// Update registry-installed plugins, except `skip_ids`.
    fn update_installed(
        &self,
        config: AppConfig,
        skip_ids: &BTreeSet<String>,
    ) -> impl Future<Output = Result<PluginUpdateReport>> + Send;
}

/// Outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PluginUpdateCounts {
    /// Updated plugins
    pub updated: usize,
    /// Already-current plugins
    pub unchanged: usize,
    /// Failed plugins
    pub failed: usize,
    /// Skipped plugins
    pub skipped: usize,
}

impl PluginUpdateCounts {
    /// Tally `outcomes`.
    pub fn from_outcomes(outcomes: &[PluginUpdateOutcome]) -> Self {
        outcomes.iter().fold(Self::default(), |mut counts, outcome| {
            match outcome.status {
                PluginUpdateStatus::Updated => counts.updated += 1,
                PluginUpdateStatus::Unchanged => counts.unchanged += 1,
                PluginUpdateStatus::Failed => counts.failed += 1,
                PluginUpdateStatus::Skipped => counts.skipped += 1,
            }
            counts
        })
    }
}

/// Everything reconciliation produced, for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginReport {
    /// Source switches
    pub sync: PluginSyncSummary,
    /// Per-plugin update outcomes
    pub outcomes: Vec<PluginUpdateOutcome>,
    /// Outcome counts
    pub counts: PluginUpdateCounts,
    /// Whether the merged config was written
    pub persisted: bool,
    /// Collaborator failures (never fatal)
    pub warnings: Vec<String>,
}

/// Run both plugin passes and persist the merged config once.
///
/// Requires a valid snapshot; an invalid config is never written.
pub async fn reconcile<P: PluginSynchronizer>(
    plugins: &P,
    store: &ConfigStore,
    snapshot: ConfigSnapshot,
    channel: UpdateChannel,
    workspace_root: &Path,
) -> PluginReport {
    let mut report = PluginReport::default();
    let mut config = snapshot.config;
    let mut changed = false;

    match plugins.sync(config.clone(), channel, workspace_root).await {
        Ok(output) => {
            config = output.config;
            changed |= output.summary.changed;
            report.sync = output.summary;
        }
        Err(e) => {
            tracing::warn!(target: "update", "Plugin sync failed: {:#}", e);
            report.warnings.push(format!("plugin sync failed: {e:#}"));
        }
    }

    let skip_ids: BTreeSet<String> = report
        .sync
        .switched_to_bundled
        .iter()
        .chain(&report.sync.switched_to_npm)
        .cloned()
        .collect();

    match plugins.update_installed(config.clone(), &skip_ids).await {
        Ok(update) => {
            config = update.config;
            changed |= update.changed;
            report.counts = PluginUpdateCounts::from_outcomes(&update.outcomes);
            report.outcomes = update.outcomes;
        }
        Err(e) => {
            tracing::warn!(target: "update", "Plugin update failed: {:#}", e);
            report.warnings.push(format!("plugin update failed: {e:#}"));
        }
    }

    if changed {
        match store.save(&config).await {
            Ok(()) => report.persisted = true,
            Err(e) => {
                tracing::warn!(target: "config", "Could not save plugin records: {:#}", e);
                report.warnings.push(format!("could not save plugin records: {e:#}"));
            }
        }
    }

    report
}

/// Comma-separated ids, at most [`PLUGIN_LIST_LIMIT`] then `+N more`.
pub fn format_plugin_list(ids: &[String]) -> String {
    let shown: Vec<&str> = ids.iter().take(PLUGIN_LIST_LIMIT).map(String::as_str).collect();
    let mut list = shown.join(", ");
    if ids.len() > PLUGIN_LIST_LIMIT {
        list.push_str(&format!(" +{} more", ids.len() - PLUGIN_LIST_LIMIT));
    }
    list
}

/// Registry spec of a first-party plugin.
pub fn default_plugin_spec(id: &str) -> String {
    format!("{PLUGIN_SCOPE}/{id}")
}

/// Plugin synchronizer working on `[plugins.installs]` with real installs.
#[derive(Debug, Clone)]
pub struct ConfigPluginSynchronizer<R> {
    runner: R,
    manager: GlobalInstallManager,
    timeout: Duration,
}

impl<R: CommandRunner> ConfigPluginSynchronizer<R> {
    /// Creates a synchronizer installing through `manager`.
    pub const fn new(runner: R, manager: GlobalInstallManager, timeout: Duration) -> Self {
        Self {
            runner,
            manager,
            timeout,
        }
    }

    /// Install `spec` globally. Returns the install directory on success.
    ///
    /// The directory is named after the package, without any version or
    /// range suffix the spec carries.
    async fn install(&self, spec: &str) -> Result<Option<PathBuf>, String> {
        let argv = self.manager.global_install_args(spec);
        let Some(cmd) = CommandSpec::from_argv(argv) else {
            return Err("empty install command".to_string());
        };
        let cmd = cmd.with_timeout(Some(self.timeout)).with_context("plugin install");

        match self.runner.run(&cmd).await {
            Ok(output) if output.success() => Ok(self
                .manager
                .resolve_global_package_root(
                    &self.runner,
                    package_name_from_spec(spec),
                    self.timeout,
                )
                .await),
            Ok(output) => Err(first_line(&output.stderr)
                .unwrap_or_else(|| format!("exit code {:?}", output.code))),
            Err(e) => Err(format!("{e:#}")),
        }
    }
}

fn first_line(text: &str) -> Option<String> {
    text.lines().map(str::trim).find(|l| !l.is_empty()).map(str::to_string)
}

async fn version_at(path: Option<&Path>) -> Option<String> {
    read_package_version(path?).await
}

impl<R: CommandRunner> PluginSynchronizer for ConfigPluginSynchronizer<R> {
    async fn sync(
        &self,
        mut config: AppConfig,
        channel: UpdateChannel,
        workspace_root: &Path,
    ) -> Result<PluginSyncOutput> {
        let mut summary = PluginSyncSummary::default();
        let extensions = workspace_root.join("extensions");

        for (id, record) in &mut config.plugins.installs {
            let bundled_dir = extensions.join(id);
            match (channel, record.source) {
                (UpdateChannel::Dev, PluginSource::Npm) => {
                    if bundled_dir.is_dir() {
                        record.source = PluginSource::Bundled;
                        record.version = read_package_version(&bundled_dir).await;
                        record.install_path = Some(bundled_dir);
                        summary.switched_to_bundled.push(id.clone());
                    }
                }
                (UpdateChannel::Dev, PluginSource::Bundled) => {
                    let path = record.install_path.clone().unwrap_or(bundled_dir);
                    if !path.is_dir() {
                        summary
                            .warnings
                            .push(format!("bundled plugin {id} not found at {}", path.display()));
                    }
                }
                (UpdateChannel::Stable | UpdateChannel::Beta, PluginSource::Bundled) => {
                    let spec = record.spec.clone().unwrap_or_else(|| default_plugin_spec(id));
                    match self.install(&spec).await {
                        Ok(path) => {
                            record.source = PluginSource::Npm;
                            record.version = version_at(path.as_deref()).await;
                            record.install_path = path;
                            record.spec = Some(spec);
                            summary.switched_to_npm.push(id.clone());
                        }
                        Err(message) => {
                            summary
                                .errors
                                .push(format!("{id}: failed to install {spec}: {message}"));
                        }
                    }
                }
                (UpdateChannel::Stable | UpdateChannel::Beta, PluginSource::Npm) => {}
            }
        }

        summary.changed =
            !summary.switched_to_bundled.is_empty() || !summary.switched_to_npm.is_empty();
        tracing::debug!(
            target: "update",
            "Plugin sync: {} to bundled, {} to npm",
            summary.switched_to_bundled.len(),
            summary.switched_to_npm.len()
        );

        Ok(PluginSyncOutput {
            config,
            summary,
        })
    }

    async fn update_installed(
        &self,
        mut config: AppConfig,
        skip_ids: &BTreeSet<String>,
    ) -> Result<PluginUpdateReport> {
        let mut outcomes = Vec::new();
        let mut changed = false;

        for (id, record) in &mut config.plugins.installs {
            if record.source != PluginSource::Npm || skip_ids.contains(id) {
                continue;
            }
            let Some(spec) = record.spec.clone() else {
                outcomes.push(PluginUpdateOutcome {
                    id: id.clone(),
                    status: PluginUpdateStatus::Skipped,
                    message: Some("no registry spec recorded".to_string()),
                });
                continue;
            };

            let outcome = match self.install(&spec).await {
                Ok(path) => {
                    let path = path.or_else(|| record.install_path.clone());
                    let version = version_at(path.as_deref()).await;
                    if version.is_some() && version != record.version {
                        record.version = version;
                        record.install_path = path;
                        changed = true;
                        PluginUpdateStatus::Updated
                    } else {
                        PluginUpdateStatus::Unchanged
                    }
                }
                Err(message) => {
                    outcomes.push(PluginUpdateOutcome {
                        id: id.clone(),
                        status: PluginUpdateStatus::Failed,
                        message: Some(message),
                    });
                    continue;
                }
            };
            outcomes.push(PluginUpdateOutcome {
                id: id.clone(),
                status: outcome,
                message: None,
            });
        }

        Ok(PluginUpdateReport {
            config,
            outcomes,
            changed,
        })
    }
}
