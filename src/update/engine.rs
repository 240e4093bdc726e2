//! The update engine.
//!
//! [`UpdateEngine::run`] is the single entry point for an update:
//!
//! 1. read the config snapshot and detect the installation
//! 2. resolve the effective channel and, for package installs, the target version
//! 3. apply the downgrade confirmation gate
//! 4. build a [`PipelinePlan`] (validating the git-mode directory for a switch)
//! 5. take the update lock, persist an explicit channel, execute the plan
//! 6. after an `ok` run: reconcile plugins, then restart and verify the gateway
//!
//! Everything up to step 5 is read-only, so validation and confirmation
//! failures leave the installation untouched.

use anyhow::{Context, Result};
use serde::Serialize;

use super::confirm::{ConfirmDecision, DowngradeCheck, Prompter, confirm_downgrade};
use super::lock::UpdateLock;
use super::observer::StepObserver;
use super::options::UpdateOptions;
use super::pipeline::{PipelinePlan, PipelineRun, plan_checkout};
use super::plugins::{PluginReport, PluginSynchronizer, reconcile};
use super::restart::{RestartReport, ServiceController, restart_and_verify};
use super::types::{UpdateRunResult, UpdateStatus};
use crate::channel::registry::{DEV_DIST_TAG, resolve_explicit_tag};
use crate::channel::{
    ChannelResolution, KindTransition, RegistryClient, UpdateChannel, VersionTarget,
    resolve_channel_tag, resolve_effective_channel,
};
use crate::config::ConfigStore;
use crate::constants::{CORE_PACKAGE_NAME, STATUS_TIMEOUT};
use crate::core::UpdateError;
use crate::install::{self, InstallKind, InstallationDescriptor, resolve_global_manager};
use crate::process::CommandRunner;

/// Note recorded when `--tag` is given for a git update.
pub const GIT_TAG_IGNORED_NOTE: &str =
    "--tag applies to package installs only; git updates ignore it";

/// Everything an update run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReport {
    /// Core pipeline result
    #[serde(flatten)]
    pub result: UpdateRunResult,
    /// Effective channel and its provenance
    pub channel: ChannelResolution,
    /// Resolved package target
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<VersionTarget>,
    /// Whether `update.channel` was written
    pub channel_persisted: bool,
    /// Plugin reconciliation, after an `ok` run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugins: Option<PluginReport>,
    /// Restart and verification, after an `ok` run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<RestartReport>,
    /// Informational messages
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The user declined a downgrade; nothing was changed
    Cancelled,
    /// The pipeline ran (successfully or not)
    Finished(Box<UpdateReport>),
}

impl UpdateOutcome {
    /// Process exit code: 1 when the pipeline failed, 0 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Cancelled => 0,
            Self::Finished(report) => report.result.exit_code(),
        }
    }

    /// The report, when the pipeline ran.
    pub fn report(&self) -> Option<&UpdateReport> {
        match self {
            Self::Cancelled => None,
            Self::Finished(report) => Some(report),
        }
    }
}

/// Orchestrates one update run against its collaborators.
pub struct UpdateEngine<R, G, P, S, C> {
    runner: R,
    registry: G,
    prompter: P,
    plugins: S,
    service: C,
    config_store: ConfigStore,
}

impl<R, G, P, S, C> UpdateEngine<R, G, P, S, C>
where
    R: CommandRunner,
    G: RegistryClient,
    P: Prompter,
    S: PluginSynchronizer,
    C: ServiceController,
{
    /// Assemble an engine.
    pub const fn new(
        runner: R,
        registry: G,
        prompter: P,
        plugins: S,
        service: C,
        config_store: ConfigStore,
    ) -> Self {
        Self {
            runner,
            registry,
            prompter,
            plugins,
            service,
            config_store,
        }
    }

    /// The registry client.
    pub const fn registry(&self) -> &G {
        &self.registry
    }

    /// The prompter.
    pub const fn prompter(&self) -> &P {
        &self.prompter
    }

    /// The plugin synchronizer.
    pub const fn plugins(&self) -> &S {
        &self.plugins
    }

    /// The service controller.
    pub const fn service(&self) -> &C {
        &self.service
    }

    /// Run an update.
    ///
    /// # Errors
    ///
    /// Validation, confirmation and lock errors (see [`UpdateError`]). Step
    /// failures are reported inside the returned result, not as errors.
    pub async fn run<O: StepObserver>(
        &self,
        options: &UpdateOptions,
        observer: &O,
    ) -> Result<UpdateOutcome> {
        let snapshot = self.config_store.load().await?;
        if options.requested_channel.is_some() && !snapshot.valid {
            return Err(UpdateError::ConfigInvalid {
                path: snapshot.path.clone(),
                issues: snapshot.issues.clone(),
            }
            .into());
        }

        let descriptor = install::detect(&options.root, &self.runner, STATUS_TIMEOUT).await;
        let transition = KindTransition::for_request(options.requested_channel, descriptor.kind);
        let target_kind = transition.target_kind(descriptor.kind);
        let channel = resolve_effective_channel(
            options.requested_channel,
            snapshot.stored_channel(),
            target_kind,
        );
        tracing::info!(
            target: "update",
            "Installation {} at {}; channel {} ({}); transition {:?}",
            descriptor.kind,
            descriptor.root.display(),
            channel.channel,
            channel.source.label(),
            transition
        );

        let mut notes = Vec::new();
        let mut target = None;
        if target_kind == InstallKind::Package {
            let current = match transition {
                KindTransition::SwitchToPackage => None,
                _ => install::read_package_version(&options.root).await,
            };
            let (resolved, fell_back) = self.resolve_target(options, channel.channel).await;
            let check = DowngradeCheck {
                current: current.as_deref(),
                target: &resolved,
                fell_back,
                assume_yes: options.assume_yes,
                json: options.json,
            };
            if confirm_downgrade(&self.prompter, &check)? == ConfirmDecision::Declined {
                return Ok(UpdateOutcome::Cancelled);
            }
            target = Some(resolved);
        } else if target_kind == InstallKind::Git && options.tag.is_some() {
            notes.push(GIT_TAG_IGNORED_NOTE.to_string());
        }

        let plan =
            self.plan(options, &descriptor, transition, channel.channel, target.clone()).await?;

        let _lock = match &plan {
            PipelinePlan::Unsupported { .. } => None,
            _ => Some(UpdateLock::acquire(&options.state_dir, options.lock_timeout).await?),
        };

        let mut channel_persisted = false;
        if let Some(requested) = options.requested_channel
            && snapshot.valid
        {
            self.config_store
                .persist_channel(requested)
                .await
                .context("Failed to persist update channel")?;
            channel_persisted = true;
        }

        let result =
            PipelineRun::new(&self.runner, observer, options.step_timeout).execute(&plan).await;

        let mut plugins = None;
        let mut restart = None;
        if result.status == UpdateStatus::Ok {
            let fresh = self.config_store.load().await?;
            if fresh.valid {
                let report = reconcile(
                    &self.plugins,
                    &self.config_store,
                    fresh,
                    channel.channel,
                    &result.root,
                )
                .await;
                plugins = Some(report);
            } else {
                notes.push("Skipped plugin sync: config is invalid".to_string());
            }

            if options.restart {
                restart = Some(restart_and_verify(&self.service).await);
            }
        }

        Ok(UpdateOutcome::Finished(Box::new(UpdateReport {
            result,
            channel,
            target,
            channel_persisted,
            plugins,
            restart,
            notes,
        })))
    }

    /// Target version for a package install, plus the beta fallback flag.
    async fn resolve_target(
        &self,
        options: &UpdateOptions,
        channel: UpdateChannel,
    ) -> (VersionTarget, bool) {
        if let Some(tag) = &options.tag {
            return (resolve_explicit_tag(&self.registry, CORE_PACKAGE_NAME, tag).await, false);
        }
        let resolved = resolve_channel_tag(&self.registry, CORE_PACKAGE_NAME, channel).await;
        tracing::debug!(
            target: "update",
            "Channel {} resolved to {}@{:?} (fallback: {})",
            channel,
            resolved.tag,
            resolved.version,
            resolved.fell_back
        );
        (
            VersionTarget {
                tag: resolved.tag,
                version: resolved.version,
            },
            resolved.fell_back,
        )
    }

    async fn plan(
        &self,
        options: &UpdateOptions,
        descriptor: &InstallationDescriptor,
        transition: KindTransition,
        channel: UpdateChannel,
        target: Option<VersionTarget>,
    ) -> Result<PipelinePlan> {
        let root = options.root.clone();
        let package_target = || {
            target.clone().unwrap_or_else(|| VersionTarget {
                tag: channel.dist_tag().unwrap_or(DEV_DIST_TAG).to_string(),
                version: None,
            })
        };

        Ok(match (transition, descriptor.kind) {
            (KindTransition::SwitchToGit, _) => PipelinePlan::SwitchToGit {
                git_dir: options.git_dir.clone(),
                checkout: plan_checkout(&options.git_dir).await?,
                manager: resolve_global_manager(descriptor.package_manager),
                previous_root: root,
            },
            (KindTransition::SwitchToPackage, _) => PipelinePlan::SwitchToPackage {
                root,
                manager: resolve_global_manager(None),
                target: package_target(),
            },
            (KindTransition::Stay, InstallKind::Git) => PipelinePlan::Git {
                root,
                channel,
            },
            (KindTransition::Stay, InstallKind::Package) => PipelinePlan::Package {
                root,
                manager: resolve_global_manager(descriptor.package_manager),
                target: package_target(),
            },
            (KindTransition::Stay, InstallKind::Unknown) => PipelinePlan::Unsupported {
                root,
            },
        })
    }
}
