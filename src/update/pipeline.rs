//! Pipeline plans and their execution.
//!
//! The engine decides once which pipeline to run and encodes the decision as a
//! [`PipelinePlan`]. Execution is uniform: every plan drives the same
//! [`StepExecutor`], so results always list steps in true execution order,
//! including the clone and global-install steps of a kind switch.
//!
//! # Git pipeline
//!
//! ```text
//! clean check -> upstream check -> git fetch -> git rebase          (dev)
//! clean check -> git fetch -> git checkout <newest release tag>     (stable, beta)
//!   -> deps install -> build -> [ui:build] -> openclaw doctor
//! ```
//!
//! A dirty tree ends the run as `skipped` before anything is recorded.
//!
//! # Package pipeline
//!
//! ```text
//! global update <name>@<tag> -> [openclaw doctor]
//! ```

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Result;

use super::executor::StepExecutor;
use super::observer::StepObserver;
use super::types::{
    REASON_DIRTY, REASON_NO_RELEASE_TAG, REASON_NO_UPSTREAM, REASON_NOT_GIT_INSTALL, UpdateMode,
    UpdateRunResult, UpdateStatus, UpdateStep, VersionSnapshot, step,
};
use crate::channel::{UpdateChannel, VersionTarget};
use crate::constants::{CORE_PACKAGE_NAME, DEFAULT_REPO_URL, STATUS_TIMEOUT};
use crate::core::UpdateError;
use crate::git;
use crate::install::{
    GlobalInstallManager, read_package_manifest, read_package_name, read_package_version,
};
use crate::process::{CommandRunner, CommandSpec};

/// How a kind switch into git mode obtains its checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutAction {
    /// Clone the repository into the target directory
    Clone {
        /// Repository URL
        url: String,
    },
    /// Reuse an existing checkout of the core package
    Existing,
}

/// The pipeline chosen for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelinePlan {
    /// Update a checkout in place
    Git {
        /// Checkout root
        root: PathBuf,
        /// Effective channel
        channel: UpdateChannel,
    },
    /// Reinstall the published package through its manager
    Package {
        /// Current package root
        root: PathBuf,
        /// Manager owning the install
        manager: GlobalInstallManager,
        /// Version to install
        target: VersionTarget,
    },
    /// Move a package (or unknown) install onto a checkout
    SwitchToGit {
        /// Checkout directory
        git_dir: PathBuf,
        /// Clone or reuse
        checkout: CheckoutAction,
        /// Manager that installs the checkout globally
        manager: GlobalInstallManager,
        /// Root of the installation being replaced
        previous_root: PathBuf,
    },
    /// Replace a checkout with the published package
    SwitchToPackage {
        /// Checkout root being replaced
        root: PathBuf,
        /// Manager used for the install
        manager: GlobalInstallManager,
        /// Version to install
        target: VersionTarget,
    },
    /// Nothing can be updated
    Unsupported {
        /// Root that was inspected
        root: PathBuf,
    },
}

impl PipelinePlan {
    /// Mode reported in the result.
    pub const fn mode(&self) -> UpdateMode {
        match self {
            Self::Git { .. } | Self::SwitchToGit { .. } => UpdateMode::Git,
            Self::Package { manager, .. } | Self::SwitchToPackage { manager, .. } => {
                UpdateMode::from_manager(*manager)
            }
            Self::Unsupported { .. } => UpdateMode::Other,
        }
    }
}

/// Decide how to obtain the checkout for a switch into git mode.
///
/// # Errors
///
/// [`UpdateError::GitDirNotCheckout`] when the directory holds unrelated files;
/// [`UpdateError::GitDirNotCore`] when it is a checkout of another project.
pub async fn plan_checkout(git_dir: &Path) -> Result<CheckoutAction> {
    let clone = || CheckoutAction::Clone {
        url: DEFAULT_REPO_URL.to_string(),
    };

    if !git_dir.exists() {
        return Ok(clone());
    }
    if git::is_checkout(git_dir) {
        let is_core = read_package_manifest(git_dir).await.is_some_and(|m| m.is_core());
        if !is_core {
            return Err(UpdateError::GitDirNotCore {
                path: git_dir.to_path_buf(),
            }
            .into());
        }
        return Ok(CheckoutAction::Existing);
    }

    let mut entries = tokio::fs::read_dir(git_dir).await?;
    if entries.next_entry().await?.is_none() {
        return Ok(clone());
    }
    Err(UpdateError::GitDirNotCheckout {
        path: git_dir.to_path_buf(),
    }
    .into())
}

/// Shared execution state for one run.
pub struct PipelineRun<'a, R, O> {
    runner: &'a R,
    executor: StepExecutor<'a, R, O>,
    step_timeout: Duration,
    started: Instant,
}

impl<'a, R: CommandRunner, O: StepObserver> PipelineRun<'a, R, O> {
    /// Prepare a run with the given per-step timeout.
    pub fn new(runner: &'a R, observer: &'a O, step_timeout: Duration) -> Self {
        Self {
            runner,
            executor: StepExecutor::new(runner, observer),
            step_timeout,
            started: Instant::now(),
        }
    }

    fn step(&self, name: &str, spec: CommandSpec) -> UpdateStep {
        UpdateStep::new(name, spec.with_timeout(Some(self.step_timeout)))
    }

    fn argv_step(&self, name: &str, argv: Vec<String>, cwd: Option<&Path>) -> Option<UpdateStep> {
        let spec = CommandSpec::from_argv(argv)?;
        let spec = match cwd {
            Some(dir) => spec.current_dir(dir),
            None => spec,
        };
        Some(self.step(name, spec))
    }

    fn finish(
        self,
        status: UpdateStatus,
        mode: UpdateMode,
        root: PathBuf,
        reason: Option<String>,
        before: VersionSnapshot,
        after: VersionSnapshot,
    ) -> UpdateRunResult {
        let duration_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            target: "update",
            "Update finished: {} ({}) in {}ms",
            status,
            reason.as_deref().unwrap_or("-"),
            duration_ms
        );
        UpdateRunResult {
            status,
            mode,
            root,
            reason,
            before,
            after,
            steps: self.executor.into_steps(),
            duration_ms,
        }
    }

    async fn snapshot(&self, root: &Path, with_sha: bool) -> VersionSnapshot {
        VersionSnapshot {
            version: read_package_version(root).await,
            sha: if with_sha {
                git::read_head_sha(self.runner, root, STATUS_TIMEOUT).await
            } else {
                None
            },
        }
    }

    /// Execute `plan` to completion.
    pub async fn execute(self, plan: &PipelinePlan) -> UpdateRunResult {
        tracing::debug!(target: "update", "Executing plan: {:?}", plan);
        match plan {
            PipelinePlan::Git {
                root,
                channel,
            } => self.run_git(root, *channel).await,
            PipelinePlan::Package {
                root,
                manager,
                target,
            } => self.run_package(Some(root.as_path()), root, *manager, target).await,
            PipelinePlan::SwitchToPackage {
                root,
                manager,
                target,
            } => self.run_package(None, root, *manager, target).await,
            PipelinePlan::SwitchToGit {
                git_dir,
                checkout,
                manager,
                previous_root,
            } => self.run_switch_to_git(git_dir, checkout, *manager, previous_root).await,
            PipelinePlan::Unsupported {
                root,
            } => {
                let before = self.snapshot(root, false).await;
                let stop = Some((UpdateStatus::Skipped, REASON_NOT_GIT_INSTALL.to_string()));
                self.conclude(UpdateMode::Other, root, stop, before, false).await
            }
        }
    }

    /// Clean check, then channel-specific sync.
    async fn sync_checkout(&mut self, root: &Path, channel: UpdateChannel) -> Option<Stop> {
        let clean_step = self.step(step::CLEAN_CHECK, git::status_porcelain(root));
        let clean = self.executor.execute(&clean_step).await;
        let dirty = clean.succeeded()
            && clean.stdout_tail.as_deref().is_some_and(|out| !out.trim().is_empty());
        if dirty {
            tracing::info!(target: "update", "Working tree at {} is dirty", root.display());
            return Some((UpdateStatus::Skipped, REASON_DIRTY.to_string()));
        }
        let clean_ok = clean.succeeded();
        self.executor.record_executed(&clean_step, clean);
        if !clean_ok {
            return Some((UpdateStatus::Error, step::CLEAN_CHECK.to_string()));
        }

        match channel {
            UpdateChannel::Dev => {
                let upstream = self.step(step::UPSTREAM_CHECK, git::upstream(root));
                if !self.executor.run(upstream).await {
                    return Some((UpdateStatus::Skipped, REASON_NO_UPSTREAM.to_string()));
                }
                let steps = vec![
                    self.step(step::GIT_FETCH, git::fetch(root)),
                    self.step(step::GIT_REBASE, git::rebase_upstream(root)),
                ];
                self.executor.run_all(steps).await.map(|failed| (UpdateStatus::Error, failed))
            }
            UpdateChannel::Stable | UpdateChannel::Beta => {
                let fetch = self.step(step::GIT_FETCH, git::fetch(root));
                if !self.executor.run(fetch).await {
                    return Some((UpdateStatus::Error, step::GIT_FETCH.to_string()));
                }
                let listing = self.step(step::TAG_LIST, git::list_release_tags(root));
                let (listed, tags) = self.executor.execute_with_stdout(&listing).await;
                if !listed.succeeded() {
                    tracing::warn!(
                        target: "update",
                        "Could not list release tags in {}",
                        root.display()
                    );
                    self.executor.record_executed(&listing, listed);
                    return Some((UpdateStatus::Error, step::TAG_LIST.to_string()));
                }
                let Some(tag) = git::latest_release_tag(&tags, channel) else {
                    return Some((UpdateStatus::Skipped, REASON_NO_RELEASE_TAG.to_string()));
                };
                tracing::debug!(target: "update", "Checking out release tag {}", tag);
                let checkout = self.step(step::GIT_CHECKOUT, git::checkout_detached(root, &tag));
                if self.executor.run(checkout).await {
                    None
                } else {
                    Some((UpdateStatus::Error, step::GIT_CHECKOUT.to_string()))
                }
            }
        }
    }

    /// Install dependencies, build and verify a checkout.
    fn build_steps(&self, root: &Path) -> Vec<UpdateStep> {
        let manager = GlobalInstallManager::for_lockfile(root);
        let mut argvs = vec![
            (step::DEPS_INSTALL, manager.install_deps_args()),
            (step::BUILD, manager.run_script_args("build")),
        ];
        if root.join("ui").join("package.json").exists() {
            argvs.push((step::UI_BUILD, manager.run_script_args("ui:build")));
        }
        argvs.push((step::DOCTOR, doctor_argv(&root.join("openclaw.mjs"))));

        argvs
            .into_iter()
            .filter_map(|(name, argv)| self.argv_step(name, argv, Some(root)))
            .collect()
    }

    /// Sync (optionally) and build a checkout.
    async fn git_phase(&mut self, root: &Path, channel: UpdateChannel, sync: bool) -> Option<Stop> {
        if sync && let Some(stop) = self.sync_checkout(root, channel).await {
            return Some(stop);
        }
        let steps = self.build_steps(root);
        self.executor.run_all(steps).await.map(|failed| (UpdateStatus::Error, failed))
    }

    async fn conclude(
        self,
        mode: UpdateMode,
        root: &Path,
        stop: Option<Stop>,
        before: VersionSnapshot,
        with_sha: bool,
    ) -> UpdateRunResult {
        let (status, reason) = match stop {
            Some((status, reason)) => (status, Some(reason)),
            None => (UpdateStatus::Ok, None),
        };
        let after = if status == UpdateStatus::Skipped {
            before.clone()
        } else {
            self.snapshot(root, with_sha).await
        };
        self.finish(status, mode, root.to_path_buf(), reason, before, after)
    }

    async fn run_git(mut self, root: &Path, channel: UpdateChannel) -> UpdateRunResult {
        let before = self.snapshot(root, true).await;
        let stop = self.git_phase(root, channel, true).await;
        self.conclude(UpdateMode::Git, root, stop, before, true).await
    }

    async fn run_switch_to_git(
        mut self,
        git_dir: &Path,
        checkout: &CheckoutAction,
        manager: GlobalInstallManager,
        previous_root: &Path,
    ) -> UpdateRunResult {
        let before = VersionSnapshot {
            version: read_package_version(previous_root).await,
            sha: match checkout {
                CheckoutAction::Existing => {
                    git::read_head_sha(self.runner, git_dir, STATUS_TIMEOUT).await
                }
                CheckoutAction::Clone { .. } => None,
            },
        };

        // A fresh clone is already at the remote head; only existing checkouts sync.
        let sync = match checkout {
            CheckoutAction::Clone {
                url,
            } => {
                let clone = self.step(step::GIT_CLONE, git::clone(url, git_dir));
                if !self.executor.run(clone).await {
                    let stop = Some((UpdateStatus::Error, step::GIT_CLONE.to_string()));
                    return self.conclude(UpdateMode::Git, git_dir, stop, before, true).await;
                }
                false
            }
            CheckoutAction::Existing => true,
        };

        let mut stop = self.git_phase(git_dir, UpdateChannel::Dev, sync).await;
        if stop.is_none() {
            let install_args = manager.global_install_args(&git_dir.display().to_string());
            let install = self.argv_step(step::GLOBAL_INSTALL, install_args, Some(git_dir));
            stop = self
                .executor
                .run_all(install.into_iter().collect())
                .await
                .map(|failed| (UpdateStatus::Error, failed));
        }
        self.conclude(UpdateMode::Git, git_dir, stop, before, true).await
    }

    /// Global install of the published package.
    ///
    /// `known_root` is the package root of an in-place update; a kind switch
    /// asks the manager where the package lives.
    async fn run_package(
        mut self,
        known_root: Option<&Path>,
        fallback_root: &Path,
        manager: GlobalInstallManager,
        target: &VersionTarget,
    ) -> UpdateRunResult {
        let pkg_root = match known_root {
            Some(root) => Some(root.to_path_buf()),
            None => manager
                .resolve_global_package_root(self.runner, CORE_PACKAGE_NAME, STATUS_TIMEOUT)
                .await
                .filter(|p| p.exists()),
        };
        let root = pkg_root.unwrap_or_else(|| fallback_root.to_path_buf());
        let package_name =
            read_package_name(&root).await.unwrap_or_else(|| CORE_PACKAGE_NAME.to_string());
        let before = self.snapshot(&root, false).await;

        let spec = format!("{}@{}", package_name, target.tag);
        let install = self.argv_step(step::GLOBAL_UPDATE, manager.global_install_args(&spec), None);
        let mut failed = self.executor.run_all(install.into_iter().collect()).await;

        let entry = root.join("dist").join("entry.js");
        if failed.is_none() && entry.exists() {
            let doctor = self.argv_step(step::DOCTOR, doctor_argv(&entry), None);
            failed = self.executor.run_all(doctor.into_iter().collect()).await;
        }

        let stop = failed.map(|failed| (UpdateStatus::Error, failed));
        self.conclude(UpdateMode::from_manager(manager), &root, stop, before, false).await
    }
}

/// `(status, reason)` that ended a phase early.
type Stop = (UpdateStatus, String);

fn doctor_argv(entry: &Path) -> Vec<String> {
    vec![
        "node".to_string(),
        entry.display().to_string(),
        "doctor".to_string(),
        "--non-interactive".to_string(),
    ]
}
