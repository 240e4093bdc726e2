//! Data produced by an update run.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::install::GlobalInstallManager;
use crate::process::CommandSpec;

/// Skip reason: the checkout has uncommitted changes.
pub const REASON_DIRTY: &str = "dirty";
/// Skip reason: no updatable installation was found.
pub const REASON_NOT_GIT_INSTALL: &str = "not-git-install";
/// Skip reason: the checkout has no upstream branch.
pub const REASON_NO_UPSTREAM: &str = "no-upstream";
/// Skip reason: no release tag matches the channel.
pub const REASON_NO_RELEASE_TAG: &str = "no-release-tag";
/// Error reason used when the user interrupts a run.
pub const REASON_INTERRUPTED: &str = "interrupted";

/// Step names, in the order they can appear.
pub mod step {
    /// Working tree cleanliness
    pub const CLEAN_CHECK: &str = "clean check";
    /// Upstream branch lookup
    pub const UPSTREAM_CHECK: &str = "upstream check";
    /// `git fetch`
    pub const GIT_FETCH: &str = "git fetch";
    /// `git rebase`
    pub const GIT_REBASE: &str = "git rebase";
    /// Release tag listing; recorded only when it fails
    pub const TAG_LIST: &str = "git tag list";
    /// Release tag checkout
    pub const GIT_CHECKOUT: &str = "git checkout";
    /// Fresh clone when switching into git mode
    pub const GIT_CLONE: &str = "git clone";
    /// Dependency install in a checkout
    pub const DEPS_INSTALL: &str = "deps install";
    /// `build` script
    pub const BUILD: &str = "build";
    /// `ui:build` script
    pub const UI_BUILD: &str = "ui:build";
    /// Post-update diagnostics
    pub const DOCTOR: &str = "openclaw doctor";
    /// Global install of a published package
    pub const GLOBAL_UPDATE: &str = "global update";
    /// Global install of a checkout
    pub const GLOBAL_INSTALL: &str = "global install";
}

/// One command of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateStep {
    /// Step name reported in results
    pub name: String,
    /// Command to run
    pub spec: CommandSpec,
}

impl UpdateStep {
    /// Creates a step; the command is labelled with the step name in logs.
    pub fn new(name: impl Into<String>, spec: CommandSpec) -> Self {
        let name = name.into();
        let spec = spec.with_context(name.clone());
        Self {
            name,
            spec,
        }
    }
}

/// Outcome of one executed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStepResult {
    /// Step name
    pub name: String,
    /// Space-joined argv
    pub command: String,
    /// Working directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    /// Wall-clock duration
    pub duration_ms: u64,
    /// Exit code; `None` on timeout or kill
    pub exit_code: Option<i32>,
    /// Last characters of stdout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout_tail: Option<String>,
    /// Last characters of stderr
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr_tail: Option<String>,
}

impl UpdateStepResult {
    /// True when the step exited with code 0.
    pub const fn succeeded(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }
}

/// Overall outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    /// Every step succeeded
    Ok,
    /// A precondition ended the run early
    Skipped,
    /// A step failed
    Error,
}

impl UpdateStatus {
    /// Lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Skipped => "skipped",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which pipeline produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// Git checkout pipeline
    Git,
    /// npm global install
    Npm,
    /// pnpm global install
    Pnpm,
    /// bun global install
    Bun,
    /// Nothing ran
    Other,
}

impl UpdateMode {
    /// Mode of a global install through `manager`.
    pub const fn from_manager(manager: GlobalInstallManager) -> Self {
        match manager {
            GlobalInstallManager::Npm => Self::Npm,
            GlobalInstallManager::Pnpm => Self::Pnpm,
            GlobalInstallManager::Bun => Self::Bun,
        }
    }
}

/// Version and sha at one point of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VersionSnapshot {
    /// Package version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Checkout HEAD sha
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

/// Complete, serializable result of one update run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRunResult {
    /// Overall status
    pub status: UpdateStatus,
    /// Pipeline mode
    pub mode: UpdateMode,
    /// Root the pipeline operated on
    pub root: PathBuf,
    /// Skip reason, or the failing step name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// State before the run
    pub before: VersionSnapshot,
    /// State after the run
    pub after: VersionSnapshot,
    /// Executed steps in order
    pub steps: Vec<UpdateStepResult>,
    /// Total duration
    pub duration_ms: u64,
}

impl UpdateRunResult {
    /// Result for a run the user interrupted after `steps` completed.
    pub fn interrupted(root: PathBuf, steps: Vec<UpdateStepResult>) -> Self {
        let duration_ms = steps.iter().map(|s| s.duration_ms).sum();
        Self {
            status: UpdateStatus::Error,
            mode: UpdateMode::Other,
            root,
            reason: Some(REASON_INTERRUPTED.to_string()),
            before: VersionSnapshot::default(),
            after: VersionSnapshot::default(),
            steps,
            duration_ms,
        }
    }

    /// Exit code for this result: 1 on error, 0 otherwise.
    pub const fn exit_code(&self) -> i32 {
        match self.status {
            UpdateStatus::Error => 1,
            UpdateStatus::Ok | UpdateStatus::Skipped => 0,
        }
    }

    /// The failed step, if any.
    pub fn failed_step(&self) -> Option<&UpdateStepResult> {
        self.steps.iter().find(|s| !s.succeeded())
    }
}
