//! Installation detection.
//!
//! Classifies the installation rooted at a directory:
//!
//! - **git**: `root/.git` exists *and* `root/package.json` names the core
//!   package. The second check keeps the engine from rebasing some unrelated
//!   repository that happens to contain the root.
//! - **package**: one of the supported package managers reports a global
//!   `node_modules` that contains the root.
//! - **unknown**: anything else. The update degrades to a `not-git-install` skip.
//!
//! Detection is read-only. It may run `git rev-parse`, `npm root -g` and similar
//! probes, each bounded by the caller's timeout. A descriptor is computed fresh
//! for every run and never cached.

pub mod manager;
pub mod package;

pub use manager::{
    GlobalInstallManager, detect_manager_by_presence, detect_manager_for_root,
    resolve_global_manager,
};
pub use package::{
    PackageManifest, find_core_package_root, package_name_from_spec, read_package_manifest,
    read_package_name, read_package_version,
};

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::git::{self, GitInfo};
use crate::process::CommandRunner;

/// How the running software was installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallKind {
    /// Source checkout of the core repository
    Git,
    /// Global install through a package manager
    Package,
    /// Neither
    Unknown,
}

impl InstallKind {
    /// Lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Git => "git",
            Self::Package => "package",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for InstallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the local installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationDescriptor {
    /// Installation kind
    pub kind: InstallKind,
    /// Package root of the installation
    pub root: PathBuf,
    /// Manager that owns a package install
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_manager: Option<GlobalInstallManager>,
    /// Checkout metadata for git installs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<GitInfo>,
}

/// Classify the installation at `root`.
pub async fn detect<R: CommandRunner>(
    root: &Path,
    runner: &R,
    timeout: Duration,
) -> InstallationDescriptor {
    if git::is_checkout(root) {
        let is_core = read_package_manifest(root).await.is_some_and(|m| m.is_core());
        if is_core {
            let info = git::read_git_info(runner, root, timeout).await;
            tracing::debug!(target: "install", "Git checkout at {}: {}", root.display(), info.summary());
            return InstallationDescriptor {
                kind: InstallKind::Git,
                root: root.to_path_buf(),
                package_manager: None,
                git: Some(info),
            };
        }
        tracing::debug!(
            target: "install",
            "{} is a git checkout but not of the core package",
            root.display()
        );
    }

    if let Some(manager) = detect_manager_for_root(runner, root, timeout).await {
        return InstallationDescriptor {
            kind: InstallKind::Package,
            root: root.to_path_buf(),
            package_manager: Some(manager),
            git: None,
        };
    }

    tracing::debug!(target: "install", "Could not classify installation at {}", root.display());
    InstallationDescriptor {
        kind: InstallKind::Unknown,
        root: root.to_path_buf(),
        package_manager: None,
        git: None,
    }
}
