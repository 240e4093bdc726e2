//! Global package managers.
//!
//! The engine supports the three managers the core package is published for.
//! Each knows how to report its global `node_modules` root and how to spell a
//! global install.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::process::{CommandRunner, CommandSpec};

/// A package manager capable of global installs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlobalInstallManager {
    /// npm
    Npm,
    /// pnpm
    Pnpm,
    /// bun
    Bun,
}

impl GlobalInstallManager {
    /// Detection order.
    pub const ALL: [Self; 3] = [Self::Npm, Self::Pnpm, Self::Bun];

    /// Executable name.
    pub const fn program(self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Pnpm => "pnpm",
            Self::Bun => "bun",
        }
    }

    /// Argv installing `spec` (a `name@tag` or a local path) globally.
    pub fn global_install_args(self, spec: &str) -> Vec<String> {
        let args: [&str; 3] = match self {
            Self::Npm => ["npm", "i", "-g"],
            Self::Pnpm => ["pnpm", "add", "-g"],
            Self::Bun => ["bun", "add", "-g"],
        };
        args.iter().map(|s| (*s).to_string()).chain(std::iter::once(spec.to_string())).collect()
    }

    /// Argv installing a project's dependencies in its own directory.
    pub fn install_deps_args(self) -> Vec<String> {
        vec![self.program().to_string(), "install".to_string()]
    }

    /// Argv running a package script.
    pub fn run_script_args(self, script: &str) -> Vec<String> {
        vec![self.program().to_string(), "run".to_string(), script.to_string()]
    }

    /// Global `node_modules` directory, when the manager can report one.
    pub async fn global_root<R: CommandRunner>(
        self,
        runner: &R,
        timeout: Duration,
    ) -> Option<PathBuf> {
        match self {
            Self::Npm | Self::Pnpm => {
                let spec = CommandSpec::new(self.program())
                    .args(["root", "-g"])
                    .with_timeout(Some(timeout));
                match runner.run(&spec).await {
                    Ok(output) => output.stdout_trimmed().map(PathBuf::from),
                    Err(e) => {
                        tracing::debug!(target: "install", "{} root -g failed: {}", self, e);
                        None
                    }
                }
            }
            Self::Bun => bun_global_root(),
        }
    }

    /// Where `package` would live after a global install.
    pub async fn resolve_global_package_root<R: CommandRunner>(
        self,
        runner: &R,
        package: &str,
        timeout: Duration,
    ) -> Option<PathBuf> {
        Some(self.global_root(runner, timeout).await?.join(package))
    }

    /// Pick the manager for a project checkout from its lockfile.
    pub fn for_lockfile(dir: &Path) -> Self {
        if dir.join("pnpm-lock.yaml").exists() {
            Self::Pnpm
        } else if dir.join("bun.lockb").exists() || dir.join("bun.lock").exists() {
            Self::Bun
        } else {
            Self::Npm
        }
    }
}

impl fmt::Display for GlobalInstallManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

fn bun_global_root() -> Option<PathBuf> {
    let base = match std::env::var_os("BUN_INSTALL") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::home_dir()?.join(".bun"),
    };
    Some(base.join("install").join("global").join("node_modules"))
}

fn same_path(a: &Path, b: &Path) -> bool {
    let canon = |p: &Path| std::fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf());
    canon(a) == canon(b)
}

/// Find the manager whose global root contains `package_root`.
pub async fn detect_manager_for_root<R: CommandRunner>(
    runner: &R,
    package_root: &Path,
    timeout: Duration,
) -> Option<GlobalInstallManager> {
    for manager in GlobalInstallManager::ALL {
        let Some(global_root) = manager.global_root(runner, timeout).await else {
            continue;
        };
        if let Some(parent) = package_root.parent()
            && same_path(parent, &global_root)
        {
            tracing::debug!(target: "install", "{} owns {}", manager, package_root.display());
            return Some(manager);
        }
    }
    None
}

/// First manager available on `PATH`, in [`GlobalInstallManager::ALL`] order.
pub fn detect_manager_by_presence() -> Option<GlobalInstallManager> {
    GlobalInstallManager::ALL.into_iter().find(|m| which::which(m.program()).is_ok())
}

/// Manager to use for a global install.
///
/// Prefers the manager that installed the running package (`known`), then
/// whatever is on `PATH`, then npm.
pub fn resolve_global_manager(known: Option<GlobalInstallManager>) -> GlobalInstallManager {
    known.or_else(detect_manager_by_presence).unwrap_or(GlobalInstallManager::Npm)
}
