//! On-disk installation layouts.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::constants::CORE_PACKAGE_NAME;

/// Write `dir/package.json` with `name` and `version`, creating `dir`.
pub fn write_package_json(dir: &Path, name: &str, version: &str) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let body = serde_json::json!({ "name": name, "version": version });
    fs::write(dir.join("package.json"), serde_json::to_string_pretty(&body)?)
        .with_context(|| format!("Failed to write package.json in {}", dir.display()))
}

/// A temporary home with room for a checkout, a global package install, the
/// state directory and the config file.
///
/// ```text
/// <tmp>/
/// ├── checkout/               git install (package.json + .git/)
/// ├── global/node_modules/    global root reported by the package manager
/// │   └── openclaw/           package install
/// ├── state/                  lock file
/// └── config.toml
/// ```
pub struct InstallFixture {
    temp: TempDir,
}

impl InstallFixture {
    /// Empty layout.
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp: TempDir::new()?,
        })
    }

    /// Fixture root.
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Checkout directory.
    pub fn checkout_dir(&self) -> PathBuf {
        self.path().join("checkout")
    }

    /// Global `node_modules`.
    pub fn global_root(&self) -> PathBuf {
        self.path().join("global").join("node_modules")
    }

    /// Core package directory inside the global root.
    pub fn package_dir(&self) -> PathBuf {
        self.global_root().join(CORE_PACKAGE_NAME)
    }

    /// State directory for the update lock.
    pub fn state_dir(&self) -> PathBuf {
        self.path().join("state")
    }

    /// Config file path (not created).
    pub fn config_path(&self) -> PathBuf {
        self.path().join("config.toml")
    }

    /// Lay out a core checkout at `version`; returns its root.
    pub fn git_install(&self, version: &str) -> Result<PathBuf> {
        let dir = self.checkout_dir();
        write_package_json(&dir, CORE_PACKAGE_NAME, version)?;
        fs::create_dir_all(dir.join(".git"))?;
        Ok(dir)
    }

    /// Lay out a global package install at `version`; returns its root.
    pub fn package_install(&self, version: &str) -> Result<PathBuf> {
        let dir = self.package_dir();
        write_package_json(&dir, CORE_PACKAGE_NAME, version)?;
        Ok(dir)
    }

    /// Write the config file.
    pub fn write_config(&self, body: &str) -> Result<()> {
        fs::write(self.config_path(), body)?;
        Ok(())
    }
}
