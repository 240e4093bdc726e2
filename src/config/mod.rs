//! Configuration and well-known locations.
//!
//! - [`ConfigStore`] reads and writes `~/.openclaw/config.toml`
//! - [`state_dir`] is `~/.openclaw`, home of the config and the update lock
//! - [`resolve_git_dir`] applies the `OPENCLAW_GIT_DIR` override, defaulting
//!   to `~/.openclaw/openclaw`

mod global;

pub use global::{
    AppConfig, ConfigSnapshot, ConfigStore, PluginInstallRecord, PluginSettings, PluginSource,
    UpdateSettings,
};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::constants::{CHECKOUT_DIR_NAME, GIT_DIR_ENV, STATE_DIR_NAME};

/// `~/.openclaw`.
pub fn state_dir() -> Result<PathBuf> {
    Ok(dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
        .join(STATE_DIR_NAME))
}

/// Expand `~` and environment variables in a user-supplied path.
pub fn expand_path(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw)
        .with_context(|| format!("Failed to expand environment variables in path: {raw}"))?;
    Ok(PathBuf::from(expanded.into_owned()))
}

/// Anchor a relative path at the working directory.
///
/// Steps run with their own `cwd`, so every path handed to them must be
/// absolute.
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path)
        .with_context(|| format!("Failed to resolve path: {}", path.display()))
}

/// Directory used when switching into git mode.
///
/// `override_value` is the raw `OPENCLAW_GIT_DIR` value, passed in by the
/// caller so the engine never reads process-wide state itself. A relative
/// override is resolved against the working directory.
pub fn resolve_git_dir(override_value: Option<&str>) -> Result<PathBuf> {
    match override_value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => absolute_path(&expand_path(raw)?),
        None => Ok(state_dir()?.join(CHECKOUT_DIR_NAME)),
    }
}

/// Raw `OPENCLAW_GIT_DIR` from the environment.
pub fn git_dir_from_env() -> Option<String> {
    std::env::var(GIT_DIR_ENV).ok()
}
