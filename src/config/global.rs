//! User configuration file (`~/.openclaw/config.toml`).
//!
//! The update engine reads two things from it: the stored `update.channel`
//! and the plugin install records under `[plugins.installs]`. Everything else
//! in the file belongs to other parts of the platform and is carried through
//! untouched.
//!
//! # File Format
//!
//! ```toml
//! [update]
//! channel = "beta"
//!
//! [plugins.installs.voice-call]
//! source = "npm"
//! spec = "@openclaw/voice-call"
//! version = "0.4.1"
//! install_path = "/home/me/.openclaw/extensions/voice-call"
//! ```
//!
//! # Invalid files
//!
//! A file that fails to parse does not abort an update. [`ConfigStore::load`]
//! returns an invalid [`ConfigSnapshot`] with the parse issues; the engine then
//! refuses to *write* the file (channel switches, plugin records) but still
//! updates the core installation.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::channel::UpdateChannel;
use crate::constants::CONFIG_PATH_ENV;
use crate::core::UpdateError;

/// Parsed configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// `[update]` table
    #[serde(default, skip_serializing_if = "UpdateSettings::is_empty")]
    pub update: UpdateSettings,

    /// `[plugins]` table
    #[serde(default, skip_serializing_if = "PluginSettings::is_empty")]
    pub plugins: PluginSettings,

    /// Tables owned by other subsystems
    #[serde(flatten)]
    pub extra: toml::Table,
}

/// `[update]` settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpdateSettings {
    /// Channel chosen by the last explicit `--channel`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<UpdateChannel>,

    /// Keys this engine does not know about
    #[serde(flatten)]
    pub extra: toml::Table,
}

impl UpdateSettings {
    fn is_empty(&self) -> bool {
        self.channel.is_none() && self.extra.is_empty()
    }
}

/// `[plugins]` settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PluginSettings {
    /// Install records keyed by plugin id
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub installs: BTreeMap<String, PluginInstallRecord>,

    /// Keys this engine does not know about
    #[serde(flatten)]
    pub extra: toml::Table,
}

impl PluginSettings {
    fn is_empty(&self) -> bool {
        self.installs.is_empty() && self.extra.is_empty()
    }
}

/// Where a plugin's code comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginSource {
    /// Shipped inside a git checkout under `extensions/<id>`
    Bundled,
    /// Installed from the package registry
    Npm,
}

/// One installed plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInstallRecord {
    /// Source of the plugin
    pub source: PluginSource,

    /// Registry spec for npm plugins
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,

    /// Installed version, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Directory containing the plugin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_path: Option<PathBuf>,
}

/// Result of reading the configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSnapshot {
    /// File the snapshot was read from
    pub path: PathBuf,
    /// Whether the file exists
    pub exists: bool,
    /// Whether it parsed
    pub valid: bool,
    /// Parsed contents (default when missing or invalid)
    pub config: AppConfig,
    /// Parse issues for invalid files
    pub issues: Vec<String>,
}

impl ConfigSnapshot {
    /// Stored channel, ignored when the file is invalid.
    pub fn stored_channel(&self) -> Option<UpdateChannel> {
        if self.valid { self.config.update.channel } else { None }
    }
}

/// Reads and writes the configuration file at a fixed path.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Store for an explicit path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }

    /// Store for `explicit`, else `$OPENCLAW_CONFIG_PATH`, else the default location.
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = explicit {
            return Ok(Self::new(path));
        }
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
            return Ok(Self::new(PathBuf::from(path)));
        }
        Ok(Self::new(super::state_dir()?.join("config.toml")))
    }

    /// Path of the configuration file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a snapshot. A missing file is a valid, empty configuration.
    pub async fn load(&self) -> Result<ConfigSnapshot> {
        if !self.path.exists() {
            return Ok(ConfigSnapshot {
                path: self.path.clone(),
                exists: false,
                valid: true,
                config: AppConfig::default(),
                issues: Vec::new(),
            });
        }

        let content = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read config from {}", self.path.display()))?;

        Ok(match toml::from_str::<AppConfig>(&content) {
            Ok(config) => ConfigSnapshot {
                path: self.path.clone(),
                exists: true,
                valid: true,
                config,
                issues: Vec::new(),
            },
            Err(e) => {
                tracing::warn!(target: "config", "Invalid config at {}: {}", self.path.display(), e);
                ConfigSnapshot {
                    path: self.path.clone(),
                    exists: true,
                    valid: false,
                    config: AppConfig::default(),
                    issues: vec![e.to_string().trim().to_string()],
                }
            }
        })
    }

    /// Write the whole configuration.
    pub async fn save(&self, config: &AppConfig) -> Result<()> {
        let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
        self.write(&content).await
    }

    /// Set `update.channel`, preserving comments and formatting elsewhere in the file.
    pub async fn persist_channel(&self, channel: UpdateChannel) -> Result<()> {
        let existing = if self.path.exists() {
            fs::read_to_string(&self.path)
                .await
                .with_context(|| format!("Failed to read config from {}", self.path.display()))?
        } else {
            String::new()
        };

        let mut doc = existing.parse::<toml_edit::DocumentMut>().map_err(|e| {
            UpdateError::ConfigError {
                message: format!("cannot edit {}: {}", self.path.display(), e),
            }
        })?;

        if !doc.get("update").is_some_and(toml_edit::Item::is_table_like) {
            doc["update"] = toml_edit::table();
        }
        doc["update"]["channel"] = toml_edit::value(channel.as_str());

        tracing::debug!(target: "config", "Persisting update.channel = {}", channel);
        self.write(&doc.to_string()).await
    }

    async fn write(&self, content: &str) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(&self.path, content)
            .await
            .with_context(|| format!("Failed to write config to {}", self.path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mut perms = fs::metadata(&self.path)
                .await
                .with_context(|| format!("Failed to read permissions for {}", self.path.display()))?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&self.path, perms).await.with_context(|| {
                format!("Failed to set permissions on {}", self.path.display())
            })?;
        }

        Ok(())
    }
}
