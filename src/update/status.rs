//! Read-only update status.

use anyhow::Result;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::channel::{
    ChannelResolution, RegistryClient, compare_semver, format_channel_label, resolve_channel_tag,
    resolve_effective_channel,
};
use crate::config::ConfigStore;
use crate::constants::CORE_PACKAGE_NAME;
use crate::install::{self, InstallKind, InstallationDescriptor};
use crate::process::CommandRunner;

/// Whether a newer version is published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum UpdateAvailability {
    /// Installed version matches the channel
    UpToDate,
    /// A newer version exists
    Available {
        /// The newer version
        version: String,
    },
    /// Could not be determined
    Unknown,
}

impl fmt::Display for UpdateAvailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpToDate => f.write_str("up to date"),
            Self::Available {
                version,
            } => write!(f, "update available ({version})"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Everything `status` reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// Detected installation
    pub install: InstallationDescriptor,
    /// Effective channel
    pub channel: ChannelResolution,
    /// Human channel label
    pub channel_label: String,
    /// Installed version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_version: Option<String>,
    /// Update availability
    pub update: UpdateAvailability,
}

/// Compare an installed version with the channel's published one.
pub fn availability(current: Option<&str>, latest: Option<&str>) -> UpdateAvailability {
    let (Some(current), Some(latest)) = (current, latest) else {
        return UpdateAvailability::Unknown;
    };
    match compare_semver(current, latest) {
        Some(Ordering::Less) => UpdateAvailability::Available {
            version: latest.to_string(),
        },
        Some(_) => UpdateAvailability::UpToDate,
        None => UpdateAvailability::Unknown,
    }
}

/// Collect status for the installation at `root`.
///
/// Git checkouts are not fetched, so their availability is `unknown`.
pub async fn collect_status<R: CommandRunner, G: RegistryClient>(
    runner: &R,
    registry: &G,
    store: &ConfigStore,
    root: &Path,
    timeout: Duration,
) -> Result<StatusReport> {
    let snapshot = store.load().await?;
    let descriptor = install::detect(root, runner, timeout).await;
    let channel = resolve_effective_channel(None, snapshot.stored_channel(), descriptor.kind);
    let channel_label = format_channel_label(&channel, descriptor.git.as_ref());
    let current_version = install::read_package_version(root).await;

    let update = match descriptor.kind {
        InstallKind::Package => {
            let name = install::read_package_name(root)
                .await
                .unwrap_or_else(|| CORE_PACKAGE_NAME.to_string());
            let resolved = resolve_channel_tag(registry, &name, channel.channel).await;
            availability(current_version.as_deref(), resolved.version.as_deref())
        }
        InstallKind::Git | InstallKind::Unknown => UpdateAvailability::Unknown,
    };

    Ok(StatusReport {
        install: descriptor,
        channel,
        channel_label,
        current_version,
        update,
    })
}
