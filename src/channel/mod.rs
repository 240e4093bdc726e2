//! Channel and version resolution.
//!
//! An update targets one of three channels:
//!
//! | Channel  | Source of versions                       | Dist-tag  |
//! |----------|------------------------------------------|-----------|
//! | `stable` | registry `latest`, or `vX.Y.Z` git tags   | `latest`  |
//! | `beta`   | registry `beta` (falls back to `latest`) | `beta`    |
//! | `dev`    | the upstream branch of a git checkout     | none      |
//!
//! # Precedence
//!
//! The effective channel is, highest first: the explicit request, the
//! `update.channel` value stored in config, then the installation default
//! (`dev` for git checkouts, `stable` for everything else).
//!
//! An explicit request that does not fit the current installation kind
//! (`dev` on a package install, `stable`/`beta` on a git checkout) is an
//! installation-kind switch; see [`KindTransition`].
//!
//! # Submodules
//!
//! - [`version`]: tag normalization, semver comparison and the downgrade policy
//! - [`registry`]: dist-tag lookups against the package registry

pub mod registry;
pub mod version;

pub use registry::{NpmRegistry, RegistryClient, ResolvedTag, resolve_channel_tag};
pub use version::{VersionTarget, compare_semver, needs_confirmation, normalize_tag};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::UpdateError;
use crate::git::GitInfo;
use crate::install::InstallKind;

/// Named update track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateChannel {
    /// Tagged releases
    Stable,
    /// Pre-releases
    Beta,
    /// Upstream branch head (git checkouts only)
    Dev,
}

impl UpdateChannel {
    /// Lowercase name as used on the command line and in config.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Beta => "beta",
            Self::Dev => "dev",
        }
    }

    /// Registry dist-tag backing this channel. `dev` follows a git ref instead.
    pub const fn dist_tag(self) -> Option<&'static str> {
        match self {
            Self::Stable => Some("latest"),
            Self::Beta => Some("beta"),
            Self::Dev => None,
        }
    }
}

impl fmt::Display for UpdateChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateChannel {
    type Err = UpdateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stable" => Ok(Self::Stable),
            "beta" => Ok(Self::Beta),
            "dev" => Ok(Self::Dev),
            _ => Err(UpdateError::InvalidChannel {
                value: s.to_string(),
            }),
        }
    }
}

/// Parse an optional raw channel string. Blank input counts as "not given".
pub fn normalize_channel(raw: Option<&str>) -> Result<Option<UpdateChannel>, UpdateError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some),
    }
}

/// Where the effective channel came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelSource {
    /// `--channel` on the command line
    Explicit,
    /// `update.channel` in config
    StoredConfig,
    /// Default for the installation kind
    InstallDefault,
}

impl ChannelSource {
    /// Short label for human output.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::StoredConfig => "config",
            Self::InstallDefault => "default",
        }
    }
}

/// Effective channel plus provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelResolution {
    /// The channel that will be used
    pub channel: UpdateChannel,
    /// Where it came from
    pub source: ChannelSource,
}

/// Default channel for an installation kind.
pub const fn default_channel(kind: InstallKind) -> UpdateChannel {
    match kind {
        InstallKind::Git => UpdateChannel::Dev,
        InstallKind::Package | InstallKind::Unknown => UpdateChannel::Stable,
    }
}

/// Resolve the effective channel.
///
/// `kind` is the kind being updated *to*: when a switch is in progress, pass the
/// target kind so the default matches the pipeline that will actually run.
pub fn resolve_effective_channel(
    requested: Option<UpdateChannel>,
    stored: Option<UpdateChannel>,
    kind: InstallKind,
) -> ChannelResolution {
    if let Some(channel) = requested {
        return ChannelResolution {
            channel,
            source: ChannelSource::Explicit,
        };
    }
    if let Some(channel) = stored {
        return ChannelResolution {
            channel,
            source: ChannelSource::StoredConfig,
        };
    }
    ChannelResolution {
        channel: default_channel(kind),
        source: ChannelSource::InstallDefault,
    }
}

/// Whether honoring a request changes the installation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindTransition {
    /// Update in place
    Stay,
    /// Clone (or reuse) a checkout and install it globally
    SwitchToGit,
    /// Install the published package, superseding the checkout
    SwitchToPackage,
}

impl KindTransition {
    /// Decide the transition. Only an explicit request can switch kinds.
    pub fn for_request(requested: Option<UpdateChannel>, current: InstallKind) -> Self {
        match requested {
            Some(UpdateChannel::Dev) if current != InstallKind::Git => Self::SwitchToGit,
            Some(UpdateChannel::Stable | UpdateChannel::Beta) if current == InstallKind::Git => {
                Self::SwitchToPackage
            }
            _ => Self::Stay,
        }
    }

    /// The installation kind the pipeline targets.
    pub const fn target_kind(self, current: InstallKind) -> InstallKind {
        match self {
            Self::Stay => current,
            Self::SwitchToGit => InstallKind::Git,
            Self::SwitchToPackage => InstallKind::Package,
        }
    }
}

/// Human label for a resolved channel, e.g. `dev (default · main · @0123abcd)`.
pub fn format_channel_label(resolution: &ChannelResolution, git: Option<&GitInfo>) -> String {
    let mut details = vec![resolution.source.label().to_string()];
    if let Some(git) = git {
        details.push(git.summary());
    }
    format!("{} ({})", resolution.channel, details.join(" · "))
}
