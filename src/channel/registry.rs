//! Registry dist-tag lookups.
//!
//! Lookups are best effort. A network error, timeout or missing tag yields
//! `version = None`, which the downgrade policy treats as an unknown target.

use anyhow::{Context, Result};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::UpdateChannel;
use super::version::{VersionTarget, compare_semver, normalize_version_tag};
use crate::constants::{DEFAULT_REGISTRY_URL, STATUS_TIMEOUT};

/// Dist-tag used when a package install follows the `dev` channel.
pub const DEV_DIST_TAG: &str = "dev";

/// Source of dist-tag information.
pub trait RegistryClient: Send + Sync {
    /// All dist-tags of `package`, tag name to version.
    fn dist_tags(
        &self,
        package: &str,
    ) -> impl Future<Output = Result<BTreeMap<String, String>>> + Send;
}

/// HTTP client for an npm-compatible registry.
#[derive(Debug, Clone)]
pub struct NpmRegistry {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl Default for NpmRegistry {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_REGISTRY_URL.to_string(),
            timeout: STATUS_TIMEOUT,
        }
    }
}

impl NpmRegistry {
    /// Client for the public registry with the status timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different registry (mirrors, private registries).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Per-request timeout.
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// URL of the dist-tags document for `package`. Scoped names keep the `@`
    /// and encode the slash.
    pub fn dist_tags_url(&self, package: &str) -> String {
        format!("{}/-/package/{}/dist-tags", self.base_url, package.replace('/', "%2f"))
    }
}

impl RegistryClient for NpmRegistry {
    async fn dist_tags(&self, package: &str) -> Result<BTreeMap<String, String>> {
        let url = self.dist_tags_url(package);
        debug!(target: "registry", "Fetching dist-tags from {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("Failed to fetch dist-tags for {package}"))?;

        if !response.status().is_success() {
            anyhow::bail!("Registry returned HTTP {} for {}", response.status(), url);
        }

        response
            .json::<BTreeMap<String, String>>()
            .await
            .with_context(|| format!("Failed to parse dist-tags for {package}"))
    }
}

/// Version behind one dist-tag, or `None` when it cannot be determined.
pub async fn fetch_tag_version<G: RegistryClient>(
    registry: &G,
    package: &str,
    tag: &str,
) -> Option<String> {
    match registry.dist_tags(package).await {
        Ok(tags) => tags.get(tag).cloned(),
        Err(e) => {
            warn!(target: "registry", "Could not resolve {}@{}: {:#}", package, tag, e);
            None
        }
    }
}

/// Dist-tag chosen for a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTag {
    /// Tag to install
    pub tag: String,
    /// Version behind it
    pub version: Option<String>,
    /// Beta fell back to `latest`
    pub fell_back: bool,
}

/// Resolve the dist-tag and version for `channel`.
///
/// Beta falls back to `latest` when there is no `beta` tag or when it points at
/// something older than `latest`.
pub async fn resolve_channel_tag<G: RegistryClient>(
    registry: &G,
    package: &str,
    channel: UpdateChannel,
) -> ResolvedTag {
    let tag = channel.dist_tag().unwrap_or(DEV_DIST_TAG);
    let tags = match registry.dist_tags(package).await {
        Ok(tags) => tags,
        Err(e) => {
            warn!(target: "registry", "Could not resolve {}@{}: {:#}", package, tag, e);
            return ResolvedTag {
                tag: tag.to_string(),
                version: None,
                fell_back: false,
            };
        }
    };

    let version = tags.get(tag).cloned();
    if channel != UpdateChannel::Beta {
        return ResolvedTag {
            tag: tag.to_string(),
            version,
            fell_back: false,
        };
    }

    let Some(latest) = tags.get("latest").cloned() else {
        return ResolvedTag {
            tag: tag.to_string(),
            version,
            fell_back: false,
        };
    };

    let beta_is_stale = match &version {
        None => true,
        Some(beta) => compare_semver(beta, &latest) == Some(Ordering::Less),
    };
    if beta_is_stale {
        debug!(target: "registry", "No newer beta than latest ({}); using latest", latest);
        return ResolvedTag {
            tag: "latest".to_string(),
            version: Some(latest),
            fell_back: true,
        };
    }

    ResolvedTag {
        tag: tag.to_string(),
        version,
        fell_back: false,
    }
}

/// Target for an explicit `--tag`.
///
/// A semantic version is used as-is with no registry call; anything else is a
/// dist-tag and is looked up.
pub async fn resolve_explicit_tag<G: RegistryClient>(
    registry: &G,
    package: &str,
    tag: &str,
) -> VersionTarget {
    if let Some(version) = normalize_version_tag(tag) {
        return VersionTarget {
            tag: tag.to_string(),
            version: Some(version),
        };
    }
    VersionTarget {
        tag: tag.to_string(),
        version: fetch_tag_version(registry, package, tag).await,
    }
}
