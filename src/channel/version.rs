//! Version targets, tag normalization and the downgrade policy.
//!
//! Comparison is deliberately coarse: major, minor and patch are compared
//! numerically and anything after the patch number (pre-release identifiers,
//! build metadata) is informational only.

use regex::Regex;
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::LazyLock;

use crate::constants::CORE_PACKAGE_NAME;
use crate::core::UpdateError;

static CORE_VERSION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*v?(\d+)\.(\d+)\.(\d+)").ok());

/// The version an update aims for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionTarget {
    /// Dist-tag or version string used for the install
    pub tag: String,
    /// Concrete version, when it could be determined
    pub version: Option<String>,
}

impl VersionTarget {
    /// Human label: the version when known, otherwise the tag.
    pub fn label(&self) -> &str {
        self.version.as_deref().unwrap_or(&self.tag)
    }
}

fn core_triple(version: &str) -> Option<(u64, u64, u64)> {
    let caps = CORE_VERSION.as_ref()?.captures(version)?;
    let part = |i: usize| caps.get(i)?.as_str().parse::<u64>().ok();
    Some((part(1)?, part(2)?, part(3)?))
}

/// Compare two versions on major, minor and patch only.
///
/// Returns `None` when either side has no leading `X.Y.Z`.
pub fn compare_semver(left: &str, right: &str) -> Option<Ordering> {
    Some(core_triple(left)?.cmp(&core_triple(right)?))
}

/// Normalize a raw `--tag` value.
///
/// Trims whitespace and strips a `<core-package>@` prefix so that
/// `openclaw@beta` and `beta` mean the same thing.
pub fn normalize_tag(raw: &str) -> Result<String, UpdateError> {
    let trimmed = raw.trim();
    let prefix = format!("{CORE_PACKAGE_NAME}@");
    let tag = trimmed.strip_prefix(&prefix).unwrap_or(trimmed).trim();
    if tag.is_empty() {
        return Err(UpdateError::InvalidTag);
    }
    Ok(tag.to_string())
}

/// If `tag` is a semantic version (optionally `v`-prefixed), return it without the `v`.
pub fn normalize_version_tag(tag: &str) -> Option<String> {
    let candidate = tag.trim();
    let candidate = candidate.strip_prefix('v').unwrap_or(candidate);
    semver::Version::parse(candidate).ok().map(|_| candidate.to_string())
}

/// Decide whether moving from `current` to `target` needs confirmation.
///
/// - nothing to ask when the beta channel silently fell back to `latest`
/// - nothing to ask when the current version is unknown
/// - ask when the target is unknown (it cannot be shown not to be a downgrade)
/// - ask when the target is strictly older
pub fn needs_confirmation(current: Option<&str>, target: Option<&str>, fell_back: bool) -> bool {
    if fell_back {
        return false;
    }
    let Some(current) = current else {
        return false;
    };
    match target {
        None => true,
        Some(target) => compare_semver(current, target) == Some(Ordering::Greater),
    }
}
