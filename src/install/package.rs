//! `package.json` reading.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::constants::CORE_PACKAGE_NAME;

/// The fields of a package descriptor the engine cares about.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct PackageManifest {
    /// Package name
    #[serde(default)]
    pub name: Option<String>,
    /// Package version
    #[serde(default)]
    pub version: Option<String>,
}

impl PackageManifest {
    /// True when this is the core package.
    pub fn is_core(&self) -> bool {
        self.name.as_deref() == Some(CORE_PACKAGE_NAME)
    }
}

/// Read `dir/package.json`. Missing or malformed files yield `None`.
pub async fn read_package_manifest(dir: &Path) -> Option<PackageManifest> {
    let path = dir.join("package.json");
    let content = tokio::fs::read_to_string(&path).await.ok()?;
    match serde_json::from_str(&content) {
        Ok(manifest) => Some(manifest),
        Err(e) => {
            tracing::debug!(target: "install", "Ignoring malformed {}: {}", path.display(), e);
            None
        }
    }
}

/// Version declared in `dir/package.json`.
pub async fn read_package_version(dir: &Path) -> Option<String> {
    read_package_manifest(dir).await?.version.filter(|v| !v.trim().is_empty())
}

/// Name declared in `dir/package.json`.
pub async fn read_package_name(dir: &Path) -> Option<String> {
    read_package_manifest(dir).await?.name.filter(|n| !n.trim().is_empty())
}

/// Package name of an install spec: `@scope/name@^1.2` gives `@scope/name`,
/// `name@latest` gives `name`.
pub fn package_name_from_spec(spec: &str) -> &str {
    let spec = spec.trim();
    let search_from = usize::from(spec.starts_with('@'));
    match spec[search_from..].find('@') {
        Some(at) => &spec[..search_from + at],
        None => spec,
    }
}

/// Walk up from `start` to the first directory whose `package.json` names the
/// core package.
pub async fn find_core_package_root(start: &Path) -> Option<PathBuf> {
    for dir in start.ancestors() {
        if let Some(manifest) = read_package_manifest(dir).await
            && manifest.is_core()
        {
            return Some(dir.to_path_buf());
        }
    }
    None
}
