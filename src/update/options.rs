//! Validated inputs of an update run.
//!
//! The CLI collects loosely-typed flags into an [`UpdateRequest`];
//! [`UpdateRequest::validate`] turns it into [`UpdateOptions`], the only type
//! the engine accepts. Validation has no side effects.

use std::path::PathBuf;
use std::time::Duration;

use crate::channel::{UpdateChannel, normalize_channel, normalize_tag};
use crate::constants::{DEFAULT_STEP_TIMEOUT, UPDATE_LOCK_TIMEOUT};
use crate::core::UpdateError;

/// Raw parameters as supplied by the command line.
#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
    /// Package root of the running installation
    pub root: PathBuf,
    /// `--channel`
    pub channel: Option<String>,
    /// `--tag`
    pub tag: Option<String>,
    /// `--timeout` in seconds
    pub timeout: Option<String>,
    /// Restart the gateway service afterwards
    pub restart: bool,
    /// `--yes`
    pub yes: bool,
    /// `--json`
    pub json: bool,
    /// Checkout directory used when switching into git mode
    pub git_dir: PathBuf,
    /// State directory (lock file)
    pub state_dir: PathBuf,
}

/// Validated parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Package root of the running installation
    pub root: PathBuf,
    /// Explicitly requested channel
    pub requested_channel: Option<UpdateChannel>,
    /// Normalized tag or version override
    pub tag: Option<String>,
    /// Per-step timeout
    pub step_timeout: Duration,
    /// Restart the gateway service afterwards
    pub restart: bool,
    /// Skip the downgrade confirmation
    pub assume_yes: bool,
    /// Machine-readable output requested
    pub json: bool,
    /// Checkout directory used when switching into git mode
    pub git_dir: PathBuf,
    /// State directory (lock file)
    pub state_dir: PathBuf,
    /// How long to wait for a concurrent run
    pub lock_timeout: Duration,
}

impl UpdateOptions {
    /// Options with defaults for everything but the paths.
    pub fn new(root: PathBuf, git_dir: PathBuf, state_dir: PathBuf) -> Self {
        Self {
            root,
            requested_channel: None,
            tag: None,
            step_timeout: DEFAULT_STEP_TIMEOUT,
            restart: true,
            assume_yes: false,
            json: false,
            git_dir,
            state_dir,
            lock_timeout: UPDATE_LOCK_TIMEOUT,
        }
    }
}

/// Parse `--timeout` seconds. Zero, negative and non-numeric values are rejected.
pub fn parse_timeout_secs(raw: &str) -> Result<Duration, UpdateError> {
    let invalid = || UpdateError::InvalidTimeout {
        value: raw.to_string(),
    };
    let secs: u64 = raw.trim().parse().map_err(|_| invalid())?;
    if secs == 0 {
        return Err(invalid());
    }
    Ok(Duration::from_secs(secs))
}

/// `path` anchored at the working directory. Steps run with their own `cwd`,
/// so a relative root would resolve differently in each of them.
fn anchored(path: PathBuf) -> PathBuf {
    if path.is_absolute() || path.as_os_str().is_empty() {
        return path;
    }
    std::path::absolute(&path).unwrap_or(path)
}

impl UpdateRequest {
    /// Validate every field. Relative paths are made absolute.
    ///
    /// # Errors
    ///
    /// [`UpdateError::InvalidChannel`], [`UpdateError::InvalidTag`] or
    /// [`UpdateError::InvalidTimeout`].
    pub fn validate(self) -> Result<UpdateOptions, UpdateError> {
        let requested_channel = normalize_channel(self.channel.as_deref())?;
        let tag = self.tag.as_deref().map(normalize_tag).transpose()?;
        let step_timeout = match self.timeout.as_deref() {
            Some(raw) => parse_timeout_secs(raw)?,
            None => DEFAULT_STEP_TIMEOUT,
        };

        Ok(UpdateOptions {
            root: anchored(self.root),
            requested_channel,
            tag,
            step_timeout,
            restart: self.restart,
            assume_yes: self.yes,
            json: self.json,
            git_dir: anchored(self.git_dir),
            state_dir: self.state_dir,
            lock_timeout: UPDATE_LOCK_TIMEOUT,
        })
    }
}
