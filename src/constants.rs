//! Global constants used throughout the update engine.
//!
//! Timeouts, size limits and well-known names that more than one module
//! needs. Keeping them here makes the magic numbers discoverable.

use std::time::Duration;

/// Name of the core package as published to the registry and declared in
/// the checkout's `package.json`.
pub const CORE_PACKAGE_NAME: &str = "openclaw";

/// Upstream repository cloned when switching an installation into git mode.
pub const DEFAULT_REPO_URL: &str = "https://github.com/openclaw/openclaw.git";

/// Environment variable overriding the git-mode checkout directory.
pub const GIT_DIR_ENV: &str = "OPENCLAW_GIT_DIR";

/// Environment variable overriding the configuration file location.
pub const CONFIG_PATH_ENV: &str = "OPENCLAW_CONFIG_PATH";

/// Environment variable that disables spinners when set to any value.
pub const NO_PROGRESS_ENV: &str = "OPENCLAW_NO_PROGRESS";

/// Directory under the home directory holding config and lock.
pub const STATE_DIR_NAME: &str = ".openclaw";

/// Default git-mode checkout, inside the state directory. The state directory
/// itself is never empty, so it cannot be cloned into.
pub const CHECKOUT_DIR_NAME: &str = "openclaw";

/// Base URL of the package registry.
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// Maximum number of characters kept from a step's stdout/stderr.
///
/// Truncation keeps the tail, which is where failures explain themselves.
pub const MAX_LOG_CHARS: usize = 8000;

/// Default per-step timeout (20 minutes).
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Timeout for read-only probes: registry lookups, `git rev-parse`,
/// `npm root -g` and friends (3.5 seconds).
pub const STATUS_TIMEOUT: Duration = Duration::from_millis(3500);

/// Timeout for the post-restart health check (60 seconds).
pub const VERIFY_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for the service restart command (60 seconds).
pub const RESTART_TIMEOUT: Duration = Duration::from_secs(60);

/// How long to wait for another update run to release the update lock.
pub const UPDATE_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Starting delay for lock acquisition backoff (10ms).
pub const STARTING_BACKOFF_DELAY_MS: u64 = 10;

/// Maximum backoff delay between lock attempts (500ms).
pub const MAX_BACKOFF_DELAY_MS: u64 = 500;

/// Number of plugin ids listed before collapsing the rest into `+N more`.
pub const PLUGIN_LIST_LIMIT: usize = 6;

/// Number of stderr lines echoed for a failed step in the human summary.
pub const FAILED_STEP_STDERR_LINES: usize = 5;
