//! Test utilities for the update engine
//!
//! Every collaborator of [`UpdateEngine`](crate::update::UpdateEngine) has a
//! scripted fake here, so whole update runs can be exercised without spawning
//! processes, touching the network or prompting:
//! - [`ScriptedRunner`] answers commands by substring match
//! - [`FakeRegistry`] serves fixed dist-tags
//! - [`FakePrompter`], [`FakePluginSync`] and [`FakeService`] record calls
//! - [`InstallFixture`] lays out checkouts and global package installs on disk
//!
//! # Example
//!
//! ```rust,no_run
//! use openclaw_update::process::CommandOutput;
//! use openclaw_update::test_utils::ScriptedRunner;
//!
//! let runner = ScriptedRunner::new()
//!     .respond("status --porcelain", CommandOutput::ok(" M README.md"));
//! assert!(runner.calls().is_empty());
//! ```

pub mod fakes;
pub mod fixtures;
pub mod runner;

pub use fakes::{FakePluginSync, FakePrompter, FakeRegistry, FakeService, RecordingObserver};
pub use fixtures::{InstallFixture, write_package_json};
pub use runner::ScriptedRunner;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, otherwise `RUST_LOG`; does nothing when neither is
/// set.
///
/// ```bash
/// RUST_LOG=update=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}
