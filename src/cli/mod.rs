//! Command-line interface for `openclaw-update`.
//!
//! # Commands
//!
//! - `update` - update the installation (see [`update::UpdateCommand`])
//! - `status` - show installation, channel and update availability
//!
//! # Global options
//!
//! - `-v, --verbose`: debug logging (`RUST_LOG` still wins when set)
//! - `-q, --quiet`: errors only
//! - `-c, --config <PATH>`: config file instead of `$OPENCLAW_CONFIG_PATH` or
//!   `~/.openclaw/config.toml`
//! - `--no-progress`: no spinner (also `OPENCLAW_NO_PROGRESS`)
//!
//! Logs go to stderr so `--json` output on stdout stays parseable.

pub mod render;
mod status;
mod update;

pub use status::StatusCommand;
pub use update::UpdateCommand;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::absolute_path;
use crate::install::find_core_package_root;

/// Runtime configuration derived from the global flags.
///
/// Passed to every command instead of being written into the process
/// environment.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,

    /// Hide progress indicators.
    pub no_progress: bool,

    /// Explicit config file path.
    pub config_path: Option<PathBuf>,
}

/// Self-update tool for OpenClaw installations.
#[derive(Parser)]
#[command(
    name = "openclaw-update",
    about = "Update OpenClaw installations (git checkouts and global packages)",
    version,
    long_about = "Updates an OpenClaw installation in place: git checkouts are rebased or moved \
                  to the newest release tag and rebuilt, package installs are reinstalled \
                  through their package manager. Switching channel can switch between the two."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Path to the config file
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Disable progress indicators
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Update the installation to the newest version on its channel
    Update(UpdateCommand),

    /// Show installation, channel and update availability
    Status(StatusCommand),
}

impl Cli {
    /// Run the selected command; returns the process exit code.
    pub async fn execute(self) -> Result<i32> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    /// Derive the runtime configuration from the global flags.
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        };

        CliConfig {
            log_level: log_level.to_string(),
            no_progress: self.no_progress,
            config_path: self.config.clone(),
        }
    }

    /// Run with an explicit configuration.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<i32> {
        init_logging(&config.log_level);

        match self.command {
            Commands::Update(cmd) => cmd.execute(&config).await,
            Commands::Status(cmd) => cmd.execute(&config).await,
        }
    }
}

/// Install the stderr log subscriber. `RUST_LOG` overrides `default_level`.
pub fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}

/// Package root to operate on.
///
/// An explicit `--root` wins (resolved against the working directory);
/// otherwise the core package containing the
/// running executable, then the one containing the working directory, then
/// the working directory itself (which detection will report as unknown).
pub async fn resolve_root(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(root) = explicit {
        return absolute_path(&root);
    }
    if let Ok(exe) = std::env::current_exe()
        && let Some(dir) = exe.parent()
        && let Some(root) = find_core_package_root(dir).await
    {
        return Ok(root);
    }
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    Ok(find_core_package_root(&cwd).await.unwrap_or(cwd))
}
