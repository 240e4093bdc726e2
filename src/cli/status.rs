//! `openclaw-update status`: show the installation, its channel and whether
//! an update is available. Never changes anything.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

use super::CliConfig;
use super::render;
use crate::channel::NpmRegistry;
use crate::config::ConfigStore;
use crate::constants::STATUS_TIMEOUT;
use crate::core::UpdateError;
use crate::process::SystemRunner;
use crate::update::collect_status;

/// Arguments of `status`.
#[derive(Args, Debug, Clone, Default)]
pub struct StatusCommand {
    /// Print the status as JSON
    #[arg(long)]
    pub json: bool,

    /// Timeout for each probe (git, package manager, registry) in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Package root to inspect (defaults to the running installation)
    #[arg(long, value_name = "PATH")]
    pub root: Option<PathBuf>,
}

impl StatusCommand {
    /// Print the status; returns the process exit code.
    pub async fn execute(self, cli: &CliConfig) -> Result<i32> {
        let root = super::resolve_root(self.root).await?;
        let store = ConfigStore::resolve(cli.config_path.clone())?;
        let timeout = match self.timeout {
            Some(0) => {
                return Err(UpdateError::InvalidTimeout {
                    value: "0".to_string(),
                }
                .into());
            }
            Some(ms) => Duration::from_millis(ms),
            None => STATUS_TIMEOUT,
        };
        let registry = NpmRegistry::new().with_timeout(timeout);
        let report = collect_status(&SystemRunner::new(), &registry, &store, &root, timeout).await?;

        if self.json {
            println!("{}", render::to_json(&report)?);
        } else {
            println!("{}", render::render_status(&report));
        }
        Ok(0)
    }
}
