//! `openclaw-update update`: move the installation to the newest version on
//! its channel.
//!
//! # Examples
//!
//! ```bash
//! openclaw-update update                    # follow the stored or default channel
//! openclaw-update update --channel beta     # switch channel (and persist it)
//! openclaw-update update --channel dev      # switch a package install to a checkout
//! openclaw-update update --tag 1.2.3 --yes  # pin a version, skipping the downgrade prompt
//! openclaw-update update --json             # machine-readable result, never prompts
//! ```
//!
//! Pressing Ctrl-C stops the running step, prints the steps that completed
//! and exits with status 1.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use super::CliConfig;
use super::render;
use crate::channel::NpmRegistry;
use crate::config::{self, ConfigStore};
use crate::install::resolve_global_manager;
use crate::process::SystemRunner;
use crate::update::{
    CliServiceController, ConfigPluginSynchronizer, InquirePrompter, StepRecorder, Tee,
    UpdateEngine, UpdateOutcome, UpdateRequest, UpdateRunResult,
};
use crate::utils::StepProgress;

/// Arguments of `update`.
#[derive(Args, Debug, Clone, Default)]
pub struct UpdateCommand {
    /// Print the result as JSON (never prompts)
    #[arg(long)]
    pub json: bool,

    /// Do not restart the gateway service after a successful update
    #[arg(long)]
    pub no_restart: bool,

    /// Update channel: stable, beta or dev. Switching kind persists it
    #[arg(long, value_name = "CHANNEL")]
    pub channel: Option<String>,

    /// Dist-tag or version to install (package installs only)
    #[arg(long, value_name = "TAG")]
    pub tag: Option<String>,

    /// Per-step timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<String>,

    /// Accept a downgrade without prompting
    #[arg(short, long)]
    pub yes: bool,

    /// Package root to update (defaults to the running installation)
    #[arg(long, value_name = "PATH")]
    pub root: Option<PathBuf>,
}

impl UpdateCommand {
    /// Build the raw request. Paths are resolved here; validation happens in
    /// [`UpdateRequest::validate`].
    pub async fn request(&self) -> Result<UpdateRequest> {
        Ok(UpdateRequest {
            root: super::resolve_root(self.root.clone()).await?,
            channel: self.channel.clone(),
            tag: self.tag.clone(),
            timeout: self.timeout.clone(),
            restart: !self.no_restart,
            yes: self.yes,
            json: self.json,
            git_dir: config::resolve_git_dir(config::git_dir_from_env().as_deref())?,
            state_dir: config::state_dir()?,
        })
    }

    /// Run the update; returns the process exit code.
    pub async fn execute(self, cli: &CliConfig) -> Result<i32> {
        let options = self.request().await?.validate()?;
        let store = ConfigStore::resolve(cli.config_path.clone())?;

        let runner = SystemRunner::new();
        let engine = UpdateEngine::new(
            runner,
            NpmRegistry::new(),
            InquirePrompter,
            ConfigPluginSynchronizer::new(runner, resolve_global_manager(None), options.step_timeout),
            CliServiceController::new(runner),
            store,
        );

        let progress = StepProgress::new(options.json || cli.no_progress);
        let recorder = StepRecorder::new();
        let observer = Tee::new(&progress, &recorder);

        let outcome = tokio::select! {
            outcome = engine.run(&options, &observer) => outcome,
            _ = tokio::signal::ctrl_c() => {
                progress.finish();
                tracing::warn!(target: "update", "Interrupted by user");
                let result = UpdateRunResult::interrupted(options.root.clone(), recorder.steps());
                if options.json {
                    println!("{}", render::to_json(&result)?);
                } else {
                    println!("{}", render::render_interrupted(&result));
                }
                return Ok(result.exit_code());
            }
        };
        progress.finish();

        let outcome = outcome?;
        match &outcome {
            UpdateOutcome::Cancelled => println!("Update cancelled."),
            UpdateOutcome::Finished(report) if options.json => {
                println!("{}", render::to_json(report.as_ref())?);
            }
            UpdateOutcome::Finished(report) => println!("{}", render::render_update(report)),
        }
        Ok(outcome.exit_code())
    }
}
