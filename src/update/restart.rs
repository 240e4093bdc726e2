//! Gateway restart and post-update verification.
//!
//! Both run only after an `ok` update. Their failures become warnings with a
//! manual recovery hint; the update itself already succeeded.

use anyhow::Result;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;

use crate::constants::{RESTART_TIMEOUT, VERIFY_TIMEOUT};
use crate::core::UpdateError;
use crate::process::{CommandRunner, CommandSpec, EXIT_NOT_FOUND};

/// Command a user can run to restart the service by hand.
pub const RESTART_HINT: &str = "openclaw gateway restart";

/// Controls the long-running gateway service.
pub trait ServiceController: Send + Sync {
    /// Restart the service. `Ok(false)` means the restart command failed.
    fn restart(&self) -> impl Future<Output = Result<bool>> + Send;

    /// Run the post-update health check. `Ok(false)` means it reported problems.
    fn verify(&self) -> impl Future<Output = Result<bool>> + Send;
}

/// What the restart phase did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestartReport {
    /// A restart was attempted
    pub attempted: bool,
    /// The service restarted
    pub restarted: bool,
    /// Verification passed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    /// Problems, each with a recovery hint
    pub warnings: Vec<String>,
}

/// Restart the service and verify it, collecting warnings.
pub async fn restart_and_verify<S: ServiceController>(service: &S) -> RestartReport {
    let mut report = RestartReport {
        attempted: true,
        ..RestartReport::default()
    };

    match service.restart().await {
        Ok(true) => report.restarted = true,
        Ok(false) => {
            report.warnings.push(format!("Gateway restart failed; run `{RESTART_HINT}` manually"));
            return report;
        }
        Err(e) => {
            tracing::warn!(target: "update", "Gateway restart errored: {:#}", e);
            report
                .warnings
                .push(format!("Gateway restart failed ({e:#}); run `{RESTART_HINT}` manually"));
            return report;
        }
    }

    match service.verify().await {
        Ok(verified) => {
            report.verified = Some(verified);
            if !verified {
                report.warnings.push(
                    "Post-update check reported problems; run `openclaw doctor` for details"
                        .to_string(),
                );
            }
        }
        Err(e) => {
            tracing::warn!(target: "update", "Post-update check errored: {:#}", e);
            report.verified = Some(false);
            report.warnings.push(format!(
                "Post-update check could not run ({e:#}); run `openclaw doctor` for details"
            ));
        }
    }

    report
}

/// Service controller that shells out to the `openclaw` CLI.
#[derive(Debug, Clone)]
pub struct CliServiceController<R> {
    runner: R,
    restart_timeout: Duration,
    verify_timeout: Duration,
}

impl<R: CommandRunner> CliServiceController<R> {
    /// Creates a controller with the default timeouts.
    pub const fn new(runner: R) -> Self {
        Self {
            runner,
            restart_timeout: RESTART_TIMEOUT,
            verify_timeout: VERIFY_TIMEOUT,
        }
    }

    async fn succeeds(&self, spec: CommandSpec) -> Result<bool> {
        let output = self.runner.run(&spec).await?;
        if output.code == Some(EXIT_NOT_FOUND) {
            return Err(UpdateError::SpawnFailed {
                program: spec.program().to_string(),
                reason: output.stderr.trim().to_string(),
            }
            .into());
        }
        if !output.success() {
            tracing::debug!(target: "update", "{} exited with {:?}", spec, output.code);
        }
        Ok(output.success())
    }
}

impl<R: CommandRunner> ServiceController for CliServiceController<R> {
    async fn restart(&self) -> Result<bool> {
        let spec = CommandSpec::new("openclaw")
            .args(["gateway", "restart"])
            .with_timeout(Some(self.restart_timeout))
            .with_context("gateway restart");
        self.succeeds(spec).await
    }

    async fn verify(&self) -> Result<bool> {
        let spec = CommandSpec::new("openclaw")
            .args(["doctor", "--non-interactive"])
            .with_timeout(Some(self.verify_timeout))
            .with_context("post-update check");
        self.succeeds(spec).await
    }
}
