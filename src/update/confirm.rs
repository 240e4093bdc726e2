//! Downgrade confirmation gate.
//!
//! Moving to an older version (or to a version that cannot be determined) can
//! break configuration written by the newer release, so it needs an explicit
//! yes. When no answer can be obtained the gate fails closed:
//!
//! | Situation                               | Outcome                         |
//! |-----------------------------------------|---------------------------------|
//! | confirmation not needed, or `--yes`     | proceed                         |
//! | `--json` output                         | [`UpdateError::ConfirmationRequired`] |
//! | no interactive terminal                 | [`UpdateError::ConfirmationRequired`] |
//! | user accepts                            | proceed                         |
//! | user declines                           | cancelled (exit 0)              |

use anyhow::Result;
use inquire::{Confirm, InquireError};
use std::io::IsTerminal;

use crate::channel::{VersionTarget, needs_confirmation};
use crate::core::UpdateError;

/// Asks the user yes/no questions.
pub trait Prompter: Send + Sync {
    /// Whether a human can answer prompts.
    fn is_interactive(&self) -> bool;

    /// Ask `message`; `false` means declined.
    fn confirm(&self, message: &str) -> Result<bool>;
}

/// Terminal prompter backed by `inquire`.
#[derive(Debug, Clone, Copy, Default)]
pub struct InquirePrompter;

impl Prompter for InquirePrompter {
    fn is_interactive(&self) -> bool {
        std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
    }

    fn confirm(&self, message: &str) -> Result<bool> {
        match Confirm::new(message)
            .with_default(false)
            .with_help_message("Press 'y' to continue, or Enter to cancel")
            .prompt()
        {
            Ok(answer) => Ok(answer),
            Err(InquireError::OperationCanceled) => Ok(false),
            Err(InquireError::OperationInterrupted) => Err(UpdateError::Interrupted.into()),
            Err(e) => Err(UpdateError::Other {
                message: format!("Failed to read confirmation: {e}"),
            }
            .into()),
        }
    }
}

/// Result of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmDecision {
    /// Continue with the update
    Proceed,
    /// The user said no
    Declined,
}

/// Inputs to the gate.
#[derive(Debug, Clone, Copy)]
pub struct DowngradeCheck<'a> {
    /// Installed version, when known
    pub current: Option<&'a str>,
    /// Resolved target
    pub target: &'a VersionTarget,
    /// The beta channel fell back to `latest`
    pub fell_back: bool,
    /// `--yes`
    pub assume_yes: bool,
    /// `--json`
    pub json: bool,
}

/// Prompt text for a downgrade.
pub fn downgrade_message(current: &str, target: &VersionTarget) -> String {
    match &target.version {
        Some(version) => {
            format!("Downgrading from {current} to {version} can break configuration. Continue?")
        }
        None => format!(
            "Target version for '{}' is unknown; this may be a downgrade from {current}. Continue?",
            target.tag
        ),
    }
}

/// Apply the confirmation policy.
///
/// # Errors
///
/// [`UpdateError::ConfirmationRequired`] when an answer is needed but cannot
/// be asked for; prompt failures otherwise.
pub fn confirm_downgrade<P: Prompter>(
    prompter: &P,
    check: &DowngradeCheck<'_>,
) -> Result<ConfirmDecision> {
    let required =
        needs_confirmation(check.current, check.target.version.as_deref(), check.fell_back);
    if check.assume_yes || !required {
        return Ok(ConfirmDecision::Proceed);
    }

    // needs_confirmation only asks when the current version is known
    let current = check.current.unwrap_or("unknown");
    let target_label = check.target.label().to_string();

    let blocked = if check.json {
        Some("JSON output cannot prompt for confirmation")
    } else if !prompter.is_interactive() {
        Some("no interactive terminal is attached")
    } else {
        None
    };
    if let Some(reason) = blocked {
        tracing::warn!(
            target: "update",
            "Confirmation needed for {} -> {}: {}",
            current,
            target_label,
            reason
        );
        return Err(UpdateError::ConfirmationRequired {
            current: current.to_string(),
            target: target_label,
            reason: reason.to_string(),
        }
        .into());
    }

    if prompter.confirm(&downgrade_message(current, check.target))? {
        Ok(ConfirmDecision::Proceed)
    } else {
        tracing::info!(target: "update", "Downgrade declined");
        Ok(ConfirmDecision::Declined)
    }
}
