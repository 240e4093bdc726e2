//! Error handling for the update engine
//!
//! Two layers, the same way the rest of the CLI does it:
//! 1. [`UpdateError`] is the strongly-typed enum for every failure that ends a run
//!    before (or instead of) producing an [`UpdateRunResult`](crate::update::UpdateRunResult).
//! 2. [`ErrorContext`] wraps an error with a suggestion and details for terminal display.
//!
//! Step failures are *not* errors in this sense. A `git rebase` that exits 1 is data:
//! it becomes `status = error` inside the run result and is rendered like any other
//! outcome. `UpdateError` covers validation, preconditions the engine cannot degrade
//! into a skip, confirmation that cannot be obtained, and infrastructure problems.
//!
//! # Examples
//!
//! ```rust,no_run
//! use openclaw_update::core::{ErrorContext, UpdateError, user_friendly_error};
//!
//! let err = UpdateError::InvalidChannel {
//!     value: "nightly".to_string(),
//! };
//! let ctx = user_friendly_error(anyhow::Error::from(err));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for update operations.
///
/// Every variant maps to exit code 1. Cancellation after a declined
/// confirmation is not an error and never appears here.
#[derive(Error, Debug, Clone)]
pub enum UpdateError {
    /// `--channel` was not one of `stable`, `beta` or `dev`.
    #[error("--channel must be \"stable\", \"beta\", or \"dev\" (got \"{value}\")")]
    InvalidChannel {
        /// The rejected input
        value: String,
    },

    /// `--timeout` was not a positive whole number of seconds.
    #[error("--timeout must be a positive integer (seconds), got \"{value}\"")]
    InvalidTimeout {
        /// The rejected input
        value: String,
    },

    /// `--tag` was empty after normalization.
    #[error("--tag must not be empty")]
    InvalidTag,

    /// The configuration file exists but could not be parsed, and the request
    /// needs to write it (an explicit channel switch).
    #[error("Config is invalid; cannot set update channel ({path})")]
    ConfigInvalid {
        /// Path of the configuration file
        path: PathBuf,
        /// Parse issues reported by the loader
        issues: Vec<String>,
    },

    /// A downgrade (or unverifiable target) needs confirmation that cannot be obtained.
    #[error("Downgrade confirmation required ({current} -> {target})")]
    ConfirmationRequired {
        /// Currently installed version
        current: String,
        /// Target version or tag
        target: String,
        /// Why the prompt could not be shown
        reason: String,
    },

    /// The git-mode directory exists, is not a checkout, and is not empty.
    #[error("OPENCLAW_GIT_DIR points at a non-git directory: {path}")]
    GitDirNotCheckout {
        /// The offending directory
        path: PathBuf,
    },

    /// The git-mode directory is a checkout of some other project.
    #[error("OPENCLAW_GIT_DIR does not look like a core checkout: {path}")]
    GitDirNotCore {
        /// The offending directory
        path: PathBuf,
    },

    /// Another update run holds the update lock.
    #[error("Another update is already running (lock held: {path})")]
    LockHeld {
        /// Path of the lock file
        path: PathBuf,
    },

    /// A configuration file could not be read or written.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Error description
        message: String,
    },

    /// An external command could not be spawned at all.
    #[error("Failed to run {program}: {reason}")]
    SpawnFailed {
        /// Program that failed to start
        program: String,
        /// Operating system error
        reason: String,
    },

    /// The user interrupted the run.
    #[error("Update interrupted")]
    Interrupted,

    /// File system operation failed
    #[error("File system error: {operation} on {path}")]
    FileSystemError {
        /// The operation that failed
        operation: String,
        /// Path involved
        path: String,
    },

    /// Permission denied
    #[error("Permission denied: {operation} on {path}")]
    PermissionDenied {
        /// The operation that failed
        operation: String,
        /// Path involved
        path: String,
    },

    /// Catch-all for errors that carry no structured information.
    #[error("{message}")]
    Other {
        /// Error description
        message: String,
    },
}

/// An [`UpdateError`] plus the user-facing suggestion and details.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: UpdateError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: UpdateError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error (rendered in green).
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining the error (rendered in yellow).
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error, details and suggestion to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with recovery hints.
///
/// Downcasts to [`UpdateError`] first, then to [`std::io::Error`], and falls
/// back to [`UpdateError::Other`] carrying the full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(update_error) = error.downcast_ref::<UpdateError>() {
        return create_error_context(update_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(UpdateError::PermissionDenied {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                })
                .with_suggestion(
                    "Check ownership of the installation directory, or re-run with the permissions used to install it",
                )
                .with_details("Global package installs often live in directories owned by root");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(UpdateError::FileSystemError {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(UpdateError::Other {
        message,
    })
}

fn create_error_context(error: UpdateError) -> ErrorContext {
    match &error {
        UpdateError::InvalidChannel { .. } => ErrorContext::new(error)
            .with_suggestion("Use one of: --channel stable, --channel beta, --channel dev"),

        UpdateError::InvalidTimeout { .. } => ErrorContext::new(error)
            .with_suggestion("Pass the step timeout in whole seconds, e.g. --timeout 1200"),

        UpdateError::InvalidTag => ErrorContext::new(error)
            .with_suggestion("Pass a dist-tag (latest, beta) or a version such as 1.4.2"),

        UpdateError::ConfigInvalid { issues, .. } => {
            let details = issues.join("\n");
            ErrorContext::new(error)
                .with_suggestion("Fix the configuration file, or re-run without --channel")
                .with_details(details)
        }

        UpdateError::ConfirmationRequired { reason, .. } => {
            let reason = reason.clone();
            ErrorContext::new(error)
                .with_suggestion("Re-run with --yes to accept the downgrade")
                .with_details(reason)
        }

        UpdateError::GitDirNotCheckout { .. } => ErrorContext::new(error)
            .with_suggestion("Point OPENCLAW_GIT_DIR at an empty directory or an existing checkout")
            .with_details("Switching to the dev channel clones the repository into that directory"),

        UpdateError::GitDirNotCore { .. } => ErrorContext::new(error)
            .with_suggestion("Point OPENCLAW_GIT_DIR at a checkout of the openclaw repository"),

        UpdateError::LockHeld { .. } => ErrorContext::new(error)
            .with_suggestion("Wait for the other update to finish, then try again")
            .with_details("Only one update may modify an installation at a time"),

        UpdateError::SpawnFailed { program, .. } => {
            let suggestion = format!("Make sure '{program}' is installed and on your PATH");
            ErrorContext::new(error).with_suggestion(suggestion)
        }

        UpdateError::Interrupted => ErrorContext::new(error)
            .with_suggestion("Re-run the update; completed steps are safe to repeat"),

        UpdateError::ConfigError { .. } => ErrorContext::new(error)
            .with_suggestion("Check the config file at ~/.openclaw/config.toml (or $OPENCLAW_CONFIG_PATH)"),

        UpdateError::FileSystemError { .. }
        | UpdateError::PermissionDenied { .. }
        | UpdateError::Other { .. } => ErrorContext::new(error),
    }
}
