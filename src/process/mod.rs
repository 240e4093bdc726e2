//! External process execution.
//!
//! The engine never spawns processes directly. It describes them as
//! [`CommandSpec`]s and hands them to a [`CommandRunner`]. Production code uses
//! [`SystemRunner`] (tokio child processes with a wall-clock timeout and
//! kill-on-drop); tests substitute a scripted runner.
//!
//! # Timeouts and cancellation
//!
//! Children are spawned with `kill_on_drop(true)`. When a timeout elapses, or the
//! future driving the run is dropped because the user pressed Ctrl-C, the child
//! is killed before control returns. A timed-out command reports `code = None`.

mod command;

pub use command::CommandSpec;

use anyhow::{Context, Result};
use std::future::Future;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tokio::time::timeout;

/// Exit code reported when the program could not be found.
pub const EXIT_NOT_FOUND: i32 = 127;

/// Exit code reported when the program exists but could not be executed.
pub const EXIT_CANNOT_EXECUTE: i32 = 126;

/// Captured result of one command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Full standard output
    pub stdout: String,
    /// Full standard error
    pub stderr: String,
    /// Exit code; `None` when the process was killed (timeout or signal)
    pub code: Option<i32>,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            code: Some(0),
        }
    }

    /// Failed output with the given code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            code: Some(code),
        }
    }

    /// Output of a command that was killed after exceeding its timeout.
    pub fn timed_out(stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            code: None,
        }
    }

    /// True when the command exited with code 0.
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// Trimmed stdout, or `None` when the command failed or printed nothing.
    pub fn stdout_trimmed(&self) -> Option<&str> {
        if !self.success() {
            return None;
        }
        let trimmed = self.stdout.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// Something that can execute a [`CommandSpec`].
///
/// Implementations report non-zero exits and timeouts through
/// [`CommandOutput::code`]; `Err` is reserved for failures where no process
/// result exists at all.
pub trait CommandRunner: Send + Sync {
    /// Run the command to completion (or timeout) and capture its output.
    fn run(&self, spec: &CommandSpec) -> impl Future<Output = Result<CommandOutput>> + Send;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    /// Creates a new system runner.
    pub const fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let start = Instant::now();
        let mut cmd = Command::new(spec.program());
        cmd.args(spec.arg_list());
        if let Some(dir) = spec.cwd() {
            cmd.current_dir(dir);
        }
        for (key, value) in spec.env_vars() {
            tracing::trace!(target: "process", "Setting env var: {}={}", key, value);
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);

        match spec.context() {
            Some(ctx) => tracing::debug!(target: "process", "({}) Executing command: {}", ctx, spec),
            None => tracing::debug!(target: "process", "Executing command: {}", spec),
        }

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let code = if e.kind() == std::io::ErrorKind::NotFound {
                    EXIT_NOT_FOUND
                } else {
                    EXIT_CANNOT_EXECUTE
                };
                tracing::debug!(target: "process", "Failed to spawn {}: {}", spec.program(), e);
                return Ok(CommandOutput::failed(code, format!("{}: {}", spec.program(), e)));
            }
        };

        let output = if let Some(duration) = spec.timeout() {
            match timeout(duration, child.wait_with_output()).await {
                Ok(result) => result.with_context(|| format!("Failed to wait for {spec}"))?,
                Err(_) => {
                    tracing::warn!(
                        target: "process",
                        "Command timed out after {} seconds: {}",
                        duration.as_secs(),
                        spec
                    );
                    return Ok(CommandOutput::timed_out(format!(
                        "timed out after {}s",
                        duration.as_secs()
                    )));
                }
            }
        } else {
            child.wait_with_output().await.with_context(|| format!("Failed to wait for {spec}"))?
        };

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: output.status.code(),
        };

        tracing::debug!(
            target: "process::perf",
            "{} finished with {:?} in {}ms",
            spec.program(),
            result.code,
            start.elapsed().as_millis()
        );
        if !result.success() && !result.stderr.is_empty() {
            tracing::debug!(target: "process", "stderr: {}", result.stderr.trim_end());
        }

        Ok(result)
    }
}

/// Keep at most `max_chars` characters from the end of `text`.
///
/// Returns `None` for empty output so serialized results stay compact.
pub fn trim_log_tail(text: &str, max_chars: usize) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    let count = text.chars().count();
    if count <= max_chars {
        return Some(text.to_string());
    }
    Some(text.chars().skip(count - max_chars).collect())
}
