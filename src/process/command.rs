//! Type-safe builder for external commands run by the update pipeline.
//!
//! Every step of an update (git operations, dependency installs, builds,
//! package-manager global installs, service restarts) is described by a
//! [`CommandSpec`]. A `CommandSpec` is plain data: it can be logged, compared in
//! tests and handed to any [`CommandRunner`](super::CommandRunner).

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::DEFAULT_STEP_TIMEOUT;

/// Fluent description of a single external command.
///
/// # Examples
///
/// ```rust
/// use openclaw_update::process::CommandSpec;
/// use std::time::Duration;
///
/// let spec = CommandSpec::new("git")
///     .args(["-C", "/srv/openclaw", "fetch", "--all", "--prune", "--tags"])
///     .with_timeout(Some(Duration::from_secs(60)))
///     .with_context("git fetch");
///
/// assert_eq!(spec.argv()[0], "git");
/// ```
///
/// # Default Configuration
///
/// - **Timeout**: 20 minutes
/// - **Working directory**: current process directory
/// - **Environment**: inherited from the parent process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable name or path
    program: String,

    /// Arguments passed after the program
    args: Vec<String>,

    /// Working directory for the child (None = inherit)
    current_dir: Option<PathBuf>,

    /// Extra environment variables for the child
    env_vars: Vec<(String, String)>,

    /// Wall-clock limit (None = no timeout)
    timeout_duration: Option<Duration>,

    /// Label used in log lines
    context: Option<String>,
}

impl CommandSpec {
    /// Creates a spec for `program` with the default timeout.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            env_vars: Vec::new(),
            timeout_duration: Some(DEFAULT_STEP_TIMEOUT),
            context: None,
        }
    }

    /// Builds a spec from a full argv (`argv[0]` is the program).
    ///
    /// Returns `None` for an empty argv.
    pub fn from_argv<I, S>(argv: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut iter = argv.into_iter().map(Into::into);
        let program = iter.next()?;
        Some(Self::new(program).args(iter))
    }

    /// Adds a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds multiple arguments in order.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory for the child process.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Adds an environment variable for the child process.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Sets a custom timeout (None for no timeout).
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Sets a context label included in debug logs (usually the step name).
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// The executable.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments after the program.
    pub fn arg_list(&self) -> &[String] {
        &self.args
    }

    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }

    /// Working directory, if one was set.
    pub fn cwd(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    /// Extra environment variables.
    pub fn env_vars(&self) -> &[(String, String)] {
        &self.env_vars
    }

    /// Timeout, if any.
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout_duration
    }

    /// Log label, if any.
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }
}

impl fmt::Display for CommandSpec {
    /// Space-joined argv, the same form used in step results.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}
