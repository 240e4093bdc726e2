//! Progress indicators for update runs
//!
//! A spinner shows the running step; each finished step is printed above it
//! with a status marker. Progress is hidden when:
//! - `OPENCLAW_NO_PROGRESS` is set to any value
//! - stderr is not a terminal (pipes, CI logs)
//! - the caller asks for it (`--json`, `--no-progress`)
//!
//! Hidden indicators accept every call and draw nothing, so callers never
//! branch on visibility.

use colored::Colorize;
use indicatif::{ProgressBar as IndicatifBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::Duration;

use crate::constants::NO_PROGRESS_ENV;
use crate::update::{StepObserver, UpdateStep, UpdateStepResult};

/// Checks if progress output is disabled by environment or terminal.
pub fn is_progress_disabled() -> bool {
    std::env::var_os(NO_PROGRESS_ENV).is_some() || !std::io::stderr().is_terminal()
}

/// Human duration: `850ms`, `12.3s`.
pub fn format_duration_ms(ms: u64) -> String {
    if ms < 1000 {
        format!("{ms}ms")
    } else {
        format!("{:.1}s", ms as f64 / 1000.0)
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{prefix:.bold} {spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
}

/// A spinner with consistent styling.
#[derive(Clone)]
pub struct ProgressBar {
    inner: IndicatifBar,
}

impl ProgressBar {
    /// Creates a ticking spinner, or a hidden one when progress is disabled.
    pub fn new_spinner() -> Self {
        if is_progress_disabled() {
            return Self::hidden();
        }
        let bar = IndicatifBar::new_spinner();
        bar.set_style(spinner_style());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self {
            inner: bar,
        }
    }

    /// A spinner that draws nothing.
    pub fn hidden() -> Self {
        Self {
            inner: IndicatifBar::hidden(),
        }
    }

    /// Whether anything is drawn.
    pub fn is_hidden(&self) -> bool {
        self.inner.is_hidden()
    }

    /// Sets the message shown next to the spinner.
    pub fn set_message(&self, msg: impl Into<String>) {
        self.inner.set_message(msg.into());
    }

    /// Sets the prefix shown before the spinner.
    pub fn set_prefix(&self, prefix: impl Into<String>) {
        self.inner.set_prefix(prefix.into());
    }

    /// Prints a line above the spinner.
    pub fn println(&self, line: impl AsRef<str>) {
        self.inner.println(line);
    }

    /// Removes the spinner from the terminal.
    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }
}

/// Step observer that drives a spinner.
pub struct StepProgress {
    bar: ProgressBar,
}

impl StepProgress {
    /// Visible unless progress is disabled or `quiet`.
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: if quiet {
                ProgressBar::hidden()
            } else {
                ProgressBar::new_spinner()
            },
        }
    }

    /// Clears the spinner; call before printing the final report.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl StepObserver for StepProgress {
    fn on_step_start(&self, step: &UpdateStep, index: usize) {
        self.bar.set_prefix(format!("[{}]", index + 1));
        self.bar.set_message(format!("{} ({})", step.name, step.spec));
    }

    fn on_step_complete(&self, result: &UpdateStepResult) {
        let marker = match result.exit_code {
            Some(0) => "✓".green(),
            Some(_) => "✗".red(),
            None => "?".yellow(),
        };
        self.bar.println(format!(
            "{} {} {}",
            marker,
            result.name,
            format_duration_ms(result.duration_ms).dimmed()
        ));
        self.bar.set_message("");
    }
}
