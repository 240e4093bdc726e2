//! Sequential step execution.
//!
//! Steps run strictly one after another: every step assumes the filesystem
//! state left by the previous one. The first failure stops the sequence;
//! results already captured stay available for diagnostics.

use std::time::Instant;

use super::observer::StepObserver;
use super::types::{UpdateStep, UpdateStepResult};
use crate::constants::MAX_LOG_CHARS;
use crate::process::{CommandRunner, trim_log_tail};

/// Runs steps and accumulates their results in execution order.
pub struct StepExecutor<'a, R, O> {
    runner: &'a R,
    observer: &'a O,
    steps: Vec<UpdateStepResult>,
    started: usize,
}

impl<'a, R: CommandRunner, O: StepObserver> StepExecutor<'a, R, O> {
    /// Creates an executor with no recorded steps.
    pub const fn new(runner: &'a R, observer: &'a O) -> Self {
        Self {
            runner,
            observer,
            steps: Vec::new(),
            started: 0,
        }
    }

    /// Run `step` without recording it or telling the observer.
    ///
    /// The caller inspects the result and decides whether to keep it with
    /// [`record_executed`](Self::record_executed). A runner error becomes a
    /// result with no exit code and the error text as stderr.
    pub async fn execute(&self, step: &UpdateStep) -> UpdateStepResult {
        self.execute_with_stdout(step).await.0
    }

    /// Like [`execute`](Self::execute), also returning the untruncated stdout.
    pub async fn execute_with_stdout(&self, step: &UpdateStep) -> (UpdateStepResult, String) {
        let start = Instant::now();
        let (exit_code, stdout, stderr) = match self.runner.run(&step.spec).await {
            Ok(output) => (output.code, output.stdout, output.stderr),
            Err(e) => {
                tracing::warn!(target: "update::step", "{} could not run: {:#}", step.name, e);
                (None, String::new(), format!("{e:#}"))
            }
        };
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        tracing::debug!(
            target: "update::step",
            "{} finished with {:?} in {}ms",
            step.name,
            exit_code,
            duration_ms
        );

        let result = UpdateStepResult {
            name: step.name.clone(),
            command: step.spec.to_string(),
            cwd: step.spec.cwd().map(Into::into),
            duration_ms,
            exit_code,
            stdout_tail: trim_log_tail(&stdout, MAX_LOG_CHARS),
            stderr_tail: trim_log_tail(&stderr, MAX_LOG_CHARS),
        };
        (result, stdout)
    }

    fn announce(&mut self, step: &UpdateStep) {
        self.observer.on_step_start(step, self.started);
        self.started += 1;
    }

    fn record(&mut self, result: UpdateStepResult) {
        self.observer.on_step_complete(&result);
        self.steps.push(result);
    }

    /// Keep the result of an [`execute`](Self::execute) call. The observer
    /// sees the step start and finish at this point.
    pub fn record_executed(&mut self, step: &UpdateStep, result: UpdateStepResult) {
        self.announce(step);
        self.record(result);
    }

    /// Run and record `step`. Returns whether it succeeded.
    pub async fn run(&mut self, step: UpdateStep) -> bool {
        self.announce(&step);
        let result = self.execute(&step).await;
        let ok = result.succeeded();
        self.record(result);
        ok
    }

    /// Run `steps` in order, stopping at the first failure.
    ///
    /// Returns the name of the failed step, or `None` when all succeeded.
    pub async fn run_all(&mut self, steps: Vec<UpdateStep>) -> Option<String> {
        for step in steps {
            let name = step.name.clone();
            if !self.run(step).await {
                return Some(name);
            }
        }
        None
    }

    /// Results recorded so far.
    pub fn steps(&self) -> &[UpdateStepResult] {
        &self.steps
    }

    /// Consume the executor, returning the recorded results.
    pub fn into_steps(self) -> Vec<UpdateStepResult> {
        self.steps
    }
}
