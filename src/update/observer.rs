//! Step lifecycle observation.
//!
//! Observers see each step as it starts and finishes. They cannot influence
//! control flow; the CLI uses one to drive a spinner and another to keep
//! partial results for interrupted runs.

use std::sync::Mutex;

use super::types::{UpdateStep, UpdateStepResult};

/// Receives step lifecycle events.
pub trait StepObserver: Send + Sync {
    /// A step is about to run. `index` is zero-based within the run.
    fn on_step_start(&self, _step: &UpdateStep, _index: usize) {}

    /// A step finished (successfully or not).
    fn on_step_complete(&self, _result: &UpdateStepResult) {}
}

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl StepObserver for NoopObserver {}

/// Keeps a copy of every completed step.
///
/// Used to report what already ran when a run is interrupted.
#[derive(Debug, Default)]
pub struct StepRecorder {
    steps: Mutex<Vec<UpdateStepResult>>,
}

impl StepRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed steps so far.
    pub fn steps(&self) -> Vec<UpdateStepResult> {
        self.steps.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl StepObserver for StepRecorder {
    fn on_step_complete(&self, result: &UpdateStepResult) {
        if let Ok(mut steps) = self.steps.lock() {
            steps.push(result.clone());
        }
    }
}

/// Forwards events to two observers.
#[derive(Debug)]
pub struct Tee<'a, A, B> {
    first: &'a A,
    second: &'a B,
}

impl<'a, A, B> Tee<'a, A, B> {
    /// Combine two observers.
    pub const fn new(first: &'a A, second: &'a B) -> Self {
        Self {
            first,
            second,
        }
    }
}

impl<A: StepObserver, B: StepObserver> StepObserver for Tee<'_, A, B> {
    fn on_step_start(&self, step: &UpdateStep, index: usize) {
        self.first.on_step_start(step, index);
        self.second.on_step_start(step, index);
    }

    fn on_step_complete(&self, result: &UpdateStepResult) {
        self.first.on_step_complete(result);
        self.second.on_step_complete(result);
    }
}
