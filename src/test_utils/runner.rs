//! Scripted command runner.

use anyhow::{Result, anyhow};
use std::sync::{Arc, Mutex};

use crate::process::{CommandOutput, CommandRunner, CommandSpec};

type Effect = Arc<dyn Fn(&CommandSpec) + Send + Sync>;

#[derive(Clone)]
enum Reply {
    Output(CommandOutput),
    Error(String),
}

#[derive(Clone)]
struct Rule {
    pattern: String,
    reply: Reply,
    effect: Option<Effect>,
}

#[derive(Default)]
struct State {
    rules: Vec<Rule>,
    calls: Vec<String>,
}

/// A [`CommandRunner`] that answers from a script instead of spawning.
///
/// Rules match when the pattern is a substring of the command line (argv
/// joined by spaces). Later rules win. Unmatched commands succeed with empty
/// output. Clones share the script and the call log.
#[derive(Clone, Default)]
pub struct ScriptedRunner {
    state: Arc<Mutex<State>>,
}

impl ScriptedRunner {
    /// Runner where every command succeeds silently.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, pattern: &str, reply: Reply, effect: Option<Effect>) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.rules.push(Rule {
                pattern: pattern.to_string(),
                reply,
                effect,
            });
        }
        self
    }

    /// Answer commands containing `pattern` with `output`.
    pub fn respond(self, pattern: &str, output: CommandOutput) -> Self {
        self.push(pattern, Reply::Output(output), None)
    }

    /// Answer with `output` and run `effect` first, e.g. to rewrite a
    /// `package.json` the way a real install would.
    pub fn on<F>(self, pattern: &str, output: CommandOutput, effect: F) -> Self
    where
        F: Fn(&CommandSpec) + Send + Sync + 'static,
    {
        self.push(pattern, Reply::Output(output), Some(Arc::new(effect)))
    }

    /// Make commands containing `pattern` fail with a runner error.
    pub fn fail_with(self, pattern: &str, message: &str) -> Self {
        self.push(pattern, Reply::Error(message.to_string()), None)
    }

    /// Every command line run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().map(|s| s.calls.clone()).unwrap_or_default()
    }

    /// Whether any command containing `pattern` ran.
    pub fn ran(&self, pattern: &str) -> bool {
        self.calls().iter().any(|c| c.contains(pattern))
    }

    /// Number of commands containing `pattern` that ran.
    pub fn count(&self, pattern: &str) -> usize {
        self.calls().iter().filter(|c| c.contains(pattern)).count()
    }
}

impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let line = spec.to_string();
        let rule = {
            let mut state = self.state.lock().map_err(|_| anyhow!("runner state poisoned"))?;
            state.calls.push(line.clone());
            state.rules.iter().rev().find(|r| line.contains(&r.pattern)).cloned()
        };

        let Some(rule) = rule else {
            return Ok(CommandOutput::ok(""));
        };
        if let Some(effect) = &rule.effect {
            effect(spec);
        }
        match rule.reply {
            Reply::Output(output) => Ok(output),
            Reply::Error(message) => Err(anyhow!(message)),
        }
    }
}
