//! openclaw-update - self-update engine for OpenClaw installations
//!
//! OpenClaw is installed either as a git checkout (built in place) or as a
//! global package (npm, pnpm or bun). This crate moves an installation to the
//! newest version on its update channel, can switch between the two kinds,
//! and reports every step it ran.
//!
//! # Architecture Overview
//!
//! ```text
//! cli ──> update::UpdateEngine ──> update::PipelineRun ──> process::CommandRunner
//!              │                          │
//!              ├─ install (detection)     └─ git (command builders)
//!              ├─ channel (resolution, registry dist-tags)
//!              ├─ config (config.toml, state dir)
//!              └─ plugins / restart (post-update)
//! ```
//!
//! Every external effect goes through a trait ([`process::CommandRunner`],
//! [`channel::RegistryClient`], [`update::Prompter`],
//! [`update::PluginSynchronizer`], [`update::ServiceController`]) so whole
//! runs are testable with the fakes in `test_utils`.
//!
//! # Core Modules
//!
//! - [`update`] - engine, pipelines, step execution, lock, post-update phases
//! - [`channel`] - channels, dist-tag resolution, version comparison
//! - [`install`] - installation detection and package managers
//! - [`git`] - git command builders and checkout inspection
//! - [`process`] - command specs and the process runner
//! - [`config`] - configuration file and well-known paths
//! - [`core`] - error types and user-facing error context
//! - [`cli`] - command-line interface
//! - [`utils`] - progress indicators
//!
//! # Update Channels
//!
//! | Channel  | Git checkout                   | Package install   |
//! |----------|--------------------------------|-------------------|
//! | `stable` | newest `vX.Y.Z` tag            | `latest` dist-tag |
//! | `beta`   | newest `vX.Y.Z[-beta.N]` tag   | `beta` dist-tag   |
//! | `dev`    | rebase onto upstream           | switch to git     |
//!
//! # Exit Codes
//!
//! `0` for `ok`, `skipped` and a declined downgrade; `1` for `error` results,
//! validation failures and interruptions.

pub mod channel;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod git;
pub mod install;
pub mod process;
pub mod update;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
