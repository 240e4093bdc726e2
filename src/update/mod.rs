//! Self-update orchestration.
//!
//! An update run moves an installation to the newest version on its channel
//! (or a pinned tag), switching between git-checkout and package installs
//! when the requested channel asks for it.
//!
//! # Components
//!
//! - **[`UpdateEngine`]**: detection, channel resolution, confirmation, locking
//!   and the post-update phases
//! - **[`PipelinePlan`]** / **[`PipelineRun`]**: the git and package pipelines
//! - **[`StepExecutor`]**: runs one step at a time and records its result
//! - **[`StepObserver`]**: progress callbacks for each step
//! - **[`reconcile`]**: plugin sync after a successful run
//! - **[`restart_and_verify`]**: gateway restart and health check
//! - **[`collect_status`]**: the read-only `status` view
//!
//! # Flow
//!
//! ```text
//! 1. Validate
//!    ├── channel, tag and timeout arguments
//!    └── config validity when a channel is requested
//!
//! 2. Resolve
//!    ├── detect the installation (git, package, unknown)
//!    ├── effective channel: explicit > stored > install default
//!    └── package target from registry dist-tags
//!
//! 3. Confirm
//!    └── downgrades need a TTY confirmation or --yes
//!
//! 4. Execute (under ~/.openclaw/update.lock)
//!    ├── persist an explicit channel
//!    └── run the pipeline step by step, stopping at the first failure
//!
//! 5. Post-update (only when status is ok)
//!    ├── plugin sync and npm plugin updates
//!    └── gateway restart and doctor check
//! ```
//!
//! Step failures never surface as `Err`: they end the run with `status: error`
//! and the failing step's name as `reason`.

pub mod confirm;
pub mod engine;
pub mod executor;
pub mod lock;
pub mod observer;
pub mod options;
pub mod pipeline;
pub mod plugins;
pub mod restart;
pub mod status;
pub mod types;

pub use confirm::{ConfirmDecision, InquirePrompter, Prompter};
pub use engine::{UpdateEngine, UpdateOutcome, UpdateReport};
pub use executor::StepExecutor;
pub use lock::UpdateLock;
pub use observer::{NoopObserver, StepObserver, StepRecorder, Tee};
pub use options::{UpdateOptions, UpdateRequest};
pub use pipeline::{PipelinePlan, PipelineRun};
pub use plugins::{ConfigPluginSynchronizer, PluginReport, PluginSynchronizer, reconcile};
pub use restart::{CliServiceController, RestartReport, ServiceController, restart_and_verify};
pub use status::{StatusReport, UpdateAvailability, collect_status};
pub use types::{
    UpdateMode, UpdateRunResult, UpdateStatus, UpdateStep, UpdateStepResult, VersionSnapshot,
};
