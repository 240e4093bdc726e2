//! Terminal utilities
//!
//! - [`progress`] - Spinners and the step progress observer

pub mod progress;

pub use progress::{ProgressBar, StepProgress, format_duration_ms, is_progress_disabled};
