//! Core types shared by every part of the update engine.
//!
//! Currently this is the error taxonomy and its user-facing rendering.

pub mod error;

pub use error::{ErrorContext, UpdateError, user_friendly_error};
