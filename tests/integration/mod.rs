//! Integration tests for openclaw-update.
//!
//! Engine tests drive whole update runs through the fakes in
//! `openclaw_update::test_utils`: commands are scripted, the registry is
//! in-memory and the installation lives in a temporary directory. CLI tests
//! run the built binary against empty temporary homes.
//!
//! ```bash
//! cargo test --test integration
//! RUST_LOG=update=debug cargo test --test integration -- --nocapture
//! ```

mod cli;
mod common;
mod engine;
mod git_pipeline;
mod kind_switch;
mod package_pipeline;
