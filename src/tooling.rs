//! Tooling & Integration Layer
//!
//! Command-line access to local storages.

pub mod cli;

pub use cli::{Cli, CliContext, Commands};
