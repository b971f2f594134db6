//! CLI, configuration and invocation harness for gsandbox.
//!
//! This crate provides the `gsandbox` command-line tool, which runs the
//! Gmail and Drive listings from the `gsandbox-google` crate by name.

pub mod cli;
pub mod config;
pub mod error;
pub mod harness;
pub mod params;
pub mod prompt;
pub mod runtime;

pub use cli::Cli;
pub use error::{ClientError, ClientResult};
pub use harness::{Backend, GoogleBackend, Harness, Operation};
