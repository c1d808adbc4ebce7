//! CLI module for ckplog
//!
//! Provides command-line interface for:
//! - inspect: Report state, header and verified extent
//! - ids: List completed work ids
//! - compact: Drop an unverified tail (acts as coordinator)
//! - append: Append records, used to drive multi-process runs

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command, Target};
pub use commands::{append, compact, ids, inspect, run, run_command};
pub use errors::{CliError, CliResult};
