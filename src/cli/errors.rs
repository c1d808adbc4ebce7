//! CLI-specific error types
//!
//! All CLI errors end the process with a non-zero exit code.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::checkpoint::{CheckpointError, ConfigError};

/// CLI error
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Maintenance commands never create a checkpoint
    #[error("No checkpoint at {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to write output: {0}")]
    Output(#[from] io::Error),

    #[error("Failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            CliError::Checkpoint(e) => e.code().code(),
            CliError::Config(_) => "CKPLOG_CLI_CONFIG_ERROR",
            CliError::NotFound(_) => "CKPLOG_CLI_NOT_FOUND",
            CliError::Output(_) | CliError::Json(_) => "CKPLOG_CLI_IO_ERROR",
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
