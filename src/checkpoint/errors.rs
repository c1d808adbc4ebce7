//! Checkpoint error types
//!
//! Error codes:
//! - CKP_IO_ERROR (FATAL) - open/stat/metadata failure
//! - CKP_WRITE_FAILED (FATAL) - short write or fsync failure
//! - CKP_READ_FAILED (FATAL) - raw read failure
//! - CKP_LOCK_FAILED (FATAL) - advisory lock could not be taken or released
//! - CKP_CORRUPTION (ERROR) - checksum mismatch or torn frame; bounds replay
//! - CKP_COMPACTION_FAILED (FATAL) - compaction has no partial success

use std::fmt;
use std::io;
use std::path::Path;

/// Severity levels for checkpoint errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Recoverable locally, the caller decides how far to go
    Error,
    /// Aborts the current operation and, in practice, the run
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Checkpoint error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointErrorCode {
    /// Open, stat or metadata failure
    CkpIoError,
    /// Short write or fsync failure
    CkpWriteFailed,
    /// Underlying read reported an error
    CkpReadFailed,
    /// Advisory lock failure
    CkpLockFailed,
    /// Checksum mismatch or malformed frame
    CkpCorruption,
    /// Backup creation, copy or rename failed
    CkpCompactionFailed,
}

impl CheckpointErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            CheckpointErrorCode::CkpIoError => "CKP_IO_ERROR",
            CheckpointErrorCode::CkpWriteFailed => "CKP_WRITE_FAILED",
            CheckpointErrorCode::CkpReadFailed => "CKP_READ_FAILED",
            CheckpointErrorCode::CkpLockFailed => "CKP_LOCK_FAILED",
            CheckpointErrorCode::CkpCorruption => "CKP_CORRUPTION",
            CheckpointErrorCode::CkpCompactionFailed => "CKP_COMPACTION_FAILED",
        }
    }

    /// Returns the severity level for this code
    pub fn severity(&self) -> Severity {
        match self {
            CheckpointErrorCode::CkpCorruption => Severity::Error,
            _ => Severity::Fatal,
        }
    }
}

impl fmt::Display for CheckpointErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Checkpoint error with code, message and context
#[derive(Debug)]
pub struct CheckpointError {
    code: CheckpointErrorCode,
    message: String,
    details: Option<String>,
    source: Option<io::Error>,
    /// Frame ran into end of file before it could verify
    torn: bool,
}

impl CheckpointError {
    fn new(code: CheckpointErrorCode, message: impl Into<String>, source: Option<io::Error>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            source,
            torn: false,
        }
    }

    /// Open/stat/metadata failure
    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(CheckpointErrorCode::CkpIoError, message, Some(source))
    }

    /// Open failure with the offending path attached
    pub fn io_error_at_path(path: &Path, source: io::Error) -> Self {
        Self::io_error("Failed to open checkpoint file", source)
            .with_details(format!("path: {}", path.display()))
    }

    /// Short write or fsync failure
    pub fn write_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(CheckpointErrorCode::CkpWriteFailed, message, Some(source))
    }

    /// Underlying read failure
    pub fn read_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(CheckpointErrorCode::CkpReadFailed, message, Some(source))
    }

    /// Advisory lock failure
    pub fn lock_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(CheckpointErrorCode::CkpLockFailed, message, Some(source))
    }

    /// Corrupted frame
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::new(CheckpointErrorCode::CkpCorruption, message, None)
    }

    /// Corrupted frame with byte offset context
    pub fn corruption_at_offset(offset: u64, reason: impl Into<String>) -> Self {
        Self::corruption(reason).with_details(format!("byte_offset: {}", offset))
    }

    /// Frame cut short by end of file, as a crash mid-write leaves it
    pub fn torn_frame_at_offset(offset: u64, reason: impl Into<String>) -> Self {
        let mut err = Self::corruption_at_offset(offset, reason);
        err.torn = true;
        err
    }

    /// Compaction failure without an IO source
    pub fn compaction_failed(message: impl Into<String>) -> Self {
        Self::new(CheckpointErrorCode::CkpCompactionFailed, message, None)
    }

    /// Compaction failure caused by an IO error
    pub fn compaction_io(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(CheckpointErrorCode::CkpCompactionFailed, message, Some(source))
    }

    /// Attaches context details
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Returns the error code
    pub fn code(&self) -> CheckpointErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns additional error details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Returns whether this error is fatal
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Returns whether this error reports a corrupted frame
    pub fn is_corruption(&self) -> bool {
        self.code == CheckpointErrorCode::CkpCorruption
    }

    /// Returns whether the corrupted frame was cut short rather than garbled
    pub fn is_torn(&self) -> bool {
        self.torn
    }
}

impl fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for CheckpointError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for checkpoint operations
pub type CheckpointResult<T> = Result<T, CheckpointError>;
