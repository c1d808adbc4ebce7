//! Whole-file advisory exclusive lock
//!
//! Structural operations (append, replay, header creation, compaction) run
//! inside a [`FileLock`] section. Acquisition blocks indefinitely: there is
//! no timeout and no deadlock detection. A process that dies while holding
//! the lock stalls its peers until the kernel drops the lock with the
//! process's file descriptors.
//!
//! The lock is tied to the open file description, so two handles opened
//! separately on the same file exclude each other even inside one process.
//! The guard releases the lock on every exit path, including errors.

use std::fs::File;

use super::errors::{CheckpointError, CheckpointResult};

/// Guard for an exclusive advisory lock on a checkpoint file.
#[derive(Debug)]
pub struct FileLock<'a> {
    file: &'a File,
}

impl<'a> FileLock<'a> {
    /// Blocks until the exclusive lock on `file` is held.
    pub fn acquire(file: &'a File) -> CheckpointResult<Self> {
        fs2::FileExt::lock_exclusive(file).map_err(|e| {
            CheckpointError::lock_failed("Failed to acquire exclusive checkpoint lock", e)
        })?;
        Ok(Self { file })
    }
}

impl Drop for FileLock<'_> {
    fn drop(&mut self) {
        // Closing the descriptor would release it anyway
        let _ = fs2::FileExt::unlock(self.file);
    }
}
