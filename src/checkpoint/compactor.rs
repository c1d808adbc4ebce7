//! Checkpoint compaction
//!
//! Rewrites the checkpoint so that it holds only verified frames, dropping
//! a corrupted or torn tail for good. Runs once, after the work is done, in
//! the single elected coordinator; the election itself happens outside
//! this crate.
//!
//! # Algorithm
//!
//! 1. Acquire the exclusive lock on the checkpoint
//! 2. Create `<prefix>.ckp.bak` with exclusive-create semantics; an existing
//!    backup means another compaction is running or one failed earlier
//! 3. Re-frame the header and every verified record into the backup
//! 4. fsync the backup and close it
//! 5. Rename the backup over the checkpoint, then fsync the directory
//! 6. Release the lock and reopen the coordinator's own handle
//!
//! There is no partial success. Any failure aborts the compaction, leaves
//! the original checkpoint untouched, and leaves the backup (if created) in
//! place as evidence. Other processes must `reload()` afterwards; their
//! next locked operation does so on its own.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use super::errors::{CheckpointError, CheckpointResult};
use super::frame::encode_frame;
use super::record::WorkRecord;
use super::store::CheckpointStore;
use crate::codec::Codec;
use crate::crash_point::{maybe_crash, points};
use crate::observability::{log_event, Event};

/// Role of the calling process in the cooperating set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionRole {
    /// The single process allowed to compact
    Coordinator,
    /// Any other member
    Worker,
}

/// Why a compaction request did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Caller is not the elected coordinator
    NotCoordinator,
    /// The checkpoint was created by this run; there is no old tail
    NoExistingCheckpoint,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NotCoordinator => "not_coordinator",
            SkipReason::NoExistingCheckpoint => "no_existing_checkpoint",
        }
    }
}

/// Result of a compaction request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionOutcome {
    Skipped(SkipReason),
    Compacted {
        /// Records carried into the new file
        records: usize,
        /// Unverified bytes that were dropped
        bytes_dropped: u64,
    },
}

/// Checkpoint compactor.
pub struct Compactor;

impl Compactor {
    /// Compacts the checkpoint behind `store` if `role` allows it and the
    /// checkpoint pre-existed this run.
    ///
    /// # Errors
    ///
    /// Returns `CKP_COMPACTION_FAILED` if the backup cannot be created
    /// exclusively, the header does not verify, or the rename fails. Write
    /// and fsync failures on the backup surface as `CKP_WRITE_FAILED`.
    pub fn compact<H: Codec, R: WorkRecord>(
        store: &mut CheckpointStore<H, R>,
        role: CompactionRole,
    ) -> CheckpointResult<CompactionOutcome> {
        let reason = if role != CompactionRole::Coordinator {
            Some(SkipReason::NotCoordinator)
        } else if !store.existing_checkpoint() {
            Some(SkipReason::NoExistingCheckpoint)
        } else {
            None
        };
        if let Some(reason) = reason {
            log_event(Event::CompactionSkipped, &[("reason", reason.as_str())]);
            return Ok(CompactionOutcome::Skipped(reason));
        }

        let shown = store.path().display().to_string();
        log_event(Event::CompactionStart, &[("path", shown.as_str())]);

        let (records, bytes_dropped) = match store.with_lock(compact_locked) {
            Ok(counts) => counts,
            Err(e) => {
                let reason = e.to_string();
                log_event(
                    Event::CompactionFailed,
                    &[("path", shown.as_str()), ("reason", reason.as_str())],
                );
                return Err(e);
            }
        };

        store.reload()?;

        let kept = records.to_string();
        let dropped = bytes_dropped.to_string();
        log_event(
            Event::CompactionComplete,
            &[
                ("bytes_dropped", dropped.as_str()),
                ("path", shown.as_str()),
                ("records", kept.as_str()),
            ],
        );
        Ok(CompactionOutcome::Compacted {
            records,
            bytes_dropped,
        })
    }
}

/// Body of the compaction. Caller holds the lock.
fn compact_locked<H: Codec, R: WorkRecord>(
    store: &CheckpointStore<H, R>,
) -> CheckpointResult<(usize, u64)> {
    let backup_path = store.config().backup_path();

    let header = match store.read_header_locked() {
        Ok(Some((header, _))) => header,
        Ok(None) => {
            return Err(CheckpointError::compaction_failed(
                "Checkpoint has no header to carry over",
            ))
        }
        Err(e) => {
            return Err(CheckpointError::compaction_failed(format!(
                "Cannot compact without a verified header: {}",
                e
            )))
        }
    };
    let report = store.replay_locked()?;

    let backup = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(store.config().file_mode)
        .open(&backup_path)
        .map_err(|e| {
            CheckpointError::compaction_io("Failed to exclusively create compaction backup", e)
                .with_details(format!("path: {}", backup_path.display()))
        })?;
    maybe_crash(points::COMPACT_AFTER_BACKUP);

    write_backup(&backup, &header, &report.records)?;
    backup
        .sync_all()
        .map_err(|e| CheckpointError::write_failed("fsync failed for compaction backup", e))?;
    drop(backup);

    maybe_crash(points::COMPACT_BEFORE_RENAME);
    fs::rename(&backup_path, store.path()).map_err(|e| {
        CheckpointError::compaction_io("Failed to rename compaction backup over checkpoint", e)
            .with_details(format!("path: {}", backup_path.display()))
    })?;
    fsync_parent_dir(store.path())?;
    maybe_crash(points::COMPACT_AFTER_RENAME);

    Ok((report.records.len(), report.unverified_bytes()))
}

fn write_backup<H: Codec, R: WorkRecord>(
    backup: &File,
    header: &H,
    records: &[R],
) -> CheckpointResult<()> {
    let mut writer = BufWriter::new(backup);
    encode_frame(&mut writer, header)?;
    for record in records {
        encode_frame(&mut writer, record)?;
    }
    writer
        .flush()
        .map_err(|e| CheckpointError::write_failed("Failed to flush compaction backup", e))
}

/// fsync the directory holding `path` so the rename is durable.
fn fsync_parent_dir(path: &Path) -> CheckpointResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let dir = File::open(parent).map_err(|e| CheckpointError::io_error_at_path(parent, e))?;
    dir.sync_all().map_err(|e| {
        CheckpointError::write_failed(format!("fsync directory failed: {}", parent.display()), e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::config::StoreConfig;
    use crate::checkpoint::options::RunOptions;
    use crate::checkpoint::record::ResultRecord;
    use crate::checkpoint::store::RunCheckpoint;
    use tempfile::TempDir;

    fn config(temp_dir: &TempDir) -> StoreConfig {
        StoreConfig::new(temp_dir.path().join("run").display().to_string()).without_sync()
    }

    fn seeded(temp_dir: &TempDir, ids: &[u64]) {
        let mut store = RunCheckpoint::open_with(config(temp_dir)).unwrap();
        store
            .save_options(&RunOptions {
                seed: 3,
                ..RunOptions::default()
            })
            .unwrap();
        for id in ids {
            store.append(&ResultRecord::new(*id, vec![*id as u8; 4])).unwrap();
        }
    }

    #[test]
    fn test_worker_does_not_compact() {
        let temp_dir = TempDir::new().unwrap();
        seeded(&temp_dir, &[1]);
        let mut store = RunCheckpoint::open_with(config(&temp_dir)).unwrap();
        let outcome = Compactor::compact(&mut store, CompactionRole::Worker).unwrap();
        assert_eq!(outcome, CompactionOutcome::Skipped(SkipReason::NotCoordinator));
    }

    #[test]
    fn test_fresh_checkpoint_is_not_compacted() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = RunCheckpoint::open_with(config(&temp_dir)).unwrap();
        let outcome = Compactor::compact(&mut store, CompactionRole::Coordinator).unwrap();
        assert_eq!(
            outcome,
            CompactionOutcome::Skipped(SkipReason::NoExistingCheckpoint)
        );
    }

    #[test]
    fn test_clean_file_compacts_to_itself() {
        let temp_dir = TempDir::new().unwrap();
        seeded(&temp_dir, &[4, 8]);
        let before = fs::read(config(&temp_dir).checkpoint_path()).unwrap();

        let mut store = RunCheckpoint::open_with(config(&temp_dir)).unwrap();
        let outcome = Compactor::compact(&mut store, CompactionRole::Coordinator).unwrap();
        assert_eq!(
            outcome,
            CompactionOutcome::Compacted {
                records: 2,
                bytes_dropped: 0
            }
        );
        assert_eq!(fs::read(config(&temp_dir).checkpoint_path()).unwrap(), before);
        assert!(!config(&temp_dir).backup_path().exists());
        assert!(!store.is_stale().unwrap());
    }

    #[test]
    fn test_existing_backup_aborts() {
        let temp_dir = TempDir::new().unwrap();
        seeded(&temp_dir, &[1, 2]);
        fs::write(config(&temp_dir).backup_path(), b"other coordinator").unwrap();
        let before = fs::read(config(&temp_dir).checkpoint_path()).unwrap();

        let mut store = RunCheckpoint::open_with(config(&temp_dir)).unwrap();
        let err = Compactor::compact(&mut store, CompactionRole::Coordinator).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.code().code(), "CKP_COMPACTION_FAILED");

        assert_eq!(fs::read(config(&temp_dir).checkpoint_path()).unwrap(), before);
        assert_eq!(
            fs::read(config(&temp_dir).backup_path()).unwrap(),
            b"other coordinator"
        );
    }

    #[test]
    fn test_corrupt_header_aborts() {
        let temp_dir = TempDir::new().unwrap();
        seeded(&temp_dir, &[1]);
        let path = config(&temp_dir).checkpoint_path();
        let mut bytes = fs::read(&path).unwrap();
        bytes[0] ^= 0xFF;
        fs::write(&path, &bytes).unwrap();

        let mut store = RunCheckpoint::open_with(config(&temp_dir)).unwrap();
        let err = Compactor::compact(&mut store, CompactionRole::Coordinator).unwrap_err();
        assert_eq!(err.code().code(), "CKP_COMPACTION_FAILED");
        assert!(!config(&temp_dir).backup_path().exists());
    }

    #[test]
    fn test_fsync_parent_of_relative_path() {
        fsync_parent_dir(Path::new("run.ckp")).unwrap();
    }
}
