//! Checkpoint store: the shared, append-only checkpoint file
//!
//! File layout:
//!
//! ```text
//! [Frame(header)] [Frame(record)]*
//! ```
//!
//! - The header frame is written once, when the file is created, and never
//!   overwritten by a later process that finds an existing file
//! - Record frames are appended at end of file and are immutable once
//!   written; only compaction removes frames, and only a corrupted tail
//! - Every append and replay runs inside the exclusive file lock, so no
//!   reader ever sees a checksum without its payload
//!
//! A handle whose file was swapped out by compaction is detected when the
//! lock is taken and transparently reopened before the operation runs.
//!
//! Appends only go after a verified frame. A file that ends in unverified
//! bytes refuses appends until a coordinator compacts it, since a record
//! written after the garbage could never be replayed.

use std::cell::Cell;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::marker::PhantomData;
use std::os::unix::fs::{MetadataExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use super::config::StoreConfig;
use super::cursor::FileCursor;
use super::errors::{CheckpointError, CheckpointResult};
use super::frame::{decode_frame, frame_bytes, FrameRead};
use super::lock::FileLock;
use super::options::RunOptions;
use super::record::{ResultRecord, WorkRecord};
use crate::codec::Codec;
use crate::crash_point::{crash_point_enabled, maybe_crash, points};
use crate::observability::{log_event, Event};

/// Stable identifier of the storage object behind an open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    pub device: u64,
    pub inode: u64,
}

impl FileIdentity {
    fn of(metadata: &fs::Metadata) -> Self {
        Self {
            device: metadata.dev(),
            inode: metadata.ino(),
        }
    }
}

/// Structural state of the checkpoint file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// Empty file or a torn header, no verified header yet
    Fresh,
    /// Header present, no result frames after it
    HeaderOnly,
    /// Header followed by at least one byte of result data
    HasResults,
}

/// Everything a replay pass found.
#[derive(Debug)]
pub struct ReplayReport<R> {
    /// Size of the header frame, 0 if absent or unreadable
    pub header_bytes: u64,
    /// Verified records in file order
    pub records: Vec<R>,
    /// Offset just past the last verified frame
    pub verified_bytes: u64,
    /// File length when the replay ran
    pub file_len: u64,
    /// Why replay stopped early, if it did
    pub corruption: Option<CheckpointError>,
}

impl<R> ReplayReport<R> {
    fn empty(file_len: u64) -> Self {
        Self {
            header_bytes: 0,
            records: Vec::new(),
            verified_bytes: 0,
            file_len,
            corruption: None,
        }
    }

    /// True if every byte of the file was verified.
    pub fn is_clean(&self) -> bool {
        self.corruption.is_none() && self.verified_bytes == self.file_len
    }

    /// Bytes after the verified prefix.
    pub fn unverified_bytes(&self) -> u64 {
        self.file_len.saturating_sub(self.verified_bytes)
    }
}

/// Checkpoint store over `<prefix>.ckp`.
///
/// Generic over the header type `H` and the record type `R`; the defaults
/// are the run configuration snapshot and plain result records.
///
/// The store exclusively owns its file handle. Moving the store moves the
/// handle; dropping it closes the handle.
pub struct CheckpointStore<H = RunOptions, R = ResultRecord> {
    config: StoreConfig,
    path: PathBuf,
    file: File,
    /// File had content when opened
    existed: bool,
    /// This handle wrote (or saw another process write) the header
    header_written: bool,
    /// End of the verified prefix as of this handle's last locked scan or
    /// append; a matching file length means nothing was added since
    verified_end: Cell<Option<u64>>,
    _types: PhantomData<fn() -> (H, R)>,
}

/// Store for run options and result records.
pub type RunCheckpoint = CheckpointStore<RunOptions, ResultRecord>;

/// Opens `path` for read + append, creating it if absent, never truncating.
///
/// Returns the handle and whether the file already held data.
fn open_file(path: &Path, mode: u32) -> CheckpointResult<(File, bool)> {
    let created = OpenOptions::new()
        .read(true)
        .append(true)
        .create_new(true)
        .mode(mode)
        .open(path);

    let file = match created {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => OpenOptions::new()
            .read(true)
            .append(true)
            .open(path)
            .map_err(|e| CheckpointError::io_error_at_path(path, e))?,
        Err(e) => return Err(CheckpointError::io_error_at_path(path, e)),
    };

    let len = file
        .metadata()
        .map_err(|e| CheckpointError::io_error("Failed to read checkpoint metadata", e))?
        .len();

    Ok((file, len > 0))
}

impl<H: Codec, R: WorkRecord> CheckpointStore<H, R> {
    /// Opens `<prefix>.ckp` with default settings.
    pub fn open(prefix: impl Into<String>) -> CheckpointResult<Self> {
        Self::open_with(StoreConfig::new(prefix))
    }

    /// Opens the checkpoint described by `config`.
    ///
    /// Records whether the file already held a checkpoint; an empty file
    /// left behind by a crash before the header was written counts as new.
    /// A torn header leaves `save_options` free to repair it.
    pub fn open_with(config: StoreConfig) -> CheckpointResult<Self> {
        let path = config.checkpoint_path();
        let (file, existed) = open_file(&path, config.file_mode)?;

        let mut store = Self {
            config,
            path,
            file,
            existed,
            header_written: existed,
            verified_end: Cell::new(None),
            _types: PhantomData,
        };
        store.classify_header()?;

        let shown = store.path.display().to_string();
        log_event(
            Event::StoreOpened,
            &[
                ("path", shown.as_str()),
                ("existing", if store.existed { "true" } else { "false" }),
            ],
        );
        Ok(store)
    }

    /// Clears `header_written` when the header on disk is torn.
    fn classify_header(&mut self) -> CheckpointResult<()> {
        if !self.header_written {
            return Ok(());
        }
        let torn = {
            let _lock = FileLock::acquire(&self.file)?;
            match self.read_header_locked() {
                Ok(_) => false,
                Err(e) if e.is_torn() => true,
                Err(e) if e.is_corruption() => false,
                Err(e) => return Err(e),
            }
        };
        if torn {
            self.header_written = false;
        }
        Ok(())
    }

    /// Path of the checkpoint file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configuration the store was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Whether a checkpoint already existed when this handle was opened.
    pub fn existing_checkpoint(&self) -> bool {
        self.existed
    }

    /// Writes the header frame if this store created the file.
    ///
    /// A no-op when the checkpoint pre-existed or a header is already
    /// present, so the first header ever written is the one that stays.
    /// Returns whether a header was written by this call.
    ///
    /// A torn header shorter than the new header frame is what a creator
    /// killed mid-write leaves; it is discarded and the header rewritten.
    /// Any other damaged header fails with `CKP_CORRUPTION`.
    pub fn save_options(&mut self, options: &H) -> CheckpointResult<bool> {
        let shown = self.path.display().to_string();
        if self.header_written {
            log_event(Event::HeaderSkipped, &[("path", shown.as_str())]);
            return Ok(false);
        }

        let frame = frame_bytes(options)?;
        let (written, repaired) = self.with_lock(|store| {
            let len = store.file_len()?;
            let mut repaired = false;
            // Another process may have created the header since we opened
            if len > 0 {
                match store.read_header_locked() {
                    Ok(_) => return Ok((false, false)),
                    Err(e) if e.is_torn() && len < frame.len() as u64 => {
                        store.discard_torn_header(len)?;
                        repaired = true;
                    }
                    Err(e) if e.is_corruption() => {
                        return Err(CheckpointError::corruption(format!(
                            "Checkpoint header is damaged, remove the file to start over: {}",
                            e.message()
                        ))
                        .with_details(format!("path: {}", store.path.display())))
                    }
                    Err(e) => return Err(e),
                }
            }

            if crash_point_enabled(points::HEADER_TORN_WRITE) {
                store.write_torn(&frame)?;
                maybe_crash(points::HEADER_TORN_WRITE);
            }
            store.write_frame(&frame)?;
            store.verified_end.set(Some(frame.len() as u64));
            Ok((true, repaired))
        })?;
        self.header_written = true;
        if repaired {
            // The file now holds only what this run wrote
            self.existed = false;
        }

        let event = if written {
            Event::HeaderWritten
        } else {
            Event::HeaderSkipped
        };
        log_event(event, &[("path", shown.as_str())]);
        Ok(written)
    }

    /// Reads the header frame back.
    ///
    /// Returns `Ok(None)` if the file holds no header yet. A header that
    /// fails verification is an error: nothing after it can be trusted.
    pub fn load_options(&mut self) -> CheckpointResult<Option<H>> {
        let header = self.with_lock(|store| store.read_header_locked())?;
        if header.is_some() {
            let shown = self.path.display().to_string();
            log_event(Event::OptionsLoaded, &[("path", shown.as_str())]);
        }
        Ok(header.map(|(options, _)| options))
    }

    /// Appends one record frame at the end of the file.
    ///
    /// # Errors
    ///
    /// Returns `CKP_CORRUPTION` without writing if the file does not end on
    /// a verified frame; compact the checkpoint first.
    pub fn append(&mut self, record: &R) -> CheckpointResult<usize> {
        let frame = frame_bytes(record)?;
        self.with_lock(|store| {
            let end = store.verified_len_locked()?;
            maybe_crash(points::APPEND_BEFORE_WRITE);
            if crash_point_enabled(points::APPEND_TORN_WRITE) {
                store.write_torn(&frame)?;
                maybe_crash(points::APPEND_TORN_WRITE);
            }
            store.write_frame(&frame)?;
            store.verified_end.set(Some(end + frame.len() as u64));
            maybe_crash(points::APPEND_AFTER_WRITE);
            Ok(())
        })?;

        let bytes = frame.len().to_string();
        let work_id = record.work_id().to_string();
        log_event(
            Event::RecordAppended,
            &[("bytes", bytes.as_str()), ("work_id", work_id.as_str())],
        );
        Ok(frame.len())
    }

    /// Returns every verified record, in file order.
    ///
    /// Stops at end of file or at the first corrupted frame; a corrupted
    /// tail shortens the history but is never an error.
    pub fn replay(&mut self) -> CheckpointResult<Vec<R>> {
        Ok(self.replay_report()?.records)
    }

    /// Replay with the verified extent and the reason replay stopped.
    pub fn replay_report(&mut self) -> CheckpointResult<ReplayReport<R>> {
        self.with_lock(|store| store.replay_locked())
    }

    /// Work ids of completed records, in file order.
    ///
    /// A work id recorded more than once is reported at its first
    /// occurrence only.
    pub fn completed_work_ids(&mut self) -> CheckpointResult<Vec<u64>> {
        let records = self.replay()?;
        let mut seen = HashSet::with_capacity(records.len());
        Ok(records
            .iter()
            .map(|record| record.work_id())
            .filter(|id| seen.insert(*id))
            .collect())
    }

    /// Current structural state of the file.
    pub fn state(&mut self) -> CheckpointResult<StoreState> {
        self.with_lock(|store| {
            let len = store.file_len()?;
            if len == 0 {
                return Ok(StoreState::Fresh);
            }
            match store.read_header_locked() {
                Ok(Some((_, header_len))) if len > header_len => Ok(StoreState::HasResults),
                Ok(_) => Ok(StoreState::HeaderOnly),
                // Crash while the header was being created
                Err(e) if e.is_torn() => Ok(StoreState::Fresh),
                Err(e) => Err(e),
            }
        })
    }

    /// Closes and reopens the file handle.
    ///
    /// Required after compaction replaced the file at the path.
    pub fn reload(&mut self) -> CheckpointResult<()> {
        let (file, existed) = open_file(&self.path, self.config.file_mode)?;
        // Old handle is closed here
        self.file = file;
        self.existed = existed;
        self.header_written = existed;
        self.verified_end.set(None);
        self.classify_header()?;

        let shown = self.path.display().to_string();
        log_event(Event::StoreReloaded, &[("path", shown.as_str())]);
        Ok(())
    }

    /// Identity of the storage object behind the open handle.
    pub fn identity(&self) -> CheckpointResult<FileIdentity> {
        let metadata = self
            .file
            .metadata()
            .map_err(|e| CheckpointError::io_error("Failed to stat checkpoint handle", e))?;
        Ok(FileIdentity::of(&metadata))
    }

    /// True if the path no longer names the file this handle has open,
    /// including when nothing exists at the path any more.
    pub fn is_stale(&self) -> CheckpointResult<bool> {
        Ok(self.path_identity()? != Some(self.identity()?))
    }

    /// Identity of whatever the path names now, `None` if nothing.
    fn path_identity(&self) -> CheckpointResult<Option<FileIdentity>> {
        match fs::metadata(&self.path) {
            Ok(metadata) => Ok(Some(FileIdentity::of(&metadata))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CheckpointError::io_error(
                "Failed to stat checkpoint path",
                e,
            )),
        }
    }

    /// Runs `op` under the exclusive lock on a current handle.
    ///
    /// If another file was renamed over the path since this handle was
    /// opened, the lock is dropped, the handle reopened, and the lock taken
    /// again. A missing path is stale (see `is_stale`) but not swapped:
    /// compaction only ever replaces the file, and reopening would create
    /// an empty checkpoint, so the handle keeps its unlinked file instead.
    pub(super) fn with_lock<T>(
        &mut self,
        op: impl Fn(&Self) -> CheckpointResult<T>,
    ) -> CheckpointResult<T> {
        loop {
            {
                let _lock = FileLock::acquire(&self.file)?;
                if !self.swapped()? {
                    return op(self);
                }
            }
            self.reload()?;
        }
    }

    fn swapped(&self) -> CheckpointResult<bool> {
        match self.path_identity()? {
            Some(current) => Ok(current != self.identity()?),
            None => Ok(false),
        }
    }

    fn file_len(&self) -> CheckpointResult<u64> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(|e| CheckpointError::io_error("Failed to read checkpoint metadata", e))
    }

    fn write_frame(&self, frame: &[u8]) -> CheckpointResult<()> {
        (&self.file)
            .write_all(frame)
            .map_err(|e| CheckpointError::write_failed("Failed to append checkpoint frame", e))?;

        if self.config.sync_on_append {
            self.file
                .sync_data()
                .map_err(|e| CheckpointError::write_failed("fsync failed after append", e))?;
        }
        Ok(())
    }

    /// Crash injection: half the frame reaches disk.
    fn write_torn(&self, frame: &[u8]) -> CheckpointResult<()> {
        (&self.file)
            .write_all(&frame[..frame.len() / 2])
            .map_err(|e| CheckpointError::write_failed("Failed to write torn frame", e))?;
        self.file
            .sync_data()
            .map_err(|e| CheckpointError::write_failed("fsync failed after torn write", e))
    }

    /// Truncates a torn header of `len` bytes. Caller holds the lock.
    fn discard_torn_header(&self, len: u64) -> CheckpointResult<()> {
        self.file
            .set_len(0)
            .map_err(|e| CheckpointError::write_failed("Failed to discard torn header", e))?;
        self.verified_end.set(Some(0));

        let shown = self.path.display().to_string();
        let bytes = len.to_string();
        log_event(
            Event::HeaderDiscarded,
            &[("bytes", bytes.as_str()), ("path", shown.as_str())],
        );
        Ok(())
    }

    /// File length, if the file ends on a verified frame. Caller holds the
    /// lock.
    ///
    /// Rescans only when the length moved since this handle last knew
    /// where the verified prefix ends.
    fn verified_len_locked(&self) -> CheckpointResult<u64> {
        let len = self.file_len()?;
        if self.verified_end.get() == Some(len) {
            return Ok(len);
        }
        let report = self.replay_locked()?;
        if report.verified_bytes != len {
            return Err(CheckpointError::corruption_at_offset(
                report.verified_bytes,
                format!(
                    "Checkpoint ends in {} unverified bytes, compact before appending",
                    report.unverified_bytes()
                ),
            ));
        }
        Ok(len)
    }

    /// Decodes the header frame at offset zero. Caller holds the lock.
    pub(super) fn read_header_locked(&self) -> CheckpointResult<Option<(H, u64)>> {
        let mut cursor = FileCursor::at(&self.file, 0);
        match decode_frame::<H, _>(&mut cursor, 0)? {
            FrameRead::Frame { value, bytes } => Ok(Some((value, bytes as u64))),
            FrameRead::End => Ok(None),
        }
    }

    /// Replays the verified prefix. Caller holds the lock.
    pub(super) fn replay_locked(&self) -> CheckpointResult<ReplayReport<R>> {
        let report = self.scan_locked()?;
        self.verified_end.set(Some(report.verified_bytes));
        Ok(report)
    }

    fn scan_locked(&self) -> CheckpointResult<ReplayReport<R>> {
        let file_len = self.file_len()?;
        let mut report = ReplayReport::empty(file_len);

        let header_bytes = match self.read_header_locked() {
            Ok(Some((_, bytes))) => bytes,
            Ok(None) => return Ok(report),
            Err(e) if e.is_corruption() => {
                self.warn_corrupt_tail(&report, &e);
                report.corruption = Some(e);
                return Ok(report);
            }
            Err(e) => return Err(e),
        };
        report.header_bytes = header_bytes;
        report.verified_bytes = header_bytes;

        let mut cursor = FileCursor::at(&self.file, header_bytes);
        loop {
            match decode_frame::<R, _>(&mut cursor, report.verified_bytes) {
                Ok(FrameRead::Frame { value, bytes }) => {
                    report.records.push(value);
                    report.verified_bytes += bytes as u64;
                }
                Ok(FrameRead::End) => break,
                Err(e) if e.is_corruption() => {
                    self.warn_corrupt_tail(&report, &e);
                    report.corruption = Some(e);
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        if report.corruption.is_none() {
            let shown = self.path.display().to_string();
            let records = report.records.len().to_string();
            log_event(
                Event::ReplayComplete,
                &[("path", shown.as_str()), ("records", records.as_str())],
            );
        }
        Ok(report)
    }

    fn warn_corrupt_tail(&self, report: &ReplayReport<R>, error: &CheckpointError) {
        let shown = self.path.display().to_string();
        let records = report.records.len().to_string();
        let unverified = report.unverified_bytes().to_string();
        let reason = error.to_string();
        log_event(
            Event::ReplayCorruptTail,
            &[
                ("path", shown.as_str()),
                ("records", records.as_str()),
                ("unverified_bytes", unverified.as_str()),
                ("reason", reason.as_str()),
            ],
        );
    }
}
