//! Checkpoint subsystem for ckplog
//!
//! A single append-only file, `<prefix>.ckp`, shared by every worker of a
//! run. The first frame is the run configuration; every later frame is one
//! completed unit of work. A restarted run replays the file to learn what
//! is already done.
//!
//! # Frame format
//!
//! ```text
//! [crc32: u32][payload: codec bytes]
//! ```
//!
//! The checksum covers the payload only. Frames carry no length prefix;
//! the payload codec knows its own extent.
//!
//! # Design Principles
//!
//! - Append only, never truncate
//! - Every frame verified before it is trusted
//! - Replay stops at the first bad frame, never skips past it
//! - Exclusive advisory lock around every append and replay
//!
//! # Crash Safety
//!
//! - Crash mid-append leaves a torn tail; replay stops before it
//! - Crash during compaction leaves the original file untouched, or the
//!   fully written replacement in its place
//!
//! Compaction is the only operation that removes bytes, and only bytes
//! that never verified.

mod checksum;
mod compactor;
mod config;
mod cursor;
mod errors;
mod frame;
mod lock;
mod options;
mod record;
mod store;

pub use checksum::{compute_checksum, ChecksumReader};
pub use compactor::{CompactionOutcome, CompactionRole, Compactor, SkipReason};
pub use config::{ConfigError, StoreConfig, BACKUP_SUFFIX, CHECKPOINT_EXTENSION};
pub use cursor::FileCursor;
pub use errors::{CheckpointError, CheckpointErrorCode, CheckpointResult, Severity};
pub use frame::{decode_frame, encode_frame, frame_bytes, FrameRead, CHECKSUM_SIZE};
pub use lock::FileLock;
pub use options::{DataType, RateCategoryType, RunOptions};
pub use record::{ResultRecord, WorkRecord};
pub use store::{CheckpointStore, FileIdentity, ReplayReport, RunCheckpoint, StoreState};
