//! ckplog - a crash-resumable, checksummed checkpoint log
//!
//! Cooperating worker processes share one append-only file. Each completed
//! unit of work is appended as a checksummed frame under an exclusive
//! advisory lock; a restarted run replays the verified prefix and skips
//! work that is already done.

pub mod checkpoint;
pub mod cli;
pub mod codec;
pub mod crash_point;
pub mod observability;
