//! Crash point injection for durability testing
//!
//! Crash points are enabled through the `CKPLOG_CRASH_POINT` environment
//! variable. When the named point is reached the process terminates via
//! `std::process::abort()`: no cleanup, no unwinding, no lock release
//! beyond what the kernel does for a dead process.
//!
//! ```bash
//! CKPLOG_CRASH_POINT=append_torn_write ckplog append --prefix run --work-id 9
//! ```

use std::sync::OnceLock;

/// Environment variable naming the active crash point
pub const CRASH_POINT_ENV: &str = "CKPLOG_CRASH_POINT";

static CRASH_POINT: OnceLock<Option<String>> = OnceLock::new();

#[inline]
fn get_crash_point() -> Option<&'static str> {
    CRASH_POINT
        .get_or_init(|| std::env::var(CRASH_POINT_ENV).ok())
        .as_deref()
}

/// Returns true if `CKPLOG_CRASH_POINT` equals `name`.
#[inline]
pub fn crash_point_enabled(name: &str) -> bool {
    get_crash_point().map(|p| p == name).unwrap_or(false)
}

/// Aborts the process if the named crash point is enabled.
#[inline]
pub fn maybe_crash(name: &str) {
    if crash_point_enabled(name) {
        eprintln!("[CRASH] Triggering crash at point: {}", name);
        std::process::abort();
    }
}

/// All defined crash point names
pub mod points {
    // Header
    /// Writes the first half of the header frame, then aborts
    pub const HEADER_TORN_WRITE: &str = "header_torn_write";

    // Append
    pub const APPEND_BEFORE_WRITE: &str = "append_before_write";
    /// Writes the first half of the frame, then aborts
    pub const APPEND_TORN_WRITE: &str = "append_torn_write";
    pub const APPEND_AFTER_WRITE: &str = "append_after_write";

    // Compaction
    pub const COMPACT_AFTER_BACKUP: &str = "compact_after_backup";
    pub const COMPACT_BEFORE_RENAME: &str = "compact_before_rename";
    pub const COMPACT_AFTER_RENAME: &str = "compact_after_rename";

    /// Get all crash point names
    pub fn all() -> &'static [&'static str] {
        &[
            HEADER_TORN_WRITE,
            APPEND_BEFORE_WRITE,
            APPEND_TORN_WRITE,
            APPEND_AFTER_WRITE,
            COMPACT_AFTER_BACKUP,
            COMPACT_BEFORE_RENAME,
            COMPACT_AFTER_RENAME,
        ]
    }
}
