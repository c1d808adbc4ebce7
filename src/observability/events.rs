//! Observable checkpoint events
//!
//! Events are explicit and typed; each carries its own severity.

use std::fmt;

use super::logger::Severity;

/// Observable events in the checkpoint log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Store lifecycle
    /// Checkpoint file opened
    StoreOpened,
    /// Handle closed and reopened
    StoreReloaded,

    // Header
    /// Configuration snapshot written
    HeaderWritten,
    /// Header already present, save was a no-op
    HeaderSkipped,
    /// Torn header from a crashed creator truncated before rewriting
    HeaderDiscarded,
    /// Configuration snapshot read back
    OptionsLoaded,

    // Records
    /// Result frame appended
    RecordAppended,
    /// Replay reached the end of the file
    ReplayComplete,
    /// Replay stopped at a corrupted or torn frame
    ReplayCorruptTail,

    // Compaction
    /// Compaction started
    CompactionStart,
    /// Compaction finished and the file was swapped
    CompactionComplete,
    /// Compaction not attempted
    CompactionSkipped,
    /// Compaction aborted
    CompactionFailed,
}

impl Event {
    /// Returns the event name
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::StoreOpened => "STORE_OPENED",
            Event::StoreReloaded => "STORE_RELOADED",
            Event::HeaderWritten => "HEADER_WRITTEN",
            Event::HeaderSkipped => "HEADER_SKIPPED",
            Event::HeaderDiscarded => "HEADER_DISCARDED",
            Event::OptionsLoaded => "OPTIONS_LOADED",
            Event::RecordAppended => "RECORD_APPENDED",
            Event::ReplayComplete => "REPLAY_COMPLETE",
            Event::ReplayCorruptTail => "REPLAY_CORRUPT_TAIL",
            Event::CompactionStart => "COMPACTION_START",
            Event::CompactionComplete => "COMPACTION_COMPLETE",
            Event::CompactionSkipped => "COMPACTION_SKIPPED",
            Event::CompactionFailed => "COMPACTION_FAILED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::RecordAppended => Severity::Trace,
            Event::ReplayCorruptTail | Event::OptionsLoaded | Event::HeaderDiscarded => {
                Severity::Warn
            }
            Event::CompactionFailed => Severity::Error,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
