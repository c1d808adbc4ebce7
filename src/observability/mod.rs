//! Observability for the checkpoint log
//!
//! Structured JSON logging of typed lifecycle events. Observability is
//! read-only: a logging failure never fails a checkpoint operation.
//!
//! ```ignore
//! use ckplog::observability::{log_event, Event};
//!
//! log_event(Event::ReplayCorruptTail, &[("records", "5")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity, LOG_LEVEL_ENV};

/// Log a lifecycle event at its own severity
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
