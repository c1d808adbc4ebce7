//! CLI command implementations
//!
//! Each command returns its report as a JSON value; `run_command` prints it
//! to stdout as a single line. Logs go to stderr.
//!
//! `inspect`, `ids` and `compact` refuse to run against a missing
//! checkpoint rather than create an empty one.

use std::io::{self, Write};

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::checkpoint::{
    CompactionOutcome, CompactionRole, Compactor, ResultRecord, RunCheckpoint, RunOptions,
    StoreConfig, StoreState,
};

use super::args::{Command, Target};
use super::errors::{CliError, CliResult};

impl Target {
    /// Resolves the store configuration named on the command line
    pub fn store_config(&self) -> CliResult<StoreConfig> {
        if let Some(path) = &self.config {
            return Ok(StoreConfig::load(path)?);
        }
        let config = StoreConfig::new(self.prefix.clone().unwrap_or_default());
        config.validate()?;
        Ok(config)
    }
}

/// Parse arguments and run the requested command
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    let report = match cmd {
        Command::Inspect { target } => inspect(&target.store_config()?)?,
        Command::Ids { target } => ids(&target.store_config()?)?,
        Command::Compact { target } => compact(&target.store_config()?)?,
        Command::Append {
            target,
            work_id,
            count,
            payload,
        } => append(&target.store_config()?, work_id, count, payload.as_bytes())?,
    };
    write_json(&report)
}

fn write_json(value: &Value) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

fn open_existing(config: &StoreConfig) -> CliResult<RunCheckpoint> {
    let path = config.checkpoint_path();
    if !path.exists() {
        return Err(CliError::NotFound(path));
    }
    Ok(RunCheckpoint::open_with(config.clone())?)
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn state_name(state: StoreState) -> &'static str {
    match state {
        StoreState::Fresh => "fresh",
        StoreState::HeaderOnly => "header_only",
        StoreState::HasResults => "has_results",
    }
}

/// Report the state, header and verified extent of a checkpoint
pub fn inspect(config: &StoreConfig) -> CliResult<Value> {
    let mut store = open_existing(config)?;
    let state = match store.state() {
        Ok(state) => state_name(state),
        Err(e) if e.is_corruption() => "corrupt_header",
        Err(e) => return Err(e.into()),
    };

    let (header, header_error) = match store.load_options() {
        Ok(options) => (serde_json::to_value(options)?, Value::Null),
        Err(e) if e.is_corruption() => (Value::Null, Value::String(e.to_string())),
        Err(e) => return Err(e.into()),
    };
    let report = store.replay_report()?;

    Ok(json!({
        "path": store.path().display().to_string(),
        "state": state,
        "existing": store.existing_checkpoint(),
        "header": header,
        "header_error": header_error,
        "header_bytes": report.header_bytes,
        "records": report.records.len(),
        "verified_bytes": report.verified_bytes,
        "file_len": report.file_len,
        "clean": report.is_clean(),
        "corruption": report.corruption.as_ref().map(|e| e.to_string()),
        "ts": now(),
    }))
}

/// List completed work ids in file order
pub fn ids(config: &StoreConfig) -> CliResult<Value> {
    let mut store = open_existing(config)?;
    let ids = store.completed_work_ids()?;
    Ok(json!({
        "path": store.path().display().to_string(),
        "work_ids": ids,
    }))
}

/// Compact the checkpoint as the coordinator
pub fn compact(config: &StoreConfig) -> CliResult<Value> {
    let mut store = open_existing(config)?;
    let outcome = Compactor::compact(&mut store, CompactionRole::Coordinator)?;
    let path = store.path().display().to_string();
    Ok(match outcome {
        CompactionOutcome::Skipped(reason) => json!({
            "path": path,
            "compacted": false,
            "reason": reason.as_str(),
        }),
        CompactionOutcome::Compacted {
            records,
            bytes_dropped,
        } => json!({
            "path": path,
            "compacted": true,
            "records": records,
            "bytes_dropped": bytes_dropped,
        }),
    })
}

/// Append `count` records with ids starting at `work_id`
///
/// A fresh checkpoint first gets a default header naming the prefix. Ids
/// stop at `u64::MAX`; the report counts the records actually appended.
pub fn append(config: &StoreConfig, work_id: u64, count: u64, payload: &[u8]) -> CliResult<Value> {
    let mut store = RunCheckpoint::open_with(config.clone())?;
    let header = RunOptions {
        prefix: config.prefix.clone(),
        ..RunOptions::default()
    };
    let header_written = store.save_options(&header)?;

    let mut bytes = 0;
    let mut appended = 0u64;
    for id in (0..count).map_while(|i| work_id.checked_add(i)) {
        bytes += store.append(&ResultRecord::new(id, payload))?;
        appended += 1;
    }

    Ok(json!({
        "path": store.path().display().to_string(),
        "header_written": header_written,
        "appended": appended,
        "bytes": bytes,
    }))
}
