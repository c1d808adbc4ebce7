//! Compaction Tests
//!
//! Tests for:
//! - Compaction keeps the header and every verified record, drops the tail
//! - Appends are refused behind a damaged tail until compaction removes it
//! - Only a coordinator compacts, and only a pre-existing checkpoint
//! - Other handles follow the replaced file on their next operation
//! - A leftover backup blocks compaction and leaves the checkpoint alone

use ckplog::checkpoint::{
    CompactionOutcome, CompactionRole, Compactor, ResultRecord, RunCheckpoint, RunOptions,
    SkipReason, StoreConfig,
};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

fn create_temp_data_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

fn store_config(temp_dir: &TempDir) -> StoreConfig {
    StoreConfig::new(temp_dir.path().join("ml_search").display().to_string())
}

fn open_store(temp_dir: &TempDir) -> RunCheckpoint {
    RunCheckpoint::open_with(store_config(temp_dir)).unwrap()
}

fn run_options() -> RunOptions {
    RunOptions {
        msa_filename: "ml_search.fasta".to_string(),
        model_string: "LG+G4".to_string(),
        seed: 1234,
        min_roots: 3,
        root_ratio: 0.05,
        ..RunOptions::default()
    }
}

fn record(work_id: u64) -> ResultRecord {
    ResultRecord::new(work_id, vec![work_id as u8; 16])
}

/// Header, five records and a garbage tail of `tail` bytes
fn seed_damaged_checkpoint(temp_dir: &TempDir, tail: usize) -> u64 {
    {
        let mut store = open_store(temp_dir);
        store.save_options(&run_options()).unwrap();
        for id in 0..5 {
            store.append(&record(id)).unwrap();
        }
    }
    let path = store_config(temp_dir).checkpoint_path();
    let clean_len = fs::metadata(&path).unwrap().len();
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&vec![0x5A; tail]).unwrap();
    clean_len
}

// =============================================================================
// Compaction Result
// =============================================================================

#[test]
fn test_compaction_drops_garbage_tail() {
    let temp_dir = create_temp_data_dir();
    let clean_len = seed_damaged_checkpoint(&temp_dir, 10);

    let mut store = open_store(&temp_dir);
    let outcome = Compactor::compact(&mut store, CompactionRole::Coordinator).unwrap();
    assert_eq!(
        outcome,
        CompactionOutcome::Compacted {
            records: 5,
            bytes_dropped: 10
        }
    );

    let config = store_config(&temp_dir);
    assert_eq!(fs::metadata(config.checkpoint_path()).unwrap().len(), clean_len);
    assert!(!config.backup_path().exists());

    let mut reloaded = open_store(&temp_dir);
    assert_eq!(reloaded.load_options().unwrap(), Some(run_options()));
    let records = reloaded.replay().unwrap();
    assert_eq!(records, (0..5).map(record).collect::<Vec<_>>());
    assert!(reloaded.replay_report().unwrap().is_clean());
}

#[test]
fn test_compacted_file_keeps_creation_mode() {
    let temp_dir = create_temp_data_dir();
    seed_damaged_checkpoint(&temp_dir, 3);

    let mut store = open_store(&temp_dir);
    Compactor::compact(&mut store, CompactionRole::Coordinator).unwrap();

    let mode = fs::metadata(store.path()).unwrap().permissions().mode();
    // umask may only clear bits
    assert_eq!(mode & 0o777 & !0o640, 0);
}

#[test]
fn test_append_behind_damaged_tail_waits_for_compaction() {
    let temp_dir = create_temp_data_dir();
    let clean_len = seed_damaged_checkpoint(&temp_dir, 7);
    let path = store_config(&temp_dir).checkpoint_path();
    let damaged = fs::read(&path).unwrap();

    let mut store = open_store(&temp_dir);
    let err = store.append(&record(5)).unwrap_err();
    assert!(err.is_corruption());
    assert_eq!(fs::read(&path).unwrap(), damaged);

    let outcome = Compactor::compact(&mut store, CompactionRole::Coordinator).unwrap();
    assert_eq!(
        outcome,
        CompactionOutcome::Compacted {
            records: 5,
            bytes_dropped: 7
        }
    );
    assert_eq!(fs::metadata(&path).unwrap().len(), clean_len);

    store.append(&record(5)).unwrap();
    assert_eq!(
        open_store(&temp_dir).completed_work_ids().unwrap(),
        vec![0, 1, 2, 3, 4, 5]
    );
}

#[test]
fn test_appends_after_compaction_are_replayed() {
    let temp_dir = create_temp_data_dir();
    seed_damaged_checkpoint(&temp_dir, 21);

    let mut store = open_store(&temp_dir);
    Compactor::compact(&mut store, CompactionRole::Coordinator).unwrap();
    store.append(&record(99)).unwrap();

    assert_eq!(
        open_store(&temp_dir).completed_work_ids().unwrap(),
        vec![0, 1, 2, 3, 4, 99]
    );
}

// =============================================================================
// Who Compacts
// =============================================================================

#[test]
fn test_worker_leaves_file_untouched() {
    let temp_dir = create_temp_data_dir();
    seed_damaged_checkpoint(&temp_dir, 10);
    let path = store_config(&temp_dir).checkpoint_path();
    let before = fs::read(&path).unwrap();

    let mut store = open_store(&temp_dir);
    let outcome = Compactor::compact(&mut store, CompactionRole::Worker).unwrap();
    assert_eq!(outcome, CompactionOutcome::Skipped(SkipReason::NotCoordinator));
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn test_checkpoint_created_by_this_run_is_not_compacted() {
    let temp_dir = create_temp_data_dir();
    let mut store = open_store(&temp_dir);
    store.save_options(&run_options()).unwrap();
    store.append(&record(1)).unwrap();

    let outcome = Compactor::compact(&mut store, CompactionRole::Coordinator).unwrap();
    assert_eq!(
        outcome,
        CompactionOutcome::Skipped(SkipReason::NoExistingCheckpoint)
    );
}

// =============================================================================
// Peer Handles
// =============================================================================

#[test]
fn test_peer_handle_follows_compacted_file() {
    let temp_dir = create_temp_data_dir();
    seed_damaged_checkpoint(&temp_dir, 10);

    let mut peer = open_store(&temp_dir);
    let mut coordinator = open_store(&temp_dir);
    let before = peer.identity().unwrap();

    Compactor::compact(&mut coordinator, CompactionRole::Coordinator).unwrap();
    assert!(peer.is_stale().unwrap());
    assert!(!coordinator.is_stale().unwrap());

    // Next locked operation reopens the path
    peer.append(&record(5)).unwrap();
    assert!(!peer.is_stale().unwrap());
    assert_ne!(peer.identity().unwrap(), before);

    assert_eq!(
        coordinator.completed_work_ids().unwrap(),
        vec![0, 1, 2, 3, 4, 5]
    );
}

#[test]
fn test_explicit_reload_after_compaction() {
    let temp_dir = create_temp_data_dir();
    seed_damaged_checkpoint(&temp_dir, 10);

    let mut peer = open_store(&temp_dir);
    let mut coordinator = open_store(&temp_dir);
    Compactor::compact(&mut coordinator, CompactionRole::Coordinator).unwrap();

    peer.reload().unwrap();
    assert!(!peer.is_stale().unwrap());
    assert!(peer.replay_report().unwrap().is_clean());
}

// =============================================================================
// Failure
// =============================================================================

#[test]
fn test_leftover_backup_blocks_compaction() {
    let temp_dir = create_temp_data_dir();
    seed_damaged_checkpoint(&temp_dir, 10);
    let config = store_config(&temp_dir);
    fs::write(config.backup_path(), b"").unwrap();
    let before = fs::read(config.checkpoint_path()).unwrap();

    let mut store = open_store(&temp_dir);
    let err = Compactor::compact(&mut store, CompactionRole::Coordinator).unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.code().code(), "CKP_COMPACTION_FAILED");
    assert_eq!(fs::read(config.checkpoint_path()).unwrap(), before);

    // Removing the leftover lets the next attempt through
    fs::remove_file(config.backup_path()).unwrap();
    let outcome = Compactor::compact(&mut store, CompactionRole::Coordinator).unwrap();
    assert!(matches!(outcome, CompactionOutcome::Compacted { records: 5, .. }));
}
