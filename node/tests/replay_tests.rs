// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
mod common;

use chainlog_kernel::error::{ProcessorError, ProcessorResult};
use chainlog_kernel::log::{BlockLog, StateChange};
use chainlog_kernel::processor::{BlockLogProcessor, OpIndex, StopSignal};
use chainlog_node::block_store::{self, BlockLogRecord};
use chainlog_node::db;
use chainlog_node::processors::{HolderProcessor, TransferProcessor};
use chainlog_node::progress;
use chainlog_node::replay::{replay_group, BatchEnd};
use common::*;
use rusqlite::Connection;

/// Holder projection that fails once, after writing, at `fail_at`.
struct FailOnce {
    inner: HolderProcessor,
    fail_at: u64,
    failed: bool,
}

impl BlockLogProcessor<Connection> for FailOnce {
    fn prepare(&mut self, db: &Connection, block_log: &BlockLog) -> ProcessorResult {
        self.inner.prepare(db, block_log)
    }

    fn process_change(
        &mut self,
        db: &Connection,
        change: &StateChange,
        block_log: &BlockLog,
        change_idx: usize,
        at: Option<OpIndex>,
    ) -> ProcessorResult {
        self.inner.process_change(db, change, block_log, change_idx, at)
    }

    fn finalize(&mut self, _db: &Connection, block_log: &BlockLog) -> ProcessorResult {
        if block_log.block_num == self.fail_at && !self.failed {
            self.failed = true;
            return Err(ProcessorError::malformed("injected failure"));
        }
        Ok(())
    }
}

/// Holder projection that asks to stop in the middle of a block.
struct StopMidway {
    inner: HolderProcessor,
    stop: StopSignal,
}

impl BlockLogProcessor<Connection> for StopMidway {
    fn prepare(&mut self, db: &Connection, block_log: &BlockLog) -> ProcessorResult {
        self.inner.prepare(db, block_log)
    }

    fn process_change(
        &mut self,
        db: &Connection,
        change: &StateChange,
        block_log: &BlockLog,
        change_idx: usize,
        at: Option<OpIndex>,
    ) -> ProcessorResult {
        self.inner.process_change(db, change, block_log, change_idx, at)?;
        self.stop.request();
        Ok(())
    }
}

fn balance(conn: &Connection, name: &str) -> Option<i64> {
    conn.query_row("SELECT balance FROM holders WHERE name = ?1", [name], |row| row.get(0))
        .ok()
}

fn seed_transfers(conn: &Connection) {
    store_final(conn, &transfer_block(1, &[("alice", "bob", 10, 100, 0)]));
    store_final(conn, &transfer_block(2, &[("bob", "carol", 4, 10, 0)]));
    store_final(conn, &transfer_block(3, &[("alice", "carol", 5, 90, 4)]));
}

#[test]
fn test_replay_advances_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let mut conn = open(&dir.path().join("replay.db"));
    seed_transfers(&conn);

    let mut group = progress::ensure(&conn, "holders").unwrap();
    let report = replay_group(&mut conn, &mut HolderProcessor::new(), &mut group, 100, &StopSignal::new());

    assert_eq!(report.replayed, 3);
    assert_eq!(report.end, BatchEnd::CaughtUp);
    assert_eq!(group.block_height, 3);
    assert_eq!(progress::load(&conn, "holders").unwrap().unwrap().block_height, 3);

    assert_eq!(balance(&conn, "alice"), Some(85));
    assert_eq!(balance(&conn, "bob"), Some(6));
    assert_eq!(balance(&conn, "carol"), Some(9));
}

#[test]
fn test_batch_window_limits_replay() {
    let dir = tempfile::tempdir().unwrap();
    let mut conn = open(&dir.path().join("replay.db"));
    store_final_range(&conn, 1..=5);

    let mut group = progress::ensure(&conn, "holders").unwrap();
    let mut processor = HolderProcessor::new();
    let stop = StopSignal::new();

    let report = replay_group(&mut conn, &mut processor, &mut group, 2, &stop);
    assert_eq!((report.replayed, report.end), (2, BatchEnd::Exhausted));
    assert_eq!(group.block_height, 2);

    let report = replay_group(&mut conn, &mut processor, &mut group, 2, &stop);
    assert_eq!((report.replayed, report.end), (2, BatchEnd::Exhausted));

    let report = replay_group(&mut conn, &mut processor, &mut group, 2, &stop);
    assert_eq!((report.replayed, report.end), (1, BatchEnd::CaughtUp));
    assert_eq!(group.block_height, 5);
}

#[test]
fn test_replay_waits_for_finality() {
    let dir = tempfile::tempdir().unwrap();
    let mut conn = open(&dir.path().join("replay.db"));
    store_final_range(&conn, 1..=2);
    let pending = BlockLogRecord::from_log(&empty_block(3), "w", false).unwrap();
    block_store::insert(&conn, &pending).unwrap();
    store_final(&conn, &empty_block(4));

    let mut group = progress::ensure(&conn, "holders").unwrap();
    let report = replay_group(&mut conn, &mut HolderProcessor::new(), &mut group, 100, &StopSignal::new());

    assert_eq!(report.replayed, 2);
    assert_eq!(report.end, BatchEnd::CaughtUp);
    assert_eq!(group.block_height, 2);

    block_store::mark_final(&mut conn, &[block_id(3)]).unwrap();
    let report = replay_group(&mut conn, &mut HolderProcessor::new(), &mut group, 100, &StopSignal::new());
    assert_eq!(report.replayed, 2);
    assert_eq!(group.block_height, 4);
}

#[test]
fn test_undecodable_log_fails_batch() {
    let dir = tempfile::tempdir().unwrap();
    let mut conn = open(&dir.path().join("replay.db"));
    let mut broken = BlockLogRecord::from_log(&empty_block(1), "w", true).unwrap();
    broken.json_log = "{not json".to_string();
    block_store::insert(&conn, &broken).unwrap();

    let mut group = progress::ensure(&conn, "holders").unwrap();
    let report = replay_group(&mut conn, &mut HolderProcessor::new(), &mut group, 100, &StopSignal::new());

    assert_eq!((report.replayed, report.end), (0, BatchEnd::Failed));
    assert_eq!(progress::load(&conn, "holders").unwrap().unwrap().block_height, 0);
}

#[test]
fn test_failed_block_rolls_back_writes_and_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let mut conn = open(&dir.path().join("flaky.db"));
    seed_transfers(&conn);

    let mut group = progress::ensure(&conn, "holders").unwrap();
    let mut flaky = FailOnce {
        inner: HolderProcessor::new(),
        fail_at: 2,
        failed: false,
    };
    let stop = StopSignal::new();

    let report = replay_group(&mut conn, &mut flaky, &mut group, 100, &stop);
    assert_eq!((report.replayed, report.end), (1, BatchEnd::Failed));
    assert_eq!(group.block_height, 1);
    assert_eq!(progress::load(&conn, "holders").unwrap().unwrap().block_height, 1);
    // block 2 credited carol before failing
    assert_eq!(balance(&conn, "carol"), None);
    assert_eq!(balance(&conn, "bob"), Some(10));

    // the retry picks up at the failed height
    let report = replay_group(&mut conn, &mut flaky, &mut group, 100, &stop);
    assert_eq!((report.replayed, report.end), (2, BatchEnd::CaughtUp));

    let clean_dir = tempfile::tempdir().unwrap();
    let mut clean = open(&clean_dir.path().join("clean.db"));
    seed_transfers(&clean);
    let mut clean_group = progress::ensure(&clean, "holders").unwrap();
    replay_group(&mut clean, &mut HolderProcessor::new(), &mut clean_group, 100, &stop);

    assert_eq!(fingerprint(&conn, "holders"), fingerprint(&clean, "holders"));
}

#[test]
fn test_amount_beyond_sqlite_range_fails_block() {
    let dir = tempfile::tempdir().unwrap();
    let mut conn = open(&dir.path().join("replay.db"));
    store_final(&conn, &transfer_block(1, &[("alice", "bob", 10, 100, 0)]));
    let mut whale = empty_block(2);
    whale.changes.push(balance_change("whale", 0, u64::MAX - 1));
    store_final(&conn, &whale);

    let mut group = progress::ensure(&conn, "holders").unwrap();
    let report = replay_group(&mut conn, &mut HolderProcessor::new(), &mut group, 100, &StopSignal::new());

    assert_eq!((report.replayed, report.end), (1, BatchEnd::Failed));
    assert_eq!(progress::load(&conn, "holders").unwrap().unwrap().block_height, 1);
    assert_eq!(balance(&conn, "whale"), None);
    assert_eq!(balance(&conn, "alice"), Some(90));
}

#[test]
fn test_transfer_amount_beyond_sqlite_range_fails_block() {
    let dir = tempfile::tempdir().unwrap();
    let mut conn = open(&dir.path().join("replay.db"));
    store_final(&conn, &transfer_block(1, &[("alice", "bob", u64::MAX - 1, u64::MAX, 0)]));

    let mut group = progress::ensure(&conn, "transfers").unwrap();
    let report = replay_group(&mut conn, &mut TransferProcessor::new(), &mut group, 100, &StopSignal::new());

    assert_eq!((report.replayed, report.end), (0, BatchEnd::Failed));
    assert_eq!(group.block_height, 0);
    assert!(!db::table_exists(&conn, "transfer_records").unwrap());
}

#[test]
fn test_stop_before_batch() {
    let dir = tempfile::tempdir().unwrap();
    let mut conn = open(&dir.path().join("replay.db"));
    store_final_range(&conn, 1..=3);

    let mut group = progress::ensure(&conn, "holders").unwrap();
    let stop = StopSignal::new();
    stop.request();
    let report = replay_group(&mut conn, &mut HolderProcessor::new(), &mut group, 100, &stop);

    assert_eq!((report.replayed, report.end), (0, BatchEnd::Stopped));
    assert_eq!(group.block_height, 0);
}

#[test]
fn test_stop_mid_block_keeps_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut conn = open(&dir.path().join("replay.db"));
    seed_transfers(&conn);

    let stop = StopSignal::new();
    let mut processor = StopMidway {
        inner: HolderProcessor::new(),
        stop: stop.clone(),
    };
    let mut group = progress::ensure(&conn, "holders").unwrap();
    let report = replay_group(&mut conn, &mut processor, &mut group, 100, &stop);

    assert_eq!((report.replayed, report.end), (0, BatchEnd::Stopped));
    // even the table created in prepare was rolled back
    assert!(!db::table_exists(&conn, "holders").unwrap());
    assert_eq!(progress::load(&conn, "holders").unwrap().unwrap().block_height, 0);
}
