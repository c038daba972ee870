// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
#![allow(dead_code)]

use chainlog_kernel::log::{
    BlockLog, ChangeKind, GenericChange, OperationData, OperationLog, StateChange, TransactionLog, TransactionReceipt,
};
use chainlog_node::block_store::{self, BlockLogRecord};
use chainlog_node::config::NodeConfig;
use chainlog_node::{db, progress};
use rusqlite::Connection;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

pub fn temp_config() -> (TempDir, NodeConfig) {
    let dir = tempfile::tempdir().unwrap();
    let cfg = NodeConfig {
        db_path: dir.path().join("chainlog.db"),
        replay_delay: Duration::from_millis(20),
        ..NodeConfig::default()
    };
    (dir, cfg)
}

pub fn open(path: &Path) -> Connection {
    let conn = db::open(path, Duration::from_secs(5)).unwrap();
    block_store::ensure_schema(&conn).unwrap();
    progress::ensure_schema(&conn).unwrap();
    conn
}

pub fn block_id(height: u64) -> String {
    format!("{:064x}", height)
}

pub fn balance_change(name: &str, before: u64, after: u64) -> StateChange {
    StateChange {
        what: "Account.Balance".to_string(),
        kind: ChangeKind::Update,
        cause: String::new(),
        cause_extra: BTreeMap::new(),
        change: GenericChange::new(name, before, after),
    }
}

/// A block with one successful transfer per `(from, to, amount)`, each
/// carrying the two balance changes it caused.
pub fn transfer_block(height: u64, transfers: &[(&str, &str, u64, u64, u64)]) -> BlockLog {
    let transactions = transfers
        .iter()
        .enumerate()
        .map(|(i, (from, to, amount, from_before, to_before))| TransactionLog {
            trx_id: format!("{:060x}{:04x}", height, i),
            receipt: TransactionReceipt::success(),
            operations: vec![OperationLog {
                op: OperationData::new("transfer", json!({"from": from, "to": to, "amount": amount, "memo": "m"})),
                changes: vec![
                    balance_change(from, *from_before, from_before - amount),
                    balance_change(to, *to_before, to_before + amount),
                ],
            }],
        })
        .collect();
    BlockLog {
        block_id: block_id(height),
        block_num: height,
        block_time: 1_700_000_000 + height as u32,
        transactions,
        changes: Vec::new(),
    }
}

pub fn empty_block(height: u64) -> BlockLog {
    BlockLog {
        block_id: block_id(height),
        block_num: height,
        block_time: 1_700_000_000 + height as u32,
        ..Default::default()
    }
}

pub fn store_final(conn: &Connection, log: &BlockLog) {
    let record = BlockLogRecord::from_log(log, "witness", true).unwrap();
    assert!(block_store::insert(conn, &record).unwrap());
}

pub fn store_final_range(conn: &Connection, heights: std::ops::RangeInclusive<u64>) {
    for height in heights {
        store_final(conn, &empty_block(height));
    }
}

/// Blake3 over every row of `table`, in primary-key order.
pub fn fingerprint(conn: &Connection, table: &str) -> String {
    let mut stmt = conn.prepare(&format!("SELECT * FROM {} ORDER BY 1", table)).unwrap();
    let columns = stmt.column_count();
    let mut hasher = blake3::Hasher::new();
    let mut rows = stmt.query([]).unwrap();
    while let Some(row) = rows.next().unwrap() {
        for i in 0..columns {
            let value: rusqlite::types::Value = row.get(i).unwrap();
            hasher.update(format!("{:?}|", value).as_bytes());
        }
        hasher.update(b"\n");
    }
    hasher.finalize().to_hex().to_string()
}

pub fn wait_for(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    check()
}
