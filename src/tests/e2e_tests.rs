// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Store -> watcher -> block log, with a toy transfer executor.

use crate::capture::{FieldValue, MemoryStateStore, Watcher};
use crate::chain::{BlockTransaction, SignedBlock};
use crate::config::TRUNK_BRANCH;
use crate::log::{BlockLog, ChangeKind, OperationData, TransactionReceipt};
use serde_json::json;
use std::sync::Arc;

fn transfer_trx(seed: u8, from: &str, to: &str, amount: u64) -> BlockTransaction {
    BlockTransaction {
        trx_id: vec![seed; 32],
        receipt: TransactionReceipt::success(),
        operations: vec![OperationData::new(
            "transfer",
            json!({"from": from, "to": to, "amount": amount}),
        )],
    }
}

fn balance(store: &MemoryStateStore, branch: &str, name: &str) -> u64 {
    store
        .get(branch, "Account", &name.into(), "Balance")
        .and_then(|v| v.as_u64())
        .unwrap_or(0)
}

/// Applies `block` on a speculative branch, committing it only when every
/// transaction succeeds.
fn apply(store: &MemoryStateStore, watcher: &Watcher, block: &SignedBlock) -> Option<Arc<BlockLog>> {
    watcher.begin_block(block.num).unwrap();
    let branch = format!("apply-{}", block.num);
    let ctx = watcher.new_state_change_context(&branch, "", None, "");

    let mut ok = true;
    for trx in &block.transactions {
        for (op_idx, op) in trx.operations.iter().enumerate() {
            ctx.set_trx_and_operation(&trx.id_hex(), Some(op_idx));
            let from = op.data["from"].as_str().unwrap_or_default();
            let to = op.data["to"].as_str().unwrap_or_default();
            let amount = op.data["amount"].as_u64().unwrap_or_default();

            let have = balance(store, &branch, from);
            if have < amount {
                ok = false;
                break;
            }
            store.put(&branch, "Account", from.into(), "Balance", FieldValue::UInt(have - amount));
            let dest = balance(store, &branch, to);
            store.put(&branch, "Account", to.into(), "Balance", FieldValue::UInt(dest + amount));
        }
    }

    if ok {
        store.commit_branch(&branch);
    } else {
        store.discard_branch(&branch);
    }
    watcher.end_block(ok, block).unwrap()
}

fn seeded() -> (MemoryStateStore, Arc<Watcher>) {
    let store = MemoryStateStore::new();
    for (name, amount) in [("A", 10u64), ("B", 0), ("C", 20), ("D", 5)] {
        store.put(TRUNK_BRANCH, "Account", name.into(), "Balance", amount.into());
    }
    let watcher = Arc::new(Watcher::new(None));
    watcher.attach(&store);
    (store, watcher)
}

#[test]
fn test_two_transfers_in_one_block() {
    let (store, watcher) = seeded();
    let block = SignedBlock {
        id: vec![5; 32],
        num: 5,
        timestamp: 1_700_000_005,
        transactions: vec![transfer_trx(1, "A", "B", 1), transfer_trx(2, "C", "D", 2)],
    };

    let log = apply(&store, &watcher, &block).unwrap();

    assert_eq!(log.block_num, 5);
    assert_eq!(log.transactions.len(), 2);
    assert!(log.changes.is_empty());

    let expect = [[("A", 10, 9), ("B", 0, 1)], [("C", 20, 18), ("D", 5, 7)]];
    for (trx, expected) in log.transactions.iter().zip(expect) {
        assert_eq!(trx.operations.len(), 1);
        let op = &trx.operations[0];
        assert_eq!(op.op.op_type, "transfer");
        assert_eq!(op.changes.len(), 2);
        for (change, (id, before, after)) in op.changes.iter().zip(expected) {
            assert_eq!(change.what, "Account.Balance");
            assert_eq!(change.kind, ChangeKind::Update);
            assert_eq!(change.cause, "");
            assert_eq!(change.change.id, json!(id));
            assert_eq!(change.change.before, json!(before));
            assert_eq!(change.change.after, json!(after));
        }
    }

    assert_eq!(balance(&store, TRUNK_BRANCH, "D"), 7);
}

#[test]
fn test_failed_block_leaves_no_trace() {
    let (store, watcher) = seeded();
    let bad = SignedBlock {
        id: vec![6; 32],
        num: 6,
        timestamp: 1_700_000_006,
        transactions: vec![transfer_trx(1, "A", "B", 1), transfer_trx(2, "B", "C", 100)],
    };

    assert!(apply(&store, &watcher, &bad).is_none());
    assert_eq!(balance(&store, TRUNK_BRANCH, "A"), 10);

    // the next block starts from a clean slate
    let good = SignedBlock {
        id: vec![6; 32],
        num: 6,
        timestamp: 1_700_000_006,
        transactions: vec![transfer_trx(3, "C", "A", 4)],
    };
    let log = apply(&store, &watcher, &good).unwrap();
    assert_eq!(log.change_count(), 2);
    assert_eq!(log.transactions[0].operations[0].changes[1].change.after, json!(14));
}

#[test]
fn test_changes_outside_a_block_are_ignored() {
    let (store, watcher) = seeded();
    store.put(TRUNK_BRANCH, "Account", "A".into(), "Balance", 99u64.into());

    watcher.begin_block(7).unwrap();
    let block = SignedBlock { id: vec![7; 32], num: 7, ..Default::default() };
    let log = watcher.end_block(true, &block).unwrap().unwrap();
    assert_eq!(log.change_count(), 0);
}

#[test]
fn test_block_log_json_survives_store() {
    let (store, watcher) = seeded();
    let block = SignedBlock {
        id: vec![8; 32],
        num: 8,
        timestamp: 1_700_000_008,
        transactions: vec![transfer_trx(9, "A", "C", 3)],
    };
    let log = apply(&store, &watcher, &block).unwrap();
    let text = log.to_json_string().unwrap();
    assert_eq!(BlockLog::from_json_str(&text).unwrap(), *log);
}
