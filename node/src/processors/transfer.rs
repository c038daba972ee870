// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! One row per successful `transfer` operation.

use crate::processors::sql_int;
use crate::tables::register_table_pattern;
use chainlog_kernel::error::{ProcessorError, ProcessorResult};
use chainlog_kernel::log::BlockLog;
use chainlog_kernel::processor::{BlockLogProcessor, OpIndex};
use rusqlite::{params, Connection};
use serde::Deserialize;

/// Longest memo kept, in characters.
pub const MEMO_CHARS_LIMIT: usize = 700;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS transfer_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    block_height INTEGER NOT NULL,
    operation_id TEXT NOT NULL UNIQUE,
    block_time INTEGER NOT NULL,
    sender TEXT NOT NULL,
    receiver TEXT NOT NULL,
    amount INTEGER NOT NULL,
    memo TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_transfer_records_height ON transfer_records(block_height);
CREATE INDEX IF NOT EXISTS idx_transfer_records_sender ON transfer_records(sender);
CREATE INDEX IF NOT EXISTS idx_transfer_records_receiver ON transfer_records(receiver);
";

#[derive(Debug, Deserialize)]
struct TransferOp {
    from: String,
    to: String,
    amount: u64,
    #[serde(default)]
    memo: String,
}

pub fn truncate_memo(memo: &str) -> String {
    memo.chars().take(MEMO_CHARS_LIMIT).collect()
}

/// The table is declared in every `prepare`, inside the replay transaction,
/// so its creation rolls back together with a failed block.
#[derive(Default)]
pub struct TransferProcessor;

impl TransferProcessor {
    pub fn new() -> Self {
        register_table_pattern("transfer_records");
        Self
    }
}

impl BlockLogProcessor<Connection> for TransferProcessor {
    fn prepare(&mut self, db: &Connection, _block_log: &BlockLog) -> ProcessorResult {
        db.execute_batch(SCHEMA).map_err(ProcessorError::storage)
    }

    fn process_operation(&mut self, db: &Connection, block_log: &BlockLog, at: OpIndex) -> ProcessorResult {
        let trx = block_log
            .transactions
            .get(at.trx)
            .ok_or_else(|| ProcessorError::malformed(format!("no transaction {}", at.trx)))?;
        if !trx.receipt.is_success() {
            return Ok(());
        }
        let op = trx
            .operations
            .get(at.op)
            .ok_or_else(|| ProcessorError::malformed(format!("no operation {} in {}", at.op, trx.trx_id)))?;
        if op.op.op_type != "transfer" {
            return Ok(());
        }

        let transfer: TransferOp = serde_json::from_value(op.op.data.clone())
            .map_err(|e| ProcessorError::malformed(format!("failed conversion to transfer: {}", e)))?;

        let block_height = sql_int(block_log.block_num, "block height")?;
        let amount = sql_int(transfer.amount, "transfer amount")?;
        db.execute(
            "INSERT INTO transfer_records (block_height, operation_id, block_time, sender, receiver, amount, memo)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                block_height,
                format!("{}_{}", trx.trx_id, at.op),
                i64::from(block_log.block_time),
                transfer.from,
                transfer.to,
                amount,
                truncate_memo(&transfer.memo),
            ],
        )
        .map_err(ProcessorError::storage)?;
        Ok(())
    }
}
