// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Latest balances per account or contract, fed by balance-like changes.

use crate::processors::sql_int;
use crate::tables::register_table_pattern;
use chainlog_kernel::error::{ProcessorError, ProcessorResult};
use chainlog_kernel::log::{BlockLog, StateChange};
use chainlog_kernel::processor::{BlockLogProcessor, OpIndex};
use rusqlite::{params, Connection};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS holders (
    name TEXT PRIMARY KEY,
    is_contract INTEGER NOT NULL DEFAULT 0,
    balance INTEGER NOT NULL DEFAULT 0,
    vest INTEGER NOT NULL DEFAULT 0,
    stake_vest_from_me INTEGER NOT NULL DEFAULT 0,
    borrowed_vest INTEGER NOT NULL DEFAULT 0,
    lent_vest INTEGER NOT NULL DEFAULT 0,
    delivering_vest INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_holders_balance ON holders(balance);
CREATE INDEX IF NOT EXISTS idx_holders_vest ON holders(vest);
";

fn column_of(what: &str) -> Option<&'static str> {
    match what {
        "Account.Balance" | "Contract.Balance" => Some("balance"),
        "Account.Vest" => Some("vest"),
        "Account.StakeVestFromMe" => Some("stake_vest_from_me"),
        "Account.BorrowedVest" => Some("borrowed_vest"),
        "Account.LentVest" => Some("lent_vest"),
        "Account.DeliveringVest" => Some("delivering_vest"),
        _ => None,
    }
}

/// The table is declared in every `prepare`, inside the replay transaction,
/// so its creation rolls back together with a failed block.
#[derive(Default)]
pub struct HolderProcessor;

impl HolderProcessor {
    pub fn new() -> Self {
        register_table_pattern("holders");
        Self
    }
}

impl BlockLogProcessor<Connection> for HolderProcessor {
    fn prepare(&mut self, db: &Connection, _block_log: &BlockLog) -> ProcessorResult {
        db.execute_batch(SCHEMA).map_err(ProcessorError::storage)
    }

    fn process_change(
        &mut self,
        db: &Connection,
        change: &StateChange,
        _block_log: &BlockLog,
        _change_idx: usize,
        _at: Option<OpIndex>,
    ) -> ProcessorResult {
        let Some(column) = column_of(&change.what) else {
            return Ok(());
        };
        let name = change
            .change
            .id
            .as_str()
            .ok_or_else(|| ProcessorError::malformed(format!("{} id is not a name: {}", change.what, change.change.id)))?;
        let value = change
            .change
            .after
            .as_u64()
            .ok_or_else(|| ProcessorError::malformed(format!("{} of {} is not an amount", change.what, name)))?;

        db.execute(
            &format!(
                "INSERT INTO holders (name, is_contract, {col}) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET is_contract = excluded.is_contract, {col} = excluded.{col}",
                col = column
            ),
            params![name, change.what == "Contract.Balance", sql_int(value, &change.what)?],
        )
        .map_err(ProcessorError::storage)?;
        Ok(())
    }
}
