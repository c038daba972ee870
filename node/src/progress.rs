// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Per-group replay checkpoints.
//!
//! A row is only ever written by the worker replaying its group, inside the
//! same transaction as that group's projected writes.

use crate::db::sql_int;
use crate::errors::Result;
use crate::tables::register_table_pattern;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

/// Finish time given to freshly registered groups.
pub const GENESIS_TIME: i64 = 0;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS progress (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    processor TEXT NOT NULL UNIQUE,
    block_height INTEGER NOT NULL,
    fast_forward INTEGER NOT NULL,
    finish_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_progress_fast_forward ON progress(fast_forward);
";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub processor: String,
    /// Highest height fully replayed and committed.
    pub block_height: u64,
    /// Still catching up from genesis.
    pub fast_forward: bool,
    pub finish_at: DateTime<Utc>,
}

impl Progress {
    pub fn genesis(processor: &str) -> Self {
        Self {
            processor: processor.to_string(),
            block_height: 0,
            fast_forward: true,
            finish_at: DateTime::from_timestamp(GENESIS_TIME, 0).unwrap_or_default(),
        }
    }

    /// Copy advanced to `height`, stamped now.
    pub fn advanced_to(&self, height: u64) -> Self {
        Self {
            block_height: height,
            finish_at: Utc::now(),
            ..self.clone()
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            processor: row.get(0)?,
            block_height: row.get(1)?,
            fast_forward: row.get(2)?,
            finish_at: row.get(3)?,
        })
    }
}

pub fn ensure_schema(conn: &Connection) -> Result<()> {
    register_table_pattern("progress");
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Loads the row of `processor`, creating a genesis row if absent.
pub fn ensure(conn: &Connection, processor: &str) -> Result<Progress> {
    if let Some(existing) = load(conn, processor)? {
        return Ok(existing);
    }
    let fresh = Progress::genesis(processor);
    conn.execute(
        "INSERT OR IGNORE INTO progress (processor, block_height, fast_forward, finish_at) VALUES (?1, ?2, ?3, ?4)",
        params![fresh.processor, sql_int(fresh.block_height)?, fresh.fast_forward, fresh.finish_at],
    )?;
    tracing::info!("Registered processor group '{}' at genesis", processor);
    Ok(load(conn, processor)?.unwrap_or(fresh))
}

pub fn load(conn: &Connection, processor: &str) -> Result<Option<Progress>> {
    let progress = conn
        .query_row(
            "SELECT processor, block_height, fast_forward, finish_at FROM progress WHERE processor = ?1",
            [processor],
            Progress::from_row,
        )
        .optional()?;
    Ok(progress)
}

pub fn save(conn: &Connection, progress: &Progress) -> Result<()> {
    conn.execute(
        "UPDATE progress SET block_height = ?2, fast_forward = ?3, finish_at = ?4 WHERE processor = ?1",
        params![
            progress.processor,
            sql_int(progress.block_height)?,
            progress.fast_forward,
            progress.finish_at,
        ],
    )?;
    Ok(())
}

pub fn list(conn: &Connection) -> Result<Vec<Progress>> {
    let mut stmt = conn.prepare("SELECT processor, block_height, fast_forward, finish_at FROM progress ORDER BY id")?;
    let rows = stmt.query_map([], Progress::from_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Groups in the given lifecycle phase, in registration order.
pub fn list_by_mode(conn: &Connection, fast_forward: bool) -> Result<Vec<Progress>> {
    let mut stmt = conn.prepare(
        "SELECT processor, block_height, fast_forward, finish_at FROM progress WHERE fast_forward = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map([fast_forward], Progress::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
