// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Block Log Store
//!
//! One row per produced block, keyed by block id.
//!
//! # Invariants
//! - Rows are inserted once; a duplicate block id is ignored
//! - `final` only ever goes from 0 to 1
//! - Replay reads `final = 1` rows only, one height at a time

use crate::db::sql_int;
use crate::errors::Result;
use crate::tables::register_table_pattern;
use chainlog_kernel::log::BlockLog;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

pub const BLOCK_LOG_TABLE: &str = "block_logs";

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS block_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    block_id TEXT NOT NULL UNIQUE,
    block_height INTEGER NOT NULL,
    block_time INTEGER NOT NULL,
    block_producer TEXT NOT NULL DEFAULT '',
    final INTEGER NOT NULL DEFAULT 0,
    json_log TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_block_logs_height ON block_logs(block_height);
CREATE INDEX IF NOT EXISTS idx_block_logs_final ON block_logs(final);
";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BlockLogRecord {
    pub block_id: String,
    pub block_height: u64,
    /// Seconds since the Unix epoch.
    pub block_time: u32,
    pub block_producer: String,
    pub is_final: bool,
    pub json_log: String,
}

impl BlockLogRecord {
    pub fn from_log(log: &BlockLog, producer: &str, is_final: bool) -> Result<Self> {
        Ok(Self {
            block_id: log.block_id.clone(),
            block_height: log.block_num,
            block_time: log.block_time,
            block_producer: producer.to_string(),
            is_final,
            json_log: log.to_json_string()?,
        })
    }

    pub fn decode(&self) -> Result<BlockLog> {
        Ok(BlockLog::from_json_str(&self.json_log)?)
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            block_id: row.get(0)?,
            block_height: row.get(1)?,
            block_time: row.get(2)?,
            block_producer: row.get(3)?,
            is_final: row.get(4)?,
            json_log: row.get(5)?,
        })
    }
}

pub fn ensure_schema(conn: &Connection) -> Result<()> {
    register_table_pattern(r"block_logs\w*");
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Inserts `record`. Returns `false` if a row with the same block id exists.
pub fn insert(conn: &Connection, record: &BlockLogRecord) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO block_logs (block_id, block_height, block_time, block_producer, final, json_log)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.block_id,
            sql_int(record.block_height)?,
            i64::from(record.block_time),
            record.block_producer,
            record.is_final,
            record.json_log,
        ],
    )?;
    Ok(inserted > 0)
}

/// Flips the given block ids to final in one transaction. Returns the number
/// of rows that changed.
pub fn mark_final(conn: &mut Connection, block_ids: &[String]) -> Result<usize> {
    if block_ids.is_empty() {
        return Ok(0);
    }
    let tx = conn.transaction()?;
    let mut changed = 0;
    {
        let mut stmt = tx.prepare("UPDATE block_logs SET final = 1 WHERE block_id = ?1 AND final = 0")?;
        for id in block_ids {
            changed += stmt.execute([id])?;
        }
    }
    tx.commit()?;
    Ok(changed)
}

const SELECT_COLUMNS: &str = "SELECT block_id, block_height, block_time, block_producer, final, json_log FROM block_logs";

/// The final record at `height`, the only way replay reads the store.
pub fn final_block_log(conn: &Connection, height: u64) -> Result<Option<BlockLogRecord>> {
    let record = conn
        .query_row(
            &format!("{} WHERE block_height = ?1 AND final = 1 LIMIT 1", SELECT_COLUMNS),
            [sql_int(height)?],
            BlockLogRecord::from_row,
        )
        .optional()?;
    Ok(record)
}

pub fn by_block_id(conn: &Connection, block_id: &str) -> Result<Option<BlockLogRecord>> {
    let record = conn
        .query_row(&format!("{} WHERE block_id = ?1", SELECT_COLUMNS), [block_id], BlockLogRecord::from_row)
        .optional()?;
    Ok(record)
}

/// Highest height stored, final or not.
pub fn latest_height(conn: &Connection) -> Result<Option<u64>> {
    let height: Option<u64> = conn.query_row("SELECT MAX(block_height) FROM block_logs", [], |row| row.get(0))?;
    Ok(height)
}

pub fn max_final_height(conn: &Connection) -> Result<Option<u64>> {
    let height: Option<u64> =
        conn.query_row("SELECT MAX(block_height) FROM block_logs WHERE final = 1", [], |row| row.get(0))?;
    Ok(height)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, height: u64, is_final: bool) -> BlockLogRecord {
        let log = BlockLog {
            block_id: id.to_string(),
            block_num: height,
            block_time: 1_000 + height as u32,
            ..Default::default()
        };
        BlockLogRecord::from_log(&log, "witness", is_final).unwrap()
    }

    fn store() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_insert_is_idempotent() {
        let conn = store();
        assert!(insert(&conn, &record("aa", 1, false)).unwrap());
        assert!(!insert(&conn, &record("aa", 1, true)).unwrap());
        assert!(!by_block_id(&conn, "aa").unwrap().unwrap().is_final);
    }

    #[test]
    fn test_only_final_rows_visible() {
        let mut conn = store();
        insert(&conn, &record("aa", 1, false)).unwrap();
        insert(&conn, &record("bb", 1, false)).unwrap();
        assert_eq!(final_block_log(&conn, 1).unwrap(), None);
        assert_eq!(latest_height(&conn).unwrap(), Some(1));
        assert_eq!(max_final_height(&conn).unwrap(), None);

        assert_eq!(mark_final(&mut conn, &["bb".to_string(), "zz".to_string()]).unwrap(), 1);
        let found = final_block_log(&conn, 1).unwrap().unwrap();
        assert_eq!(found.block_id, "bb");
        assert_eq!(found.block_producer, "witness");
        assert_eq!(found.decode().unwrap().block_time, 1_001);

        // already final, nothing changes
        assert_eq!(mark_final(&mut conn, &["bb".to_string()]).unwrap(), 0);
        assert_eq!(max_final_height(&conn).unwrap(), Some(1));
    }

    #[test]
    fn test_height_beyond_sqlite_range_rejected() {
        let conn = store();
        let huge = u64::MAX - 1;
        assert!(insert(&conn, &record("aa", huge, true)).is_err());
        assert!(final_block_log(&conn, huge).is_err());
        assert_eq!(latest_height(&conn).unwrap(), None);

        let edge = i64::MAX as u64;
        assert!(insert(&conn, &record("bb", edge, true)).unwrap());
        assert_eq!(final_block_log(&conn, edge).unwrap().unwrap().block_height, edge);
    }
}
