// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Process-wide registry of the SQL tables this node owns.
//!
//! Components register a name pattern (a regex matched against the whole
//! table name) when they are constructed. The registry only ever grows, so
//! a reset always sees every table the running process may have created.

use crate::db;
use crate::errors::Result;
use parking_lot::Mutex;
use regex::Regex;
use rusqlite::Connection;
use std::sync::OnceLock;

static PATTERNS: OnceLock<Mutex<Vec<String>>> = OnceLock::new();

fn patterns() -> &'static Mutex<Vec<String>> {
    PATTERNS.get_or_init(|| Mutex::new(Vec::new()))
}

/// Registers `pattern`. Registering the same pattern twice is a no-op.
pub fn register_table_pattern(pattern: &str) {
    let mut all = patterns().lock();
    if !all.iter().any(|p| p == pattern) {
        all.push(pattern.to_string());
    }
}

pub fn registered_patterns() -> Vec<String> {
    patterns().lock().clone()
}

/// Names of existing tables matched by any registered pattern.
pub fn registered_tables(conn: &Connection) -> Result<Vec<String>> {
    let matchers = registered_patterns()
        .iter()
        .map(|p| Regex::new(&format!("^(?:{})$", p)))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(db::table_names(conn)?
        .into_iter()
        .filter(|name| matchers.iter().any(|m| m.is_match(name)))
        .collect())
}

/// Drops every table matched by a registered pattern and returns their names.
pub fn drop_registered_tables(conn: &Connection) -> Result<Vec<String>> {
    let tables = registered_tables(conn)?;
    for name in &tables {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS \"{}\";", name.replace('"', "\"\"")))?;
        tracing::info!("Dropped table {}", name);
    }
    Ok(tables)
}
