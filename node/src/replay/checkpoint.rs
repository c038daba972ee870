// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Checkpoint strategies: which groups a manager serves, and when a group
//! leaves catch-up.
//!
//! Every group goes through the same two phases:
//! ```text
//! registered (fast_forward = 1) --within threshold of head--> tailing (fast_forward = 0)
//! ```
//! The switch is persisted and one-way.

use crate::block_store;
use crate::errors::Result;
use crate::progress::{self, Progress};
use rusqlite::Connection;

pub trait Checkpoint: Send + 'static {
    fn name(&self) -> &'static str;

    /// Groups this manager must replay now, in registration order.
    fn pending(&self, conn: &Connection) -> Result<Vec<Progress>>;

    /// Moves `progress` to the next phase if it qualifies. Returns `true`
    /// when a transition was persisted.
    fn try_transition(&self, conn: &mut Connection, progress: &mut Progress) -> Result<bool>;

    /// Whether the manager should run another batch.
    fn has_pending(&self, conn: &Connection) -> Result<bool> {
        Ok(!self.pending(conn)?.is_empty())
    }
}

/// Bulk backfill from genesis.
#[derive(Clone, Debug)]
pub struct CatchUp {
    pub threshold: u64,
}

impl CatchUp {
    pub fn new(threshold: u64) -> Self {
        Self { threshold }
    }
}

impl Checkpoint for CatchUp {
    fn name(&self) -> &'static str {
        "catch-up"
    }

    fn pending(&self, conn: &Connection) -> Result<Vec<Progress>> {
        progress::list_by_mode(conn, true)
    }

    fn try_transition(&self, conn: &mut Connection, progress: &mut Progress) -> Result<bool> {
        if !progress.fast_forward {
            return Ok(false);
        }
        // Nothing stored yet means the head is unknown, so stay in catch-up.
        let Some(latest) = block_store::latest_height(conn)? else {
            return Ok(false);
        };
        if latest.saturating_sub(progress.block_height) >= self.threshold {
            return Ok(false);
        }

        let mut next = progress.clone();
        next.fast_forward = false;
        let tx = conn.transaction()?;
        progress::save(&tx, &next)?;
        tx.commit()?;
        *progress = next;
        tracing::info!(
            "{}: caught up at {} (head {}), switching to tailing",
            progress.processor,
            progress.block_height,
            latest
        );
        Ok(true)
    }
}

/// Continuous near-head replay. Never transitions anything.
#[derive(Clone, Debug, Default)]
pub struct Tailing;

impl Checkpoint for Tailing {
    fn name(&self) -> &'static str {
        "tailing"
    }

    fn pending(&self, conn: &Connection) -> Result<Vec<Progress>> {
        progress::list_by_mode(conn, false)
    }

    fn try_transition(&self, _conn: &mut Connection, _progress: &mut Progress) -> Result<bool> {
        Ok(false)
    }

    /// Groups can join at any time, so tailing always keeps running.
    fn has_pending(&self, _conn: &Connection) -> Result<bool> {
        Ok(true)
    }
}
