// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Replay Driver - one batch of one processor group
//!
//! # Protocol (per height, in order)
//! ```text
//! stop requested?         -> end batch (Stopped)
//! final record at height? -> no: end batch (CaughtUp)
//! decode                  -> fails: end batch (Failed)
//! BEGIN
//!   replay_block(processor)
//!   save progress(height)
//! COMMIT                  -> any failure or stop: ROLLBACK, end batch
//! ```
//!
//! Projected writes and the checkpoint share one transaction, so a height is
//! either fully applied and recorded or not at all.

use crate::block_store;
use crate::errors::{NodeError, Result};
use crate::progress::{self, Progress};
use chainlog_kernel::log::BlockLog;
use chainlog_kernel::processor::{replay_block, BlockLogProcessor, ReplayOutcome, StopSignal};
use rusqlite::Connection;
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchEnd {
    /// Every height of the batch window was replayed.
    Exhausted,
    /// Finality has not reached the next height yet.
    CaughtUp,
    /// A block was rolled back; the next batch retries it.
    Failed,
    /// The stop request was observed.
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchReport {
    pub replayed: u64,
    pub end: BatchEnd,
}

enum BlockResult {
    Committed,
    Stopped,
}

fn apply_one<P>(conn: &mut Connection, processor: &mut P, log: &BlockLog, next: &Progress, stop: &StopSignal) -> Result<BlockResult>
where
    P: BlockLogProcessor<Connection> + ?Sized,
{
    let tx = conn.transaction()?;
    let db: &Connection = &tx;
    match replay_block(processor, db, log, stop) {
        Ok(ReplayOutcome::Completed) => {}
        Ok(ReplayOutcome::Stopped) => return Ok(BlockResult::Stopped),
        Err(e) => return Err(NodeError::Replay(e)),
    }
    progress::save(db, next)?;
    tx.commit()?;
    Ok(BlockResult::Committed)
}

/// Replays `[progress.block_height + 1, progress.block_height + max_batch]`
/// for one group. `progress` follows the committed checkpoint.
pub fn replay_group<P>(
    conn: &mut Connection,
    processor: &mut P,
    progress: &mut Progress,
    max_batch: u64,
    stop: &StopSignal,
) -> BatchReport
where
    P: BlockLogProcessor<Connection> + ?Sized,
{
    let group = progress.processor.clone();
    let started = Instant::now();
    let first = progress.block_height + 1;
    let last = progress.block_height.saturating_add(max_batch);
    let mut replayed = 0;
    let mut end = BatchEnd::Exhausted;

    for height in first..=last {
        if stop.is_requested() {
            end = BatchEnd::Stopped;
            break;
        }

        let record = match block_store::final_block_log(conn, height) {
            Ok(Some(record)) => record,
            Ok(None) => {
                end = BatchEnd::CaughtUp;
                break;
            }
            Err(e) => {
                tracing::error!("{}: reading block log {} failed: {}", group, height, e);
                end = BatchEnd::Failed;
                break;
            }
        };
        let log = match record.decode() {
            Ok(log) => log,
            Err(e) => {
                tracing::error!("{}: block log {} does not decode: {}", group, height, e);
                metrics::increment_counter!("chainlog_replay_failures_total", "group" => group.clone());
                end = BatchEnd::Failed;
                break;
            }
        };

        let next = progress.advanced_to(height);
        match apply_one(conn, processor, &log, &next, stop) {
            Ok(BlockResult::Committed) => {
                *progress = next;
                replayed += 1;
                metrics::increment_counter!("chainlog_blocks_replayed_total", "group" => group.clone());
                metrics::gauge!("chainlog_checkpoint_height", height as f64, "group" => group.clone());
            }
            Ok(BlockResult::Stopped) => {
                tracing::debug!("{}: stop requested while replaying {}, rolled back", group, height);
                end = BatchEnd::Stopped;
                break;
            }
            Err(e) => {
                tracing::error!("{}: process log {} failed and rolled back, error: {}", group, height, e);
                metrics::increment_counter!("chainlog_replay_failures_total", "group" => group.clone());
                end = BatchEnd::Failed;
                break;
            }
        }
    }

    metrics::histogram!("chainlog_batch_duration_seconds", started.elapsed().as_secs_f64(), "group" => group.clone());
    if replayed > 0 {
        tracing::debug!("{}: replayed {} blocks, checkpoint now {}", group, replayed, progress.block_height);
    }
    BatchReport { replayed, end }
}
