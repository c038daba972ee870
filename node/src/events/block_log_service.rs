// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Block Log Service - The Finality Gate
//!
//! Joins the two independent chain notices into one durable record per block:
//! 1. a produced log is stored as not final
//! 2. an irreversibility notice flips the matching rows to final
//!
//! # Rules
//! - Genesis is final on insert
//! - A log whose block was already reported irreversible is final on insert
//! - In reuse mode, logs at or below the highest final height already in the
//!   store are ignored, as are irreversibility notices for them
//!
//! Replay never observes anything but final rows, so blocks that lose the
//! fork race are simply never seen.

use crate::block_store::{self, BlockLogRecord};
use crate::config::NodeConfig;
use crate::db;
use crate::errors::Result;
use crate::events::notice::{ChainNotice, FinalizedBlock, NoticeReceiver};
use chainlog_kernel::log::BlockLog;
use rusqlite::Connection;
use tokio_util::sync::CancellationToken;

pub struct BlockLogService {
    conn: Connection,
    /// Id of the most recent block reported irreversible.
    last_commit: Option<String>,
    /// Blocks below this height are ignored.
    min_processing_block: u64,
}

impl BlockLogService {
    pub fn new(conn: Connection) -> Result<Self> {
        block_store::ensure_schema(&conn)?;
        Ok(Self {
            conn,
            last_commit: None,
            min_processing_block: 0,
        })
    }

    pub fn open(cfg: &NodeConfig) -> Result<Self> {
        let mut service = Self::new(db::open(&cfg.db_path, cfg.busy_timeout)?)?;
        service.check_reuse(cfg.reuse_existing)?;
        Ok(service)
    }

    /// In reuse mode, skip everything the store already holds as final.
    pub fn check_reuse(&mut self, reuse: bool) -> Result<()> {
        if !reuse {
            return Ok(());
        }
        match block_store::max_final_height(&self.conn)? {
            Some(height) if height > 0 => {
                self.min_processing_block = height + 1;
                tracing::info!("Reusing stored block logs, ignoring blocks with height < {}", self.min_processing_block);
            }
            _ => self.min_processing_block = 0,
        }
        Ok(())
    }

    pub fn min_processing_block(&self) -> u64 {
        self.min_processing_block
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn on_block_log(&mut self, log: &BlockLog, producer: &str) -> Result<()> {
        if log.block_num < self.min_processing_block {
            return Ok(());
        }
        // The irreversibility notice can overtake the log of a block this
        // node produced itself.
        let already_committed = self.last_commit.as_deref() == Some(log.block_id.as_str());
        let is_final = log.block_num == 0 || already_committed;

        let record = BlockLogRecord::from_log(log, producer, is_final)?;
        if block_store::insert(&self.conn, &record)? {
            metrics::increment_counter!("chainlog_block_logs_stored_total");
            if is_final {
                metrics::increment_counter!("chainlog_blocks_finalized_total");
            }
            tracing::debug!("Stored block log {} at height {} (final: {})", log.block_id, log.block_num, is_final);
        } else {
            tracing::warn!("Block log {} already stored, ignored", log.block_id);
        }
        Ok(())
    }

    /// Marks the given blocks final. Returns how many rows flipped.
    pub fn on_lib_change(&mut self, blocks: &[FinalizedBlock]) -> Result<usize> {
        let mut ids = Vec::with_capacity(blocks.len());
        for block in blocks {
            self.last_commit = Some(block.id.clone());
            if block.num >= self.min_processing_block {
                ids.push(block.id.clone());
            }
        }
        let changed = block_store::mark_final(&mut self.conn, &ids)?;
        if changed > 0 {
            metrics::counter!("chainlog_blocks_finalized_total", changed as u64);
            tracing::debug!("{} block logs became final", changed);
        }
        Ok(changed)
    }

    pub fn handle(&mut self, notice: &ChainNotice) -> Result<()> {
        match notice {
            ChainNotice::BlockLogProduced { log, producer } => self.on_block_log(log, producer),
            ChainNotice::Irreversible(blocks) => self.on_lib_change(blocks).map(|_| ()),
        }
    }

    fn handle_logged(&mut self, notice: &ChainNotice) {
        if let Err(e) = self.handle(notice) {
            tracing::error!("Block log service failed to handle notice: {}", e);
        }
    }

    /// Consumes notices until `cancel` fires or every producer is gone.
    /// On cancel the queue is closed and whatever is already queued is still
    /// stored.
    pub async fn run(mut self, mut rx: NoticeReceiver, cancel: CancellationToken) {
        tracing::info!("Block log service started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    rx.close();
                    let mut drained = 0;
                    while let Some(notice) = rx.recv().await {
                        self.handle_logged(&notice);
                        drained += 1;
                    }
                    if drained > 0 {
                        tracing::info!("Block log service drained {} queued notices", drained);
                    }
                    break;
                }
                received = rx.recv() => match received {
                    Some(notice) => self.handle_logged(&notice),
                    None => break,
                },
            }
        }
        tracing::info!("Block log service stopped");
    }
}
