// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Chain notices consumed by the block log service.
//!
//! The bus is a bounded single-consumer queue. A full queue blocks the
//! producer instead of overwriting older notices, so every produced log
//! reaches the finality gate.

use crate::errors::{NodeError, Result};
use chainlog_kernel::capture::WatcherCallback;
use chainlog_kernel::log::BlockLog;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A block that fork choice has made irreversible.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FinalizedBlock {
    /// Hex block id, as stored in `BlockLog::block_id`.
    pub id: String,
    pub num: u64,
}

#[derive(Clone, Debug)]
pub enum ChainNotice {
    /// A block finished applying and its change set is ready.
    BlockLogProduced { log: Arc<BlockLog>, producer: String },
    /// The last irreversible block advanced over these blocks.
    Irreversible(Vec<FinalizedBlock>),
}

pub type NoticeReceiver = mpsc::Receiver<ChainNotice>;

/// Producer side of the notice queue. Clones share one queue.
#[derive(Clone)]
pub struct NoticeBus {
    tx: mpsc::Sender<ChainNotice>,
}

impl NoticeBus {
    pub fn channel(capacity: usize) -> (Self, NoticeReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queues `notice`, waiting for room when the queue is full.
    pub async fn send(&self, notice: ChainNotice) -> Result<()> {
        self.tx.send(notice).await.map_err(|_| NodeError::BusClosed)
    }

    /// Blocking form of [`send`](Self::send) for chain threads. Must not be
    /// called from inside an async task.
    pub fn publish(&self, notice: ChainNotice) -> Result<()> {
        self.tx.blocking_send(notice).map_err(|_| NodeError::BusClosed)
    }

    pub fn block_log(&self, log: Arc<BlockLog>, producer: &str) -> Result<()> {
        self.publish(ChainNotice::BlockLogProduced {
            log,
            producer: producer.to_string(),
        })
    }

    pub fn irreversible(&self, blocks: Vec<FinalizedBlock>) -> Result<()> {
        self.publish(ChainNotice::Irreversible(blocks))
    }

    /// Watcher callback publishing every finished block as produced by
    /// `producer`. Blocks the capturing thread while the queue is full.
    pub fn watcher_callback(&self, producer: &str) -> WatcherCallback {
        let bus = self.clone();
        let producer = producer.to_string();
        Box::new(move |log| {
            let (num, id) = (log.block_num, log.block_id.clone());
            if let Err(e) = bus.block_log(log, &producer) {
                tracing::error!("Block log {} at height {} not delivered: {}", id, num, e);
            }
        })
    }
}
