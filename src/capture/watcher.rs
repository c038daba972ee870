// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Block Watcher
//!
//! Owns the branch contexts of the one block currently being produced or
//! applied, and turns them into a `BlockLog` when the block ends.
//!
//! # Protocol
//! ```text
//! Idle --begin_block--> Capturing --end_block(ok | !ok)--> Idle
//! ```
//!
//! # Invariants
//! - Two blocks are never merged: `begin_block` fails while a block is open
//!   or while contexts from a previous block linger
//! - Contexts are discarded on every `end_block`, successful or not
//! - The callback fires exactly once per successful `end_block`

use super::context::{ContextHandle, PendingChange, StateChangeContext};
use super::makers::INTERESTED_CHANGES;
use super::source::FieldChangeSource;
use crate::chain::SignedBlock;
use crate::config::TRUNK_BRANCH;
use crate::error::{CaptureError, CaptureResult};
use crate::log::{BlockLog, ChangeKind, GenericChange, OperationLog, TransactionLog};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::sync::Arc;

pub type WatcherCallback = Box<dyn Fn(Arc<BlockLog>) + Send + Sync>;

type SharedContext = Arc<Mutex<StateChangeContext>>;

#[derive(Default)]
struct WatcherState {
    /// Height passed to `begin_block`, `None` while idle.
    current: Option<u64>,
    trunk: ContextHandle,
    /// Creation order, used to flatten deterministically.
    contexts: Vec<SharedContext>,
    by_branch: FxHashMap<String, SharedContext>,
}

impl WatcherState {
    fn get_or_create(&mut self, branch: &str, trx_id: &str, op: Option<usize>, cause: &str) -> ContextHandle {
        if self.current.is_none() {
            return ContextHandle::none();
        }
        if let Some(existing) = self.by_branch.get(branch) {
            {
                let mut ctx = existing.lock();
                ctx.set_trx_and_operation(trx_id, op);
                ctx.set_cause(cause);
            }
            return ContextHandle::from_shared(existing.clone());
        }
        let ctx = Arc::new(Mutex::new(StateChangeContext::new(branch, trx_id, op, cause)));
        self.contexts.push(ctx.clone());
        self.by_branch.insert(branch.to_string(), ctx.clone());
        ContextHandle::from_shared(ctx)
    }

    fn reset(&mut self) -> Vec<SharedContext> {
        self.current = None;
        self.trunk = ContextHandle::none();
        self.by_branch.clear();
        std::mem::take(&mut self.contexts)
    }
}

pub struct Watcher {
    state: RwLock<WatcherState>,
    callback: Option<WatcherCallback>,
}

impl Watcher {
    pub fn new(callback: Option<WatcherCallback>) -> Self {
        Self {
            state: RwLock::new(WatcherState::default()),
            callback,
        }
    }

    /// Registers one field watch per interesting entity/field on `source`.
    ///
    /// Callbacks hold a weak reference, so the source never keeps the
    /// watcher alive.
    pub fn attach(self: &Arc<Self>, source: &dyn FieldChangeSource) {
        for entry in INTERESTED_CHANGES {
            let watcher = Arc::downgrade(self);
            let what = entry.what;
            let maker = entry.maker;
            source.on_field_change(
                entry.entity,
                entry.field,
                Box::new(move |branch, event, key, before, after| {
                    if let Some(watcher) = watcher.upgrade() {
                        watcher.record_change(branch, what, event.into(), maker(key, before, after));
                    }
                }),
            );
        }
        tracing::debug!("Watcher attached to {} field sources", INTERESTED_CHANGES.len());
    }

    /// Returns the context of `branch`, creating it on first use.
    ///
    /// An existing context is re-targeted to `(trx_id, op)` and its cause
    /// stack reset to `cause`. Returns an empty handle while idle.
    pub fn new_state_change_context(&self, branch: &str, trx_id: &str, op: Option<usize>, cause: &str) -> ContextHandle {
        self.state.write().get_or_create(branch, trx_id, op, cause)
    }

    /// Trunk context of the open block.
    pub fn current_block_context(&self) -> ContextHandle {
        self.state.read().trunk.clone()
    }

    pub fn current_height(&self) -> Option<u64> {
        self.state.read().current
    }

    pub fn begin_block(&self, height: u64) -> CaptureResult<()> {
        let mut state = self.state.write();
        if let Some(current) = state.current {
            return Err(CaptureError::BlockInProgress { current, requested: height });
        }
        if !state.contexts.is_empty() || !state.by_branch.is_empty() {
            return Err(CaptureError::PendingContexts {
                count: state.contexts.len().max(state.by_branch.len()),
            });
        }
        state.current = Some(height);
        let trunk = state.get_or_create(TRUNK_BRANCH, "", None, "");
        state.trunk = trunk;
        tracing::trace!("Capturing block {}", height);
        Ok(())
    }

    /// Closes the open block.
    ///
    /// When `ok`, all branches are flattened into a `BlockLog`, handed to the
    /// callback and returned. Either way the watcher is idle afterwards.
    pub fn end_block(&self, ok: bool, block: &SignedBlock) -> CaptureResult<Option<Arc<BlockLog>>> {
        let contexts = {
            let mut state = self.state.write();
            let Some(height) = state.current else {
                return Err(CaptureError::NoBlockInProgress);
            };
            if ok && height != block.num {
                tracing::warn!("Block {} ended as height {} (began as {})", block.id_hex(), block.num, height);
            }
            state.reset()
        };

        if !ok {
            tracing::debug!("Discarded change capture for block {}", block.num);
            return Ok(None);
        }

        let changes = contexts.iter().flat_map(|ctx| ctx.lock().take_changes()).collect();
        let log = Arc::new(make_log(block, changes));
        tracing::debug!(
            "Block {} captured: {} trxs, {} changes",
            log.block_num,
            log.transactions.len(),
            log.change_count()
        );

        if let Some(callback) = &self.callback {
            callback(log.clone());
        }
        Ok(Some(log))
    }

    /// Routes a field change to its branch. Dropped when the branch has no
    /// live context.
    pub fn record_change(&self, branch: &str, what: &str, kind: ChangeKind, change: GenericChange) {
        let state = self.state.read();
        if let Some(ctx) = state.by_branch.get(branch) {
            ctx.lock().add_change(what, kind, change);
        }
    }
}

/// Builds the log skeleton from the block, then attributes every pending
/// change to its operation or to the block itself.
fn make_log(block: &SignedBlock, changes: Vec<PendingChange>) -> BlockLog {
    let mut trx_index: FxHashMap<String, usize> = FxHashMap::default();
    let transactions = block
        .transactions
        .iter()
        .enumerate()
        .map(|(idx, trx)| {
            let trx_id = trx.id_hex();
            trx_index.insert(trx_id.clone(), idx);
            TransactionLog {
                trx_id,
                receipt: trx.receipt.clone(),
                operations: trx
                    .operations
                    .iter()
                    .map(|op| OperationLog {
                        op: op.clone(),
                        changes: Vec::new(),
                    })
                    .collect(),
            }
        })
        .collect();

    let mut log = BlockLog {
        block_id: block.id_hex(),
        block_num: block.num,
        block_time: block.timestamp,
        transactions,
        changes: Vec::new(),
    };

    for mut pending in changes {
        // A trx id that matches nothing in this block stays unresolved and
        // is indistinguishable from a genuine block-level change.
        if pending.op_idx.is_some() {
            pending.trx_idx = trx_index.get(&pending.trx_id).copied();
        }
        let slot = match (pending.trx_idx, pending.op_idx) {
            (Some(trx), Some(op)) => log.transactions[trx].operations.get_mut(op),
            _ => None,
        };
        match slot {
            Some(op_log) => op_log.changes.push(pending.change),
            None => log.changes.push(pending.change),
        }
    }
    log
}
