// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Processor Contract
//!
//! A projection processor is a visitor over one `BlockLog`. Replay drives it
//! in a fixed order:
//!
//! ```text
//! prepare
//! for each transaction, for each operation:
//!     process_operation
//!     process_change (per attributed change, capture order)
//! process_change (per block-level change, capture order)
//! finalize
//! ```
//!
//! # Semantics
//! - The first error aborts the whole block (all-or-nothing)
//! - A stop request aborts the same way but is reported as
//!   `ReplayOutcome::Stopped`, never as a failure
//!
//! `S` is the storage handle the processor projects into. The kernel never
//! looks inside it.

pub mod set;

pub use set::ProcessorSet;

use crate::error::{ProcessorError, ProcessorResult};
use crate::log::{BlockLog, StateChange};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Position of an operation inside its block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OpIndex {
    pub trx: usize,
    pub op: usize,
}

pub trait BlockLogProcessor<S: ?Sized> {
    fn prepare(&mut self, _db: &S, _block_log: &BlockLog) -> ProcessorResult {
        Ok(())
    }

    fn process_operation(&mut self, _db: &S, _block_log: &BlockLog, _at: OpIndex) -> ProcessorResult {
        Ok(())
    }

    /// `at` is `None` for block-level changes.
    fn process_change(
        &mut self,
        _db: &S,
        _change: &StateChange,
        _block_log: &BlockLog,
        _change_idx: usize,
        _at: Option<OpIndex>,
    ) -> ProcessorResult {
        Ok(())
    }

    fn finalize(&mut self, _db: &S, _block_log: &BlockLog) -> ProcessorResult {
        Ok(())
    }
}

impl<S: ?Sized, P: BlockLogProcessor<S> + ?Sized> BlockLogProcessor<S> for Box<P> {
    fn prepare(&mut self, db: &S, block_log: &BlockLog) -> ProcessorResult {
        (**self).prepare(db, block_log)
    }

    fn process_operation(&mut self, db: &S, block_log: &BlockLog, at: OpIndex) -> ProcessorResult {
        (**self).process_operation(db, block_log, at)
    }

    fn process_change(
        &mut self,
        db: &S,
        change: &StateChange,
        block_log: &BlockLog,
        change_idx: usize,
        at: Option<OpIndex>,
    ) -> ProcessorResult {
        (**self).process_change(db, change, block_log, change_idx, at)
    }

    fn finalize(&mut self, db: &S, block_log: &BlockLog) -> ProcessorResult {
        (**self).finalize(db, block_log)
    }
}

/// Cooperative stop flag shared between a worker and whoever stops it.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clears the flag so the owner can be started again.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// Every stage ran for every processor.
    Completed,
    /// A stop was requested part-way. Nothing from this block may be kept.
    Stopped,
}

fn guarded(stop: &StopSignal, call: impl FnOnce() -> ProcessorResult) -> ProcessorResult {
    if stop.is_requested() {
        return Err(ProcessorError::Interrupted);
    }
    call()
}

fn drive<S, P>(processor: &mut P, db: &S, block_log: &BlockLog, stop: &StopSignal) -> ProcessorResult
where
    S: ?Sized,
    P: BlockLogProcessor<S> + ?Sized,
{
    guarded(stop, || processor.prepare(db, block_log))?;

    for (trx_idx, trx) in block_log.transactions.iter().enumerate() {
        for (op_idx, op) in trx.operations.iter().enumerate() {
            let at = OpIndex { trx: trx_idx, op: op_idx };
            guarded(stop, || processor.process_operation(db, block_log, at))?;
            for (change_idx, change) in op.changes.iter().enumerate() {
                guarded(stop, || processor.process_change(db, change, block_log, change_idx, Some(at)))?;
            }
        }
    }

    for (change_idx, change) in block_log.changes.iter().enumerate() {
        guarded(stop, || processor.process_change(db, change, block_log, change_idx, None))?;
    }

    guarded(stop, || processor.finalize(db, block_log))
}

/// Replays one block through `processor` in the fixed visitor order.
pub fn replay_block<S, P>(
    processor: &mut P,
    db: &S,
    block_log: &BlockLog,
    stop: &StopSignal,
) -> Result<ReplayOutcome, ProcessorError>
where
    S: ?Sized,
    P: BlockLogProcessor<S> + ?Sized,
{
    match drive(processor, db, block_log, stop) {
        Ok(()) => Ok(ReplayOutcome::Completed),
        Err(ProcessorError::Interrupted) => Ok(ReplayOutcome::Stopped),
        Err(e) => Err(e),
    }
}
