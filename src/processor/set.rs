// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Fan-out of many processors behind one.

use super::{BlockLogProcessor, OpIndex, StopSignal};
use crate::error::{ProcessorError, ProcessorResult};
use crate::log::{BlockLog, StateChange};

pub type BoxedProcessor<S> = Box<dyn BlockLogProcessor<S> + Send>;

/// Runs each stage on every child, in registration order, before the next
/// stage starts. Short-circuits on the first error, and on a stop request
/// with `ProcessorError::Interrupted`.
pub struct ProcessorSet<S: ?Sized> {
    processors: Vec<BoxedProcessor<S>>,
    stop: StopSignal,
}

impl<S: ?Sized> ProcessorSet<S> {
    pub fn new() -> Self {
        Self {
            processors: Vec::new(),
            stop: StopSignal::new(),
        }
    }

    pub fn with_stop(stop: StopSignal) -> Self {
        Self {
            processors: Vec::new(),
            stop,
        }
    }

    pub fn set_stop(&mut self, stop: StopSignal) {
        self.stop = stop;
    }

    pub fn with(mut self, processor: impl BlockLogProcessor<S> + Send + 'static) -> Self {
        self.push(processor);
        self
    }

    pub fn push(&mut self, processor: impl BlockLogProcessor<S> + Send + 'static) {
        self.processors.push(Box::new(processor));
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    fn each(&mut self, mut call: impl FnMut(&mut dyn BlockLogProcessor<S>) -> ProcessorResult) -> ProcessorResult {
        for processor in self.processors.iter_mut() {
            if self.stop.is_requested() {
                return Err(ProcessorError::Interrupted);
            }
            call(processor.as_mut())?;
        }
        Ok(())
    }
}

impl<S: ?Sized> Default for ProcessorSet<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ?Sized> BlockLogProcessor<S> for ProcessorSet<S> {
    fn prepare(&mut self, db: &S, block_log: &BlockLog) -> ProcessorResult {
        self.each(|p| p.prepare(db, block_log))
    }

    fn process_operation(&mut self, db: &S, block_log: &BlockLog, at: OpIndex) -> ProcessorResult {
        self.each(|p| p.process_operation(db, block_log, at))
    }

    fn process_change(
        &mut self,
        db: &S,
        change: &StateChange,
        block_log: &BlockLog,
        change_idx: usize,
        at: Option<OpIndex>,
    ) -> ProcessorResult {
        self.each(|p| p.process_change(db, change, block_log, change_idx, at))
    }

    fn finalize(&mut self, db: &S, block_log: &BlockLog) -> ProcessorResult {
        self.each(|p| p.finalize(db, block_log))
    }
}
