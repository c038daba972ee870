// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.

//! chainlog-kernel: branch-aware state-change capture and the ordered replay
//! contract for block change sets.

pub mod config;
pub mod error;
pub mod log;
pub mod chain;
pub mod capture;
pub mod processor;

pub use error::{CaptureError, ProcessorError};
pub use log::{BlockLog, ChangeKind, GenericChange, OperationData, OperationLog, StateChange, TransactionLog};
pub use capture::{ContextHandle, StateChangeContext, Watcher};
pub use processor::{replay_block, BlockLogProcessor, OpIndex, ProcessorSet, ReplayOutcome, StopSignal};

#[cfg(test)]
pub mod tests;
