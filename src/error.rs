// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Error types.

use thiserror::Error;

/// Protocol violations on the capture side.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// `begin_block` while another block is still open.
    #[error("cannot begin block {requested} without ending block {current}")]
    BlockInProgress { current: u64, requested: u64 },

    /// Branch contexts left over from a block that was never ended.
    #[error("found {count} pending state change contexts")]
    PendingContexts { count: usize },

    /// `end_block` with nothing open.
    #[error("no block to end")]
    NoBlockInProgress,
}

pub type CaptureResult<T> = core::result::Result<T, CaptureError>;

/// Failures raised by projection processors during replay.
#[derive(Error, Debug)]
pub enum ProcessorError {
    /// The backing store rejected a read or write.
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The block log did not have the shape the processor expects.
    #[error("malformed block log: {0}")]
    Malformed(String),

    /// A stop was requested mid-block. Not a processing failure.
    #[error("replay interrupted by stop request")]
    Interrupted,
}

impl ProcessorError {
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ProcessorError::Storage(Box::new(err))
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        ProcessorError::Malformed(msg.into())
    }

    pub fn is_interrupt(&self) -> bool {
        matches!(self, ProcessorError::Interrupted)
    }
}

pub type ProcessorResult<T = ()> = core::result::Result<T, ProcessorError>;
