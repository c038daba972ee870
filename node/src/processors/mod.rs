// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Reference projections.

pub mod holder;
pub mod transfer;

pub use holder::HolderProcessor;
pub use transfer::TransferProcessor;

use crate::replay::Bootstrap;
use chainlog_kernel::error::{ProcessorError, ProcessorResult};

pub const HOLDERS_GROUP: &str = "holders";
pub const TRANSFERS_GROUP: &str = "transfers";

/// SQLite integers are signed 64-bit; larger amounts fail the block rather
/// than wrap.
pub(crate) fn sql_int(value: u64, what: &str) -> ProcessorResult<i64> {
    i64::try_from(value).map_err(|_| ProcessorError::malformed(format!("{} {} exceeds the SQLite integer range", what, value)))
}

/// Registers every built-in group.
pub fn register_defaults(bootstrap: &mut Bootstrap) {
    bootstrap
        .register(HOLDERS_GROUP, HolderProcessor::new())
        .register(TRANSFERS_GROUP, TransferProcessor::new());
}
