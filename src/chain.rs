// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Minimal view of a produced block, as handed to `Watcher::end_block`.

use crate::log::{OperationData, TransactionReceipt};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BlockTransaction {
    /// Raw transaction hash.
    pub trx_id: Vec<u8>,
    pub receipt: TransactionReceipt,
    pub operations: Vec<OperationData>,
}

impl BlockTransaction {
    pub fn id_hex(&self) -> String {
        hex::encode(&self.trx_id)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SignedBlock {
    /// Raw block id.
    pub id: Vec<u8>,
    pub num: u64,
    /// UTC seconds.
    pub timestamp: u32,
    pub transactions: Vec<BlockTransaction>,
}

impl SignedBlock {
    pub fn id_hex(&self) -> String {
        hex::encode(&self.id)
    }
}
