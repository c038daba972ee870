// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Block Change Sets
//!
//! Plain data describing what a block did to state:
//! - `StateChange` = one field mutation plus its provenance
//! - `OperationLog` = one operation and the changes attributed to it
//! - `TransactionLog` = one transaction's receipt and operations
//! - `BlockLog` = the root artifact, plus block-level changes
//!
//! # Invariants
//! - A `BlockLog` is immutable once emitted
//! - JSON text round-trips losslessly (integers stay integers)
//! - Unknown fields are ignored and missing collections decode empty

pub mod change;
pub mod block;

pub use change::{ChangeKind, GenericChange, StateChange};
pub use block::{BlockLog, OperationData, OperationLog, TransactionLog, TransactionReceipt};
