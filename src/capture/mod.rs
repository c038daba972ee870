// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Branch-Aware Change Capture
//!
//! # Architecture
//! - Source = state store emitting field-level change events
//! - Context = per-branch accumulator with a cause stack and restore points
//! - Watcher = routes events to contexts and assembles the `BlockLog`
//!
//! # Guarantees
//! - Changes on one branch never leak into another
//! - A discarded block leaves nothing behind
//! - Every change carries the cause stack present when it was captured

pub mod context;
pub mod source;
pub mod makers;
pub mod memory;
pub mod watcher;

pub use context::{CauseGuard, ContextHandle, PendingChange, StateChangeContext};
pub use source::{FieldCallback, FieldChangeSource, FieldEventKind, FieldValue};
pub use makers::{ChangeMaker, InterestedChange, INTERESTED_CHANGES};
pub use memory::MemoryStateStore;
pub use watcher::{Watcher, WatcherCallback};
