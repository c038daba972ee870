// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Deterministic replay of final block logs into projections.
//!
//! # Architecture
//! - Worker = thread with fixed-delay scheduling and blocking stop
//! - Driver = one batch of one group, one transaction per block
//! - Checkpoint = which groups a manager serves, and phase transitions
//! - Manager = driver over every surfaced group; Bootstrap owns two of them

pub mod worker;
pub mod driver;
pub mod checkpoint;
pub mod manager;

pub use worker::{BatchOutcome, ReplayJob, ReplayWorker, WorkerPhase};
pub use driver::{replay_group, BatchEnd, BatchReport};
pub use checkpoint::{CatchUp, Checkpoint, Tailing};
pub use manager::{Bootstrap, ForwardManager, ProcessorRegistry, SharedProcessor};
