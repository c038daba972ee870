// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Configuration constants.

/// Name of the canonical (committed) execution branch.
pub const TRUNK_BRANCH: &str = "trunk";

/// Highest number of blocks one replay batch may cover.
pub const MAX_REPLAY_BATCH: u64 = 1000;

/// Distance to the latest known block under which a catching-up group may
/// switch to tailing.
pub const FAST_FORWARD_THRESHOLD: u64 = 1000;

/// Separator used when joining a cause stack.
pub const CAUSE_SEPARATOR: &str = ".";

/// Receipt status of a successfully applied transaction.
pub const STATUS_SUCCESS: u32 = 200;
