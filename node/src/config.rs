// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use chainlog_kernel::config::{FAST_FORWARD_THRESHOLD, MAX_REPLAY_BATCH};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct NodeConfig {
    pub db_path: PathBuf,
    pub bind_addr: SocketAddr,
    /// Most blocks one replay batch may cover.
    pub max_batch: u64,
    /// Pause between the end of one batch and the start of the next.
    pub replay_delay: Duration,
    pub fast_forward_threshold: u64,
    pub busy_timeout: Duration,
    /// Skip incoming logs at or below the highest height already final in
    /// the store.
    pub reuse_existing: bool,
    /// Drop every registered table before starting.
    pub reset_tables: bool,
    pub notice_capacity: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("chainlog.db"),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3030)),
            max_batch: MAX_REPLAY_BATCH,
            replay_delay: Duration::from_secs(1),
            fast_forward_threshold: FAST_FORWARD_THRESHOLD,
            busy_timeout: Duration::from_secs(5),
            reuse_existing: false,
            reset_tables: false,
            notice_capacity: 1024,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "chainlog-node")]
#[command(
    about = "Block log store and deterministic projection replay",
    long_about = "Block log store and deterministic projection replay.\n\nBlock logs arrive from a chain integration publishing on the notice bus; none is built into this binary, so a standalone run replays only what the database already holds."
)]
pub struct Cli {
    /// SQLite database holding block logs, progress rows and projections
    #[arg(long, default_value = "chainlog.db")]
    pub db: PathBuf,

    /// Address of the status endpoint
    #[arg(long, default_value = "127.0.0.1:3030")]
    pub bind: SocketAddr,

    #[arg(long, default_value_t = MAX_REPLAY_BATCH)]
    pub max_batch: u64,

    /// Delay between replay batches, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub replay_delay_ms: u64,

    #[arg(long, default_value_t = FAST_FORWARD_THRESHOLD)]
    pub fast_forward_threshold: u64,

    /// Keep already-final block logs and only store newer ones
    #[arg(long)]
    pub reuse_sql: bool,

    /// Drop all registered tables, then start from genesis
    #[arg(long)]
    pub reset: bool,
}

impl From<Cli> for NodeConfig {
    fn from(cli: Cli) -> Self {
        Self {
            db_path: cli.db,
            bind_addr: cli.bind,
            max_batch: cli.max_batch.max(1),
            replay_delay: Duration::from_millis(cli.replay_delay_ms),
            fast_forward_threshold: cli.fast_forward_threshold,
            reuse_existing: cli.reuse_sql,
            reset_tables: cli.reset,
            ..Self::default()
        }
    }
}
