// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Forward managers and the bootstrap that owns them.
//!
//! A manager runs the replay driver for every group its checkpoint strategy
//! surfaces. The bootstrap registers groups, then runs one catch-up and one
//! tailing manager over the same processor registry.

use crate::config::NodeConfig;
use crate::db;
use crate::errors::Result;
use crate::progress;
use crate::replay::checkpoint::{CatchUp, Checkpoint, Tailing};
use crate::replay::driver::{replay_group, BatchEnd};
use crate::replay::worker::{BatchOutcome, ReplayJob, ReplayWorker};
use chainlog_kernel::processor::{BlockLogProcessor, StopSignal};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::sync::Arc;

pub type SharedProcessor = Arc<Mutex<dyn BlockLogProcessor<Connection> + Send>>;

/// Group name to processor. Shared by both managers; a group is only ever in
/// one phase, so at most one of them replays it at a time.
pub type ProcessorRegistry = Arc<BTreeMap<String, SharedProcessor>>;

pub struct ForwardManager<C: Checkpoint> {
    name: String,
    conn: Connection,
    checkpoint: C,
    processors: ProcessorRegistry,
    max_batch: u64,
}

impl<C: Checkpoint> ForwardManager<C> {
    pub fn new(conn: Connection, checkpoint: C, processors: ProcessorRegistry, max_batch: u64) -> Self {
        Self {
            name: format!("{}-manager", checkpoint.name()),
            conn,
            checkpoint,
            processors,
            max_batch: max_batch.max(1),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl<C: Checkpoint> ReplayJob for ForwardManager<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn run_batch(&mut self, stop: &StopSignal) -> BatchOutcome {
        let groups = match self.checkpoint.pending(&self.conn) {
            Ok(groups) => groups,
            Err(e) => {
                tracing::error!("{}: loading progress failed: {}", self.name, e);
                return BatchOutcome::Continue;
            }
        };

        for mut group in groups {
            if stop.is_requested() {
                return BatchOutcome::Interrupted;
            }
            let Some(processor) = self.processors.get(&group.processor).cloned() else {
                continue;
            };

            let report = {
                let mut processor = processor.lock();
                replay_group(&mut self.conn, &mut *processor, &mut group, self.max_batch, stop)
            };
            if report.end == BatchEnd::Stopped || stop.is_requested() {
                return BatchOutcome::Interrupted;
            }

            if let Err(e) = self.checkpoint.try_transition(&mut self.conn, &mut group) {
                tracing::error!("{}: try to transfer '{}' failed: {}", self.name, group.processor, e);
            }
        }

        match self.checkpoint.has_pending(&self.conn) {
            Ok(true) => BatchOutcome::Continue,
            Ok(false) => BatchOutcome::Done,
            Err(e) => {
                tracing::warn!("{}: {}", self.name, e);
                BatchOutcome::Continue
            }
        }
    }
}

/// Registers processor groups and runs both managers.
pub struct Bootstrap {
    config: NodeConfig,
    processors: BTreeMap<String, SharedProcessor>,
    workers: Vec<ReplayWorker>,
}

impl Bootstrap {
    pub fn new(config: NodeConfig) -> Self {
        Self {
            config,
            processors: BTreeMap::new(),
            workers: Vec::new(),
        }
    }

    /// Adds a named group. Registration after `start` takes effect on the
    /// next start.
    pub fn register(&mut self, name: &str, processor: impl BlockLogProcessor<Connection> + Send + 'static) -> &mut Self {
        let shared: SharedProcessor = Arc::new(Mutex::new(processor));
        if self.processors.insert(name.to_string(), shared).is_some() {
            tracing::warn!("Processor group '{}' registered twice, keeping the latest", name);
        }
        self
    }

    pub fn groups(&self) -> Vec<String> {
        self.processors.keys().cloned().collect()
    }

    pub fn is_running(&self) -> bool {
        !self.workers.is_empty()
    }

    /// Creates missing progress rows, then starts the catch-up and tailing
    /// managers on connections of their own.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        let conn = self.open()?;
        progress::ensure_schema(&conn)?;
        crate::block_store::ensure_schema(&conn)?;
        for name in self.processors.keys() {
            progress::ensure(&conn, name)?;
        }
        drop(conn);

        let registry: ProcessorRegistry = Arc::new(self.processors.clone());
        let catch_up = ForwardManager::new(
            self.open()?,
            CatchUp::new(self.config.fast_forward_threshold),
            registry.clone(),
            self.config.max_batch,
        );
        let tailing = ForwardManager::new(self.open()?, Tailing, registry, self.config.max_batch);

        self.workers.push(ReplayWorker::spawn(catch_up, self.config.replay_delay)?);
        self.workers.push(ReplayWorker::spawn(tailing, self.config.replay_delay)?);
        tracing::info!("Bootstrap started {} processor groups", self.processors.len());
        Ok(())
    }

    /// Stops both managers, waiting for any in-flight batch.
    pub fn stop(&mut self) {
        for worker in self.workers.iter_mut() {
            worker.stop();
        }
        self.workers.clear();
    }

    fn open(&self) -> Result<Connection> {
        db::open(&self.config.db_path, self.config.busy_timeout)
    }
}

impl Drop for Bootstrap {
    fn drop(&mut self) {
        self.stop();
    }
}
