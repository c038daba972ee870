// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Replay Worker - batch scheduling and blocking shutdown
//!
//! # Protocol
//! ```text
//! Idle --delay elapsed--> Working --batch done--> Idle
//!   |                                     |
//!   +------------ stop() --------> Stopped <+
//! ```
//!
//! The next batch is scheduled a fixed delay after the previous one ends,
//! never on a fixed rate, so batches cannot overlap.
//!
//! # Invariants
//! - `stop()` returns only once no batch is in flight
//! - A batch that observes the stop request leaves nothing committed for the
//!   block it was working on

use chainlog_kernel::processor::StopSignal;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Schedule the next batch after the delay.
    Continue,
    /// Nothing left to do; stay parked until stopped.
    Done,
    /// The stop request was observed mid-batch.
    Interrupted,
}

/// One unit of scheduled work.
pub trait ReplayJob: Send + 'static {
    fn name(&self) -> &str;

    fn run_batch(&mut self, stop: &StopSignal) -> BatchOutcome;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerPhase {
    Idle,
    Working,
    Stopped,
}

struct Shared {
    phase: Mutex<WorkerPhase>,
    cond: Condvar,
    stop: StopSignal,
}

impl Shared {
    /// Waits up to `delay`, or until stopped. Returns `true` if stopped.
    fn sleep(&self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        let mut phase = self.phase.lock();
        while !self.stop.is_requested() {
            if self.cond.wait_until(&mut phase, deadline).timed_out() {
                break;
            }
        }
        if self.stop.is_requested() {
            *phase = WorkerPhase::Stopped;
            self.cond.notify_all();
            return true;
        }
        *phase = WorkerPhase::Working;
        false
    }

    fn park(&self) {
        let mut phase = self.phase.lock();
        while !self.stop.is_requested() {
            self.cond.wait(&mut phase);
        }
        *phase = WorkerPhase::Stopped;
        self.cond.notify_all();
    }

    fn finish_batch(&self) {
        let mut phase = self.phase.lock();
        *phase = WorkerPhase::Idle;
        self.cond.notify_all();
    }
}

pub struct ReplayWorker {
    name: String,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl ReplayWorker {
    /// Starts `job` on its own thread. The first batch runs after `delay`.
    pub fn spawn<J: ReplayJob>(mut job: J, delay: Duration) -> std::io::Result<Self> {
        let name = job.name().to_string();
        let shared = Arc::new(Shared {
            phase: Mutex::new(WorkerPhase::Idle),
            cond: Condvar::new(),
            stop: StopSignal::new(),
        });

        let thread_shared = shared.clone();
        let handle = std::thread::Builder::new().name(name.clone()).spawn(move || {
            let shared = thread_shared;
            loop {
                if shared.sleep(delay) {
                    break;
                }
                let outcome = job.run_batch(&shared.stop);
                shared.finish_batch();
                match outcome {
                    BatchOutcome::Continue => continue,
                    BatchOutcome::Done => {
                        tracing::info!("{}: no more work, parked", job.name());
                        shared.park();
                        break;
                    }
                    BatchOutcome::Interrupted => {
                        shared.park();
                        break;
                    }
                }
            }
            tracing::debug!("{}: worker exited", job.name());
        })?;

        tracing::info!("{}: worker started", name);
        Ok(Self {
            name,
            shared,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> WorkerPhase {
        *self.shared.phase.lock()
    }

    /// Requests a stop and blocks until the in-flight batch, if any, has
    /// returned and the thread has exited.
    pub fn stop(&mut self) {
        self.shared.stop.request();
        {
            let mut phase = self.shared.phase.lock();
            self.shared.cond.notify_all();
            while *phase == WorkerPhase::Working {
                self.shared.cond.wait(&mut phase);
            }
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("{}: worker thread panicked", self.name);
            }
        }
        tracing::info!("{}: worker stopped", self.name);
    }
}

impl Drop for ReplayWorker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
        }
    }
}
