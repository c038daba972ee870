// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Per-branch change accumulator.
//!
//! # Flow
//! 1. `push_cause()` / `pop_cause()` - track why we are mutating
//! 2. `add_change()` - snapshot a mutation with the current cause
//! 3. `restore_point()` / `restore()` - drop speculative changes
//! 4. the watcher drains the changes when the block ends

use crate::config::CAUSE_SEPARATOR;
use crate::log::{ChangeKind, GenericChange, StateChange};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A captured change before its transaction's position in the block is known.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingChange {
    pub change: StateChange,
    pub trx_id: String,
    /// Resolved once, when the block ends. `None` for block-level changes.
    pub trx_idx: Option<usize>,
    pub op_idx: Option<usize>,
}

#[derive(Debug)]
pub struct StateChangeContext {
    branch: String,
    trx_id: String,
    op: Option<usize>,
    causes: Vec<String>,
    cause_extras: Vec<BTreeMap<String, Value>>,
    changes: Vec<PendingChange>,
}

impl StateChangeContext {
    pub fn new(branch: impl Into<String>, trx_id: impl Into<String>, op: Option<usize>, cause: &str) -> Self {
        let mut ctx = Self {
            branch: branch.into(),
            trx_id: trx_id.into(),
            op,
            causes: Vec::new(),
            cause_extras: Vec::new(),
            changes: Vec::new(),
        };
        ctx.push_cause(cause);
        ctx
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn trx_id(&self) -> &str {
        &self.trx_id
    }

    pub fn operation(&self) -> Option<usize> {
        self.op
    }

    pub fn set_operation(&mut self, op: Option<usize>) {
        self.op = op;
    }

    pub fn set_trx_and_operation(&mut self, trx_id: impl Into<String>, op: Option<usize>) {
        self.trx_id = trx_id.into();
        self.op = op;
    }

    /// Replaces the whole cause stack with `cause` (or empties it).
    pub fn set_cause(&mut self, cause: &str) {
        self.causes.clear();
        self.cause_extras.clear();
        self.push_cause(cause);
    }

    pub fn push_cause(&mut self, cause: &str) {
        if cause.is_empty() {
            return;
        }
        self.causes.push(cause.to_string());
        self.cause_extras.push(BTreeMap::new());
    }

    pub fn pop_cause(&mut self) {
        self.causes.pop();
        self.cause_extras.pop();
    }

    pub fn pop_and_push_cause(&mut self, cause: &str) {
        self.pop_cause();
        self.push_cause(cause);
    }

    pub fn cause(&self) -> String {
        self.causes.join(CAUSE_SEPARATOR)
    }

    pub fn cause_depth(&self) -> usize {
        self.causes.len()
    }

    /// Attaches side-channel data to the innermost cause. Dropped if the
    /// stack is empty.
    pub fn put_cause_extra(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        if let Some(extra) = self.cause_extras.last_mut() {
            extra.insert(key.into(), value.into());
        }
    }

    /// All frames merged outermost first; inner frames win on key clashes.
    pub fn cause_extra(&self) -> BTreeMap<String, Value> {
        let mut merged = BTreeMap::new();
        for extra in &self.cause_extras {
            for (k, v) in extra {
                merged.insert(k.clone(), v.clone());
            }
        }
        merged
    }

    pub fn add_change(&mut self, what: impl Into<String>, kind: ChangeKind, change: GenericChange) {
        let change = StateChange {
            what: what.into(),
            kind,
            cause: self.cause(),
            cause_extra: self.cause_extra(),
            change,
        };
        self.changes.push(PendingChange {
            change,
            trx_id: self.trx_id.clone(),
            trx_idx: None,
            op_idx: self.op,
        });
    }

    pub fn clear_changes(&mut self) {
        self.changes.clear();
    }

    pub fn changes(&self) -> &[PendingChange] {
        &self.changes
    }

    pub fn take_changes(&mut self) -> Vec<PendingChange> {
        std::mem::take(&mut self.changes)
    }

    pub fn restore_point(&self) -> usize {
        self.changes.len()
    }

    /// Truncates back to `restore_point`. Points past the end are ignored.
    pub fn restore(&mut self, restore_point: usize) {
        if restore_point <= self.changes.len() {
            self.changes.truncate(restore_point);
        }
    }
}

/// Shared, possibly absent, reference to a branch context.
///
/// Every method is a no-op on an empty handle so that code paths running
/// without a watcher need no special casing.
#[derive(Clone, Debug, Default)]
pub struct ContextHandle(Option<Arc<Mutex<StateChangeContext>>>);

impl ContextHandle {
    pub fn none() -> Self {
        Self(None)
    }

    pub(crate) fn from_shared(ctx: Arc<Mutex<StateChangeContext>>) -> Self {
        Self(Some(ctx))
    }

    /// Standalone handle not owned by any watcher.
    pub fn detached(ctx: StateChangeContext) -> Self {
        Self(Some(Arc::new(Mutex::new(ctx))))
    }

    pub fn is_active(&self) -> bool {
        self.0.is_some()
    }

    pub fn same_as(&self, other: &ContextHandle) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn with<R: Default>(&self, f: impl FnOnce(&mut StateChangeContext) -> R) -> R {
        match &self.0 {
            Some(ctx) => f(&mut ctx.lock()),
            None => R::default(),
        }
    }

    pub fn set_operation(&self, op: Option<usize>) {
        self.with(|c| c.set_operation(op))
    }

    pub fn set_trx_and_operation(&self, trx_id: &str, op: Option<usize>) {
        self.with(|c| c.set_trx_and_operation(trx_id, op))
    }

    pub fn set_cause(&self, cause: &str) {
        self.with(|c| c.set_cause(cause))
    }

    pub fn push_cause(&self, cause: &str) {
        self.with(|c| c.push_cause(cause))
    }

    pub fn pop_cause(&self) {
        self.with(|c| c.pop_cause())
    }

    pub fn pop_and_push_cause(&self, cause: &str) {
        self.with(|c| c.pop_and_push_cause(cause))
    }

    pub fn cause(&self) -> String {
        self.with(|c| c.cause())
    }

    pub fn put_cause_extra(&self, key: &str, value: impl Into<Value>) {
        self.with(|c| c.put_cause_extra(key, value))
    }

    pub fn cause_extra(&self) -> BTreeMap<String, Value> {
        self.with(|c| c.cause_extra())
    }

    pub fn add_change(&self, what: &str, kind: ChangeKind, change: GenericChange) {
        self.with(|c| c.add_change(what, kind, change))
    }

    pub fn clear_changes(&self) {
        self.with(|c| c.clear_changes())
    }

    pub fn changes(&self) -> Vec<PendingChange> {
        self.with(|c| c.changes().to_vec())
    }

    pub fn restore_point(&self) -> usize {
        self.with(|c| c.restore_point())
    }

    pub fn restore(&self, restore_point: usize) {
        self.with(|c| c.restore(restore_point))
    }

    /// Pushes `cause` and pops it again when the guard drops.
    pub fn cause_scope(&self, cause: &str) -> CauseGuard {
        let pushed = !cause.is_empty();
        self.push_cause(cause);
        CauseGuard {
            handle: self.clone(),
            pushed,
        }
    }
}

#[must_use = "the cause is popped as soon as the guard is dropped"]
pub struct CauseGuard {
    handle: ContextHandle,
    pushed: bool,
}

impl Drop for CauseGuard {
    fn drop(&mut self) {
        if self.pushed {
            self.handle.pop_cause();
        }
    }
}
