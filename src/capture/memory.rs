// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! In-memory, branch-aware state store.
//!
//! Trunk holds committed values; every other branch is an overlay on top of
//! trunk until it is committed or discarded. Writes report field changes to
//! registered watchers after the store lock is released.

use super::source::{FieldCallback, FieldChangeSource, FieldEventKind, FieldValue};
use crate::config::TRUNK_BRANCH;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

type RecordKey = (String, String);
type Records = BTreeMap<RecordKey, Option<BTreeMap<String, FieldValue>>>;

fn key_repr(key: &FieldValue) -> String {
    key.to_json().to_string()
}

#[derive(Default)]
pub struct MemoryStateStore {
    /// branch -> (entity, key) -> record (`None` = deleted on that branch)
    branches: RwLock<FxHashMap<String, Records>>,
    keys: RwLock<FxHashMap<RecordKey, FieldValue>>,
    watchers: RwLock<FxHashMap<(String, String), Vec<Arc<FieldCallback>>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup(&self, branch: &str, rk: &RecordKey) -> Option<BTreeMap<String, FieldValue>> {
        let branches = self.branches.read();
        if branch != TRUNK_BRANCH {
            if let Some(entry) = branches.get(branch).and_then(|b| b.get(rk)) {
                return entry.clone();
            }
        }
        branches.get(TRUNK_BRANCH).and_then(|b| b.get(rk)).cloned().flatten()
    }

    pub fn get(&self, branch: &str, entity: &str, key: &FieldValue, field: &str) -> Option<FieldValue> {
        let rk = (entity.to_string(), key_repr(key));
        self.lookup(branch, &rk)?.get(field).cloned()
    }

    /// Sets one field, creating the record if needed.
    pub fn put(&self, branch: &str, entity: &str, key: FieldValue, field: &str, value: FieldValue) {
        let rk = (entity.to_string(), key_repr(&key));
        let before = self.lookup(branch, &rk);
        let mut after = before.clone().unwrap_or_default();
        after.insert(field.to_string(), value);
        self.write(branch, entity, rk, key, before, Some(after));
    }

    pub fn delete(&self, branch: &str, entity: &str, key: FieldValue) {
        let rk = (entity.to_string(), key_repr(&key));
        let before = self.lookup(branch, &rk);
        if before.is_some() {
            self.write(branch, entity, rk, key, before, None);
        }
    }

    fn write(
        &self,
        branch: &str,
        entity: &str,
        rk: RecordKey,
        key: FieldValue,
        before: Option<BTreeMap<String, FieldValue>>,
        after: Option<BTreeMap<String, FieldValue>>,
    ) {
        self.branches
            .write()
            .entry(branch.to_string())
            .or_default()
            .insert(rk.clone(), after.clone());
        self.keys.write().insert(rk, key.clone());

        let event = match (&before, &after) {
            (None, _) => FieldEventKind::Insert,
            (Some(_), Some(_)) => FieldEventKind::Update,
            (Some(_), None) => FieldEventKind::Delete,
        };
        self.notify(branch, entity, event, &key, before.as_ref(), after.as_ref());
    }

    fn notify(
        &self,
        branch: &str,
        entity: &str,
        event: FieldEventKind,
        key: &FieldValue,
        before: Option<&BTreeMap<String, FieldValue>>,
        after: Option<&BTreeMap<String, FieldValue>>,
    ) {
        let callbacks: Vec<(String, Arc<FieldCallback>)> = self
            .watchers
            .read()
            .iter()
            .filter(|((e, _), _)| e == entity)
            .flat_map(|((_, f), cbs)| cbs.iter().map(move |cb| (f.clone(), cb.clone())))
            .collect();

        for (field, callback) in callbacks {
            let (old, new) = if field.is_empty() {
                (
                    before.map(|r| FieldValue::Record(r.clone())).unwrap_or_default(),
                    after.map(|r| FieldValue::Record(r.clone())).unwrap_or_default(),
                )
            } else {
                let old = before.and_then(|r| r.get(&field)).cloned().unwrap_or_default();
                let new = after.and_then(|r| r.get(&field)).cloned().unwrap_or_default();
                if old == new {
                    continue;
                }
                (old, new)
            };
            (callback.as_ref())(branch, event, key, &old, &new);
        }
    }

    /// Folds a branch overlay into trunk.
    pub fn commit_branch(&self, branch: &str) {
        if branch == TRUNK_BRANCH {
            return;
        }
        let mut branches = self.branches.write();
        if let Some(overlay) = branches.remove(branch) {
            let trunk = branches.entry(TRUNK_BRANCH.to_string()).or_default();
            for (rk, record) in overlay {
                trunk.insert(rk, record);
            }
        }
    }

    pub fn discard_branch(&self, branch: &str) {
        if branch != TRUNK_BRANCH {
            self.branches.write().remove(branch);
        }
    }

    /// Committed key of every live record of `entity`.
    pub fn keys_of(&self, entity: &str) -> Vec<FieldValue> {
        let branches = self.branches.read();
        let keys = self.keys.read();
        branches
            .get(TRUNK_BRANCH)
            .map(|trunk| {
                trunk
                    .iter()
                    .filter(|((e, _), rec)| e == entity && rec.is_some())
                    .filter_map(|(rk, _)| keys.get(rk).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl FieldChangeSource for MemoryStateStore {
    fn on_field_change(&self, entity: &str, field: &str, callback: FieldCallback) {
        self.watchers
            .write()
            .entry((entity.to_string(), field.to_string()))
            .or_default()
            .push(Arc::new(callback));
    }
}
