// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Field-level changes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Create => "create",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }
}

/// Identity and before/after values of one mutated field.
///
/// Values are opaque JSON so the capture machinery never depends on the
/// concrete field types.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct GenericChange {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub before: Value,
    #[serde(default)]
    pub after: Value,
}

impl GenericChange {
    pub fn new(id: impl Into<Value>, before: impl Into<Value>, after: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            before: before.into(),
            after: after.into(),
        }
    }
}

/// One captured mutation.
///
/// `cause` is the dot-joined cause stack of the capturing context at the
/// moment of capture and never changes afterwards.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StateChange {
    pub what: String,
    pub kind: ChangeKind,
    #[serde(default)]
    pub cause: String,
    #[serde(default)]
    pub cause_extra: BTreeMap<String, Value>,
    #[serde(default)]
    pub change: GenericChange,
}

impl StateChange {
    /// Entity half of `what`, e.g. `Account` for `Account.Balance`.
    pub fn entity(&self) -> &str {
        self.what.split('.').next().unwrap_or_default()
    }

    /// Field half of `what`, empty for whole-record changes.
    pub fn field(&self) -> &str {
        self.what.split_once('.').map(|(_, f)| f).unwrap_or_default()
    }
}
