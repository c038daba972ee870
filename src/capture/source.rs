// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Contract with the underlying key/value state store.

use crate::log::ChangeKind;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldEventKind {
    Insert,
    Update,
    Delete,
}

impl From<FieldEventKind> for ChangeKind {
    fn from(kind: FieldEventKind) -> Self {
        match kind {
            FieldEventKind::Insert => ChangeKind::Create,
            FieldEventKind::Update => ChangeKind::Update,
            FieldEventKind::Delete => ChangeKind::Delete,
        }
    }
}

/// Typed value of a key, a field, or a whole record as seen by the store.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum FieldValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Text(String),
    Record(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::UInt(v) => Some(*v),
            FieldValue::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        match self {
            FieldValue::Record(fields) => fields.get(name),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(v) => Value::Bool(*v),
            FieldValue::Int(v) => Value::from(*v),
            FieldValue::UInt(v) => Value::from(*v),
            FieldValue::Text(v) => Value::String(v.clone()),
            FieldValue::Record(fields) => {
                let map: Map<String, Value> = fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();
                Value::Object(map)
            }
        }
    }

    pub fn record<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, FieldValue)>,
        K: Into<String>,
    {
        FieldValue::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::UInt(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

/// `callback(branch, event, key, before, after)`, fired synchronously on
/// every committed or speculative mutation.
pub type FieldCallback =
    Box<dyn Fn(&str, FieldEventKind, &FieldValue, &FieldValue, &FieldValue) + Send + Sync>;

pub trait FieldChangeSource {
    /// Watches `entity.field`, or the whole record when `field` is empty.
    fn on_field_change(&self, entity: &str, field: &str, callback: FieldCallback);
}
