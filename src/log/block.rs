// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Operation, transaction and block logs.

use super::change::StateChange;
use crate::config::STATUS_SUCCESS;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct OperationData {
    #[serde(rename = "type")]
    pub op_type: String,
    #[serde(default)]
    pub data: Value,
}

impl OperationData {
    pub fn new(op_type: impl Into<String>, data: Value) -> Self {
        Self {
            op_type: op_type.into(),
            data,
        }
    }
}

/// One applied operation and the changes directly attributed to it.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct OperationLog {
    pub op: OperationData,
    #[serde(default)]
    pub changes: Vec<StateChange>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub status: u32,
    #[serde(default)]
    pub net_usage: u64,
    #[serde(default)]
    pub cpu_usage: u64,
    #[serde(default)]
    pub error_info: String,
}

impl TransactionReceipt {
    pub fn success() -> Self {
        Self {
            status: STATUS_SUCCESS,
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TransactionLog {
    #[serde(rename = "id")]
    pub trx_id: String,
    #[serde(default)]
    pub receipt: TransactionReceipt,
    #[serde(rename = "ops", default)]
    pub operations: Vec<OperationLog>,
}

/// Everything one block did to state.
///
/// `changes` holds the block-level effects that no operation owns
/// (end-of-block rewards and the like).
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct BlockLog {
    #[serde(rename = "id")]
    pub block_id: String,
    #[serde(rename = "num")]
    pub block_num: u64,
    #[serde(rename = "time", default)]
    pub block_time: u32,
    #[serde(rename = "trxs", default)]
    pub transactions: Vec<TransactionLog>,
    #[serde(default)]
    pub changes: Vec<StateChange>,
}

impl BlockLog {
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn operation(&self, trx_idx: usize, op_idx: usize) -> Option<&OperationLog> {
        self.transactions.get(trx_idx)?.operations.get(op_idx)
    }

    /// Number of captured changes, operation-level and block-level.
    pub fn change_count(&self) -> usize {
        let attributed: usize = self
            .transactions
            .iter()
            .flat_map(|t| t.operations.iter())
            .map(|o| o.changes.len())
            .sum();
        attributed + self.changes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{ChangeKind, GenericChange};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn sample_log() -> BlockLog {
        let mut extra = BTreeMap::new();
        extra.insert("post".to_string(), json!(18_446_744_073_709_551_000u64));
        BlockLog {
            block_id: "00000007abcdef".to_string(),
            block_num: 7,
            block_time: 1_600_000_000,
            transactions: vec![TransactionLog {
                trx_id: "aa".repeat(32),
                receipt: TransactionReceipt::success(),
                operations: vec![OperationLog {
                    op: OperationData::new("transfer", json!({"from": "a", "to": "b", "amount": 9_007_199_254_740_993u64})),
                    changes: vec![StateChange {
                        what: "Account.Balance".to_string(),
                        kind: ChangeKind::Update,
                        cause: "esys.reward".to_string(),
                        cause_extra: extra,
                        change: GenericChange::new("a", 9_007_199_254_740_993u64, u64::MAX),
                    }],
                }],
            }],
            changes: vec![StateChange {
                what: "Account.Vest".to_string(),
                kind: ChangeKind::Create,
                cause: "esys".to_string(),
                cause_extra: BTreeMap::new(),
                change: GenericChange::new("b", 0u64, 1u64),
            }],
        }
    }

    #[test]
    fn test_block_log_roundtrip_keeps_large_integers() {
        let log = sample_log();
        let text = log.to_json_string().unwrap();
        let decoded = BlockLog::from_json_str(&text).unwrap();

        assert_eq!(log, decoded, "BlockLog must survive a JSON roundtrip");
        let after = &decoded.transactions[0].operations[0].changes[0].change.after;
        assert_eq!(after.as_u64(), Some(u64::MAX));
        assert!(!after.is_f64());
    }

    #[test]
    fn test_wire_field_names() {
        let value = serde_json::to_value(sample_log()).unwrap();
        assert!(value.get("id").is_some());
        assert!(value.get("num").is_some());
        assert!(value["trxs"][0].get("ops").is_some());
        assert_eq!(value["trxs"][0]["ops"][0]["op"]["type"], "transfer");
    }

    #[test]
    fn test_float_values_survive_exactly() {
        let floats: [f64; 6] = [0.1, 1.0 / 3.0, 2.2250738585072014e-308, 1.7976931348623157e308, 4.35, 123_456.789_012_345_67];
        let mut log = BlockLog::default();
        for (i, f) in floats.iter().enumerate() {
            log.changes.push(StateChange {
                what: "Witness.VoteCount".to_string(),
                kind: ChangeKind::Update,
                cause: String::new(),
                cause_extra: BTreeMap::new(),
                change: GenericChange::new(i as u64, *f, -*f),
            });
        }

        let decoded = BlockLog::from_json_str(&log.to_json_string().unwrap()).unwrap();
        for (change, f) in decoded.changes.iter().zip(floats) {
            assert_eq!(change.change.before.as_f64().unwrap().to_bits(), f.to_bits());
            assert_eq!(change.change.after.as_f64().unwrap().to_bits(), (-f).to_bits());
        }
        assert_eq!(decoded, log);
    }

    #[test]
    fn test_decode_tolerates_missing_and_unknown_fields() {
        let log = BlockLog::from_json_str(r#"{"id":"ff","num":3,"producer":"x"}"#).unwrap();
        assert_eq!(log.block_num, 3);
        assert!(log.transactions.is_empty());
        assert!(log.changes.is_empty());
    }

    #[test]
    fn test_change_count_and_lookup() {
        let log = sample_log();
        assert_eq!(log.change_count(), 2);
        assert!(log.operation(0, 0).is_some());
        assert!(log.operation(0, 1).is_none());
        assert!(log.operation(1, 0).is_none());
    }
}
