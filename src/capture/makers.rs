// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Entity/field pairs worth capturing and how to turn their raw values into
//! a `GenericChange`.

use super::source::FieldValue;
use crate::log::GenericChange;
use serde_json::Value;

pub type ChangeMaker = fn(&FieldValue, &FieldValue, &FieldValue) -> GenericChange;

#[derive(Clone, Copy, Debug)]
pub struct InterestedChange {
    pub entity: &'static str,
    /// Empty for whole-record watches.
    pub field: &'static str,
    pub what: &'static str,
    pub maker: ChangeMaker,
}

/// Balance-like fields. A missing side counts as zero.
pub fn amount_change(key: &FieldValue, before: &FieldValue, after: &FieldValue) -> GenericChange {
    GenericChange {
        id: key.to_json(),
        before: Value::from(before.as_u64().unwrap_or(0)),
        after: Value::from(after.as_u64().unwrap_or(0)),
    }
}

/// Whole records and scalar fields copied as-is. A missing side is `null`.
pub fn value_change(key: &FieldValue, before: &FieldValue, after: &FieldValue) -> GenericChange {
    GenericChange {
        id: key.to_json(),
        before: before.to_json(),
        after: after.to_json(),
    }
}

macro_rules! interested {
    ($entity:literal, $field:literal, $maker:path) => {
        InterestedChange {
            entity: $entity,
            field: $field,
            what: concat!($entity, ".", $field),
            maker: $maker,
        }
    };
    ($entity:literal, $maker:path) => {
        InterestedChange {
            entity: $entity,
            field: "",
            what: $entity,
            maker: $maker,
        }
    };
}

pub const INTERESTED_CHANGES: &[InterestedChange] = &[
    interested!("Account", "Balance", amount_change),
    interested!("Account", "Vest", amount_change),
    interested!("Account", "StakeVestFromMe", amount_change),
    interested!("Account", "StakeVestForMe", amount_change),
    interested!("Account", "BorrowedVest", amount_change),
    interested!("Account", "LentVest", amount_change),
    interested!("Account", "DeliveringVest", amount_change),
    interested!("Account", "ToPowerdown", amount_change),
    interested!("Contract", "Balance", amount_change),
    interested!("Witness", "VoteCount", amount_change),
    interested!("Nft", "Owner", value_change),
    interested!("Sbt", "Owner", value_change),
    interested!("WitnessVote", value_change),
    interested!("StakeRecord", value_change),
    interested!("VestDelegation", value_change),
];

pub fn find(entity: &str, field: &str) -> Option<&'static InterestedChange> {
    INTERESTED_CHANGES.iter().find(|e| e.entity == entity && e.field == field)
}
