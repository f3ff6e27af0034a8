//! Record storage model and merge policy.
//!
//! Records live in ring slots keyed by compact slot-keys rather than by
//! human field names; [`RecordData::to_readable`] projects them back to
//! human names at the read boundary. The wire format is a JSON object,
//! so an empty record (`{}`) stays distinguishable from an absent slot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::Schema;

/// Fields keyed by human name: both the incoming payload of `set` and
/// the readable projection returned by `get`.
pub type FieldMap = BTreeMap<String, String>;

/// Internal record representation: values keyed by compact slot-key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordData(BTreeMap<String, String>);

impl RecordData {
    /// Whether the record holds no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of populated fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Value stored under `slot_key`.
    pub fn get(&self, slot_key: &str) -> Option<&str> {
        self.0.get(slot_key).map(String::as_str)
    }

    /// Merge incoming human-named fields into this record.
    ///
    /// A field is written iff its slot is currently empty (first write
    /// always wins), or it is not immutable and either the record is
    /// unlocked or the field is explicitly mutable. Fields outside the
    /// schema and empty-string values (the "unset" sentinel) are skipped.
    ///
    /// The locked flag is computed once from the record as it stood at
    /// entry: a write that introduces the lock value does not constrain
    /// later fields of the same call.
    pub fn merge(&mut self, schema: &Schema, incoming: &FieldMap) {
        let locked = schema.has_lock_field() && self.0.contains_key(schema.lock_slot_key());

        for (name, value) in incoming {
            let Some(slot_key) = schema.slot_key(name) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            let vacant = !self.0.contains_key(slot_key);
            if vacant || (!schema.is_immutable(name) && (!locked || schema.is_mutable(name))) {
                self.0.insert(slot_key.to_string(), value.clone());
            }
        }
    }

    /// Project the record back to human field names, omitting absent
    /// fields and any slot-keys the schema does not know.
    pub fn to_readable(&self, schema: &Schema) -> FieldMap {
        let mut readable = FieldMap::new();
        for (slot_key, value) in &self.0 {
            if let Some(name) = schema.field_name(slot_key) {
                readable.insert(name.to_string(), value.clone());
            }
        }
        readable
    }
}

/// One occupied ring slot: the owning identifier plus its record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotEntry {
    /// Identifier that owns the slot.
    pub key: String,
    /// The record itself, slot-keyed.
    pub data: RecordData,
}

impl SlotEntry {
    /// New entry owned by `key` holding `data`.
    pub fn new(key: impl Into<String>, data: RecordData) -> Self {
        Self {
            key: key.into(),
            data,
        }
    }

    /// Serialize for storage.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize a stored slot value.
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
