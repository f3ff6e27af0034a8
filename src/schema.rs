//! Field schema compilation.
//!
//! A cache instance is constructed with an ordered list of field
//! descriptors. Compilation assigns each field a compact slot-key (its
//! 1-based position rendered as a short decimal key, so stored records
//! stay compactly serializable), classifies it as immutable, mutable, or
//! lock-bearing, and freezes the result. Nothing modifies a schema after
//! construction.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use thiserror::Error;

use crate::record::RecordData;

/// Descriptor for one record field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldSpec {
    /// Human-readable field name used in `set`/`get` payloads.
    pub input: String,
    /// Once set, the field's value never changes.
    #[serde(default)]
    pub immutable: bool,
    /// The field may be overwritten even after the record is locked.
    #[serde(default)]
    pub mutable: bool,
    /// Presence of a value in this field locks the record. At most one
    /// field per schema may carry this flag.
    #[serde(default)]
    pub lock_key: bool,
}

impl FieldSpec {
    /// Descriptor for a plain field named `input`.
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }

    /// Mark the field immutable.
    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    /// Mark the field mutable.
    pub fn mutable(mut self) -> Self {
        self.mutable = true;
        self
    }

    /// Mark the field as the record lock.
    pub fn lock_key(mut self) -> Self {
        self.lock_key = true;
        self
    }
}

/// Errors detected while compiling a parameter list.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The parameter list was empty.
    #[error("schema parameter list is empty")]
    Empty,
    /// Two descriptors share the same field name.
    #[error("duplicate field name: {0}")]
    DuplicateField(String),
    /// More than one descriptor carries the lock flag.
    #[error("more than one lock field: {0} and {1}")]
    MultipleLockFields(String, String),
}

/// Compiled schema: slot-key assignment plus field classification.
#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<FieldSpec>,
    storage_map: HashMap<String, String>,
    readable_map: HashMap<String, String>,
    immutable_names: HashSet<String>,
    mutable_names: HashSet<String>,
    lock_slot_key: String,
}

impl Schema {
    /// Compile an ordered parameter list.
    pub fn compile(params: &[FieldSpec]) -> Result<Self, SchemaError> {
        if params.is_empty() {
            return Err(SchemaError::Empty);
        }

        let mut storage_map = HashMap::with_capacity(params.len());
        let mut readable_map = HashMap::with_capacity(params.len());
        let mut immutable_names = HashSet::new();
        let mut mutable_names = HashSet::new();
        let mut lock_field: Option<&FieldSpec> = None;
        let mut lock_slot_key = String::new();

        for (index, field) in params.iter().enumerate() {
            let slot_key = (index + 1).to_string();
            if storage_map
                .insert(field.input.clone(), slot_key.clone())
                .is_some()
            {
                return Err(SchemaError::DuplicateField(field.input.clone()));
            }
            readable_map.insert(slot_key.clone(), field.input.clone());

            if field.immutable {
                immutable_names.insert(field.input.clone());
            }
            if field.mutable {
                mutable_names.insert(field.input.clone());
            }
            if field.lock_key {
                if let Some(previous) = lock_field {
                    return Err(SchemaError::MultipleLockFields(
                        previous.input.clone(),
                        field.input.clone(),
                    ));
                }
                lock_field = Some(field);
                lock_slot_key = slot_key;
            }
        }

        Ok(Self {
            fields: params.to_vec(),
            storage_map,
            readable_map,
            immutable_names,
            mutable_names,
            lock_slot_key,
        })
    }

    /// Slot-key assigned to `name`, or `None` when the field is not in
    /// the schema.
    pub fn slot_key(&self, name: &str) -> Option<&str> {
        self.storage_map.get(name).map(String::as_str)
    }

    /// Human name behind `slot_key`, or `None` for unknown keys.
    pub fn field_name(&self, slot_key: &str) -> Option<&str> {
        self.readable_map.get(slot_key).map(String::as_str)
    }

    /// Whether `name` is flagged immutable.
    pub fn is_immutable(&self, name: &str) -> bool {
        self.immutable_names.contains(name)
    }

    /// Whether `name` is flagged mutable.
    pub fn is_mutable(&self, name: &str) -> bool {
        self.mutable_names.contains(name)
    }

    /// Slot-key of the lock field; empty string when the schema has no
    /// lock field.
    pub fn lock_slot_key(&self) -> &str {
        &self.lock_slot_key
    }

    /// Whether the schema declares a lock field.
    pub fn has_lock_field(&self) -> bool {
        !self.lock_slot_key.is_empty()
    }

    /// Canonical empty record for this schema.
    pub fn empty_record(&self) -> RecordData {
        RecordData::default()
    }

    /// Field descriptors in declaration order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Number of declared fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema has no fields (never true for a compiled one).
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
