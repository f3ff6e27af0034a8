#![doc = include_str!("../README.md")]
//!
//! # Architecture
//!
//! All durable state lives in three shared-store namespaces:
//!
//! - `ring`: slot position → encoded record
//! - `index`: identifier → slot position
//! - `stats`: counters and control flags
//!
//! The [`RingCache`] object itself is effectively stateless past
//! construction, so parallel request handlers share one instance and
//! coordinate purely through the store's atomic `incr` (cursor
//! advancement) and first-writer-wins `add` (sizing lock, drain gate).

#![warn(missing_docs)]

pub mod config;
pub mod record;
pub mod ring;
pub mod schema;
pub mod stats;
pub mod store;

// Re-exports for convenience
pub use config::{ConfigError, RingConfig, RingdexConfig};
pub use record::{FieldMap, RecordData, SlotEntry};
pub use ring::{
    DrainOutcome, EjectError, EjectRequest, EjectSink, EjectTransport, RingCache, RingError,
    SetOutcome,
};
pub use schema::{FieldSpec, Schema, SchemaError};
pub use stats::CacheStats;
pub use store::{MemoryStore, SharedStore, StoreError};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::config::RingConfig;
    pub use crate::record::FieldMap;
    pub use crate::ring::{
        DrainOutcome, EjectError, EjectSink, EjectTransport, RingCache, SetOutcome,
    };
    pub use crate::schema::{FieldSpec, Schema};
    pub use crate::store::{MemoryStore, SharedStore};
}
