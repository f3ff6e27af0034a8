//! Shared-store boundary.
//!
//! Every piece of durable cache state lives in a keyed shared store: slot
//! contents, the identifier index, and the counters that drive sizing
//! decisions. The ring core is generic over [`SharedStore`], so the same
//! cache code runs against the in-process [`MemoryStore`] or any external
//! backend that offers the same primitives.

mod memory;

pub use memory::MemoryStore;

use thiserror::Error;

/// Namespace holding slot position → encoded record entries.
pub const NS_RING: &str = "ring";
/// Namespace holding identifier → slot position entries.
pub const NS_INDEX: &str = "index";
/// Namespace holding counters and control flags.
pub const NS_STATS: &str = "stats";

/// Errors reported by a shared-store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend rejected or failed the operation.
    #[error("store backend error: {0}")]
    Backend(String),
    /// A counter key held a value that does not parse as an integer.
    #[error("non-numeric value under {key}: {value}")]
    NonNumeric {
        /// Offending key.
        key: String,
        /// Raw stored value.
        value: String,
    },
}

/// Keyed shared storage with atomic counter primitives.
///
/// Values are opaque strings; per-key operations are last-writer-wins
/// except for [`incr`](SharedStore::incr) (atomic post-increment) and
/// [`add`](SharedStore::add) (first-writer-wins insert). The cache relies
/// on exactly those two primitives for cursor advancement and for its
/// single-flight gates, so implementations must make them atomic with
/// respect to concurrent callers.
pub trait SharedStore: Send + Sync + 'static {
    /// Fetch the value under `key`, or `None` when the key is absent.
    fn get(&self, ns: &str, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, ns: &str, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove `key`. Removing an absent key is not an error.
    fn delete(&self, ns: &str, key: &str) -> Result<(), StoreError>;

    /// Atomically add `delta` to the integer stored under `key` and
    /// return the post-increment value. An absent key counts as zero, so
    /// the first increment of a fresh counter returns `delta`.
    fn incr(&self, ns: &str, key: &str, delta: i64) -> Result<i64, StoreError>;

    /// Store `value` under `key` only if the key is absent. Returns
    /// `true` when this call created the entry; concurrent callers see
    /// `false` (first writer wins).
    fn add(&self, ns: &str, key: &str, value: &str) -> Result<bool, StoreError>;

    /// Remove every key in the namespace.
    fn flush_all(&self, ns: &str) -> Result<(), StoreError>;
}
