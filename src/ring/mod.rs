//! Ring core: slot discipline, identifier index, and the public
//! operations.
//!
//! The ring is a fixed-capacity array of slots living in the shared
//! store's `ring` namespace, addressed by position. A monotonic cursor
//! in the `stats` namespace hands out slots to new identifiers and wraps
//! to 1 past the current capacity, so insertion order doubles as
//! eviction order. The `index` namespace maps identifiers to their slot
//! for O(1) lookup; the ring is authoritative and the index is a
//! location hint that may lag (stale entries are repaired on write and
//! reported on read).

mod drain;
mod eject;
mod resize;
mod sizer;

pub use eject::{EjectError, EjectRequest, EjectSink, EjectTransport};

use std::sync::Arc;

use thiserror::Error;

use crate::config::{ConfigError, RingConfig};
use crate::record::{FieldMap, SlotEntry};
use crate::schema::Schema;
use crate::stats::{CacheStats, iso8601_utc, keys, unix_now};
use crate::store::{NS_INDEX, NS_RING, NS_STATS, SharedStore, StoreError};

/// Errors surfaced at construction time.
#[derive(Debug, Error)]
pub enum RingError {
    /// The configuration failed validation.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// The shared store failed while seeding counters.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Outcome of a [`RingCache::set`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// A new identifier was inserted into a fresh slot.
    Inserted,
    /// An existing record was merged in place.
    Updated,
    /// The write was dropped because a drain is in progress.
    Dropped,
}

/// Outcome of a [`RingCache::drain`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// This call performed the sweep.
    Drained {
        /// Number of records dispatched to the sink.
        evicted: u64,
    },
    /// Another drain was already in flight; nothing was done.
    AlreadyDraining,
}

/// Indexed ring-buffer cache over a shared store.
///
/// All state lives in the store, so a `RingCache` is effectively
/// stateless past construction and can be wrapped in an [`Arc`] and
/// shared freely by parallel request handlers.
pub struct RingCache<S: SharedStore> {
    config: RingConfig,
    schema: Schema,
    store: S,
    sink: Option<Arc<dyn EjectSink>>,
    transport: Option<Arc<dyn EjectTransport>>,
}

impl<S: SharedStore> RingCache<S> {
    /// Construct a cache over `store`, seeding the shared counters that
    /// are not already present (first process wins).
    pub fn new(config: RingConfig, schema: Schema, store: S) -> Result<Self, RingError> {
        config.validate()?;

        let now = unix_now();
        store.add(NS_STATS, keys::SERVER_START, &now.to_string())?;
        store.add(NS_STATS, keys::PERIOD_START, &now.to_string())?;
        store.add(
            NS_STATS,
            keys::CURRENT_SIZE,
            &config.initial_size.to_string(),
        )?;
        store.add(NS_STATS, keys::POS, "0")?;

        Ok(Self {
            config,
            schema,
            store,
            sink: None,
            transport: None,
        })
    }

    /// Attach an eviction sink.
    pub fn with_sink(mut self, sink: impl EjectSink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Attach a parallel ejection transport.
    pub fn with_transport(mut self, transport: impl EjectTransport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// The shared store backing this cache.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The compiled record schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The runtime configuration.
    pub fn config(&self) -> &RingConfig {
        &self.config
    }

    pub(crate) fn sink(&self) -> Option<&dyn EjectSink> {
        self.sink.as_deref()
    }

    pub(crate) fn transport(&self) -> Option<&dyn EjectTransport> {
        self.transport.as_deref()
    }

    /// Insert a new record or merge into an existing one.
    ///
    /// Writes arriving while a full drain is sweeping are dropped
    /// silently; the caller sees [`SetOutcome::Dropped`].
    pub fn set(&self, id: &str, fields: &FieldMap) -> SetOutcome {
        if self.draining() {
            return SetOutcome::Dropped;
        }

        if let Some(pos) = self.lookup_index(id) {
            match self.fetch_slot(pos) {
                Some(mut entry) => {
                    entry.data.merge(&self.schema, fields);
                    self.write_slot(pos, &entry);
                    self.bump_requests();
                    return SetOutcome::Updated;
                }
                None => {
                    // Stale index entry: repair and fall through as an
                    // insertion.
                    self.swallow(self.store.delete(NS_INDEX, id), "delete stale index entry");
                }
            }
        }

        let slot = self.reserve_slot();
        // Evict whatever occupies the reserved slot before the new
        // record lands; its index entry and slot go with it.
        self.eject_item(slot, true, false);

        self.swallow(
            self.store.set(NS_INDEX, id, &slot.to_string()),
            "write index entry",
        );
        let mut data = self.schema.empty_record();
        data.merge(&self.schema, fields);
        self.write_slot(slot, &SlotEntry::new(id, data));

        self.bump_requests();
        self.bump_items();
        self.observe_insert();
        SetOutcome::Inserted
    }

    /// Fetch the readable record for `id`, or `None` when absent.
    ///
    /// A stale index entry produces a miss, which is reported but not
    /// repaired here; the next `set` for the identifier heals it.
    pub fn get(&self, id: &str) -> Option<FieldMap> {
        let pos = self.lookup_index(id)?;
        match self.fetch_slot(pos) {
            Some(entry) => Some(entry.data.to_readable(&self.schema)),
            None => {
                tracing::warn!(id, pos, "index entry points at an empty slot");
                None
            }
        }
    }

    /// Snapshot the cache counters.
    pub fn stats(&self) -> CacheStats {
        let now = unix_now();
        let server_start = self.stat_i64(keys::SERVER_START).unwrap_or(now);
        let total_req_count = self.stat_u64(keys::TOTAL_REQ_COUNT).unwrap_or(0);
        let total_item_count = self.stat_u64(keys::TOTAL_ITEM_COUNT).unwrap_or(0);

        let elapsed_secs = (now - server_start).max(0) as f64;
        let (req_per_sec, items_per_sec) = if elapsed_secs > 0.0 {
            (
                total_req_count as f64 / elapsed_secs,
                total_item_count as f64 / elapsed_secs,
            )
        } else {
            (0.0, 0.0)
        };

        let last_period_avg_mins = self
            .stat_raw(keys::LAST_PERIOD_AVG_MINS)
            .and_then(|raw| raw.parse::<f64>().ok());

        CacheStats {
            current_size: self.current_size(),
            total_req_count,
            total_item_count,
            req_per_sec,
            items_per_sec,
            last_period_avg_mins,
            draining: self.draining(),
            server_start: iso8601_utc(server_start),
        }
    }

    /// Reserve a slot for a new identifier: atomic cursor increment,
    /// wrapped to slot 1 past the current capacity.
    ///
    /// The wrap reset is not atomic with the increment; under a storm a
    /// handful of concurrent inserts may all land on slot 1 and resolve
    /// through the normal overwrite path.
    fn reserve_slot(&self) -> u64 {
        let size = self.current_size();
        let pos = match self.store.incr(NS_STATS, keys::POS, 1) {
            Ok(pos) => pos,
            Err(err) => {
                tracing::warn!(error = %err, "cursor increment failed; falling back to slot 1");
                return 1;
            }
        };
        if pos < 1 || pos as u64 > size {
            self.swallow(self.store.set(NS_STATS, keys::POS, "1"), "reset cursor");
            1
        } else {
            pos as u64
        }
    }

    /// Current ring capacity from the shared store.
    pub(crate) fn current_size(&self) -> u64 {
        self.stat_u64(keys::CURRENT_SIZE)
            .unwrap_or(self.config.initial_size)
    }

    /// Whether the drain gate is set.
    pub(crate) fn draining(&self) -> bool {
        matches!(self.store.get(NS_RING, keys::DRAINING), Ok(Some(_)))
    }

    fn lookup_index(&self, id: &str) -> Option<u64> {
        let raw = match self.store.get(NS_INDEX, id) {
            Ok(raw) => raw?,
            Err(err) => {
                tracing::warn!(id, error = %err, "index lookup failed");
                return None;
            }
        };
        match raw.parse::<u64>() {
            Ok(pos) => Some(pos),
            Err(_) => {
                tracing::warn!(id, value = %raw, "non-numeric index entry dropped");
                self.swallow(
                    self.store.delete(NS_INDEX, id),
                    "delete malformed index entry",
                );
                None
            }
        }
    }

    pub(crate) fn fetch_slot(&self, pos: u64) -> Option<SlotEntry> {
        let raw = match self.store.get(NS_RING, &pos.to_string()) {
            Ok(raw) => raw?,
            Err(err) => {
                tracing::warn!(pos, error = %err, "slot read failed");
                return None;
            }
        };
        match SlotEntry::decode(&raw) {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!(pos, error = %err, "undecodable slot treated as empty");
                None
            }
        }
    }

    fn write_slot(&self, pos: u64, entry: &SlotEntry) {
        match entry.encode() {
            Ok(encoded) => {
                self.swallow(
                    self.store.set(NS_RING, &pos.to_string(), &encoded),
                    "write slot",
                );
            }
            Err(err) => {
                tracing::warn!(pos, error = %err, "record encoding failed; slot not written");
            }
        }
    }

    fn bump_requests(&self) {
        self.swallow(
            self.store.incr(NS_STATS, keys::TOTAL_REQ_COUNT, 1),
            "bump request counter",
        );
    }

    fn bump_items(&self) {
        self.swallow(
            self.store.incr(NS_STATS, keys::TOTAL_ITEM_COUNT, 1),
            "bump item counter",
        );
    }

    fn stat_raw(&self, key: &str) -> Option<String> {
        match self.store.get(NS_STATS, key) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(key, error = %err, "stats read failed");
                None
            }
        }
    }

    fn stat_u64(&self, key: &str) -> Option<u64> {
        self.stat_raw(key).and_then(|raw| raw.parse().ok())
    }

    fn stat_i64(&self, key: &str) -> Option<i64> {
        self.stat_raw(key).and_then(|raw| raw.parse().ok())
    }

    /// Log and discard a shared-store failure; the caller proceeds.
    pub(crate) fn swallow<T>(&self, result: Result<T, StoreError>, context: &'static str) {
        if let Err(err) = result {
            tracing::warn!(error = %err, context, "shared store operation failed");
        }
    }
}
