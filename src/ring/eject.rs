//! Eviction dispatch.
//!
//! Every record that leaves the ring is announced to the configured
//! [`EjectSink`], whether it was overwritten or swept out by a shrink
//! or a full drain.
//! Sink delivery is at-most-once: failures are logged and never retried.
//! When an [`EjectTransport`] is configured, shrink and drain sweeps
//! hand batches of slot positions to it instead of ejecting inline; the
//! transport runs [`RingCache::eject_item`] per position externally.

use thiserror::Error;

use crate::record::{FieldMap, SlotEntry};
use crate::ring::RingCache;
use crate::store::{NS_INDEX, NS_RING, SharedStore};

/// Error reported by an eviction sink or transport.
#[derive(Debug, Error)]
#[error("eject failed: {0}")]
pub struct EjectError(String);

impl EjectError {
    /// Wrap a failure message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// External consumer notified for every record leaving the ring.
pub trait EjectSink: Send + Sync {
    /// Called with the owning identifier, the readable record, and
    /// whether the ejection came from a full drain.
    fn eject(&self, id: &str, record: &FieldMap, is_full_drain: bool) -> Result<(), EjectError>;
}

impl<F> EjectSink for F
where
    F: Fn(&str, &FieldMap, bool) -> Result<(), EjectError> + Send + Sync,
{
    fn eject(&self, id: &str, record: &FieldMap, is_full_drain: bool) -> Result<(), EjectError> {
        self(id, record, is_full_drain)
    }
}

/// One slot position scheduled for external ejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EjectRequest {
    /// Slot position to eject.
    pub pos: u64,
    /// Whether to delete the slot and its index entry afterwards.
    pub delete: bool,
}

/// Fan-out transport that dispatches ejection for a batch of slot
/// positions externally.
///
/// Its effect must be equivalent to calling
/// [`RingCache::eject_item`]`(pos, delete, is_full_drain)` for each
/// request; only timing may differ.
pub trait EjectTransport: Send + Sync {
    /// Dispatch one batch.
    fn dispatch(&self, batch: &[EjectRequest], is_full_drain: bool) -> Result<(), EjectError>;
}

impl<S: SharedStore> RingCache<S> {
    /// Read slot `pos`, announce its occupant to the eviction sink, and
    /// optionally delete the slot and its index entry.
    ///
    /// Returns `true` when the slot was occupied. Sink failures are
    /// logged and swallowed; delivery is at-most-once.
    pub fn eject_item(&self, pos: u64, delete: bool, is_full_drain: bool) -> bool {
        let slot_key = pos.to_string();
        let raw = match self.store().get(NS_RING, &slot_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return false,
            Err(err) => {
                tracing::warn!(pos, error = %err, "failed to read slot for ejection");
                return false;
            }
        };

        let entry = match SlotEntry::decode(&raw) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(pos, error = %err, "undecodable slot dropped during ejection");
                if delete {
                    self.swallow(self.store().delete(NS_RING, &slot_key), "delete corrupt slot");
                }
                return false;
            }
        };

        let readable = entry.data.to_readable(self.schema());
        tracing::debug!(pos, id = %entry.key, full_drain = is_full_drain, "ejecting record");

        if let Some(sink) = self.sink() {
            if let Err(err) = sink.eject(&entry.key, &readable, is_full_drain) {
                tracing::warn!(id = %entry.key, error = %err, "eviction sink failed");
            }
        }

        if delete {
            self.swallow(
                self.store().delete(NS_INDEX, &entry.key),
                "delete index entry of ejected record",
            );
            self.swallow(
                self.store().delete(NS_RING, &slot_key),
                "delete slot of ejected record",
            );
        }

        true
    }
}

/// Accumulates slot positions for a sweep and routes them inline or
/// through the transport in `drain_parallel_items`-sized batches.
pub(crate) struct Ejector<'a, S: SharedStore> {
    cache: &'a RingCache<S>,
    is_full_drain: bool,
    pending: Vec<EjectRequest>,
    ejected: u64,
}

impl<'a, S: SharedStore> Ejector<'a, S> {
    pub(crate) fn new(cache: &'a RingCache<S>, is_full_drain: bool) -> Self {
        Self {
            cache,
            is_full_drain,
            pending: Vec::new(),
            ejected: 0,
        }
    }

    /// Schedule `pos` for ejection. Without a transport this ejects
    /// inline; with one it joins the current batch.
    pub(crate) fn push(&mut self, pos: u64, delete: bool) {
        if self.cache.transport().is_some() {
            self.pending.push(EjectRequest { pos, delete });
            if self.pending.len() >= self.cache.config().drain_parallel_items {
                self.flush();
            }
        } else if self.cache.eject_item(pos, delete, self.is_full_drain) {
            self.ejected += 1;
        }
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let transport = self
            .cache
            .transport()
            .expect("flush is only reached with a transport configured");
        match transport.dispatch(&self.pending, self.is_full_drain) {
            Ok(()) => self.ejected += self.pending.len() as u64,
            Err(err) => {
                tracing::warn!(
                    batch = self.pending.len(),
                    error = %err,
                    "eject transport batch failed"
                );
            }
        }
        self.pending.clear();
    }

    /// Flush the final partial batch and return the ejection count.
    pub(crate) fn finish(mut self) -> u64 {
        self.flush();
        self.ejected
    }
}
