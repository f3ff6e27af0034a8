//! Resize protocol.

use super::eject::Ejector;
use crate::ring::RingCache;
use crate::stats::keys;
use crate::store::{NS_RING, NS_STATS, SharedStore};

impl<S: SharedStore> RingCache<S> {
    /// Apply a new ring capacity.
    ///
    /// Growing is cheap: future inserts use the new range naturally.
    /// Shrinking pulls the cursor back to the new boundary and sweeps
    /// every occupied slot above it through the eviction dispatcher.
    ///
    /// The protocol holds no lock and may race with `set`: a write that
    /// read the old capacity can land in a slot above the new boundary
    /// in a narrow window, and the sweep then evicts it (at most one
    /// extra eviction, never a lost slot). Calling `resize` while a full
    /// drain is sweeping is undefined: the two sweeps may interleave
    /// their ejections.
    pub fn resize(&self, new_size: u64) {
        let prev_size = self.current_size();
        self.swallow(
            self.store()
                .set(NS_STATS, keys::CURRENT_SIZE, &new_size.to_string()),
            "write ring capacity",
        );

        if new_size >= prev_size {
            if tracing::enabled!(tracing::Level::INFO) && new_size != prev_size {
                tracing::info!(prev_size, new_size, "ring grown");
            }
            return;
        }

        // Pull the cursor back so the next insert wraps at the new
        // boundary instead of landing above it.
        if let Ok(Some(raw)) = self.store().get(NS_STATS, keys::POS) {
            if raw.parse::<i64>().is_ok_and(|pos| pos > new_size as i64) {
                self.swallow(
                    self.store().set(NS_STATS, keys::POS, &new_size.to_string()),
                    "pull cursor back to new capacity",
                );
            }
        }

        let mut ejector = Ejector::new(self, false);
        let mut pos = new_size + 1;
        loop {
            match self.store().get(NS_RING, &pos.to_string()) {
                Ok(Some(_)) => ejector.push(pos, true),
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(pos, error = %err, "shrink sweep read failed; stopping");
                    break;
                }
            }
            pos += 1;
        }
        let evicted = ejector.finish();

        if tracing::enabled!(tracing::Level::INFO) {
            tracing::info!(prev_size, new_size, evicted, "ring shrunk");
        }
    }
}
