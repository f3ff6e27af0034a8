//! Full-drain protocol.

use super::eject::Ejector;
use crate::ring::{DrainOutcome, RingCache};
use crate::stats::keys;
use crate::store::{NS_INDEX, NS_RING, NS_STATS, SharedStore};

impl<S: SharedStore> RingCache<S> {
    /// Empty the ring completely.
    ///
    /// Single-flight: the gate is a first-writer-wins `add` on the
    /// drain flag, so exactly one caller performs the sweep; concurrent
    /// callers return [`DrainOutcome::AlreadyDraining`]. While the flag
    /// is set every `set` is dropped silently, and `get` is best-effort
    /// for records about to be evicted.
    pub fn drain(&self) -> DrainOutcome {
        match self.store().add(NS_RING, keys::DRAINING, "1") {
            Ok(true) => {}
            Ok(false) => return DrainOutcome::AlreadyDraining,
            Err(err) => {
                // Without the gate there is no single-flight guarantee;
                // refuse rather than risk a double sweep.
                tracing::warn!(error = %err, "drain gate unavailable");
                return DrainOutcome::AlreadyDraining;
            }
        }

        let mut ejector = Ejector::new(self, true);
        let mut pos = 1u64;
        loop {
            match self.store().get(NS_RING, &pos.to_string()) {
                Ok(Some(_)) => ejector.push(pos, false),
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(pos, error = %err, "drain sweep read failed; stopping");
                    break;
                }
            }
            pos += 1;
        }
        let evicted = ejector.finish();

        self.swallow(self.store().flush_all(NS_RING), "flush ring namespace");
        self.swallow(self.store().flush_all(NS_INDEX), "flush index namespace");
        self.swallow(
            self.store().set(NS_STATS, keys::POS, "0"),
            "reset cursor after drain",
        );
        // Flushing the ring namespace already removed the gate; delete
        // covers stores whose flush is deferred.
        self.swallow(
            self.store().delete(NS_RING, keys::DRAINING),
            "clear drain gate",
        );

        if tracing::enabled!(tracing::Level::INFO) {
            tracing::info!(evicted, "ring drained");
        }
        DrainOutcome::Drained { evicted }
    }
}
