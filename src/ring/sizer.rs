//! Capacity controller.
//!
//! Keeps the mean time a record spends in the ring close to
//! `desired_eject_mins` by sampling the new-identifier insert rate over
//! a monitoring window and resizing at window close. Window evaluation
//! is single-flight: the first caller to win the `locked` flag (a
//! first-writer-wins `add`) decides; everyone else falls through.

use crate::ring::RingCache;
use crate::stats::{keys, unix_now};
use crate::store::{NS_STATS, SharedStore};

impl<S: SharedStore> RingCache<S> {
    /// Account a new-identifier insertion and, when the monitoring
    /// window has closed, evaluate a resize decision.
    pub(crate) fn observe_insert(&self) {
        if !self.config().auto_resize {
            return;
        }
        self.swallow(
            self.store().incr(NS_STATS, keys::ITEM_COUNT, 1),
            "bump window item counter",
        );
        self.maybe_adjust();
    }

    fn maybe_adjust(&self) {
        let now = unix_now();
        let period_start = match self.store().get(NS_STATS, keys::PERIOD_START) {
            Ok(Some(raw)) => raw.parse::<i64>().unwrap_or(now),
            Ok(None) => {
                // Window anchor missing (flushed externally): restart it.
                self.swallow(
                    self.store()
                        .set(NS_STATS, keys::PERIOD_START, &now.to_string()),
                    "restart monitoring window",
                );
                return;
            }
            Err(err) => {
                tracing::warn!(error = %err, "window anchor read failed");
                return;
            }
        };

        if (now - period_start) as f64 <= self.config().monitor_period_mins * 60.0 {
            return;
        }

        // Window closed: only the first caller to win the flag decides.
        match self.store().add(NS_STATS, keys::LOCKED, "1") {
            Ok(true) => {}
            Ok(false) => return,
            Err(err) => {
                tracing::warn!(error = %err, "sizing lock unavailable");
                return;
            }
        }

        self.evaluate_window(now);
    }

    /// Compute the observed mean residency for the closed window and
    /// resize if it strayed outside the deadband. Always reinitializes
    /// the window and releases the lock.
    fn evaluate_window(&self, now: i64) {
        let count = match self.store().get(NS_STATS, keys::ITEM_COUNT) {
            Ok(Some(raw)) => raw.parse::<u64>().unwrap_or(0),
            _ => 0,
        };
        let current = self.current_size();

        if count > 0 && current > 0 {
            let period = self.config().monitor_period_mins;
            let desired = self.config().desired_eject_mins;

            let avg_eject_mins = current as f64 / count as f64 * period;
            self.swallow(
                self.store().set(
                    NS_STATS,
                    keys::LAST_PERIOD_AVG_MINS,
                    &avg_eject_mins.to_string(),
                ),
                "record window residency",
            );

            let deviation_pct = (1.0 - avg_eject_mins / desired).abs() * 100.0;
            if deviation_pct > self.config().trigger_adjust_percent {
                let desired_size = (count as f64 / period * desired).floor();
                let diff_pct = (desired_size - current as f64) / current as f64 * 100.0;
                let slew = if diff_pct >= 0.0 {
                    self.config().max_adjust_percent_up
                } else {
                    self.config().max_adjust_percent_down
                };

                let new_size = if diff_pct.abs() > slew {
                    let step = (current as f64 * slew / 100.0).floor() as u64;
                    if diff_pct >= 0.0 {
                        current + step
                    } else {
                        current.saturating_sub(step)
                    }
                } else {
                    desired_size as u64
                };
                let new_size =
                    new_size.clamp(self.config().auto_min_size, self.config().auto_max_size);

                if tracing::enabled!(tracing::Level::INFO) {
                    tracing::info!(
                        window_items = count,
                        avg_eject_mins,
                        current_size = current,
                        new_size,
                        "residency off target; resizing ring"
                    );
                }
                if new_size != current {
                    self.resize(new_size);
                }
            }
        }

        // Reinitialize: back to collecting, lock released.
        self.swallow(
            self.store().set(NS_STATS, keys::ITEM_COUNT, "0"),
            "reset window item counter",
        );
        self.swallow(
            self.store()
                .set(NS_STATS, keys::PERIOD_START, &now.to_string()),
            "restart monitoring window",
        );
        self.swallow(
            self.store().delete(NS_STATS, keys::LOCKED),
            "release sizing lock",
        );
    }
}

#[cfg(test)]
mod tests {
    use crate::config::RingConfig;
    use crate::record::FieldMap;
    use crate::ring::RingCache;
    use crate::schema::{FieldSpec, Schema};
    use crate::stats::keys;
    use crate::store::{MemoryStore, NS_STATS, SharedStore};

    fn sizing_cache(initial: u64) -> RingCache<MemoryStore> {
        let schema = Schema::compile(&[FieldSpec::new("a")]).unwrap();
        let config = RingConfig::new()
            .with_initial_size(initial)
            .with_auto_resize(true)
            .with_auto_bounds(10, 1_000_000)
            .with_desired_eject_mins(15.0)
            .with_monitor_period_mins(10.0)
            .with_trigger_adjust_percent(20.0)
            .with_max_adjust_percent(25.0, 10.0);
        RingCache::new(config, schema, MemoryStore::new()).unwrap()
    }

    fn fields(value: &str) -> FieldMap {
        FieldMap::from([("a".to_string(), value.to_string())])
    }

    /// Pretend the monitoring window opened `mins` minutes ago.
    fn backdate_window(cache: &RingCache<MemoryStore>, mins: i64) {
        let start = crate::stats::unix_now() - mins * 60;
        cache
            .store()
            .set(NS_STATS, keys::PERIOD_START, &start.to_string())
            .unwrap();
    }

    #[test]
    fn test_no_decision_inside_window() {
        let cache = sizing_cache(1000);
        for i in 0..100 {
            cache.set(&format!("id-{i}"), &fields("v"));
        }
        assert_eq!(cache.current_size(), 1000);
        assert_eq!(
            cache.store().get(NS_STATS, keys::ITEM_COUNT).unwrap(),
            Some("100".to_string())
        );
    }

    #[test]
    fn test_up_adjust_clamped_by_slew() {
        let cache = sizing_cache(1000);
        // 1999 inserts collected, then the window closes on the 2000th:
        // avg = (1000 / 2000) * 10 = 5 mins, well below the 15-min
        // target; desired size 3000 is clamped to +25%.
        for i in 0..1999 {
            cache.set(&format!("id-{i}"), &fields("v"));
        }
        backdate_window(&cache, 11);
        cache.set("id-1999", &fields("v"));

        assert_eq!(cache.current_size(), 1250);
        let stats = cache.stats();
        assert_eq!(stats.last_period_avg_mins, Some(5.0));

        // Window reinitialized and lock released.
        assert_eq!(
            cache.store().get(NS_STATS, keys::ITEM_COUNT).unwrap(),
            Some("0".to_string())
        );
        assert_eq!(cache.store().get(NS_STATS, keys::LOCKED).unwrap(), None);
    }

    #[test]
    fn test_down_adjust_clamped_by_slew() {
        let cache = sizing_cache(1000);
        // 9 inserts over a 10-minute window: avg = (1000 / 10) * 10 =
        // 1000 mins, far above target; desired size 15 would be an
        // enormous shrink, clamped to -10%.
        for i in 0..9 {
            cache.set(&format!("id-{i}"), &fields("v"));
        }
        backdate_window(&cache, 11);
        cache.set("id-9", &fields("v"));

        assert_eq!(cache.current_size(), 900);
    }

    #[test]
    fn test_deadband_suppresses_resize() {
        let cache = sizing_cache(1000);
        // 666 inserts: avg = (1000/667)*10 ≈ 14.99 mins, within 20% of
        // the 15-min target.
        for i in 0..666 {
            cache.set(&format!("id-{i}"), &fields("v"));
        }
        backdate_window(&cache, 11);
        cache.set("id-666", &fields("v"));

        assert_eq!(cache.current_size(), 1000);
        // Residency is still recorded even when no resize fires.
        assert!(cache.stats().last_period_avg_mins.is_some());
    }

    #[test]
    fn test_small_adjust_lands_on_desired() {
        // With the default 20% deadband and 25% up-slew, any deviation
        // that fires the trigger also exceeds the slew, so an exact
        // landing needs a tighter deadband and a looser cap.
        let schema = Schema::compile(&[FieldSpec::new("a")]).unwrap();
        let config = RingConfig::new()
            .with_initial_size(1000)
            .with_auto_resize(true)
            .with_auto_bounds(10, 1_000_000)
            .with_monitor_period_mins(10.0)
            .with_trigger_adjust_percent(10.0)
            .with_max_adjust_percent(30.0, 10.0);
        let cache = RingCache::new(config, schema, MemoryStore::new()).unwrap();

        // count=800: avg = (1000/800)*10 = 12.5 mins (16.7% off target),
        // desired size = (800/10)*15 = 1200, a +20% step inside the cap.
        for i in 0..799 {
            cache.set(&format!("id-{i}"), &fields("v"));
        }
        backdate_window(&cache, 11);
        cache.set("id-799", &fields("v"));

        assert_eq!(cache.current_size(), 1200);
    }

    #[test]
    fn test_bounds_clamp() {
        let schema = Schema::compile(&[FieldSpec::new("a")]).unwrap();
        let config = RingConfig::new()
            .with_initial_size(1000)
            .with_auto_resize(true)
            .with_auto_bounds(950, 1100)
            .with_monitor_period_mins(10.0)
            .with_max_adjust_percent(25.0, 10.0);
        let cache = RingCache::new(config, schema, MemoryStore::new()).unwrap();

        for i in 0..1999 {
            cache.set(&format!("id-{i}"), &fields("v"));
        }
        backdate_window(&cache, 11);
        cache.set("id-1999", &fields("v"));

        // Slew would allow 1250; the absolute bound wins.
        assert_eq!(cache.current_size(), 1100);
    }

    #[test]
    fn test_unreadable_sample_count_skips_decision_but_reinitializes() {
        let cache = sizing_cache(1000);
        // Wedge the window counter so the closing insert cannot bump it
        // and evaluation cannot read it: the decision is skipped, but
        // the window still reinitializes and the lock is released.
        cache
            .store()
            .set(NS_STATS, keys::ITEM_COUNT, "junk")
            .unwrap();
        backdate_window(&cache, 11);
        cache.set("closer", &fields("v"));

        assert_eq!(cache.current_size(), 1000);
        assert!(cache.stats().last_period_avg_mins.is_none());
        assert_eq!(
            cache.store().get(NS_STATS, keys::ITEM_COUNT).unwrap(),
            Some("0".to_string())
        );
        assert_eq!(cache.store().get(NS_STATS, keys::LOCKED).unwrap(), None);
    }

    #[test]
    fn test_disabled_controller_touches_nothing() {
        let schema = Schema::compile(&[FieldSpec::new("a")]).unwrap();
        let config = RingConfig::new().with_initial_size(1000);
        let cache = RingCache::new(config, schema, MemoryStore::new()).unwrap();

        cache.set("x", &fields("v"));
        assert_eq!(cache.store().get(NS_STATS, keys::ITEM_COUNT).unwrap(), None);
        // Lifetime counters still advance.
        assert_eq!(cache.stats().total_item_count, 1);
    }
}
