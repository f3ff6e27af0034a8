//! Capacity controller in action.
//!
//! Drives several monitoring windows at different ingest rates and
//! prints each sizing decision. The window anchor is rewound manually
//! so the demo runs in milliseconds instead of hours.
//!
//! Run: cargo run --example auto_resize

use ringdex::prelude::*;
use ringdex::stats::keys;
use ringdex::store::NS_STATS;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let schema = Schema::compile(&[FieldSpec::new("payload")])?;
    let config = RingConfig::new()
        .with_initial_size(1_000)
        .with_auto_resize(true)
        .with_auto_bounds(100, 100_000)
        .with_desired_eject_mins(15.0)
        .with_monitor_period_mins(10.0)
        .with_trigger_adjust_percent(20.0)
        .with_max_adjust_percent(25.0, 10.0);
    let cache = RingCache::new(config, schema, MemoryStore::new())?;

    // (label, new identifiers per 10-minute window)
    let windows = [
        ("hot burst", 2_000u64),
        ("hot burst", 2_000),
        ("cooling", 900),
        ("quiet", 40),
        ("quiet", 40),
    ];

    let mut id = 0u64;
    for (round, (label, items)) in windows.iter().enumerate() {
        let before = cache.stats().current_size;

        for _ in 0..items - 1 {
            cache.set(
                &format!("id-{id}"),
                &FieldMap::from([("payload".to_string(), "x".to_string())]),
            );
            id += 1;
        }

        // Rewind the window anchor so the next insert closes it.
        let start = chrono::Utc::now().timestamp() - 11 * 60;
        cache
            .store()
            .set(NS_STATS, keys::PERIOD_START, &start.to_string())?;
        cache.set(
            &format!("id-{id}"),
            &FieldMap::from([("payload".to_string(), "x".to_string())]),
        );
        id += 1;

        let stats = cache.stats();
        println!(
            "window {}: {label:<9} {items:>5} items  size {before:>6} -> {:>6}  (mean residency {:.1} mins)",
            round + 1,
            stats.current_size,
            stats.last_period_avg_mins.unwrap_or_default(),
        );
    }

    Ok(())
}
