//! Basic walkthrough: schema, inserts, merges, eviction.
//!
//! Run: cargo run --example basic

use ringdex::prelude::*;

fn fields(pairs: &[(&str, &str)]) -> FieldMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // A ticket-shaped schema: status locks the record, owner never
    // changes once set, note stays editable.
    let schema = Schema::compile(&[
        FieldSpec::new("status").lock_key(),
        FieldSpec::new("owner").immutable(),
        FieldSpec::new("note").mutable(),
    ])?;

    // Tiny ring so eviction is easy to see.
    let config = RingConfig::new().with_initial_size(3);
    let cache = RingCache::new(config, schema, MemoryStore::new())?.with_sink(
        |id: &str, record: &FieldMap, full_drain: bool| {
            println!("  [sink] ejected {id} (full drain: {full_drain}): {record:?}");
            Ok(())
        },
    );

    println!("--- inserts ---");
    for i in 1..=3 {
        let outcome = cache.set(
            &format!("ticket-{i}"),
            &fields(&[("status", "open"), ("owner", "ada"), ("note", "fresh")]),
        );
        println!("  ticket-{i}: {outcome:?}");
    }

    println!("\n--- merge on a locked record ---");
    cache.set(
        "ticket-1",
        &fields(&[("status", "closed"), ("owner", "brin"), ("note", "edited")]),
    );
    println!("  ticket-1 now: {:?}", cache.get("ticket-1"));

    println!("\n--- overwrite: the ring is full ---");
    cache.set("ticket-4", &fields(&[("status", "open"), ("owner", "cyn")]));
    println!("  ticket-1 after wrap: {:?}", cache.get("ticket-1"));
    println!("  ticket-4: {:?}", cache.get("ticket-4"));

    println!("\n--- stats ---");
    let stats = cache.stats();
    println!("  size: {}", stats.current_size);
    println!(
        "  requests: {} ({} new items)",
        stats.total_req_count, stats.total_item_count
    );
    println!("  started: {}", stats.server_start);

    println!("\n--- full drain ---");
    let outcome = cache.drain();
    println!("  drain: {outcome:?}");
    println!("  ticket-4 after drain: {:?}", cache.get("ticket-4"));

    Ok(())
}
