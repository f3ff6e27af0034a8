//! Concurrency behavior: parallel writers over one shared ring.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread;

use ringdex::schema::{FieldSpec, Schema};
use ringdex::stats::keys;
use ringdex::store::{NS_INDEX, NS_STATS, SharedStore};
use ringdex::{FieldMap, MemoryStore, RingCache, RingConfig};

fn fields(value: &str) -> FieldMap {
    FieldMap::from([("a".to_string(), value.to_string())])
}

fn schema() -> Schema {
    Schema::compile(&[FieldSpec::new("a")]).unwrap()
}

#[test]
fn test_parallel_inserts_get_distinct_slots() {
    let cache = Arc::new(
        RingCache::new(
            RingConfig::new().with_initial_size(10_000),
            schema(),
            MemoryStore::new(),
        )
        .unwrap(),
    );

    let threads = 8;
    let per_thread = 500;
    let mut handles = Vec::new();
    for t in 0..threads {
        let cache = Arc::clone(&cache);
        handles.push(thread::spawn(move || {
            for i in 0..per_thread {
                cache.set(&format!("t{t}-{i}"), &fields("v"));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    // Capacity was never exceeded, so no two identifiers share a slot.
    let mut slots = HashSet::new();
    for t in 0..threads {
        for i in 0..per_thread {
            let pos = cache
                .store()
                .get(NS_INDEX, &format!("t{t}-{i}"))
                .unwrap()
                .expect("identifier must be indexed");
            assert!(slots.insert(pos), "two identifiers landed in one slot");
        }
    }
    assert_eq!(slots.len(), threads * per_thread);

    // The cursor advanced exactly once per insert.
    assert_eq!(
        cache.store().get(NS_STATS, keys::POS).unwrap(),
        Some((threads * per_thread).to_string())
    );
    assert_eq!(cache.stats().total_item_count, (threads * per_thread) as u64);
}

#[test]
fn test_parallel_updates_converge_on_one_slot() {
    let cache = Arc::new(
        RingCache::new(
            RingConfig::new().with_initial_size(100),
            schema(),
            MemoryStore::new(),
        )
        .unwrap(),
    );
    cache.set("shared", &fields("seed"));

    let mut handles = Vec::new();
    for t in 0..8 {
        let cache = Arc::clone(&cache);
        handles.push(thread::spawn(move || {
            for i in 0..200 {
                cache.set("shared", &fields(&format!("t{t}-{i}")));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    // Updates never move the record or advance the cursor.
    assert_eq!(
        cache.store().get(NS_INDEX, "shared").unwrap(),
        Some("1".to_string())
    );
    assert_eq!(
        cache.store().get(NS_STATS, keys::POS).unwrap(),
        Some("1".to_string())
    );
    assert!(cache.get("shared").is_some());

    let stats = cache.stats();
    assert_eq!(stats.total_item_count, 1);
    assert_eq!(stats.total_req_count, 1 + 8 * 200);
}

#[test]
fn test_churn_never_exceeds_capacity() {
    let capacity = 64u64;
    let evictions = Arc::new(Mutex::new(Vec::new()));
    let sink_evictions = Arc::clone(&evictions);
    let cache = Arc::new(
        RingCache::new(
            RingConfig::new().with_initial_size(capacity),
            schema(),
            MemoryStore::new(),
        )
        .unwrap()
        .with_sink(move |id: &str, _record: &FieldMap, _full: bool| {
            sink_evictions.lock().unwrap().push(id.to_string());
            Ok(())
        }),
    );

    let mut handles = Vec::new();
    for t in 0..4 {
        let cache = Arc::clone(&cache);
        handles.push(thread::spawn(move || {
            for i in 0..1000 {
                cache.set(&format!("t{t}-{i}"), &fields("v"));
                if i % 3 == 0 {
                    cache.get(&format!("t{t}-{i}"));
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    // The index can never exceed the capacity, regardless of the
    // overwrite storms the wrap reset allows.
    assert!(cache.store().len(NS_INDEX) as u64 <= capacity);
}

#[test]
fn test_sizing_lock_blocks_second_decision() {
    let cache = {
        let config = RingConfig::new()
            .with_initial_size(1000)
            .with_auto_resize(true)
            .with_auto_bounds(10, 1_000_000)
            .with_monitor_period_mins(10.0)
            .with_max_adjust_percent(25.0, 10.0);
        RingCache::new(config, schema(), MemoryStore::new()).unwrap()
    };

    for i in 0..2000 {
        cache.set(&format!("seed-{i}"), &fields("v"));
    }
    let backdate = |mins: i64| {
        let start = chrono::Utc::now().timestamp() - mins * 60;
        cache
            .store()
            .set(NS_STATS, keys::PERIOD_START, &start.to_string())
            .unwrap();
    };

    // Another evaluator holds the lock when the window closes: this
    // caller falls through without deciding.
    backdate(11);
    cache.store().add(NS_STATS, keys::LOCKED, "1").unwrap();
    cache.set("closer-a", &fields("v"));
    assert_eq!(cache.stats().current_size, 1000);

    // Lock released: the next closing insert decides.
    cache.store().delete(NS_STATS, keys::LOCKED).unwrap();
    backdate(11);
    cache.set("closer-b", &fields("v"));
    assert_eq!(cache.stats().current_size, 1250);
}
