//! In-process shared store.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::{SharedStore, StoreError};

/// In-process [`SharedStore`] backed by namespaced hash maps.
///
/// A single coarse lock guards all namespaces, which makes `incr` and
/// `add` trivially atomic. Intended for tests, examples, and
/// single-process deployments; multi-process deployments point the cache
/// at an external store with the same primitives.
#[derive(Default)]
pub struct MemoryStore {
    spaces: Mutex<HashMap<String, HashMap<String, String>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys in `ns`.
    pub fn len(&self, ns: &str) -> usize {
        self.spaces.lock().get(ns).map_or(0, HashMap::len)
    }

    /// Whether `ns` holds no keys.
    pub fn is_empty(&self, ns: &str) -> bool {
        self.len(ns) == 0
    }
}

impl SharedStore for MemoryStore {
    fn get(&self, ns: &str, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .spaces
            .lock()
            .get(ns)
            .and_then(|space| space.get(key).cloned()))
    }

    fn set(&self, ns: &str, key: &str, value: &str) -> Result<(), StoreError> {
        self.spaces
            .lock()
            .entry(ns.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, ns: &str, key: &str) -> Result<(), StoreError> {
        if let Some(space) = self.spaces.lock().get_mut(ns) {
            space.remove(key);
        }
        Ok(())
    }

    fn incr(&self, ns: &str, key: &str, delta: i64) -> Result<i64, StoreError> {
        let mut spaces = self.spaces.lock();
        let space = spaces.entry(ns.to_string()).or_default();
        let current = match space.get(key) {
            Some(raw) => raw.parse::<i64>().map_err(|_| StoreError::NonNumeric {
                key: key.to_string(),
                value: raw.clone(),
            })?,
            None => 0,
        };
        let next = current + delta;
        space.insert(key.to_string(), next.to_string());
        Ok(next)
    }

    fn add(&self, ns: &str, key: &str, value: &str) -> Result<bool, StoreError> {
        let mut spaces = self.spaces.lock();
        let space = spaces.entry(ns.to_string()).or_default();
        if space.contains_key(key) {
            return Ok(false);
        }
        space.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    fn flush_all(&self, ns: &str) -> Result<(), StoreError> {
        if let Some(space) = self.spaces.lock().get_mut(ns) {
            space.clear();
        }
        Ok(())
    }
}
