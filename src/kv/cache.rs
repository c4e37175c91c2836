//! Bounded read cache
//!
//! Each KV layer owns its own instance; nothing here is global. The engine
//! stays the source of truth, so an eviction only costs an extra engine read.
//! Eviction policy is `quick_cache`'s, which approximates LRU.

use quick_cache::sync::Cache;

/// Key bytes -> `V`, shared between threads without an outer lock
pub struct ReadCache<V> {
    /// `None` when caching is disabled
    inner: Option<Cache<Vec<u8>, V>>,
    capacity: usize,
}

impl<V: Clone> ReadCache<V> {
    /// A capacity of zero disables caching
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: (capacity > 0).then(|| Cache::new(capacity)),
            capacity,
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<V> {
        self.inner.as_ref()?.get(key)
    }

    pub fn insert(&self, key: &[u8], value: V) {
        if let Some(cache) = &self.inner {
            cache.insert(key.to_vec(), value);
        }
    }

    pub fn remove(&self, key: &[u8]) {
        if let Some(cache) = &self.inner {
            cache.remove(key);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.as_ref().map_or(0, |cache| cache.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
