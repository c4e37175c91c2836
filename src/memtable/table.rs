//! MemTable implementation
//!
//! BTreeMap-based memtable with RwLock for concurrency.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

/// In-memory table for live data
pub struct MemTable {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    /// Approximate size in bytes (keys + values)
    size: AtomicUsize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
        }
    }

    /// Get a value by key (read lock)
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.read().get(key).cloned()
    }

    /// Put a key-value pair (write lock), returning the new approximate size
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> usize {
        let mut data = self.data.write();
        self.insert_locked(&mut data, key, value)
    }

    /// Apply several writes under one write lock, so readers never observe
    /// half of a batch
    pub fn apply_batch(&self, writes: Vec<(Vec<u8>, Vec<u8>)>) -> usize {
        let mut data = self.data.write();
        let mut size = self.size.load(Ordering::Relaxed);
        for (key, value) in writes {
            size = self.insert_locked(&mut data, key, value);
        }
        size
    }

    fn insert_locked(
        &self,
        data: &mut BTreeMap<Vec<u8>, Vec<u8>>,
        key: Vec<u8>,
        value: Vec<u8>,
    ) -> usize {
        let added = key.len() + value.len();
        let removed = match data.get(&key) {
            Some(old) => key.len() + old.len(),
            None => 0,
        };
        data.insert(key, value);

        // Callers hold the write lock, so load/store cannot interleave
        let size = self.size.load(Ordering::Relaxed) + added - removed;
        self.size.store(size, Ordering::Relaxed);
        size
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// Get entry count
    pub fn entry_count(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Copy of all entries in sorted key order
    pub fn snapshot(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Clear all entries
    pub fn clear(&self) {
        let mut data = self.data.write();
        data.clear();
        self.size.store(0, Ordering::Relaxed);
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}
