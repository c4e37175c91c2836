//! Shared setup for KV layer tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crossbeam::channel::{bounded, Receiver, Sender};
use partikv::config::{EngineOptions, WalSyncStrategy};
use partikv::kv::{ExistenceStore, ReadCache, VersionedStore};
use partikv::storage::{PartitionedStorage, Storage, StorageBatch};
use partikv::Result;
use tempfile::TempDir;

pub fn setup_storage(partitions: usize) -> (TempDir, Arc<dyn Storage>) {
    let temp_dir = TempDir::new().unwrap();
    let options = EngineOptions {
        sync_strategy: WalSyncStrategy::EveryWrite,
        ..EngineOptions::default()
    };
    let storage = PartitionedStorage::open(&temp_dir.path().join("db"), partitions, options).unwrap();
    (temp_dir, Arc::new(storage))
}

pub fn setup_versioned(cache_capacity: usize) -> (TempDir, Arc<VersionedStore>) {
    let (temp_dir, storage) = setup_storage(4);
    let store = VersionedStore::new(storage, ReadCache::new(cache_capacity));
    (temp_dir, Arc::new(store))
}

pub fn setup_existence(cache_capacity: usize) -> (TempDir, Arc<ExistenceStore>) {
    let (temp_dir, storage) = setup_storage(4);
    let store = ExistenceStore::new(storage, ReadCache::new(cache_capacity));
    (temp_dir, Arc::new(store))
}

// =============================================================================
// Gated Storage
// =============================================================================

/// In-memory [`Storage`] that can hold one read open after it has read
///
/// Lets a test run a write between a cache miss's engine read and its
/// cache fill.
#[derive(Default)]
pub struct GatedStorage {
    data: Arc<Mutex<HashMap<Vec<u8>, Vec<u8>>>>,
    gate: Mutex<Option<(Sender<()>, Receiver<()>)>>,
}

/// Handle on an armed [`GatedStorage`] read
pub struct ReadPause {
    reached: Receiver<()>,
    release: Sender<()>,
}

impl ReadPause {
    /// Block until the paused read has fetched its value
    pub fn wait_reached(&self) {
        self.reached.recv().unwrap();
    }

    pub fn release(self) {
        self.release.send(()).unwrap();
    }
}

impl GatedStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The next `get`, whatever its key, pauses after reading
    pub fn pause_next_read(&self) -> ReadPause {
        let (reached_tx, reached_rx) = bounded(1);
        let (release_tx, release_rx) = bounded(1);
        *self.gate.lock().unwrap() = Some((reached_tx, release_rx));
        ReadPause {
            reached: reached_rx,
            release: release_tx,
        }
    }
}

impl Storage for GatedStorage {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let value = self.data.lock().unwrap().get(key).cloned();
        let gate = self.gate.lock().unwrap().take();
        if let Some((reached, release)) = gate {
            reached.send(()).unwrap();
            release.recv().unwrap();
        }
        Ok(value)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.data.lock().unwrap().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn begin_batch(&self) -> Box<dyn StorageBatch> {
        Box::new(MemBatch {
            data: Arc::clone(&self.data),
            writes: Vec::new(),
        })
    }

    fn partition_count(&self) -> usize {
        1
    }

    fn close(&self) {}

    fn destroy(&self) {}
}

struct MemBatch {
    data: Arc<Mutex<HashMap<Vec<u8>, Vec<u8>>>>,
    writes: Vec<(Vec<u8>, Vec<u8>)>,
}

impl StorageBatch for MemBatch {
    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.writes.push((key, value));
    }

    fn len(&self) -> usize {
        self.writes.len()
    }

    fn commit(self: Box<Self>) -> Result<()> {
        self.data.lock().unwrap().extend(self.writes);
        Ok(())
    }
}
