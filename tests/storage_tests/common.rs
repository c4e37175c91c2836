//! In-memory engines for storage tests

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use partikv::engine::{KvEngine, WriteBatch};
use partikv::storage::Partitioner;
use partikv::{KvError, Result};

/// How a [`TestEngine`] handles batch writes
#[derive(Clone, Copy)]
pub enum Behavior {
    Normal,
    Slow(Duration),
    Fail,
    Panic,
}

pub struct TestEngine {
    data: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
    behavior: Behavior,
    /// Batch writes attempted, successful or not
    pub attempts: AtomicUsize,
}

impl TestEngine {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            data: Mutex::new(BTreeMap::new()),
            behavior,
            attempts: AtomicUsize::new(0),
        })
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    /// Read bypassing the storage layer
    pub fn get_direct(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.lock().get(key).cloned()
    }
}

impl KvEngine for TestEngine {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if let Behavior::Fail = self.behavior {
            return Err(KvError::Storage("injected put failure".to_string()));
        }
        self.data.lock().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Normal => {}
            Behavior::Slow(delay) => thread::sleep(delay),
            Behavior::Fail => return Err(KvError::Storage("injected batch failure".to_string())),
            Behavior::Panic => panic!("injected batch panic"),
        }
        let mut data = self.data.lock();
        for (key, value) in batch.into_writes() {
            data.insert(key, value);
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }

    fn destroy(&self) -> Result<()> {
        self.data.lock().clear();
        Ok(())
    }
}

/// One key per partition, found by probing `key-{n}`
pub fn key_per_partition(partitions: usize) -> Vec<Vec<u8>> {
    let partitioner = Partitioner::new(partitions).unwrap();
    let mut keys: Vec<Option<Vec<u8>>> = vec![None; partitions];
    let mut n = 0;
    while keys.iter().any(Option::is_none) {
        let key = format!("key-{}", n).into_bytes();
        let slot = &mut keys[partitioner.partition(&key)];
        if slot.is_none() {
            *slot = Some(key);
        }
        n += 1;
    }
    keys.into_iter().map(|k| k.unwrap()).collect()
}
