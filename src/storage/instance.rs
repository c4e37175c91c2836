//! Storage Instance
//!
//! Facade over one embedded engine: get/set/batch plus best-effort teardown.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::EngineOptions;
use crate::engine::{KvEngine, LogEngine, WriteBatch};
use crate::error::{KvError, Result};

/// A single logical key space
///
/// Implemented by [`StorageInstance`] and
/// [`PartitionedStorage`](super::PartitionedStorage); the KV layers are
/// written against this trait so they work over either.
pub trait Storage: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Start buffering writes; nothing reaches the engine until commit
    fn begin_batch(&self) -> Box<dyn StorageBatch>;

    fn partition_count(&self) -> usize;

    /// Close every engine. Idempotent; errors are logged, not raised.
    fn close(&self);

    /// Close, then delete every engine's files. Idempotent; errors are
    /// logged, not raised.
    fn destroy(&self);
}

/// Buffered writes against a [`Storage`]
///
/// A batch belongs to one caller; it is `Send` so it can move with a
/// session, but it is never shared between threads.
pub trait StorageBatch: Send {
    fn set(&mut self, key: Vec<u8>, value: Vec<u8>);

    /// Number of buffered writes
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hand the buffered writes to the engine(s) and wait until every
    /// partition has been attempted
    fn commit(self: Box<Self>) -> Result<()>;
}

/// One engine behind the [`Storage`] facade
pub struct StorageInstance {
    engine: Arc<dyn KvEngine>,
    closed: AtomicBool,
    destroyed: AtomicBool,
}

impl StorageInstance {
    /// Open a [`LogEngine`] rooted at `dir`
    pub fn open(dir: &Path, options: EngineOptions) -> Result<Self> {
        let engine = LogEngine::open(dir, options)?;
        Ok(Self::new(Arc::new(engine)))
    }

    /// Wrap an already-open engine
    pub fn new(engine: Arc<dyn KvEngine>) -> Self {
        Self {
            engine,
            closed: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Commit one engine batch directly
    pub fn write(&self, batch: WriteBatch) -> Result<()> {
        self.check_open()?;
        self.engine.write(batch)
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(KvError::Closed);
        }
        Ok(())
    }
}

impl Storage for StorageInstance {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.check_open()?;
        self.engine.get(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_open()?;
        self.engine.put(key, value)
    }

    fn begin_batch(&self) -> Box<dyn StorageBatch> {
        Box::new(InstanceBatch {
            engine: Arc::clone(&self.engine),
            batch: WriteBatch::new(),
        })
    }

    fn partition_count(&self) -> usize {
        1
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = self.engine.close() {
            tracing::warn!("Failed to close engine: {}", e);
        }
    }

    fn destroy(&self) {
        self.close();
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = self.engine.destroy() {
            tracing::warn!("Failed to destroy engine: {}", e);
        }
    }
}

struct InstanceBatch {
    engine: Arc<dyn KvEngine>,
    batch: WriteBatch,
}

impl StorageBatch for InstanceBatch {
    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.batch.put(key, value);
    }

    fn len(&self) -> usize {
        self.batch.len()
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let InstanceBatch { engine, batch } = *self;
        engine.write(batch)
    }
}
