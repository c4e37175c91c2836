//! Partitioned Storage
//!
//! One logical key space spread over N [`StorageInstance`]s.
//!
//! ## Batch commit
//! ```text
//!   caller ── commit() ──┬── worker: partition 0 engine batch ──┐
//!                        ├── worker: partition 2 engine batch ──┤
//!                        └── worker: partition 3 engine batch ──┤
//!   caller ◄──────────── WaitGroup reaches zero ◄──────────────┘
//! ```
//! Each partition commits independently. A failing partition is logged and
//! does not roll back or block its siblings; `commit` reports only that every
//! partition has been attempted. There is no cross-partition atomicity.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam::sync::WaitGroup;

use crate::config::EngineOptions;
use crate::engine::WriteBatch;
use crate::error::{KvError, Result};

use super::instance::{Storage, StorageBatch, StorageInstance};
use super::partitioner::Partitioner;
use super::pool::WorkerPool;

pub struct PartitionedStorage {
    shared: Arc<Shared>,
}

struct Shared {
    partitioner: Partitioner,
    instances: Vec<StorageInstance>,
    /// Sized to the partition count
    pool: WorkerPool,
    closed: AtomicBool,
    destroyed: AtomicBool,
    dir: Option<PathBuf>,
}

impl PartitionedStorage {
    /// Open (or create) `partitions` engines under `dir/partition-{n}`
    pub fn open(dir: &Path, partitions: usize, options: EngineOptions) -> Result<Self> {
        let partitioner = Partitioner::new(partitions)?;

        let mut instances = Vec::with_capacity(partitions);
        for index in 0..partitions {
            let instance = StorageInstance::open(&Self::partition_dir(dir, index), options)?;
            instances.push(instance);
        }

        tracing::debug!("Opened {} partitions under {}", partitions, dir.display());
        Self::build(partitioner, instances, Some(dir.to_path_buf()))
    }

    /// Compose already-open instances; partition `n` is `instances[n]`
    pub fn with_instances(instances: Vec<StorageInstance>) -> Result<Self> {
        let partitioner = Partitioner::new(instances.len())?;
        Self::build(partitioner, instances, None)
    }

    fn build(
        partitioner: Partitioner,
        instances: Vec<StorageInstance>,
        dir: Option<PathBuf>,
    ) -> Result<Self> {
        let pool = WorkerPool::new("partition-commit", partitioner.partition_count())?;

        Ok(Self {
            shared: Arc::new(Shared {
                partitioner,
                instances,
                pool,
                closed: AtomicBool::new(false),
                destroyed: AtomicBool::new(false),
                dir,
            }),
        })
    }

    /// Directory of partition `index` under a database directory
    pub fn partition_dir(dir: &Path, index: usize) -> PathBuf {
        dir.join(format!("partition-{}", index))
    }

    pub fn partitioner(&self) -> Partitioner {
        self.shared.partitioner
    }

    fn instance_for(&self, key: &[u8]) -> Result<&StorageInstance> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(KvError::Closed);
        }
        let index = self.shared.partitioner.partition(key);
        Ok(&self.shared.instances[index])
    }
}

impl Storage for PartitionedStorage {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.instance_for(key)?.get(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.instance_for(key)?.set(key, value)
    }

    fn begin_batch(&self) -> Box<dyn StorageBatch> {
        let count = self.shared.partitioner.partition_count();
        Box::new(PartitionedBatch {
            shared: Arc::clone(&self.shared),
            pending: vec![WriteBatch::new(); count],
            len: 0,
        })
    }

    fn partition_count(&self) -> usize {
        self.shared.partitioner.partition_count()
    }

    fn close(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for instance in &self.shared.instances {
            instance.close();
        }
        self.shared.pool.shutdown();
    }

    fn destroy(&self) {
        self.close();
        if self.shared.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        for instance in &self.shared.instances {
            instance.destroy();
        }
        if let Some(dir) = &self.shared.dir {
            if let Err(e) = remove_empty_dir(dir) {
                tracing::warn!("Failed to remove {}: {}", dir.display(), e);
            }
        }
    }
}

fn remove_empty_dir(dir: &Path) -> std::io::Result<()> {
    if dir.exists() && std::fs::read_dir(dir)?.next().is_none() {
        std::fs::remove_dir(dir)?;
    }
    Ok(())
}

/// Writes buffered per partition; index computed once at `set`
struct PartitionedBatch {
    shared: Arc<Shared>,
    pending: Vec<WriteBatch>,
    len: usize,
}

impl StorageBatch for PartitionedBatch {
    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        let index = self.shared.partitioner.partition(&key);
        self.pending[index].put(key, value);
        self.len += 1;
    }

    fn len(&self) -> usize {
        self.len
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let PartitionedBatch { shared, pending, .. } = *self;
        if shared.closed.load(Ordering::Acquire) {
            return Err(KvError::Closed);
        }

        let barrier = WaitGroup::new();
        let mut submitted = 0usize;

        for (index, batch) in pending.into_iter().enumerate() {
            if batch.is_empty() {
                continue;
            }

            let worker_shared = Arc::clone(&shared);
            let done = barrier.clone();
            let queued = shared.pool.execute(move || {
                // Released on every exit path, panics included
                let _done = done;
                let writes = batch.len();
                if let Err(e) = worker_shared.instances[index].write(batch) {
                    tracing::warn!(
                        "Partition {} failed to commit {} writes: {}",
                        index,
                        writes,
                        e
                    );
                }
            });

            match queued {
                Ok(()) => submitted += 1,
                Err(e) => tracing::warn!("Could not queue commit for partition {}: {}", index, e),
            }
        }

        barrier.wait();
        tracing::trace!("Batch committed across {} partitions", submitted);
        Ok(())
    }
}
