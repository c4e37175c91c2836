//! Engine Module
//!
//! The embedded ordered store underneath one partition.
//!
//! ## Responsibilities
//! - Point reads and writes
//! - Atomic multi-key write batches
//! - Crash recovery on startup
//! - Bounded log growth through checkpoints
//!
//! The rest of the crate only sees the [`KvEngine`] trait, so any ordered
//! store with an atomic batch primitive can sit underneath a partition.
//! [`LogEngine`] is the implementation shipped with the server.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::config::EngineOptions;
use crate::error::{KvError, Result};
use crate::memtable::MemTable;
use crate::wal::{Operation, WalRecovery, WalWriter};

/// Writes collected for one atomic engine commit
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    writes: Vec<(Vec<u8>, Vec<u8>)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.writes.push((key, value));
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn into_writes(self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.writes
    }
}

/// An embedded ordered key-value store owning one directory
///
/// `close` and `destroy` must be idempotent.
pub trait KvEngine: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Apply every write in `batch` or none of them
    fn write(&self, batch: WriteBatch) -> Result<()>;

    fn close(&self) -> Result<()>;

    /// Close and remove all files
    fn destroy(&self) -> Result<()>;
}

/// WAL-backed ordered memtable
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/write/checkpoint): serialized by the `wal` mutex
///   - Must acquire: wal → memtable (write)
/// - **Reads** (get): go straight to the memtable's internal RwLock
pub struct LogEngine {
    dir: PathBuf,
    options: EngineOptions,

    /// `None` once the engine is closed
    wal: Mutex<Option<WalWriter>>,

    memtable: MemTable,
}

impl LogEngine {
    const WAL_FILENAME: &'static str = "wal.log";

    /// Open or create an engine rooted at `dir`
    ///
    /// On startup:
    /// 1. Create the directory if it doesn't exist
    /// 2. Recover from the WAL, dropping any partial tail
    /// 3. Replay recovered entries into the memtable
    pub fn open(dir: &Path, options: EngineOptions) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let wal_path = dir.join(Self::WAL_FILENAME);
        let memtable = MemTable::new();

        if wal_path.exists() {
            let (entries, recovery) = WalRecovery::recover(&wal_path)?;

            if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
                tracing::debug!(
                    "WAL recovery in {}: {} entries recovered, {} corrupted, last_lsn={}",
                    dir.display(),
                    recovery.entries_recovered,
                    recovery.entries_corrupted,
                    recovery.last_lsn
                );
            }

            for entry in entries {
                match entry.operation {
                    Operation::Put { key, value } => {
                        memtable.put(key, value);
                    }
                    Operation::Batch { writes } => {
                        memtable.apply_batch(writes);
                    }
                }
            }
        }

        let wal = WalWriter::open(&wal_path, options.sync_strategy)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            options,
            wal: Mutex::new(Some(wal)),
            memtable,
        })
    }

    /// Directory this engine owns
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of live keys
    pub fn entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    /// Current WAL size in bytes (0 when closed)
    pub fn wal_len(&self) -> u64 {
        self.wal.lock().as_ref().map(WalWriter::len).unwrap_or(0)
    }

    pub fn is_closed(&self) -> bool {
        self.wal.lock().is_none()
    }

    /// Rewrite the WAL once it outgrows the configured limit
    fn maybe_checkpoint(&self, wal: &mut WalWriter) -> Result<()> {
        if wal.len() <= self.options.checkpoint_bytes {
            return Ok(());
        }

        let before = wal.len();
        wal.rewrite(self.memtable.snapshot())?;
        tracing::debug!(
            "Checkpointed WAL in {}: {} -> {} bytes",
            self.dir.display(),
            before,
            wal.len()
        );
        Ok(())
    }
}

impl KvEngine for LogEngine {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if self.is_closed() {
            return Err(KvError::Closed);
        }
        Ok(self.memtable.get(key))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut guard = self.wal.lock();
        let wal = guard.as_mut().ok_or(KvError::Closed)?;

        // WAL first, then the memtable
        wal.append(Operation::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        })?;
        self.memtable.put(key.to_vec(), value.to_vec());

        self.maybe_checkpoint(wal)
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut guard = self.wal.lock();
        let wal = guard.as_mut().ok_or(KvError::Closed)?;

        let writes = batch.into_writes();
        wal.append(Operation::Batch {
            writes: writes.clone(),
        })?;
        self.memtable.apply_batch(writes);

        self.maybe_checkpoint(wal)
    }

    fn close(&self) -> Result<()> {
        let mut guard = self.wal.lock();
        if let Some(mut wal) = guard.take() {
            wal.sync()?;
        }
        Ok(())
    }

    fn destroy(&self) -> Result<()> {
        self.close()?;
        self.memtable.clear();
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)?;
        }
        Ok(())
    }
}
