//! Versioning KV layer (optimistic concurrency)
//!
//! ## Key namespaces
//! ```text
//!   0x01 ++ key              -> current version (i64, big-endian)
//!   0x02 ++ key ++ version   -> value written at that version
//! ```
//! The version suffix is fixed-width, so `(key, version)` encodes
//! unambiguously for arbitrary key bytes.
//!
//! A write checks the caller's expected version against the current one,
//! then writes the version marker first and the payload second. A crash in
//! between leaves a marker with no payload, which readers report as
//! [`KvError::MissingPayload`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{KvError, Result};
use crate::storage::{Storage, StorageBatch};

use super::cache::ReadCache;

/// Version of a key that has never been written
pub const NO_VERSION: i64 = -1;

const VERSION_PREFIX: u8 = 0x01;
const DATA_PREFIX: u8 = 0x02;

/// One immutable `(key, version) -> value` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedEntry {
    pub key: Vec<u8>,
    pub version: i64,
    pub value: Vec<u8>,
}

pub struct VersionedStore {
    storage: Arc<dyn Storage>,
    /// key -> latest committed version
    cache: ReadCache<i64>,
    /// Shared from a cache miss's engine read through its fill; exclusive
    /// from a write's version check through its cache update
    lock: RwLock<()>,
}

impl VersionedStore {
    pub fn new(storage: Arc<dyn Storage>, cache: ReadCache<i64>) -> Self {
        Self {
            storage,
            cache,
            lock: RwLock::new(()),
        }
    }

    /// Latest committed version, or [`NO_VERSION`]
    pub fn get_version(&self, key: &[u8]) -> Result<i64> {
        if let Some(version) = self.cache.get(key) {
            return Ok(version);
        }

        let _guard = self.lock.read();
        self.load_version(key)
    }

    /// The value written at exactly `version`
    pub fn get_entry(&self, key: &[u8], version: i64) -> Result<Option<VersionedEntry>> {
        if version < 0 {
            return Ok(None);
        }

        match self.storage.get(&data_key(key, version))? {
            Some(value) => Ok(Some(VersionedEntry {
                key: key.to_vec(),
                version,
                value,
            })),
            None if version <= self.get_version(key)? => Err(KvError::MissingPayload { version }),
            None => Ok(None),
        }
    }

    /// Entry at the current version, if the key exists
    pub fn get_latest(&self, key: &[u8]) -> Result<Option<VersionedEntry>> {
        match self.get_version(key)? {
            NO_VERSION => Ok(None),
            version => self.get_entry(key, version),
        }
    }

    /// Write `value` as the version after `expected_version`
    ///
    /// Fails with [`KvError::VersionMismatch`], leaving state untouched,
    /// unless `expected_version` is the current version.
    pub fn set(&self, key: &[u8], value: &[u8], expected_version: i64) -> Result<i64> {
        let _guard = self.lock.write();

        let current = self.load_version(key)?;
        if expected_version != current {
            return Err(KvError::VersionMismatch {
                expected: expected_version,
                actual: current,
            });
        }

        let new_version = expected_version + 1;
        self.storage.set(&version_key(key), &new_version.to_be_bytes())?;
        let written = self.storage.set(&data_key(key, new_version), value);
        // The marker is durable now; the cache follows it even if the
        // payload write failed
        self.cache.insert(key, new_version);
        written?;

        Ok(new_version)
    }

    /// Start a batch whose writes stay pending until [`VersionedBatch::commit`]
    pub fn begin_batch(self: &Arc<Self>) -> VersionedBatch {
        VersionedBatch {
            store: Arc::clone(self),
            batch: self.storage.begin_batch(),
            pending: HashMap::new(),
        }
    }

    /// Cache, then engine, filling the cache. Caller holds `lock`.
    fn load_version(&self, key: &[u8]) -> Result<i64> {
        if let Some(version) = self.cache.get(key) {
            return Ok(version);
        }

        let version = match self.storage.get(&version_key(key))? {
            Some(bytes) => decode_version(&bytes)?,
            None => NO_VERSION,
        };
        if version != NO_VERSION {
            self.cache.insert(key, version);
        }
        Ok(version)
    }
}

struct PendingVersion {
    /// Committed version the batch started from
    base: i64,
    /// Latest version written inside the batch
    version: i64,
    value: Vec<u8>,
}

/// Buffered versioned writes
///
/// Reads through the batch see its own pending writes first. Committed
/// state and the shared cache are untouched until commit.
pub struct VersionedBatch {
    store: Arc<VersionedStore>,
    batch: Box<dyn StorageBatch>,
    pending: HashMap<Vec<u8>, PendingVersion>,
}

impl VersionedBatch {
    pub fn get_version(&self, key: &[u8]) -> Result<i64> {
        match self.pending.get(key) {
            Some(pending) => Ok(pending.version),
            None => self.store.get_version(key),
        }
    }

    pub fn get_entry(&self, key: &[u8], version: i64) -> Result<Option<VersionedEntry>> {
        if let Some(pending) = self.pending.get(key) {
            if pending.version == version {
                return Ok(Some(VersionedEntry {
                    key: key.to_vec(),
                    version,
                    value: pending.value.clone(),
                }));
            }
        }
        self.store.get_entry(key, version)
    }

    pub fn get_latest(&self, key: &[u8]) -> Result<Option<VersionedEntry>> {
        match self.get_version(key)? {
            NO_VERSION => Ok(None),
            version => self.get_entry(key, version),
        }
    }

    pub fn set(&mut self, key: &[u8], value: &[u8], expected_version: i64) -> Result<i64> {
        let current = self.get_version(key)?;
        if expected_version != current {
            return Err(KvError::VersionMismatch {
                expected: expected_version,
                actual: current,
            });
        }

        let new_version = expected_version + 1;
        self.batch.set(version_key(key), new_version.to_be_bytes().to_vec());
        self.batch.set(data_key(key, new_version), value.to_vec());

        let base = self
            .pending
            .get(key)
            .map(|p| p.base)
            .unwrap_or(current);
        self.pending.insert(
            key.to_vec(),
            PendingVersion {
                base,
                version: new_version,
                value: value.to_vec(),
            },
        );
        Ok(new_version)
    }

    /// Number of keys written in this batch
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Commit if no key moved since the batch read it
    ///
    /// Touched keys are dropped from the cache afterwards, so the next read
    /// comes from the engine whatever each partition's outcome was.
    pub fn commit(self) -> Result<()> {
        let VersionedBatch {
            store,
            batch,
            pending,
        } = self;
        let _guard = store.lock.write();

        for (key, p) in &pending {
            let current = store.load_version(key)?;
            if current != p.base {
                return Err(KvError::VersionMismatch {
                    expected: p.base,
                    actual: current,
                });
            }
        }

        let result = batch.commit();
        for key in pending.keys() {
            store.cache.remove(key);
        }
        result
    }

    /// Discard every pending write
    pub fn abort(self) {}
}

fn version_key(key: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + key.len());
    buf.push(VERSION_PREFIX);
    buf.extend_from_slice(key);
    buf
}

fn data_key(key: &[u8], version: i64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + key.len() + 8);
    buf.push(DATA_PREFIX);
    buf.extend_from_slice(key);
    buf.extend_from_slice(&version.to_be_bytes());
    buf
}

fn decode_version(bytes: &[u8]) -> Result<i64> {
    let raw: [u8; 8] = bytes.try_into().map_err(|_| {
        KvError::Storage(format!("version marker has {} bytes, expected 8", bytes.len()))
    })?;
    Ok(i64::from_be_bytes(raw))
}
