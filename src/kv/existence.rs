//! Existence-policy KV layer (compare-and-swap on existence)
//!
//! ## Key namespace
//! ```text
//!   0x03 ++ key -> value
//! ```
//! A write declares whether it expects the key to exist already. The only
//! condition offered is existence; there is no conditional-value CAS.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{KvError, Result};
use crate::storage::{Storage, StorageBatch};

use super::cache::ReadCache;

const VALUE_PREFIX: u8 = 0x03;

/// Caller's expectation for a conditional write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistencePolicy {
    Existing,
    NotExisting,
}

impl ExistencePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExistencePolicy::Existing => "EXISTING",
            ExistencePolicy::NotExisting => "NOT_EXISTING",
        }
    }

    /// Whether a key in state `exists` satisfies this policy
    pub fn allows(&self, exists: bool) -> bool {
        match self {
            ExistencePolicy::Existing => exists,
            ExistencePolicy::NotExisting => !exists,
        }
    }
}

impl fmt::Display for ExistencePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExistencePolicy {
    type Err = KvError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "EXISTING" => Ok(ExistencePolicy::Existing),
            "NOT_EXISTING" => Ok(ExistencePolicy::NotExisting),
            other => Err(KvError::InvalidArgument(format!(
                "unknown existence policy: {}",
                other
            ))),
        }
    }
}

pub struct ExistenceStore {
    storage: Arc<dyn Storage>,
    /// key -> exists, independent of value content
    cache: ReadCache<bool>,
    /// Shared from a cache miss's engine read through its fill; exclusive
    /// from a write's policy check through its cache update
    lock: RwLock<()>,
}

impl ExistenceStore {
    pub fn new(storage: Arc<dyn Storage>, cache: ReadCache<bool>) -> Self {
        Self {
            storage,
            cache,
            lock: RwLock::new(()),
        }
    }

    pub fn exist(&self, key: &[u8]) -> Result<bool> {
        if let Some(exists) = self.cache.get(key) {
            return Ok(exists);
        }

        let _guard = self.lock.read();
        self.load_exist(key)
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.storage.get(&value_key(key))
    }

    /// Write only if the key's existence satisfies `policy`; returns whether
    /// the write happened
    pub fn set(&self, key: &[u8], value: &[u8], policy: ExistencePolicy) -> Result<bool> {
        let _guard = self.lock.write();

        if !policy.allows(self.load_exist(key)?) {
            tracing::trace!("Conditional write rejected by policy {}", policy);
            return Ok(false);
        }

        self.storage.set(&value_key(key), value)?;
        self.cache.insert(key, true);
        Ok(true)
    }

    pub fn begin_batch(self: &Arc<Self>) -> ExistenceBatch {
        ExistenceBatch {
            store: Arc::clone(self),
            batch: self.storage.begin_batch(),
            pending_exists: HashMap::new(),
            pending_values: HashMap::new(),
            created: HashSet::new(),
        }
    }

    /// Cache, then engine, filling the cache. Caller holds `lock`.
    fn load_exist(&self, key: &[u8]) -> Result<bool> {
        if let Some(exists) = self.cache.get(key) {
            return Ok(exists);
        }

        let exists = self.storage.get(&value_key(key))?.is_some();
        self.cache.insert(key, exists);
        Ok(exists)
    }
}

/// Buffered conditional writes
pub struct ExistenceBatch {
    store: Arc<ExistenceStore>,
    batch: Box<dyn StorageBatch>,
    /// Existence as seen inside this batch, including engine read back-fills
    pending_exists: HashMap<Vec<u8>, bool>,
    pending_values: HashMap<Vec<u8>, Vec<u8>>,
    /// Keys this batch creates; they must still be absent at commit
    created: HashSet<Vec<u8>>,
}

impl ExistenceBatch {
    /// Pending state first, then the store
    pub fn exist(&mut self, key: &[u8]) -> Result<bool> {
        if let Some(&exists) = self.pending_exists.get(key) {
            return Ok(exists);
        }
        let exists = self.store.exist(key)?;
        self.pending_exists.insert(key.to_vec(), exists);
        Ok(exists)
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.pending_values.get(key) {
            Some(value) => Ok(Some(value.clone())),
            None => self.store.get(key),
        }
    }

    pub fn set(&mut self, key: &[u8], value: &[u8], policy: ExistencePolicy) -> Result<bool> {
        let exists = self.exist(key)?;
        if !policy.allows(exists) {
            return Ok(false);
        }

        if !exists {
            self.created.insert(key.to_vec());
        }
        self.batch.set(value_key(key), value.to_vec());
        self.pending_exists.insert(key.to_vec(), true);
        self.pending_values.insert(key.to_vec(), value.to_vec());
        Ok(true)
    }

    /// Number of keys written in this batch
    pub fn len(&self) -> usize {
        self.pending_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending_values.is_empty()
    }

    /// Commit unless a key this batch creates has appeared meanwhile
    pub fn commit(self) -> Result<()> {
        let ExistenceBatch {
            store,
            batch,
            pending_values,
            created,
            ..
        } = self;
        let _guard = store.lock.write();

        for key in &created {
            if store.load_exist(key)? {
                return Err(KvError::PolicyViolation(
                    ExistencePolicy::NotExisting.to_string(),
                ));
            }
        }

        let result = batch.commit();
        for key in pending_values.keys() {
            store.cache.remove(key);
        }
        result
    }

    pub fn abort(self) {}
}

fn value_key(key: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + key.len());
    buf.push(VALUE_PREFIX);
    buf.extend_from_slice(key);
    buf
}
