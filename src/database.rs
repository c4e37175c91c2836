//! Database Module
//!
//! Logical databases and the registry that owns them.
//!
//! ## Layout
//! ```text
//!   {data_dir}/databases/{name}/info.bin        bincode DatabaseInfo
//!   {data_dir}/databases/{name}/partition-{n}/  one engine per partition
//! ```
//! A database serves exactly one KV semantics, chosen at creation by its
//! [`DatabaseKind`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::Config;
use crate::error::{KvError, Result};
use crate::kv::{ExistenceStore, ReadCache, VersionedStore};
use crate::protocol::{ClusterInfo, DatabaseInfo, DatabaseKind};
use crate::storage::{PartitionedStorage, Storage};

/// The KV semantics a database serves
#[derive(Clone)]
pub enum KvLayer {
    Versioned(Arc<VersionedStore>),
    Conditional(Arc<ExistenceStore>),
}

/// One open logical database
pub struct Database {
    info: RwLock<DatabaseInfo>,
    storage: Arc<dyn Storage>,
    layer: KvLayer,
    dir: PathBuf,
}

impl Database {
    const INFO_FILENAME: &'static str = "info.bin";

    /// Open (or create) the database stored under `dir`
    ///
    /// A partition count of 0 in `info` is replaced by the configured default
    /// before anything is written.
    pub fn open(dir: &Path, mut info: DatabaseInfo, config: &Config) -> Result<Self> {
        if info.partitions == 0 {
            info.partitions = config.default_partitions as u32;
        }

        fs::create_dir_all(dir)?;
        let storage: Arc<dyn Storage> = Arc::new(PartitionedStorage::open(
            dir,
            info.partitions as usize,
            config.engine_options(),
        )?);

        let layer = match info.kind {
            DatabaseKind::Versioned => KvLayer::Versioned(Arc::new(VersionedStore::new(
                Arc::clone(&storage),
                ReadCache::new(config.cache_capacity),
            ))),
            DatabaseKind::Conditional => KvLayer::Conditional(Arc::new(ExistenceStore::new(
                Arc::clone(&storage),
                ReadCache::new(config.cache_capacity),
            ))),
        };

        let database = Self {
            info: RwLock::new(info),
            storage,
            layer,
            dir: dir.to_path_buf(),
        };
        database.persist_info()?;
        Ok(database)
    }

    pub fn name(&self) -> String {
        self.info.read().name.clone()
    }

    pub fn info(&self) -> DatabaseInfo {
        self.info.read().clone()
    }

    pub fn kind(&self) -> DatabaseKind {
        self.info.read().kind
    }

    pub fn is_enabled(&self) -> bool {
        self.info.read().enabled
    }

    pub fn cluster_info(&self) -> ClusterInfo {
        self.info.read().clusters.clone()
    }

    pub fn layer(&self) -> &KvLayer {
        &self.layer
    }

    pub fn partition_count(&self) -> usize {
        self.storage.partition_count()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.info.write().enabled = enabled;
        self.persist_info()
    }

    /// Write `info.bin` atomically (temp file + rename)
    fn persist_info(&self) -> Result<()> {
        let bytes = bincode::serialize(&*self.info.read())?;
        let path = self.dir.join(Self::INFO_FILENAME);
        let tmp = self.dir.join(format!("{}.tmp", Self::INFO_FILENAME));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn load_info(dir: &Path) -> Result<Option<DatabaseInfo>> {
        let path = dir.join(Self::INFO_FILENAME);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(bincode::deserialize(&fs::read(path)?)?))
    }

    fn close(&self) {
        self.storage.close();
    }

    fn destroy(&self) {
        self.storage.destroy();
    }
}

/// Registry of every database on this node
pub struct DatabaseManager {
    config: Config,
    root: PathBuf,
    databases: RwLock<BTreeMap<String, Arc<Database>>>,
}

impl DatabaseManager {
    const DATABASES_DIR: &'static str = "databases";

    /// Open the registry, reloading every database found on disk
    pub fn open(config: Config) -> Result<Self> {
        let root = config.data_dir.join(Self::DATABASES_DIR);
        fs::create_dir_all(&root)?;

        let mut databases = BTreeMap::new();
        for entry in fs::read_dir(&root)? {
            let dir = entry?.path();
            if !dir.is_dir() {
                continue;
            }

            match Database::load_info(&dir)? {
                Some(info) => {
                    let name = info.name.clone();
                    let database = Database::open(&dir, info, &config)?;
                    tracing::info!(
                        "Loaded database {} ({:?}, {} partitions)",
                        name,
                        database.kind(),
                        database.partition_count()
                    );
                    databases.insert(name, Arc::new(database));
                }
                None => tracing::warn!("Skipping {}: no database info", dir.display()),
            }
        }

        Ok(Self {
            config,
            root,
            databases: RwLock::new(databases),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn create(&self, info: DatabaseInfo) -> Result<Arc<Database>> {
        validate_name(&info.name)?;

        let mut databases = self.databases.write();
        if databases.contains_key(&info.name) {
            return Err(KvError::DatabaseExists(info.name));
        }

        let name = info.name.clone();
        let database = Arc::new(Database::open(&self.root.join(&name), info, &self.config)?);
        databases.insert(name.clone(), Arc::clone(&database));

        tracing::info!(
            "Created database {} ({:?}, {} partitions)",
            name,
            database.kind(),
            database.partition_count()
        );
        Ok(database)
    }

    pub fn get(&self, name: &str) -> Result<Arc<Database>> {
        self.databases
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| KvError::DatabaseNotFound(name.to_string()))
    }

    /// Like [`get`](Self::get), but a disabled database is an error
    pub fn get_enabled(&self, name: &str) -> Result<Arc<Database>> {
        let database = self.get(name)?;
        if !database.is_enabled() {
            return Err(KvError::DatabaseDisabled(name.to_string()));
        }
        Ok(database)
    }

    pub fn enable(&self, name: &str) -> Result<()> {
        self.get(name)?.set_enabled(true)?;
        tracing::info!("Enabled database {}", name);
        Ok(())
    }

    pub fn disable(&self, name: &str) -> Result<()> {
        self.get(name)?.set_enabled(false)?;
        tracing::info!("Disabled database {}", name);
        Ok(())
    }

    /// Remove the database and delete its files
    pub fn drop_database(&self, name: &str) -> Result<()> {
        let database = self
            .databases
            .write()
            .remove(name)
            .ok_or_else(|| KvError::DatabaseNotFound(name.to_string()))?;

        database.destroy();
        if database.dir().exists() {
            fs::remove_dir_all(database.dir())?;
        }

        tracing::info!("Dropped database {}", name);
        Ok(())
    }

    pub fn list(&self) -> Vec<DatabaseInfo> {
        self.databases.read().values().map(|db| db.info()).collect()
    }

    /// Close every database's storage
    pub fn close_all(&self) {
        for database in self.databases.read().values() {
            database.close();
        }
    }
}

/// Names become directory names
fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

    if !valid {
        return Err(KvError::InvalidArgument(format!(
            "invalid database name: {:?}",
            name
        )));
    }
    Ok(())
}
