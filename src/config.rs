//! Configuration for partikv
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for a partikv server
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     └── databases/
    ///           └── {name}/
    ///                 ├── info.bin        (database metadata)
    ///                 └── partition-{n}/  (one engine per partition)
    ///                       └── wal.log
    pub data_dir: PathBuf,

    /// Partition count used when a created database does not specify one
    pub default_partitions: usize,

    /// Capacity of each KV layer read cache (entries)
    pub cache_capacity: usize,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    /// WAL size (bytes) beyond which the engine rewrites it as a checkpoint
    pub wal_checkpoint_bytes: u64,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// Public TCP listen address (data commands only)
    pub listen_addr: String,

    /// Local management listen address (all commands)
    pub admin_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./partikv_data"),
            default_partitions: 4,
            cache_capacity: 10_000,
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            wal_checkpoint_bytes: 64 * 1024 * 1024, // 64 MB
            listen_addr: "0.0.0.0:7078".to_string(),
            admin_addr: "127.0.0.1:7079".to_string(),
            max_connections: 1024,
            read_timeout_ms: 0,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Options handed to every partition engine
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            sync_strategy: self.wal_sync_strategy,
            checkpoint_bytes: self.wal_checkpoint_bytes,
        }
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    pub fn default_partitions(mut self, count: usize) -> Self {
        self.config.default_partitions = count;
        self
    }

    pub fn cache_capacity(mut self, entries: usize) -> Self {
        self.config.cache_capacity = entries;
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    pub fn wal_checkpoint_bytes(mut self, bytes: u64) -> Self {
        self.config.wal_checkpoint_bytes = bytes;
        self
    }

    /// Set the public TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the local management listen address
    pub fn admin_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.admin_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

/// Per-partition engine settings
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub sync_strategy: WalSyncStrategy,
    pub checkpoint_bytes: u64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Config::default().engine_options()
    }
}

// =============================================================================
// Client Configuration
// =============================================================================

/// Configuration for a [`crate::client::Client`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// How long one wait for a response lasts
    pub request_timeout: Duration,

    /// Extra waits after the first timeout (the request is not resent)
    pub retries: u32,

    /// Fixed delay between reconnect attempts
    pub reconnect_interval: Duration,

    /// Bound on one TCP connect attempt
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            retries: 3,
            reconnect_interval: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(3),
        }
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for ClientConfig
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.config.retries = retries;
        self
    }

    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.config.reconnect_interval = interval;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}
