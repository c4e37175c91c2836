//! # partikv
//!
//! A partitioned key-value storage service with:
//! - Hash partitioning of every logical database across embedded engines
//! - Optimistic concurrency (versioned) or existence-conditioned (CAS) writes
//! - Per-partition batch commit fanned out to a worker pool
//! - A length-prefixed binary RPC protocol with a reconnecting client
//! - Topology-table comparison for cluster configuration checks
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │          TCP Server (public port + local admin port)         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ Session per connection
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  Command Table / Dispatcher                  │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  Versioned  │          │  Existence  │      KV layers (LRU cache)
//!   │    Store    │          │    Store    │
//!   └──────┬──────┘          └──────┬──────┘
//!          └────────────┬────────────┘
//!                       ▼
//!            ┌─────────────────────┐
//!            │ PartitionedStorage  │──► WorkerPool (batch fan-out)
//!            └──────────┬──────────┘
//!          ┌────────────┼────────────┐
//!          ▼            ▼            ▼
//!      LogEngine    LogEngine    LogEngine        one per partition
//!     (WAL + Mem)  (WAL + Mem)  (WAL + Mem)
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod engine;
pub mod memtable;
pub mod storage;
pub mod wal;

pub mod database;
pub mod kv;

pub mod client;
pub mod cluster;
pub mod network;
pub mod protocol;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use client::{Client, DatabaseClient};
pub use config::{ClientConfig, Config};
pub use database::DatabaseManager;
pub use error::{KvError, Result};
pub use network::Server;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of partikv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
