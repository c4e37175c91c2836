//! MemTable Module
//!
//! In-memory ordered table holding a partition's live data.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Single-writer/multi-reader access pattern
//! - Track size for checkpoint decisions
//! - Ordered iteration for WAL checkpoints
//!
//! ## Data Structure Choice
//! BTreeMap wrapped in RwLock:
//! - Ordered keys (checkpoints are written in key order)
//! - Simple and correct first, optimize later

mod table;

pub use table::MemTable;
