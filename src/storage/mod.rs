//! Storage Module
//!
//! The logical key space a database is stored in.
//!
//! ## Layout
//! ```text
//!             ┌──────────────────────┐
//!   key ────► │     Partitioner      │  xxh32(key) mod N
//!             └──────────┬───────────┘
//!          ┌─────────────┼─────────────┐
//!          ▼             ▼             ▼
//!   ┌────────────┐ ┌────────────┐ ┌────────────┐
//!   │ Instance 0 │ │ Instance 1 │ │ Instance N │  one engine each,
//!   │ (engine)   │ │ (engine)   │ │ (engine)   │  partition-{n}/
//!   └────────────┘ └────────────┘ └────────────┘
//! ```

mod instance;
mod partitioned;
mod partitioner;
mod pool;

pub use instance::{Storage, StorageBatch, StorageInstance};
pub use partitioned::PartitionedStorage;
pub use partitioner::{Partitioner, PARTITION_SEED};
pub use pool::WorkerPool;
