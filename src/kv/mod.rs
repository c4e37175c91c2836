//! KV semantics layered over a [`Storage`](crate::storage::Storage)
//!
//! - [`VersionedStore`]: every write on a key gets the next version; writers
//!   must name the version they read (optimistic concurrency).
//! - [`ExistenceStore`]: writes conditioned on whether the key exists.
//!
//! Each layer owns its read cache, injected at construction.

mod cache;
mod existence;
mod versioned;

pub use cache::ReadCache;
pub use existence::{ExistenceBatch, ExistencePolicy, ExistenceStore};
pub use versioned::{VersionedBatch, VersionedEntry, VersionedStore, NO_VERSION};
