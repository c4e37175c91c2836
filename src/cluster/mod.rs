//! Cluster Module
//!
//! Node addressing and topology-table comparison.

mod topology;
mod uri;

pub use topology::matches;
pub use uri::{KvdbUri, SCHEME};
