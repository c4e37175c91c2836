//! Client Module
//!
//! Blocking RPC client sharing one reconnecting connection between any
//! number of caller threads, plus typed wrappers for the built-in commands.

mod connection;
mod database;

pub use connection::{Client, INTERRUPTED};
pub use database::{verify_peer, DatabaseClient, VersionedValue};
