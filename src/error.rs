//! Error types for partikv
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Unified error type for partikv operations
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Storage is closed")]
    Closed,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Protocol / Network Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Unregistered payload type code: {0}")]
    UnregisteredPayload(u8),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    #[error("Server returned error: {0}")]
    Remote(String),

    // -------------------------------------------------------------------------
    // Database Registry Errors
    // -------------------------------------------------------------------------
    #[error("Database not found: {0}")]
    DatabaseNotFound(String),

    #[error("Database already exists: {0}")]
    DatabaseExists(String),

    #[error("Database is disabled: {0}")]
    DatabaseDisabled(String),

    #[error("No database selected")]
    NoDatabaseSelected,

    // -------------------------------------------------------------------------
    // KV Semantics Errors
    // -------------------------------------------------------------------------
    #[error("Version mismatch: expected {expected}, current {actual}")]
    VersionMismatch { expected: i64, actual: i64 },

    #[error("Version {version} is recorded but its payload is missing")]
    MissingPayload { version: i64 },

    #[error("Existence policy {0} not satisfied")]
    PolicyViolation(String),

    #[error("A batch is already open")]
    BatchInProgress,

    #[error("No batch is open")]
    NoBatch,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for KvError {
    fn from(e: bincode::Error) -> Self {
        KvError::Serialization(e.to_string())
    }
}
