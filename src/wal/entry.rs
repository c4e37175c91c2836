//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Buf;
use serde::{Deserialize, Serialize};

use crate::error::{KvError, Result};

/// Entry header: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// Upper bound on a single encoded entry, guards against garbage lengths
const MAX_ENTRY_SIZE: usize = 256 * 1024 * 1024;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The operation to perform
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Apply all writes atomically
    Batch { writes: Vec<(Vec<u8>, Vec<u8>)> },
}

impl Operation {
    /// Approximate in-memory footprint, used for size accounting
    pub fn byte_size(&self) -> usize {
        match self {
            Operation::Put { key, value } => key.len() + value.len(),
            Operation::Batch { writes } => writes.iter().map(|(k, v)| k.len() + v.len()).sum(),
        }
    }
}

/// Outcome of decoding one entry from a byte slice
#[derive(Debug)]
pub(crate) enum Decoded {
    /// A valid entry and the number of bytes it occupied
    Entry(WalEntry, usize),
    /// Not enough bytes for a full entry (partial write at the tail)
    Incomplete,
    /// Full entry present but CRC or payload did not check out
    Corrupt(String),
}

impl WalEntry {
    pub fn new(lsn: u64, operation: Operation) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            lsn,
            operation,
            timestamp,
        }
    }

    /// Encode into the on-disk format: header + bincode payload
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let data = bincode::serialize(self)?;
        if data.len() > MAX_ENTRY_SIZE {
            return Err(KvError::Serialization(format!(
                "WAL entry too large: {} bytes",
                data.len()
            )));
        }

        let mut buf = Vec::with_capacity(HEADER_SIZE + data.len());
        buf.extend_from_slice(&self.lsn.to_le_bytes());
        buf.extend_from_slice(&compute_crc(&data).to_le_bytes());
        buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
        buf.extend_from_slice(&data);
        Ok(buf)
    }

    /// Decode the entry at the start of `bytes`
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        match Self::decode(bytes) {
            Decoded::Entry(entry, _) => Ok(entry),
            Decoded::Incomplete => Err(KvError::WalCorruption("incomplete entry".to_string())),
            Decoded::Corrupt(reason) => Err(KvError::WalCorruption(reason)),
        }
    }

    pub(crate) fn decode(bytes: &[u8]) -> Decoded {
        if bytes.len() < HEADER_SIZE {
            return Decoded::Incomplete;
        }

        let mut header = &bytes[..HEADER_SIZE];
        let lsn = header.get_u64_le();
        let crc = header.get_u32_le();
        let len = header.get_u32_le() as usize;

        if len > MAX_ENTRY_SIZE {
            return Decoded::Corrupt(format!("entry length {} exceeds limit", len));
        }
        if bytes.len() < HEADER_SIZE + len {
            return Decoded::Incomplete;
        }

        let data = &bytes[HEADER_SIZE..HEADER_SIZE + len];
        if compute_crc(data) != crc {
            return Decoded::Corrupt(format!("CRC mismatch at lsn {}", lsn));
        }

        match bincode::deserialize::<WalEntry>(data) {
            Ok(entry) if entry.lsn == lsn => Decoded::Entry(entry, HEADER_SIZE + len),
            Ok(entry) => Decoded::Corrupt(format!(
                "header lsn {} does not match payload lsn {}",
                lsn, entry.lsn
            )),
            Err(e) => Decoded::Corrupt(e.to_string()),
        }
    }
}

fn compute_crc(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}
