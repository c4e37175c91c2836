//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL.

use std::fs::{self, OpenOptions};
use std::path::Path;

use crate::error::Result;
use super::entry::Decoded;
use super::WalEntry;

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted entries skipped
    pub entries_corrupted: u64,

    /// Last valid LSN
    pub last_lsn: u64,

    /// Whether the WAL was truncated (partial writes removed)
    pub was_truncated: bool,

    /// Byte length of the valid prefix of the file
    pub valid_len: u64,
}

impl WalRecovery {
    /// Recover entries from a WAL file
    ///
    /// This will:
    /// 1. Read all valid entries
    /// 2. Stop at the first partial or corrupted entry
    /// 3. Truncate the file there so later appends follow valid data
    /// 4. Return all valid entries in order
    pub fn recover(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        let (entries, mut result, file_len) = Self::scan(path)?;

        if result.valid_len < file_len {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(result.valid_len)?;
            file.sync_all()?;
            result.was_truncated = true;

            tracing::warn!(
                "WAL {} truncated from {} to {} bytes ({} corrupted entries)",
                path.display(),
                file_len,
                result.valid_len,
                result.entries_corrupted
            );
        }

        Ok((entries, result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let (_, mut result, file_len) = Self::scan(path)?;
        result.was_truncated = result.valid_len < file_len;
        Ok(result)
    }

    fn scan(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult, u64)> {
        let bytes = fs::read(path)?;
        let mut entries = Vec::new();
        let mut result = RecoveryResult::default();
        let mut pos = 0usize;

        while pos < bytes.len() {
            match WalEntry::decode(&bytes[pos..]) {
                Decoded::Entry(entry, used) => {
                    result.last_lsn = entry.lsn;
                    result.entries_recovered += 1;
                    entries.push(entry);
                    pos += used;
                }
                Decoded::Incomplete => break,
                Decoded::Corrupt(reason) => {
                    // Nothing after a bad entry can be trusted to be framed correctly
                    tracing::warn!("WAL {} corrupt at offset {}: {}", path.display(), pos, reason);
                    result.entries_corrupted += 1;
                    break;
                }
            }
        }

        result.valid_len = pos as u64;
        Ok((entries, result, bytes.len() as u64))
    }
}
