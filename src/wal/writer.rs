//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::error::Result;
use super::{Operation, WalEntry, WalRecovery};

/// Writes entries to the WAL file
pub struct WalWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    /// LSN assigned to the next appended entry
    current_lsn: u64,
    sync_strategy: WalSyncStrategy,
    /// Entries written since the last fsync
    unsynced: usize,
    /// Current file length in bytes
    len: u64,
}

impl WalWriter {
    /// Open or create a WAL file, continuing after its last valid entry
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let (last_lsn, len) = if path.exists() {
            let result = WalRecovery::verify(path)?;
            (result.last_lsn, result.valid_len)
        } else {
            (0, 0)
        };

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            current_lsn: last_lsn + 1,
            sync_strategy,
            unsynced: 0,
            len,
        })
    }

    /// Append an operation to the WAL, returning its LSN
    pub fn append(&mut self, operation: Operation) -> Result<u64> {
        let lsn = self.current_lsn;
        let bytes = WalEntry::new(lsn, operation).serialize()?;

        self.writer.write_all(&bytes)?;
        self.writer.flush()?;
        self.current_lsn += 1;
        self.len += bytes.len() as u64;
        self.unsynced += 1;

        match self.sync_strategy {
            WalSyncStrategy::EveryWrite => self.sync()?,
            WalSyncStrategy::EveryNEntries { count } => {
                if self.unsynced >= count {
                    self.sync()?;
                }
            }
        }

        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Replace the log with a single entry holding `writes`
    ///
    /// The new log is written beside the old one and renamed over it, so a
    /// crash leaves either the old or the new file intact.
    pub fn rewrite(&mut self, writes: Vec<(Vec<u8>, Vec<u8>)>) -> Result<()> {
        self.sync()?;

        let tmp_path = self.path.with_extension("log.tmp");
        let lsn = self.current_lsn;
        let bytes = WalEntry::new(lsn, Operation::Batch { writes }).serialize()?;
        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(&bytes)?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        let file = OpenOptions::new().append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.current_lsn = lsn + 1;
        self.len = bytes.len() as u64;
        self.unsynced = 0;
        Ok(())
    }

    /// Get the LSN the next entry will receive
    pub fn current_lsn(&self) -> u64 {
        self.current_lsn
    }

    /// Entries appended since the last fsync
    pub fn unsynced_count(&self) -> usize {
        self.unsynced
    }

    /// Current size of the log in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
