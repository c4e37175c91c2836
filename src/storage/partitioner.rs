//! Key partitioning
//!
//! Maps a key to the partition that stores it.

use crate::error::{KvError, Result};

/// Seed for the partition hash. Changing it moves every key, so it is fixed
/// for the lifetime of the on-disk format.
pub const PARTITION_SEED: u32 = 0x9747_b28c;

/// Deterministic, stateless key → partition mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partitioner {
    count: usize,
}

impl Partitioner {
    pub fn new(count: usize) -> Result<Self> {
        if count == 0 || count > i32::MAX as usize {
            return Err(KvError::InvalidArgument(format!(
                "partition count must be in 1..={}, got {}",
                i32::MAX,
                count
            )));
        }
        Ok(Self { count })
    }

    pub fn partition_count(&self) -> usize {
        self.count
    }

    /// Partition index in `[0, partition_count)`
    pub fn partition(&self, key: &[u8]) -> usize {
        if self.count == 1 {
            return 0;
        }

        // Hash read as signed; remainder takes the dividend's sign
        let hash = xxhash_rust::xxh32::xxh32(key, PARTITION_SEED) as i32;
        let index = hash % self.count as i32;
        index.unsigned_abs() as usize
    }
}
