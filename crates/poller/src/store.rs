//! Last observed value per tag, partitioned by shard.

use std::collections::HashMap;

use contracts::{TagAddress, TagValue};

/// The store partition of one shard, written only by the owning worker
#[derive(Debug, Clone, Default)]
pub struct StoreShard {
    values: HashMap<TagAddress, TagValue>,
}

impl StoreShard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last observed value, `None` while the tag is unseen
    pub fn get(&self, address: &str) -> Option<&TagValue> {
        self.values.get(address)
    }

    pub fn set(&mut self, address: TagAddress, value: TagValue) {
        self.values.insert(address, value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Cross-cycle state: one partition per worker.
///
/// The scheduler owns the store and lends each partition to its worker for
/// the duration of a cycle, so no lock is ever taken on the hot path.
#[derive(Debug, Clone)]
pub struct LastValueStore {
    shards: Vec<StoreShard>,
}

impl LastValueStore {
    /// Empty store with `partitions` partitions
    pub fn new(partitions: usize) -> Self {
        Self {
            shards: vec![StoreShard::default(); partitions],
        }
    }

    /// Last observed value of `address` in any partition.
    ///
    /// An address listed twice in different shards has one entry per
    /// partition; the lowest shard wins here.
    pub fn get(&self, address: &str) -> Option<&TagValue> {
        self.shards.iter().find_map(|shard| shard.get(address))
    }

    /// Partition of shard `index`
    pub fn partition(&self, index: usize) -> Option<&StoreShard> {
        self.shards.get(index)
    }

    pub fn partitions(&self) -> usize {
        self.shards.len()
    }

    /// Total number of tags seen so far
    pub fn len(&self) -> usize {
        self.shards.iter().map(StoreShard::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(StoreShard::is_empty)
    }

    /// Lend partition `index` to its worker, leaving an empty one behind
    pub(crate) fn take_partition(&mut self, index: usize) -> StoreShard {
        std::mem::take(&mut self.shards[index])
    }

    /// Return a lent partition
    pub(crate) fn restore_partition(&mut self, index: usize, shard: StoreShard) {
        self.shards[index] = shard;
    }
}
