//! Address partitioning
//!
//! Splits the address list into `W` contiguous shards once at startup.

use contracts::TagAddress;

use crate::error::{PollerError, Result};

/// Contiguous slice of the address list owned by one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    /// Shard index, equal to the owning worker's index
    pub index: usize,
    /// Addresses in original list order
    pub addresses: Vec<TagAddress>,
}

impl Shard {
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

/// Split `addresses` into `workers` balanced contiguous shards.
///
/// Sizes are `floor(N/W)` or `ceil(N/W)`, larger shards first. With more
/// workers than addresses the trailing shards are empty.
///
/// # Errors
/// `workers == 0` or an empty address list.
pub fn partition(addresses: &[TagAddress], workers: usize) -> Result<Vec<Shard>> {
    if workers == 0 {
        return Err(PollerError::configuration(
            "polling.workers",
            "worker count must be at least 1",
        ));
    }
    if addresses.is_empty() {
        return Err(PollerError::configuration(
            "addresses",
            "address list is empty",
        ));
    }

    let base = addresses.len() / workers;
    let extra = addresses.len() % workers;

    let mut start = 0;
    let shards = (0..workers)
        .map(|index| {
            let len = base + usize::from(index < extra);
            let shard = Shard {
                index,
                addresses: addresses[start..start + len].to_vec(),
            };
            start += len;
            shard
        })
        .collect();

    Ok(shards)
}
