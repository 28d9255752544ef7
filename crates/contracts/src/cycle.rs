//! PolledCycle - Poller output
//!
//! Aggregated result of one poll cycle and the per-channel batches handed to sinks.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TagReading;

/// Aggregated result of one poll cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolledCycle {
    /// Cycle sequence number (monotonically increasing, starts at 1)
    pub cycle_id: u64,

    /// Cycle start time (ms since Unix epoch)
    pub timestamp_ms: u64,

    /// Every successful reading, shard order then within-shard order
    pub full: Vec<TagReading>,

    /// Readings whose value changed since the previous cycle (or first seen)
    pub changed: Vec<TagReading>,

    /// Cycle metadata
    pub meta: CycleMeta,
}

impl PolledCycle {
    /// Readings for the given payload channel
    pub fn readings(&self, channel: PayloadChannel) -> &[TagReading] {
        match channel {
            PayloadChannel::Full => &self.full,
            PayloadChannel::Changed => &self.changed,
        }
    }
}

/// Cycle metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleMeta {
    /// Number of workers dispatched
    pub worker_count: usize,

    /// Addresses that failed individually in this cycle
    pub read_failures: u32,

    /// Shards that contributed nothing because of a connection error
    pub failed_shards: Vec<usize>,

    /// Time from dispatch until the last worker returned (ms)
    pub read_duration_ms: f64,
}

impl CycleMeta {
    /// A degraded cycle published despite at least one failed shard
    pub fn is_degraded(&self) -> bool {
        !self.failed_shards.is_empty()
    }
}

/// Payload view of a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadChannel {
    /// Every value, changed or not
    Full,
    /// Only values that changed since the previous cycle
    Changed,
}

impl PayloadChannel {
    pub const ALL: [PayloadChannel; 2] = [PayloadChannel::Full, PayloadChannel::Changed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Changed => "changed",
        }
    }
}

impl fmt::Display for PayloadChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One payload view of one cycle, as delivered to a sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishBatch {
    pub channel: PayloadChannel,
    pub cycle_id: u64,
    pub timestamp_ms: u64,
    pub readings: Vec<TagReading>,
}

impl PublishBatch {
    /// Extract one channel of a polled cycle
    pub fn from_cycle(cycle: &PolledCycle, channel: PayloadChannel) -> Self {
        Self {
            channel,
            cycle_id: cycle.cycle_id,
            timestamp_ms: cycle.timestamp_ms,
            readings: cycle.readings(channel).to_vec(),
        }
    }
}
