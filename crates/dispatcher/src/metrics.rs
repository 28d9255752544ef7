//! Per-sink counters, mirrored to the Prometheus recorder

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use contracts::PayloadChannel;

/// Metrics for a single sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Current queue length
    queue_len: AtomicUsize,
    /// Total successful writes
    write_count: AtomicU64,
    /// Total write failures
    failure_count: AtomicU64,
    /// Batches dropped because the queue was full
    dropped_count: AtomicU64,
}

impl SinkMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current queue length
    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    /// Set current queue length
    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    /// Record the result of one `write`
    pub fn record_write(&self, sink: &str, channel: PayloadChannel, success: bool) {
        if success {
            self.write_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failure_count.fetch_add(1, Ordering::Relaxed);
        }
        observability::record_sink_write(sink, channel.as_str(), success);
    }

    /// Record a batch rejected by a full queue
    pub fn record_dropped(&self, sink: &str) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
        observability::record_sink_dropped(sink);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            write_count: self.write_count(),
            failure_count: self.failure_count(),
            dropped_count: self.dropped_count(),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub write_count: u64,
    pub failure_count: u64,
    pub dropped_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = SinkMetrics::new();
        metrics.record_write("s", PayloadChannel::Full, true);
        metrics.record_write("s", PayloadChannel::Changed, false);
        metrics.record_dropped("s");
        metrics.set_queue_len(3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.write_count, 1);
        assert_eq!(snapshot.failure_count, 1);
        assert_eq!(snapshot.dropped_count, 1);
        assert_eq!(snapshot.queue_len, 3);
    }
}
