//! Fan-in of worker fragments into one cycle result.

use std::time::Duration;

use contracts::{CycleMeta, PolledCycle};

use crate::worker::WorkerFragment;

/// Merge fragments in shard index order.
///
/// `full` and `changed` are the concatenation of the fragments' readings,
/// shard 0 first. Shards lost to a connection error are listed in
/// `meta.failed_shards`.
pub fn aggregate(
    cycle_id: u64,
    timestamp_ms: u64,
    mut fragments: Vec<WorkerFragment>,
    read_duration: Duration,
) -> PolledCycle {
    fragments.sort_by_key(|f| f.shard_index);

    let mut meta = CycleMeta {
        worker_count: fragments.len(),
        read_duration_ms: read_duration.as_secs_f64() * 1000.0,
        ..Default::default()
    };
    let mut full = Vec::with_capacity(fragments.iter().map(|f| f.full.len()).sum());
    let mut changed = Vec::new();

    for fragment in fragments {
        meta.read_failures += fragment.read_failures;
        if fragment.is_connection_failure() {
            meta.failed_shards.push(fragment.shard_index);
        }
        full.extend(fragment.full);
        changed.extend(fragment.changed);
    }

    PolledCycle {
        cycle_id,
        timestamp_ms,
        full,
        changed,
        meta,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{TagReading, TagValue};

    fn reading(tag: &str, v: i64) -> TagReading {
        TagReading {
            address: tag.into(),
            value: TagValue::Int(v),
            timestamp_ms: 42,
        }
    }

    fn fragment(index: usize, tags: &[(&str, i64)], changed: &[(&str, i64)]) -> WorkerFragment {
        WorkerFragment {
            shard_index: index,
            full: tags.iter().map(|(t, v)| reading(t, *v)).collect(),
            changed: changed.iter().map(|(t, v)| reading(t, *v)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_shard_order() {
        let fragments = vec![
            fragment(1, &[("C", 3), ("D", 4)], &[("D", 4)]),
            fragment(0, &[("A", 1), ("B", 2)], &[("A", 1)]),
        ];

        let cycle = aggregate(7, 42, fragments, Duration::from_millis(12));
        let full: Vec<&str> = cycle.full.iter().map(|r| r.address.as_str()).collect();
        let changed: Vec<&str> = cycle.changed.iter().map(|r| r.address.as_str()).collect();

        assert_eq!(full, vec!["A", "B", "C", "D"]);
        assert_eq!(changed, vec!["A", "D"]);
        assert_eq!(cycle.cycle_id, 7);
        assert_eq!(cycle.meta.worker_count, 2);
        assert!((cycle.meta.read_duration_ms - 12.0).abs() < 1e-9);
        assert!(!cycle.meta.is_degraded());
    }

    #[test]
    fn test_failures_and_degraded() {
        let mut partial = fragment(0, &[("A", 1)], &[]);
        partial.read_failures = 2;
        let lost = WorkerFragment::connection_failed(1, "unreachable");

        let cycle = aggregate(1, 42, vec![partial, lost], Duration::ZERO);
        assert_eq!(cycle.full.len(), 1);
        assert_eq!(cycle.meta.read_failures, 2);
        assert_eq!(cycle.meta.failed_shards, vec![1]);
        assert!(cycle.meta.is_degraded());
    }
}
