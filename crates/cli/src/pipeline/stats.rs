//! Pipeline statistics and metrics.

use std::time::Duration;

use dispatcher::MetricsSnapshot;
use poller::RunSummary;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Scheduler totals
    pub summary: RunSummary,

    /// Total duration of the run
    pub duration: Duration,

    /// Number of addresses polled each cycle
    pub addresses: usize,

    /// Number of workers
    pub workers: usize,

    /// Final counters of each sink
    pub sinks: Vec<(String, MetricsSnapshot)>,
}

impl PipelineStats {
    /// Completed cycles per second
    pub fn cycle_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.summary.cycles as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Total batches dropped by full sink queues
    pub fn dropped_batches(&self) -> u64 {
        self.sinks.iter().map(|(_, m)| m.dropped_count).sum()
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Polling Statistics                        ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Cycles: {}", self.summary.cycles);
        println!("   ├─ Cycles/s: {:.2}", self.cycle_rate());
        println!("   ├─ Addresses: {}", self.addresses);
        println!("   └─ Workers: {}", self.workers);

        println!("\n{}", self.summary.cycle_stats.summary());

        if !self.sinks.is_empty() {
            println!("📤 Sinks");
            for (i, (name, metrics)) in self.sinks.iter().enumerate() {
                let prefix = if i == self.sinks.len() - 1 { "└─" } else { "├─" };
                println!(
                    "   {} {}: {} written, {} failed, {} dropped",
                    prefix, name, metrics.write_count, metrics.failure_count, metrics.dropped_count
                );
            }
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates() {
        let stats = PipelineStats {
            summary: RunSummary {
                cycles: 10,
                ..Default::default()
            },
            duration: Duration::from_secs(5),
            sinks: vec![
                (
                    "a".to_string(),
                    MetricsSnapshot {
                        dropped_count: 2,
                        ..Default::default()
                    },
                ),
                (
                    "b".to_string(),
                    MetricsSnapshot {
                        dropped_count: 1,
                        ..Default::default()
                    },
                ),
            ],
            ..Default::default()
        };

        assert!((stats.cycle_rate() - 2.0).abs() < f64::EPSILON);
        assert_eq!(stats.dropped_batches(), 3);
        assert_eq!(PipelineStats::default().cycle_rate(), 0.0);
    }
}
