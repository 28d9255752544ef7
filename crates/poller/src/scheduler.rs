//! CycleScheduler: the fixed-period polling loop.
//!
//! Lifecycle: `Idle` after [`CycleScheduler::new`], `Running` after
//! [`CycleScheduler::start`], `Sleeping` between cycles of
//! [`CycleScheduler::run`], `Stopped` after shutdown.

use std::fmt;
use std::time::Duration;

use contracts::{CyclePublisher, PollerBlueprint, TagAddress};
use controller::{ConnectionFactory, Connector};
use observability::CycleStatsAggregator;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::aggregate::aggregate;
use crate::cadence::plan_sleep;
use crate::error::{PollerError, Result};
use crate::partition::{partition, Shard};
use crate::store::LastValueStore;
use crate::worker::{Dispatch, Worker, WorkerFragment, WorkerHandle, WorkerReply};

/// Scheduler settings
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Worker count W
    pub workers: usize,
    /// Maximum addresses per batched read
    pub batch_size: usize,
    /// Target cycle period
    pub period: Duration,
    /// Per-batch read timeout
    pub read_timeout: Option<Duration>,
    /// Stop by itself after this many cycles
    pub max_cycles: Option<u64>,
}

impl SchedulerConfig {
    pub fn from_blueprint(blueprint: &PollerBlueprint) -> Self {
        Self {
            workers: blueprint.polling.workers,
            batch_size: blueprint.polling.batch_size,
            period: blueprint.polling.period(),
            read_timeout: blueprint.controller.read_timeout(),
            max_cycles: None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(PollerError::configuration(
                "polling.batch_size",
                "batch size must be at least 1",
            ));
        }
        if self.period.is_zero() {
            return Err(PollerError::configuration(
                "polling.period_ms",
                "period must be greater than zero",
            ));
        }
        if self.max_cycles == Some(0) {
            return Err(PollerError::configuration(
                "max_cycles",
                "must be at least 1 when set",
            ));
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            batch_size: 50,
            period: Duration::from_millis(1000),
            read_timeout: None,
            max_cycles: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Sleeping,
    Stopped,
}

/// Result of one completed cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    pub cycle_id: u64,
    pub timestamp_ms: u64,
    /// Dispatch to end of publish
    pub elapsed: Duration,
    /// Planned wait before the next dispatch
    pub sleep: Duration,
    pub late: bool,
    pub degraded: bool,
    pub full_count: usize,
    pub changed_count: usize,
    pub read_failures: u32,
    pub failed_shards: Vec<usize>,
}

/// Totals over the scheduler's lifetime
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub cycles: u64,
    pub late_cycles: u64,
    pub degraded_cycles: u64,
    pub read_failures: u64,
    /// Shard-cycles lost to connection errors
    pub connection_failures: u64,
    /// Cycle durations and change counts, fed with the same elapsed time
    /// and lateness as the counters above
    pub cycle_stats: CycleStatsAggregator,
}

impl RunSummary {
    fn record(&mut self, outcome: &CycleOutcome) {
        self.cycles += 1;
        self.late_cycles += u64::from(outcome.late);
        self.degraded_cycles += u64::from(outcome.degraded);
        self.read_failures += u64::from(outcome.read_failures);
        self.connection_failures += outcome.failed_shards.len() as u64;
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cycles={} late={} degraded={} read_failures={} connection_failures={}",
            self.cycles,
            self.late_cycles,
            self.degraded_cycles,
            self.read_failures,
            self.connection_failures
        )
    }
}

/// Cyclic concurrent polling engine
///
/// Owns the shard layout, the last-value store, one persistent task per
/// worker and the publisher. Each cycle lends every store partition to its
/// worker, waits for all of them, aggregates in shard order and publishes.
pub struct CycleScheduler<P: CyclePublisher> {
    config: SchedulerConfig,
    shards: Vec<Shard>,
    store: LastValueStore,
    workers: Vec<WorkerHandle>,
    publisher: P,
    state: SchedulerState,
    cycle_counter: u64,
    summary: RunSummary,
}

impl<P: CyclePublisher> CycleScheduler<P> {
    /// Partition the addresses and validate the settings.
    ///
    /// # Errors
    /// Configuration errors (W, B, period, empty address list).
    pub fn new(config: SchedulerConfig, addresses: &[TagAddress], publisher: P) -> Result<Self> {
        config.validate()?;
        let shards = partition(addresses, config.workers)?;
        let store = LastValueStore::new(shards.len());

        debug!(
            workers = shards.len(),
            tags = addresses.len(),
            "scheduler created"
        );

        Ok(Self {
            config,
            shards,
            store,
            workers: Vec::new(),
            publisher,
            state: SchedulerState::Idle,
            cycle_counter: 0,
            summary: RunSummary::default(),
        })
    }

    /// Open one connection per worker and spawn the worker tasks.
    ///
    /// A connection that fails to open leaves its worker disconnected: the
    /// shard reports a connection error on every cycle.
    #[instrument(name = "scheduler_start", skip(self, connector), fields(endpoint = %connector.endpoint()))]
    pub async fn start<C: Connector>(&mut self, connector: &C) -> Result<()> {
        self.expect_state(SchedulerState::Idle)?;

        let readers = ConnectionFactory::new(connector)
            .open_all(self.shards.len())
            .await;

        self.workers = self
            .shards
            .iter()
            .cloned()
            .zip(readers)
            .map(|(shard, reader)| {
                WorkerHandle::spawn(Worker::new(
                    shard,
                    reader,
                    self.config.batch_size,
                    self.config.read_timeout,
                ))
            })
            .collect();

        self.state = SchedulerState::Running;
        info!(
            workers = self.workers.len(),
            batch_size = self.config.batch_size,
            period_ms = self.config.period.as_millis() as u64,
            "scheduler running"
        );
        Ok(())
    }

    /// Run a single cycle: dispatch, barrier, aggregate, publish.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        self.expect_state(SchedulerState::Running)?;

        let t0 = Instant::now();
        let timestamp_ms = now_millis();
        self.cycle_counter += 1;
        let cycle_id = self.cycle_counter;

        let mut pending = Vec::with_capacity(self.workers.len());
        for handle in &self.workers {
            let partition = self.store.take_partition(handle.index());
            pending.push(handle.dispatch(timestamp_ms, partition).await);
        }

        let mut fragments = Vec::with_capacity(pending.len());
        for (index, dispatch) in pending.into_iter().enumerate() {
            let fragment = match dispatch {
                Dispatch::Sent(reply) => match reply.await {
                    Ok(WorkerReply { fragment, store }) => {
                        self.store.restore_partition(index, store);
                        fragment
                    }
                    Err(_) => {
                        error!(
                            worker = index,
                            "worker task died mid-cycle, its last values are lost"
                        );
                        WorkerFragment::connection_failed(index, "worker task terminated")
                    }
                },
                Dispatch::Unavailable(store) => {
                    self.store.restore_partition(index, store);
                    WorkerFragment::connection_failed(index, "worker task is not running")
                }
            };
            fragments.push(fragment);
        }

        let cycle = aggregate(cycle_id, timestamp_ms, fragments, t0.elapsed());
        self.publisher.publish(&cycle);

        let plan = plan_sleep(self.config.period, t0.elapsed());
        let elapsed_ms = plan.elapsed.as_secs_f64() * 1000.0;
        observability::record_cycle_metrics(&cycle, elapsed_ms, plan.late);
        self.summary.cycle_stats.update(&cycle, elapsed_ms, plan.late);

        let outcome = CycleOutcome {
            cycle_id,
            timestamp_ms,
            elapsed: plan.elapsed,
            sleep: plan.sleep,
            late: plan.late,
            degraded: cycle.meta.is_degraded(),
            full_count: cycle.full.len(),
            changed_count: cycle.changed.len(),
            read_failures: cycle.meta.read_failures,
            failed_shards: cycle.meta.failed_shards.clone(),
        };
        self.summary.record(&outcome);

        info!(
            cycle_id,
            time_needed_ms = elapsed_ms,
            tags = outcome.full_count,
            changed = outcome.changed_count,
            workers = cycle.meta.worker_count,
            next_cycle_in_ms = plan.sleep.as_millis() as u64,
            "cycle complete"
        );
        if outcome.late {
            warn!(
                cycle_id,
                elapsed_ms,
                period_ms = self.config.period.as_millis() as u64,
                "cycle overran its period, next cycle starts immediately"
            );
        }
        if outcome.degraded {
            warn!(cycle_id, failed_shards = ?outcome.failed_shards, "degraded cycle published");
        }

        Ok(outcome)
    }

    /// Poll until `cancel` fires (or `max_cycles` is reached), then shut down.
    ///
    /// Cancellation is checked at cycle boundaries only; a cycle in flight
    /// always completes and publishes. A cancel during the sleep ends the
    /// sleep early. Returns the run totals and the publisher.
    #[instrument(name = "scheduler_run", skip_all)]
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(RunSummary, P)> {
        self.expect_state(SchedulerState::Running)?;

        loop {
            if cancel.is_cancelled() {
                info!(cycles = self.cycle_counter, "cancellation requested, stopping");
                break;
            }

            let outcome = self.run_cycle().await?;

            if let Some(max) = self.config.max_cycles {
                if self.cycle_counter >= max {
                    info!(cycles = max, "cycle limit reached, stopping");
                    break;
                }
            }

            if outcome.sleep.is_zero() {
                continue;
            }

            self.state = SchedulerState::Sleeping;
            tokio::select! {
                _ = tokio::time::sleep(outcome.sleep) => {}
                _ = cancel.cancelled() => {
                    debug!("cancelled while sleeping");
                }
            }
            self.state = SchedulerState::Running;
        }

        let summary = self.summary.clone();
        let publisher = self.shutdown().await;
        Ok((summary, publisher))
    }

    /// Stop every worker task and release its connection.
    pub async fn shutdown(mut self) -> P {
        self.state = SchedulerState::Stopped;
        let workers = std::mem::take(&mut self.workers);
        let count = workers.len();
        for handle in workers {
            handle.stop().await;
        }

        info!(workers = count, summary = %self.summary, "scheduler stopped");
        self.publisher
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn shards(&self) -> &[Shard] {
        &self.shards
    }

    pub fn store(&self) -> &LastValueStore {
        &self.store
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    fn expect_state(&self, expected: SchedulerState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(PollerError::InvalidState {
                state: self.state,
                expected,
            })
        }
    }
}

/// Wall-clock cycle timestamp in ms since the Unix epoch
fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{PolledCycle, TagValue};
    use controller::{SimulatedConfig, SimulatedController};

    fn tags(names: &[&str]) -> Vec<TagAddress> {
        names.iter().map(|n| TagAddress::from(*n)).collect()
    }

    fn config(workers: usize, period_ms: u64) -> SchedulerConfig {
        SchedulerConfig {
            workers,
            batch_size: 10,
            period: Duration::from_millis(period_ms),
            read_timeout: None,
            max_cycles: None,
        }
    }

    fn pairs(readings: &[contracts::TagReading]) -> Vec<(&str, TagValue)> {
        readings
            .iter()
            .map(|r| (r.address.as_str(), r.value.clone()))
            .collect()
    }

    async fn started(
        config: SchedulerConfig,
        names: &[&str],
        controller: &SimulatedController,
    ) -> CycleScheduler<Vec<PolledCycle>> {
        let mut scheduler = CycleScheduler::new(config, &tags(names), Vec::new()).unwrap();
        scheduler.start(controller).await.unwrap();
        scheduler
    }

    #[tokio::test]
    async fn test_two_cycles_report_only_changes() {
        let controller = SimulatedController::new(SimulatedConfig::default());
        for (tag, v) in [("A", 1i64), ("B", 2), ("C", 3), ("D", 4)] {
            controller.set_value(tag, v);
        }
        let mut scheduler = started(config(2, 1000), &["A", "B", "C", "D"], &controller).await;
        assert_eq!(scheduler.shards()[0].addresses, vec!["A", "B"]);
        assert_eq!(scheduler.shards()[1].addresses, vec!["C", "D"]);

        scheduler.run_cycle().await.unwrap();
        controller.set_value("B", 5i64);
        scheduler.run_cycle().await.unwrap();

        let cycles = scheduler.publisher();
        let first = &cycles[0];
        let expected = vec![
            ("A", TagValue::Int(1)),
            ("B", TagValue::Int(2)),
            ("C", TagValue::Int(3)),
            ("D", TagValue::Int(4)),
        ];
        assert_eq!(pairs(&first.full), expected);
        assert_eq!(pairs(&first.changed), expected);

        let second = &cycles[1];
        assert_eq!(second.full.len(), 4);
        assert_eq!(pairs(&second.changed), vec![("B", TagValue::Int(5))]);
        assert_eq!(second.cycle_id, 2);
        assert!(second.full.iter().all(|r| r.timestamp_ms == second.timestamp_ms));
    }

    #[tokio::test]
    async fn test_connection_failure_publishes_degraded_cycle() {
        let controller = SimulatedController::new(SimulatedConfig::default());
        for (tag, v) in [("A", 1i64), ("B", 2), ("C", 3), ("D", 4)] {
            controller.set_value(tag, v);
        }
        let mut scheduler = started(config(2, 1000), &["A", "B", "C", "D"], &controller).await;
        scheduler.run_cycle().await.unwrap();

        controller.set_worker_offline(1, true);
        controller.set_value("A", 10i64);
        controller.set_value("C", 30i64);
        let outcome = scheduler.run_cycle().await.unwrap();

        assert!(outcome.degraded);
        assert_eq!(outcome.failed_shards, vec![1]);
        let published = &scheduler.publisher()[1];
        assert_eq!(
            pairs(&published.full),
            vec![("A", TagValue::Int(10)), ("B", TagValue::Int(2))]
        );
        assert_eq!(scheduler.store().get("C"), Some(&TagValue::Int(3)));
        assert_eq!(scheduler.store().get("D"), Some(&TagValue::Int(4)));
        assert_eq!(scheduler.store().get("A"), Some(&TagValue::Int(10)));

        controller.set_worker_offline(1, false);
        let outcome = scheduler.run_cycle().await.unwrap();
        assert!(!outcome.degraded);
        let published = &scheduler.publisher()[2];
        assert_eq!(pairs(&published.changed), vec![("C", TagValue::Int(30))]);
    }

    #[tokio::test]
    async fn test_refused_connection_degrades_every_cycle() {
        let controller = SimulatedController::new(SimulatedConfig {
            refuse_workers: vec![0],
            ..Default::default()
        });
        let mut scheduler = started(config(2, 1000), &["A", "B"], &controller).await;

        for _ in 0..3 {
            let outcome = scheduler.run_cycle().await.unwrap();
            assert_eq!(outcome.failed_shards, vec![0]);
            assert_eq!(outcome.full_count, 1);
        }
        assert_eq!(scheduler.summary().connection_failures, 3);
        assert_eq!(scheduler.summary().degraded_cycles, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrun_sleeps_zero_and_flags_late() {
        let controller = SimulatedController::new(SimulatedConfig {
            latency: Duration::from_millis(1300),
            ..Default::default()
        });
        let mut scheduler = started(config(1, 1000), &["A"], &controller).await;

        let outcome = scheduler.run_cycle().await.unwrap();
        assert!(outcome.elapsed >= Duration::from_millis(1300));
        assert_eq!(outcome.sleep, Duration::ZERO);
        assert!(outcome.late);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_cycle_starts_next_immediately() {
        let controller = SimulatedController::new(SimulatedConfig {
            latency: Duration::from_millis(1300),
            ..Default::default()
        });
        let mut cfg = config(1, 1000);
        cfg.max_cycles = Some(2);
        let scheduler = started(cfg, &["A"], &controller).await;

        let begin = Instant::now();
        let (summary, cycles) = scheduler.run(CancellationToken::new()).await.unwrap();
        assert_eq!(begin.elapsed(), Duration::from_millis(2600));
        assert_eq!(summary.cycles, 2);
        assert_eq!(summary.late_cycles, 2);
        assert_eq!(summary.cycle_stats.late_cycles, 2);
        assert_eq!(summary.cycle_stats.total_cycles, 2);
        assert!(summary.cycle_stats.cycle_stats.min() >= 1300.0);
        assert_eq!(cycles.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_exactly_period_minus_elapsed() {
        let controller = SimulatedController::new(SimulatedConfig {
            latency: Duration::from_millis(300),
            ..Default::default()
        });
        let mut cfg = config(1, 1000);
        cfg.max_cycles = Some(3);
        let scheduler = started(cfg, &["A"], &controller).await;

        let begin = Instant::now();
        let (summary, _) = scheduler.run(CancellationToken::new()).await.unwrap();

        // 300 + 700 + 300 + 700 + 300
        assert_eq!(begin.elapsed(), Duration::from_millis(2300));
        assert_eq!(summary.cycles, 3);
        assert_eq!(summary.late_cycles, 0);
        assert_eq!(summary.cycle_stats.late_cycles, 0);
        assert_eq!(summary.cycle_stats.total_cycles, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_sleep_stops_and_releases() {
        let controller = SimulatedController::new(SimulatedConfig::default());
        let scheduler = started(config(3, 10_000), &["A", "B", "C"], &controller).await;
        assert_eq!(controller.open_connections(), 3);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let begin = Instant::now();
        let (summary, cycles) = scheduler.run(cancel).await.unwrap();
        assert_eq!(summary.cycles, 1);
        assert_eq!(cycles.len(), 1);
        assert!(begin.elapsed() < Duration::from_secs(1));
        assert_eq!(controller.open_connections(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_cycle_still_publishes() {
        let controller = SimulatedController::new(SimulatedConfig {
            latency: Duration::from_millis(500),
            ..Default::default()
        });
        let scheduler = started(config(2, 1000), &["A", "B"], &controller).await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let (summary, cycles) = scheduler.run(cancel).await.unwrap();
        assert_eq!(summary.cycles, 1);
        assert_eq!(cycles[0].full.len(), 2);
        assert_eq!(controller.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_cycle() {
        let controller = SimulatedController::new(SimulatedConfig::default());
        let scheduler = started(config(1, 1000), &["A"], &controller).await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let (summary, cycles) = scheduler.run(cancel).await.unwrap();
        assert_eq!(summary.cycles, 0);
        assert!(cycles.is_empty());
    }

    #[tokio::test]
    async fn test_states() {
        let controller = SimulatedController::new(SimulatedConfig::default());
        let mut scheduler =
            CycleScheduler::new(config(1, 1000), &tags(&["A"]), Vec::new()).unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert!(matches!(
            scheduler.run_cycle().await,
            Err(PollerError::InvalidState { .. })
        ));

        scheduler.start(&controller).await.unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Running);
        assert!(scheduler.start(&controller).await.is_err());

        scheduler.shutdown().await;
        assert_eq!(controller.open_connections(), 0);
    }

    #[test]
    fn test_configuration_errors() {
        let publisher: Vec<PolledCycle> = Vec::new();
        let mut cfg = config(0, 1000);
        assert!(CycleScheduler::new(cfg.clone(), &tags(&["A"]), publisher.clone()).is_err());

        cfg.workers = 1;
        assert!(CycleScheduler::new(cfg.clone(), &[], publisher.clone()).is_err());

        cfg.period = Duration::ZERO;
        assert!(CycleScheduler::new(cfg.clone(), &tags(&["A"]), publisher.clone()).is_err());

        cfg.period = Duration::from_millis(10);
        cfg.batch_size = 0;
        assert!(CycleScheduler::new(cfg, &tags(&["A"]), publisher).is_err());
    }

    #[test]
    fn test_config_from_blueprint() {
        let blueprint = PollerBlueprint {
            version: Default::default(),
            controller: contracts::ControllerConfig {
                read_timeout_ms: Some(250),
                ..Default::default()
            },
            addresses: contracts::AddressConfig {
                file: None,
                tags: Some(vec!["A".into()]),
            },
            polling: contracts::PollingConfig {
                workers: 3,
                ..Default::default()
            },
            publish: Default::default(),
            sinks: Vec::new(),
        };

        let cfg = SchedulerConfig::from_blueprint(&blueprint);
        assert_eq!(cfg.workers, 3);
        assert_eq!(cfg.read_timeout, Some(Duration::from_millis(250)));
        assert_eq!(cfg.max_cycles, None);
    }
}
