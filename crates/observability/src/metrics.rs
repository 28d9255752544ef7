//! 轮询周期指标收集模块
//!
//! 基于 PolledCycle 收集和统计轮询引擎的运行指标。

use std::collections::BTreeMap;

use contracts::PolledCycle;
use metrics::{counter, gauge, histogram};

/// 记录一个已发布周期的指标
///
/// 每个周期发布后由调度器调用。
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_cycle_metrics;
///
/// publisher.publish(&cycle);
/// record_cycle_metrics(&cycle, elapsed_ms, late);
/// ```
pub fn record_cycle_metrics(cycle: &PolledCycle, elapsed_ms: f64, late: bool) {
    counter!("tag_poller_cycles_total").increment(1);
    gauge!("tag_poller_last_cycle_id").set(cycle.cycle_id as f64);

    // 周期耗时
    histogram!("tag_poller_cycle_duration_ms").record(elapsed_ms);
    histogram!("tag_poller_read_duration_ms").record(cycle.meta.read_duration_ms);

    if late {
        counter!("tag_poller_cycles_late_total").increment(1);
    }

    // 负载大小
    gauge!("tag_poller_full_payload_size").set(cycle.full.len() as f64);
    gauge!("tag_poller_changed_payload_size").set(cycle.changed.len() as f64);
    counter!("tag_poller_readings_changed_total").increment(cycle.changed.len() as u64);

    // 单地址读取失败
    if cycle.meta.read_failures > 0 {
        counter!("tag_poller_address_read_failures_total")
            .increment(u64::from(cycle.meta.read_failures));
    }

    // 连接失败的分片
    if cycle.meta.is_degraded() {
        counter!("tag_poller_cycles_degraded_total").increment(1);
        for shard in &cycle.meta.failed_shards {
            counter!("tag_poller_connection_failures_total", "worker" => shard.to_string())
                .increment(1);
        }
    }
}

/// 记录 sink 写入结果
pub fn record_sink_write(sink_name: &str, channel: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "tag_poller_sink_writes_total",
        "sink" => sink_name.to_string(),
        "channel" => channel.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 记录 sink 队列满导致的丢弃
pub fn record_sink_dropped(sink_name: &str) {
    counter!("tag_poller_sink_dropped_total", "sink" => sink_name.to_string()).increment(1);
}

/// 周期指标聚合器
///
/// 在内存中聚合指标，运行结束时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct CycleStatsAggregator {
    /// 总周期数
    pub total_cycles: u64,

    /// 超时周期数
    pub late_cycles: u64,

    /// 降级周期数
    pub degraded_cycles: u64,

    /// 单地址读取失败总数
    pub total_read_failures: u64,

    /// 周期耗时统计 (毫秒)
    pub cycle_stats: RunningStats,

    /// 变化数统计
    pub changed_stats: RunningStats,

    /// 各 worker 的连接失败次数
    pub connection_failures: BTreeMap<usize, u64>,
}

impl CycleStatsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, cycle: &PolledCycle, elapsed_ms: f64, late: bool) {
        self.total_cycles += 1;
        self.late_cycles += u64::from(late);
        self.total_read_failures += u64::from(cycle.meta.read_failures);

        if cycle.meta.is_degraded() {
            self.degraded_cycles += 1;
            for shard in &cycle.meta.failed_shards {
                *self.connection_failures.entry(*shard).or_insert(0) += 1;
            }
        }

        self.cycle_stats.push(elapsed_ms);
        self.changed_stats.push(cycle.changed.len() as f64);
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        let rate = |n: u64| {
            if self.total_cycles > 0 {
                n as f64 / self.total_cycles as f64 * 100.0
            } else {
                0.0
            }
        };

        MetricsSummary {
            total_cycles: self.total_cycles,
            late_cycles: self.late_cycles,
            degraded_cycles: self.degraded_cycles,
            total_read_failures: self.total_read_failures,
            late_rate: rate(self.late_cycles),
            degraded_rate: rate(self.degraded_cycles),
            cycle_duration_ms: StatsSummary::from(&self.cycle_stats),
            changed_per_cycle: StatsSummary::from(&self.changed_stats),
            connection_failures: self.connection_failures.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_cycles: u64,
    pub late_cycles: u64,
    pub degraded_cycles: u64,
    pub total_read_failures: u64,
    pub late_rate: f64,
    pub degraded_rate: f64,
    pub cycle_duration_ms: StatsSummary,
    pub changed_per_cycle: StatsSummary,
    pub connection_failures: BTreeMap<usize, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Poll Metrics Summary ===")?;
        writeln!(f, "Total cycles: {}", self.total_cycles)?;
        writeln!(
            f,
            "Late cycles: {} ({:.2}%)",
            self.late_cycles, self.late_rate
        )?;
        writeln!(
            f,
            "Degraded cycles: {} ({:.2}%)",
            self.degraded_cycles, self.degraded_rate
        )?;
        writeln!(f, "Address read failures: {}", self.total_read_failures)?;
        writeln!(f, "Cycle duration (ms): {}", self.cycle_duration_ms)?;
        writeln!(f, "Changed per cycle: {}", self.changed_per_cycle)?;

        if !self.connection_failures.is_empty() {
            writeln!(f, "Connection failures by worker:")?;
            for (worker, count) in &self.connection_failures {
                writeln!(f, "  worker {}: {}", worker, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
