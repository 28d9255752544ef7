//! PollerBlueprint - Config Loader 输出
//!
//! 描述完整的轮询配置：控制器连接、地址来源、轮询节奏、发布通道、输出路由。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::PayloadChannel;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的轮询配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 控制器连接设置
    #[serde(default)]
    pub controller: ControllerConfig,

    /// 地址列表来源
    pub addresses: AddressConfig,

    /// 轮询节奏
    #[serde(default)]
    pub polling: PollingConfig,

    /// 发布通道开关
    #[serde(default)]
    pub publish: PublishConfig,

    /// 输出路由配置
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// 控制器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// 控制器地址
    #[serde(default = "default_controller_host")]
    pub host: String,

    /// 控制器端口
    #[serde(default = "default_controller_port")]
    pub port: u16,

    /// 每个连接请求的连接大小 (字节)
    #[serde(default = "default_connection_size")]
    pub connection_size: u32,

    /// 单次批量读取超时 (毫秒)，None = 由驱动自行决定
    #[serde(default)]
    pub read_timeout_ms: Option<u64>,

    /// 驱动类型
    #[serde(default)]
    pub driver: ControllerDriver,

    /// 模拟驱动参数
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            host: default_controller_host(),
            port: default_controller_port(),
            connection_size: default_connection_size(),
            read_timeout_ms: None,
            driver: ControllerDriver::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl ControllerConfig {
    /// 批量读取超时
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }
}

fn default_controller_host() -> String {
    "127.0.0.1".to_string()
}

fn default_controller_port() -> u16 {
    44818
}

fn default_connection_size() -> u32 {
    4000
}

/// 控制器驱动
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerDriver {
    /// 内存模拟 PLC
    #[default]
    Simulated,
}

/// 模拟驱动参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// 每次批量读取的模拟延迟 (毫秒)
    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,

    /// 每次读取时数值变化的概率 [0, 1]
    #[serde(default = "default_change_probability")]
    pub change_probability: f64,

    /// 总是读取失败的地址
    #[serde(default)]
    pub failing_tags: Vec<String>,

    /// 连接不可用的 worker 序号
    #[serde(default)]
    pub offline_workers: Vec<usize>,

    /// 随机种子
    #[serde(default)]
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            latency_ms: default_latency_ms(),
            change_probability: default_change_probability(),
            failing_tags: Vec::new(),
            offline_workers: Vec::new(),
            seed: 0,
        }
    }
}

fn default_latency_ms() -> u64 {
    5
}

fn default_change_probability() -> f64 {
    0.1
}

/// 地址来源：文件或内联列表，二选一
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddressConfig {
    /// CSV 文件，每行第一列为地址
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// 内联地址列表
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// 轮询节奏
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// 并发 worker 数量 (W)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// 批量读取大小 (B)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// 目标周期 (毫秒)
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            batch_size: default_batch_size(),
            period_ms: default_period_ms(),
        }
    }
}

impl PollingConfig {
    /// 目标周期
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

fn default_workers() -> usize {
    4
}

fn default_batch_size() -> usize {
    50
}

fn default_period_ms() -> u64 {
    1000
}

/// 发布通道开关
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// 发布全部数值
    #[serde(default)]
    pub full: bool,

    /// 发布变化数值
    #[serde(default = "default_true")]
    pub changed: bool,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            full: false,
            changed: true,
        }
    }
}

impl PublishConfig {
    /// 通道是否启用
    pub fn is_enabled(&self, channel: PayloadChannel) -> bool {
        match channel {
            PayloadChannel::Full => self.full,
            PayloadChannel::Changed => self.changed,
        }
    }

    /// 所有启用的通道
    pub fn active_channels(&self) -> Vec<PayloadChannel> {
        PayloadChannel::ALL
            .into_iter()
            .filter(|c| self.is_enabled(*c))
            .collect()
    }
}

fn default_true() -> bool {
    true
}

/// Sink 输出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink 名称
    pub name: String,

    /// Sink 类型
    pub sink_type: SinkType,

    /// 是否启用
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// 订阅的通道
    #[serde(default = "default_channels")]
    pub channels: Vec<PayloadChannel>,

    /// 队列容量
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl SinkConfig {
    /// 是否订阅该通道
    pub fn subscribes(&self, channel: PayloadChannel) -> bool {
        self.channels.contains(&channel)
    }
}

fn default_channels() -> Vec<PayloadChannel> {
    PayloadChannel::ALL.to_vec()
}

fn default_queue_capacity() -> usize {
    100
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// 日志输出
    Log,
    /// 文件输出
    File,
    /// 网络输出 (UDP)
    Network,
    /// 消息总线 (NATS)
    Nats,
    /// 时序数据库 (InfluxDB)
    Influx,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_setup() {
        let polling = PollingConfig::default();
        assert_eq!(polling.workers, 4);
        assert_eq!(polling.batch_size, 50);
        assert_eq!(polling.period(), Duration::from_secs(1));

        let publish = PublishConfig::default();
        assert!(!publish.full);
        assert!(publish.changed);
        assert_eq!(publish.active_channels(), vec![PayloadChannel::Changed]);
    }

    #[test]
    fn test_sink_defaults_subscribe_both_channels() {
        let sink: SinkConfig =
            serde_json::from_str(r#"{ "name": "log", "sink_type": "log" }"#).unwrap();
        assert!(sink.enabled);
        assert!(sink.subscribes(PayloadChannel::Full));
        assert!(sink.subscribes(PayloadChannel::Changed));
        assert_eq!(sink.queue_capacity, 100);
    }

    #[test]
    fn test_minimal_blueprint_json() {
        let bp: PollerBlueprint =
            serde_json::from_str(r#"{ "addresses": { "tags": ["A", "B"] } }"#).unwrap();
        assert_eq!(bp.controller.driver, ControllerDriver::Simulated);
        assert_eq!(bp.controller.read_timeout(), None);
        assert_eq!(bp.addresses.tags.as_deref().map(|t| t.len()), Some(2));
        assert!(bp.sinks.is_empty());
    }
}
