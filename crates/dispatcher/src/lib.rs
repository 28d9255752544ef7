//! # Dispatcher
//!
//! 数据分发模块。
//!
//! 负责：
//! - 接收每个完成的 `PolledCycle`
//! - 按通道 (full / changed) 拆分并 fan-out 到多个 sinks
//! - 隔离慢 sink，不阻塞轮询主循环

pub mod dispatcher;
pub mod encoding;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{CyclePublisher, DataSink, PublishBatch};
pub use dispatcher::{create_dispatcher, Dispatcher, DispatcherBuilder, DispatcherConfig};
pub use encoding::PayloadFormat;
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{FileSink, InfluxSink, LogSink, NatsSink, NetworkSink};
