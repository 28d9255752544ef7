//! Dispatcher - fan-out of completed cycles to sinks

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use contracts::{
    CyclePublisher, PayloadChannel, PolledCycle, PublishBatch, PublishConfig, SinkConfig, SinkType,
};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::{FileSink, InfluxSink, LogSink, NatsSink, NetworkSink};

/// Dispatcher configuration
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    /// Sink configurations
    pub sinks: Vec<SinkConfig>,
    /// Channels published at all
    pub publish: PublishConfig,
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    config: DispatcherConfig,
}

impl DispatcherBuilder {
    /// Create a new DispatcherBuilder
    pub fn new(config: DispatcherConfig) -> Self {
        Self { config }
    }

    /// Create every enabled sink and start its worker
    ///
    /// A sink that cannot be created fails the whole build.
    #[instrument(name = "dispatcher_builder_build", skip(self))]
    pub async fn build(self) -> Result<Dispatcher, DispatcherError> {
        let handles = Self::initialize_handles(&self.config).await?;
        Ok(Dispatcher::with_handles(handles, self.config.publish))
    }

    #[instrument(
        name = "dispatcher_initialize_handles",
        skip(config),
        fields(sink_count = config.sinks.len())
    )]
    async fn initialize_handles(
        config: &DispatcherConfig,
    ) -> Result<Vec<SinkHandle>, DispatcherError> {
        let mut handles = Vec::with_capacity(config.sinks.len());
        for sink_config in &config.sinks {
            if !sink_config.enabled {
                debug!(sink = %sink_config.name, "Sink disabled, skipped");
                continue;
            }
            handles.push(create_sink_handle(sink_config).await?);
        }
        Ok(handles)
    }
}

/// Create a SinkHandle from configuration
#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
async fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    let creation =
        |e: contracts::ContractError| DispatcherError::sink_creation(&config.name, e.to_string());
    let channels = config.channels.clone();
    let capacity = config.queue_capacity;

    let handle = match config.sink_type {
        SinkType::Log => {
            let verbose = config.params.get("verbose").is_some_and(|v| v == "true");
            let sink = LogSink::new(&config.name).verbose(verbose);
            SinkHandle::with_channels(sink, capacity, channels)
        }
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params).map_err(creation)?;
            SinkHandle::with_channels(sink, capacity, channels)
        }
        SinkType::Network => {
            let sink = NetworkSink::from_params(&config.name, &config.params)
                .await
                .map_err(creation)?;
            SinkHandle::with_channels(sink, capacity, channels)
        }
        SinkType::Nats => {
            let sink = NatsSink::from_params(&config.name, &config.params)
                .await
                .map_err(creation)?;
            SinkHandle::with_channels(sink, capacity, channels)
        }
        SinkType::Influx => {
            let sink = InfluxSink::from_params(&config.name, &config.params).map_err(creation)?;
            SinkHandle::with_channels(sink, capacity, channels)
        }
    };

    info!(channels = ?handle.channels(), "Sink ready");
    Ok(handle)
}

/// Fans out completed cycles to the sink workers
///
/// Publishing never waits on a sink: batches are queued with `try_send` and
/// dropped (and counted) when a sink falls behind.
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    publish: PublishConfig,
    cycles: u64,
}

impl Dispatcher {
    /// Create a dispatcher with custom sink handles (for testing)
    pub fn with_handles(handles: Vec<SinkHandle>, publish: PublishConfig) -> Self {
        Self {
            handles,
            publish,
            cycles: 0,
        }
    }

    /// Number of cycles published so far
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn sink_count(&self) -> usize {
        self.handles.len()
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    fn dispatch_channel(&self, cycle: &PolledCycle, channel: PayloadChannel) {
        let subscribers: Vec<&SinkHandle> =
            self.handles.iter().filter(|h| h.subscribes(channel)).collect();
        if subscribers.is_empty() {
            return;
        }

        let batch = Arc::new(PublishBatch::from_cycle(cycle, channel));
        for handle in subscribers {
            handle.try_send(Arc::clone(&batch));
        }
    }

    /// Drain every sink queue, then flush and close the sinks
    ///
    /// Returns the final metrics of each sink.
    #[instrument(name = "dispatcher_shutdown", skip(self), fields(cycles = self.cycles))]
    pub async fn shutdown(self) -> Vec<(String, MetricsSnapshot)> {
        let mut report = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            let name = handle.name().to_string();
            let metrics = Arc::clone(handle.metrics());
            handle.shutdown().await;
            report.push((name, metrics.snapshot()));
        }

        info!(cycles = self.cycles, "Dispatcher shutdown complete");
        report
    }
}

impl CyclePublisher for Dispatcher {
    fn publish(&mut self, cycle: &PolledCycle) {
        self.cycles += 1;

        for channel in PayloadChannel::ALL {
            if self.publish.is_enabled(channel) {
                self.dispatch_channel(cycle, channel);
            }
        }

        if cycle.meta.is_degraded() {
            warn!(
                cycle_id = cycle.cycle_id,
                failed_shards = ?cycle.meta.failed_shards,
                "Publishing degraded cycle"
            );
        }
        if self.cycles.is_multiple_of(100) {
            debug!(cycles = self.cycles, "Dispatcher progress");
        }
    }
}

/// Convenience function to create a dispatcher from sink configs
#[instrument(name = "dispatcher_create", skip(sink_configs, publish))]
pub async fn create_dispatcher(
    sink_configs: Vec<SinkConfig>,
    publish: PublishConfig,
) -> Result<Dispatcher, DispatcherError> {
    let config = DispatcherConfig {
        sinks: sink_configs,
        publish,
    };
    DispatcherBuilder::new(config).build().await
}
