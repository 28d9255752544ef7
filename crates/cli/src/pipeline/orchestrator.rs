//! Pipeline orchestrator - coordinates all components.
//!
//! config → addresses → controller connections → scheduler → dispatcher → sinks

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{PollerBlueprint, TagAddress};
use controller::{SimulatedConfig, SimulatedController};
use poller::{CancellationToken, CycleScheduler, SchedulerConfig};
use tracing::{info, warn};

use super::PipelineStats;
use crate::error::CliError;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The poller blueprint, CLI overrides applied
    pub blueprint: PollerBlueprint,

    /// Address list, loaded and checked
    pub addresses: Vec<TagAddress>,

    /// Maximum number of cycles (None = unlimited)
    pub max_cycles: Option<u64>,

    /// Pipeline timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until `cancel` fires, the cycle limit is reached or the timeout elapses
    ///
    /// The cycle in flight when `cancel` fires still completes and is published.
    pub async fn run(self, cancel: CancellationToken) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let endpoint = format!(
            "{}:{}",
            blueprint.controller.host, blueprint.controller.port
        );
        let controller = SimulatedController::new(SimulatedConfig::from_blueprint(
            endpoint.clone(),
            &blueprint.controller.simulation,
        ));
        info!(
            endpoint = %endpoint,
            driver = ?blueprint.controller.driver,
            connection_size = blueprint.controller.connection_size,
            "Controller configured"
        );

        // Setup Dispatcher
        if blueprint.sinks.iter().all(|s| !s.enabled) {
            warn!("No sinks enabled - polled values will not be published anywhere");
        }
        let dispatcher =
            dispatcher::create_dispatcher(blueprint.sinks.clone(), blueprint.publish.clone())
                .await
                .context("Failed to create dispatcher")?;
        let active_sinks = dispatcher.sink_count();
        info!(
            active_sinks,
            channels = ?blueprint.publish.active_channels(),
            "Dispatcher started"
        );

        // Setup Scheduler
        let scheduler_config = SchedulerConfig {
            max_cycles: self.config.max_cycles,
            ..SchedulerConfig::from_blueprint(blueprint)
        };
        let period = scheduler_config.period;
        let workers = scheduler_config.workers;

        let mut scheduler =
            CycleScheduler::new(scheduler_config, &self.config.addresses, dispatcher)
                .map_err(|e| CliError::config_validation(e.to_string()))?;
        scheduler
            .start(&controller)
            .await
            .map_err(|e| CliError::pipeline_execution(e.to_string()))?;

        info!(
            addresses = self.config.addresses.len(),
            workers,
            period_ms = period.as_millis() as u64,
            max_cycles = ?self.config.max_cycles,
            "Polling started"
        );

        let timer = self.config.timeout.map(|timeout| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                warn!(timeout_secs = timeout.as_secs(), "Pipeline timed out");
                cancel.cancel();
            })
        });

        let outcome = scheduler.run(cancel).await;
        if let Some(timer) = timer {
            timer.abort();
        }
        let (summary, dispatcher) =
            outcome.map_err(|e| CliError::pipeline_execution(e.to_string()))?;

        // Shutdown
        info!("Shutting down dispatcher...");
        let sinks = dispatcher.shutdown().await;

        let stats = PipelineStats {
            summary,
            duration: start_time.elapsed(),
            addresses: self.config.addresses.len(),
            workers,
            sinks,
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            cycles = stats.summary.cycles,
            dropped_batches = stats.dropped_batches(),
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }
}
