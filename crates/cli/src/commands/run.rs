//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::PollerBlueprint;
use poller::CancellationToken;
use std::time::Duration;
use tracing::{info, warn};

use super::load_blueprint;
use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let mut blueprint = load_blueprint(&args.config)?;
    apply_overrides(&mut blueprint, args)?;

    let addresses = config_loader::ConfigLoader::load_addresses(&blueprint)
        .context("Failed to load tag addresses")?;

    info!(
        host = %blueprint.controller.host,
        port = blueprint.controller.port,
        addresses = addresses.len(),
        workers = blueprint.polling.workers,
        batch_size = blueprint.polling.batch_size,
        period_ms = blueprint.polling.period_ms,
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint, addresses.len());
        return Ok(());
    }

    let pipeline_config = PipelineConfig {
        blueprint,
        addresses,
        max_cycles: (args.max_cycles > 0).then_some(args.max_cycles),
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    };

    // Ctrl+C / SIGTERM end the loop after the current cycle
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    let signal_task = tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Received shutdown signal, stopping after the current cycle...");
        signal_cancel.cancel();
    });

    info!("Starting pipeline...");
    let result = Pipeline::new(pipeline_config).run(cancel).await;
    signal_task.abort();

    let stats = result.context("Pipeline execution failed")?;
    info!(
        cycles = stats.summary.cycles,
        late_cycles = stats.summary.late_cycles,
        degraded_cycles = stats.summary.degraded_cycles,
        duration_secs = stats.duration.as_secs_f64(),
        "Pipeline completed successfully"
    );
    stats.print_summary();

    info!("Tag Poller finished");
    Ok(())
}

/// Apply CLI overrides and re-validate the result
fn apply_overrides(blueprint: &mut PollerBlueprint, args: &RunArgs) -> Result<()> {
    if let Some(ref host) = args.host {
        info!(host = %host, "Overriding controller host from CLI");
        blueprint.controller.host = host.clone();
    }
    if let Some(ref file) = args.addresses {
        info!(file = %file.display(), "Overriding address file from CLI");
        blueprint.addresses.file = Some(file.clone());
        blueprint.addresses.tags = None;
    }
    if let Some(workers) = args.workers {
        blueprint.polling.workers = workers;
    }
    if let Some(batch_size) = args.batch_size {
        blueprint.polling.batch_size = batch_size;
    }
    if let Some(period_ms) = args.period_ms {
        blueprint.polling.period_ms = period_ms;
    }

    config_loader::ConfigLoader::validate(blueprint)
        .map_err(|e| CliError::config_validation(e.to_string()))?;
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &PollerBlueprint, address_count: usize) {
    println!("\n=== Configuration Summary ===\n");
    println!("Controller:");
    println!(
        "  Endpoint: {}:{} ({:?})",
        blueprint.controller.host, blueprint.controller.port, blueprint.controller.driver
    );
    if let Some(timeout) = blueprint.controller.read_timeout_ms {
        println!("  Read timeout: {} ms", timeout);
    }

    println!("\nPolling:");
    println!("  Addresses: {}", address_count);
    println!("  Workers: {}", blueprint.polling.workers);
    println!("  Batch size: {}", blueprint.polling.batch_size);
    println!("  Period: {} ms", blueprint.polling.period_ms);
    println!("  Channels: {:?}", blueprint.publish.active_channels());

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            let state = if sink.enabled { "" } else { " [disabled]" };
            println!("  - {} ({:?}){}", sink.name, sink.sink_type, state);
        }
    }

    println!();
}
