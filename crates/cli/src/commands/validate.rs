//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{PayloadChannel, PollerBlueprint, TagAddress};
use serde::Serialize;
use std::collections::HashSet;
use tracing::info;

use super::load_blueprint;
use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    controller: String,
    address_count: usize,
    workers: usize,
    batch_size: usize,
    period_ms: u64,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();
    let invalid = |config_path: String, error: String| ValidationResult {
        valid: false,
        config_path,
        error: Some(error),
        warnings: None,
        summary: None,
    };

    let blueprint = match load_blueprint(&args.config) {
        Ok(blueprint) => blueprint,
        Err(e) => return invalid(config_path, format!("{:#}", e)),
    };

    // The address list is part of a usable configuration
    let addresses = match config_loader::ConfigLoader::load_addresses(&blueprint) {
        Ok(addresses) => addresses,
        Err(e) => return invalid(config_path, e.to_string()),
    };

    let warnings = collect_warnings(&blueprint, &addresses);

    ValidationResult {
        valid: true,
        config_path,
        error: None,
        warnings: (!warnings.is_empty()).then_some(warnings),
        summary: Some(ConfigSummary {
            version: format!("{:?}", blueprint.version),
            controller: format!(
                "{}:{}",
                blueprint.controller.host, blueprint.controller.port
            ),
            address_count: addresses.len(),
            workers: blueprint.polling.workers,
            batch_size: blueprint.polling.batch_size,
            period_ms: blueprint.polling.period_ms,
            sink_count: blueprint.sinks.len(),
        }),
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &PollerBlueprint, addresses: &[TagAddress]) -> Vec<String> {
    let mut warnings = Vec::new();
    let publish = &blueprint.publish;

    if publish.active_channels().is_empty() {
        warnings.push("publish.full and publish.changed are both off - nothing is published".to_string());
    }

    if blueprint.sinks.iter().all(|s| !s.enabled) {
        warnings.push("No sinks enabled - polled values will not be published anywhere".to_string());
    }

    for sink in blueprint.sinks.iter().filter(|s| s.enabled) {
        for channel in &sink.channels {
            if !publish.is_enabled(*channel) {
                warnings.push(format!(
                    "Sink '{}' subscribes to '{}' but publish.{} is off",
                    sink.name, channel, channel
                ));
            }
        }
        if !PayloadChannel::ALL
            .into_iter()
            .any(|c| sink.subscribes(c) && publish.is_enabled(c))
        {
            warnings.push(format!("Sink '{}' will never receive data", sink.name));
        }
    }

    let mut seen = HashSet::new();
    let duplicates: Vec<&str> = addresses
        .iter()
        .filter(|a| !seen.insert(a.as_str()))
        .map(|a| a.as_str())
        .collect();
    if !duplicates.is_empty() {
        warnings.push(format!(
            "{} duplicate address(es), each is read once per occurrence: {:?}",
            duplicates.len(),
            duplicates
        ));
    }

    if blueprint.polling.workers > addresses.len() {
        warnings.push(format!(
            "{} workers for {} addresses - some workers stay idle",
            blueprint.polling.workers,
            addresses.len()
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Controller: {}", summary.controller);
            println!("  Addresses: {}", summary.address_count);
            println!("  Workers: {}", summary.workers);
            println!("  Batch size: {}", summary.batch_size);
            println!("  Period: {} ms", summary.period_ms);
            println!("  Sinks: {}", summary.sink_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
