//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::PollerBlueprint;
use serde::Serialize;
use tracing::info;

use super::load_blueprint;
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    controller: ControllerInfo,
    polling: PollingInfo,
    addresses: AddressInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    shards: Vec<ShardInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct ControllerInfo {
    host: String,
    port: u16,
    driver: String,
    connection_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    read_timeout_ms: Option<u64>,
}

#[derive(Serialize)]
struct PollingInfo {
    workers: usize,
    batch_size: usize,
    period_ms: u64,
    publish_full: bool,
    publish_changed: bool,
}

#[derive(Serialize)]
struct AddressInfo {
    source: String,
    count: usize,
}

#[derive(Serialize)]
struct ShardInfo {
    index: usize,
    count: usize,
    batches: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    first: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last: Option<String>,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    enabled: bool,
    channels: Vec<String>,
    queue_capacity: usize,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let blueprint = load_blueprint(&args.config)?;
    let info = build_config_info(&blueprint, args)?;

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(blueprint: &PollerBlueprint, args: &InfoArgs) -> Result<ConfigInfo> {
    let source = config_loader::address_source(&blueprint.addresses)?;
    let addresses = source
        .load_addresses()
        .context("Failed to load tag addresses")?;

    let shards = if args.shards {
        let batch_size = blueprint.polling.batch_size.max(1);
        poller::partition(&addresses, blueprint.polling.workers)?
            .into_iter()
            .map(|shard| ShardInfo {
                index: shard.index,
                count: shard.len(),
                batches: shard.len().div_ceil(batch_size),
                first: shard.addresses.first().map(ToString::to_string),
                last: shard.addresses.last().map(ToString::to_string),
            })
            .collect()
    } else {
        Vec::new()
    };

    let sinks = if args.sinks {
        blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                enabled: s.enabled,
                channels: s.channels.iter().map(ToString::to_string).collect(),
                queue_capacity: s.queue_capacity,
            })
            .collect()
    } else {
        Vec::new()
    };

    let controller = &blueprint.controller;
    Ok(ConfigInfo {
        version: format!("{:?}", blueprint.version),
        controller: ControllerInfo {
            host: controller.host.clone(),
            port: controller.port,
            driver: format!("{:?}", controller.driver),
            connection_size: controller.connection_size,
            read_timeout_ms: controller.read_timeout_ms,
        },
        polling: PollingInfo {
            workers: blueprint.polling.workers,
            batch_size: blueprint.polling.batch_size,
            period_ms: blueprint.polling.period_ms,
            publish_full: blueprint.publish.full,
            publish_changed: blueprint.publish.changed,
        },
        addresses: AddressInfo {
            source: source.describe(),
            count: addresses.len(),
        },
        shards,
        sinks,
    })
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Tag Poller Configuration                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let controller = &info.controller;
    println!("🔌 Controller");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ Endpoint: {}:{}", controller.host, controller.port);
    println!("   ├─ Driver: {}", controller.driver);
    println!("   ├─ Connection size: {}", controller.connection_size);
    match controller.read_timeout_ms {
        Some(ms) => println!("   └─ Read timeout: {} ms", ms),
        None => println!("   └─ Read timeout: driver default"),
    }

    let polling = &info.polling;
    println!("\n⏱  Polling");
    println!(
        "   ├─ Addresses: {} ({})",
        info.addresses.count, info.addresses.source
    );
    println!("   ├─ Workers: {}", polling.workers);
    println!("   ├─ Batch size: {}", polling.batch_size);
    println!("   ├─ Period: {} ms", polling.period_ms);
    println!(
        "   └─ Publish: full={} changed={}",
        polling.publish_full, polling.publish_changed
    );

    if !info.shards.is_empty() {
        println!("\n🧩 Shards ({})", info.shards.len());
        for (i, shard) in info.shards.iter().enumerate() {
            let prefix = if i == info.shards.len() - 1 { "└─" } else { "├─" };
            match (&shard.first, &shard.last) {
                (Some(first), Some(last)) => println!(
                    "   {} #{}: {} addresses in {} batches ({} .. {})",
                    prefix, shard.index, shard.count, shard.batches, first, last
                ),
                _ => println!("   {} #{}: idle", prefix, shard.index),
            }
        }
    }

    if !info.sinks.is_empty() {
        println!("\n📤 Sinks ({})", info.sinks.len());
        for (i, sink) in info.sinks.iter().enumerate() {
            let prefix = if i == info.sinks.len() - 1 { "└─" } else { "├─" };
            let state = if sink.enabled { "" } else { " [disabled]" };
            println!(
                "   {} {} ({}) -> {:?}, queue {}{}",
                prefix, sink.name, sink.sink_type, sink.channels, sink.queue_capacity, state
            );
        }
    }

    println!();
}
