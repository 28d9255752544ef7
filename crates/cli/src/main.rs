//! # Tag Poller CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 轮询管道编排与生命周期管理
//! - 优雅关闭处理

mod cli;
mod commands;
mod error;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_info, run_pipeline, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Tag Poller CLI starting");

    let result = match &cli.command {
        Commands::Run(args) => run_pipeline(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging based on CLI options
///
/// Metrics are installed later by `run`, only when a port is requested.
fn init_logging(cli: &Cli) -> Result<()> {
    let default_log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    observability::init_with_config(observability::ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port: None,
        default_log_level: default_log_level.to_string(),
        env_filter: !cli.quiet,
    })
}
