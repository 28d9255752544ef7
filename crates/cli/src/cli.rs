//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Tag Poller - cyclic concurrent polling of PLC tags
#[derive(Parser, Debug)]
#[command(
    name = "tag-poller",
    author,
    version,
    about = "Cyclic concurrent PLC tag poller",
    long_about = "Polls a fixed list of controller tag addresses at a fixed period.\n\n\
                  Addresses are split across concurrent workers, each with its own \n\
                  connection. Every cycle publishes the full set of values and the \n\
                  values that changed since the previous cycle to the configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "TAG_POLLER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "TAG_POLLER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the polling loop
    Run(RunArgs),

    /// Validate configuration file without polling
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "poller.toml",
        env = "TAG_POLLER_CONFIG"
    )]
    pub config: PathBuf,

    /// Override controller host from configuration
    #[arg(long, env = "TAG_POLLER_HOST")]
    pub host: Option<String>,

    /// Override the address file from configuration
    #[arg(long, env = "TAG_POLLER_ADDRESSES")]
    pub addresses: Option<PathBuf>,

    /// Override worker count
    #[arg(long, env = "TAG_POLLER_WORKERS")]
    pub workers: Option<usize>,

    /// Override batch size
    #[arg(long, env = "TAG_POLLER_BATCH_SIZE")]
    pub batch_size: Option<usize>,

    /// Override cycle period in milliseconds
    #[arg(long, env = "TAG_POLLER_PERIOD_MS")]
    pub period_ms: Option<u64>,

    /// Stop after this many cycles (0 = unlimited)
    #[arg(long, default_value = "0", env = "TAG_POLLER_MAX_CYCLES")]
    pub max_cycles: u64,

    /// Stop after this many seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "TAG_POLLER_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without polling
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "TAG_POLLER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "poller.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "poller.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show the address split across workers
    #[arg(long)]
    pub shards: bool,

    /// Show sink configuration
    #[arg(long)]
    pub sinks: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
