//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Lanewatch - traffic violation rule engine
#[derive(Parser, Debug)]
#[command(
    name = "lanewatch",
    author,
    version,
    about = "Traffic violation rule engine",
    long_about = "Evaluates traffic rules (red light, lane exit, wrong way, speeding, \n\
                  helmet) over tracked objects and dispatches debounced alerts to \n\
                  configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "LANEWATCH_VERBOSE")]
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
        env = "LANEWATCH_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a session over a replay file
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "site.toml", env = "LANEWATCH_CONFIG")]
    pub config: PathBuf,

    /// JSONL scene replay (defaults to site.source)
    #[arg(short, long, env = "LANEWATCH_REPLAY")]
    pub replay: Option<PathBuf>,

    /// Initial signal state (red / green)
    #[arg(long, env = "LANEWATCH_SIGNAL")]
    pub signal: Option<String>,

    /// Maximum number of frames to process (0 = until end of stream)
    #[arg(long, default_value = "0", env = "LANEWATCH_MAX_FRAMES")]
    pub max_frames: u64,

    /// Override session pacing factor (0 = no pacing)
    #[arg(long, env = "LANEWATCH_PACING")]
    pub pacing: Option<f64>,

    /// Disable evidence capture regardless of configuration
    #[arg(long)]
    pub no_evidence: bool,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "LANEWATCH_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "site.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "site.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show rule engine parameters
    #[arg(long)]
    pub engine: bool,

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
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}
