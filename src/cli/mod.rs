//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Multi-outcome prediction-market arbitrage pipeline.
#[derive(Parser, Debug)]
#[command(name = "arbcore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Override the configured log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the discovery/detection/execution pipeline in the foreground.
    Run,
    /// Load and validate the configuration file, then exit.
    Check,
}
