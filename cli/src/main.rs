// Copyright (c) 2026 Dataverse Broker Contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Dataverse Service Broker
//!
//! The `dataverse-broker` binary advertises Dataverse collections to cloud
//! platforms over the Open Service Broker API.
//!
//! ## Commands
//!
//! - `dataverse-broker [serve]` - Run the broker (default)
//! - `dataverse-broker whitelist export|list` - Manage whitelist directories
//! - `dataverse-broker version` - Print the build version

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use dataverse_broker::commands::{self, ServeArgs, WhitelistCommand};

/// Dataverse Open Service Broker
#[derive(Parser)]
#[command(name = "dataverse-broker")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "DATAVERSE_BROKER_CONFIG",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "DATAVERSE_BROKER_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, env = "DATAVERSE_BROKER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the broker
    #[command(name = "serve")]
    Serve(ServeArgs),

    /// Whitelist directory management
    #[command(name = "whitelist")]
    Whitelist {
        #[command(subcommand)]
        command: WhitelistCommand,
    },

    /// Print the build version
    #[command(name = "version")]
    Version,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Compact,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.log_format)?;

    match cli.command {
        Some(Commands::Serve(args)) => commands::serve::run(args, cli.config).await,
        Some(Commands::Whitelist { command }) => commands::whitelist::handle_command(command).await,
        Some(Commands::Version) => {
            println!("dataverse-broker {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        None => commands::serve::run(ServeArgs::default(), cli.config).await,
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }

    Ok(())
}
