//! gather - telemetry snapshot collector
//!
//! Subcommands:
//! - `gather serve` - Run the collector HTTP server
//! - `gather ping <url>` - Check whether a collector is ready
//! - `gather snapshot <url>` - Trigger a window and save the result
//! - `gather push <url> <instrument> <json>` - Submit one sample
//! - `gather config` - Show the effective configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use gather::{commands, telemetry, web};
use gatherconf::GatherConfig;

#[derive(Parser)]
#[command(name = "gather")]
#[command(about = "Time-bounded telemetry snapshot collector")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the collector server
    Serve {
        /// Config file (replaces ./gather.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// HTTP port to bind
        #[arg(short, long)]
        port: Option<u16>,

        /// Interface to bind
        #[arg(long)]
        host: Option<String>,

        /// Collection window length in milliseconds
        #[arg(short, long)]
        window_ms: Option<u64>,

        /// OTLP gRPC endpoint for OpenTelemetry (e.g., "localhost:4317")
        #[arg(long)]
        otlp_endpoint: Option<String>,
    },

    /// Check whether a collector is ready for a snapshot
    Ping {
        /// Collector base URL (e.g., http://localhost:8380)
        url: String,

        /// Timeout in milliseconds
        #[arg(short, long, default_value = "5000")]
        timeout: u64,
    },

    /// Trigger a collection window and save the snapshot
    Snapshot {
        /// Collector base URL
        url: String,

        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Timeout in milliseconds, must exceed the server's window
        #[arg(short, long, default_value = "30000")]
        timeout: u64,
    },

    /// Submit a sample for an instrument
    Push {
        /// Collector base URL
        url: String,

        /// Instrument identifier
        instrument: String,

        /// JSON payload
        json: String,

        /// Timeout in milliseconds
        #[arg(short, long, default_value = "5000")]
        timeout: u64,
    },

    /// Print the effective configuration
    Config {
        /// Config file (replaces ./gather.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The server configures its own subscriber from the loaded config
    if !matches!(cli.command, Commands::Serve { .. }) {
        telemetry::init_cli();
    }

    match cli.command {
        Commands::Serve {
            config,
            port,
            host,
            window_ms,
            otlp_endpoint,
        } => {
            let mut settings =
                GatherConfig::load_from(config.as_deref()).context("Failed to load configuration")?;
            if let Some(port) = port {
                settings.bind.http_port = port;
            }
            if let Some(host) = host {
                settings.bind.host = host;
            }
            if let Some(ms) = window_ms {
                settings.window.duration_ms = ms;
            }
            if otlp_endpoint.is_some() {
                settings.telemetry.otlp_endpoint = otlp_endpoint;
            }
            settings.validate()?;

            let telemetry = telemetry::init(
                &settings.telemetry.log_level,
                settings.telemetry.otlp_endpoint.as_deref(),
            )?;

            let served = web::run(web::ServeConfig {
                addr: settings.bind_addr(),
                window: settings.window_duration(),
            })
            .await;
            telemetry.shutdown();
            served?;
        }
        Commands::Ping { url, timeout } => {
            commands::ping(&url, timeout).await?;
        }
        Commands::Snapshot {
            url,
            output,
            timeout,
        } => {
            commands::snapshot(&url, output.as_deref(), timeout).await?;
        }
        Commands::Push {
            url,
            instrument,
            json,
            timeout,
        } => {
            commands::push(&url, &instrument, &json, timeout).await?;
        }
        Commands::Config { config } => {
            commands::show_config(config.as_deref())?;
        }
    }

    Ok(())
}
