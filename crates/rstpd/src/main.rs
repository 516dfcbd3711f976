//! Rapid Spanning Tree daemon
//!
//! Entry point for rstpd.

use anyhow::Context;
use clap::Parser;
use sonic_rstp::MacAddress;
use sonic_rstpd::{DaemonConfig, LoggingDriver, LoggingTransport, StpService, DEFAULT_CONFIG_PATH};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// SONiC Rapid Spanning Tree daemon
#[derive(Parser, Debug)]
#[command(name = "rstpd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Bridge MAC address, overrides the configuration file
    #[arg(short = 'm', long)]
    mac_address: Option<MacAddress>,

    /// Log level or filter directive, used when RUST_LOG is unset
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,
}

fn init_logging(args: &Args) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .context("invalid log filter")?;
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true);

    let result = if args.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.compact().finish())
    };
    result.context("failed to set tracing subscriber")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    info!("--- Starting rstpd ---");

    let mut config = DaemonConfig::load_or_default(&args.config)?;
    if let Some(mac) = args.mac_address {
        config.bridge.address = mac;
    }

    let service = StpService::start(&config, Arc::new(LoggingDriver), Arc::new(LoggingTransport))
        .context("failed to start spanning tree service")?;

    signal::ctrl_c().await.context("failed to wait for ctrl-c")?;
    info!("rstpd: Received SIGINT/SIGTERM");

    service.shutdown().await;
    Ok(())
}
