//! Latest-version badge proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────┐
//!                     │                  LATEST PROXY                    │
//!   Client Request    │  ┌─────────┐   ┌──────────┐   ┌──────────────┐   │
//!   ──────────────────┼─▶│ request │──▶│ latest   │──▶│   forward    │───┼──▶ Page
//!                     │  │   id    │   │ version  │   │   upstream   │   │    Renderer
//!                     │  └─────────┘   │  layer   │   └──────────────┘   │
//!   Client Response   │                │          │◀── captured body ────┼───
//!   ◀─────────────────┼────────────────│ rewrite  │                      │
//!                     │                └────┬─────┘                      │
//!                     │                     ▼                            │
//!                     │              ┌─────────────┐                     │
//!                     │              │  resolver   │──▶ Go module proxy  │
//!                     │              │             │    / versions table │
//!                     │              └─────────────┘                     │
//!                     └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use latest_proxy::config::{check_config, load_config, ProxyConfig};
use latest_proxy::observability::{logging, metrics};
use latest_proxy::{resolver, HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "latest-proxy")]
#[command(about = "Fills in latest-version badges on pages from an upstream renderer", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file (defaults are used when omitted).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    check_config(&config)?;

    if cli.check {
        println!("configuration ok");
        return Ok(());
    }

    logging::init(&config.observability)?;

    tracing::info!("latest-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.url,
        resolver = ?config.resolver.kind,
        request_timeout_secs = config.timeouts.request_secs,
        resolve_timeout_ms = config.timeouts.resolve_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Keeps the versions table watcher alive for the life of the server.
    let handle = resolver::from_config(&config)?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let server = HttpServer::new(config, handle.resolver.clone());
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
