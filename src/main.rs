//! Bot Gateway
//!
//! An inline request-inspection gateway built with Tokio and Axum. Every
//! non-static request is described to an external bot-detection decision
//! service; its verdict decides whether the request reaches the application.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────┐
//!                     │                   BOT GATEWAY                    │
//!   Client Request    │  ┌─────────┐   ┌────────────┐   ┌────────────┐  │
//!   ──────────────────┼─▶│  http   │──▶│ validation │──▶│   proxy    │──┼──▶ Application
//!                     │  │ server  │   │  gateway   │   │  handler   │  │
//!                     │  └─────────┘   └─────┬──────┘   └────────────┘  │
//!                     │                      │ POST (deadline)          │
//!                     │                      ▼                          │
//!                     │               Decision service                  │
//!                     │                                                 │
//!                     │  config · observability · resilience · lifecycle│
//!                     └──────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use bot_gateway::config::loader::{default_config, load_config};
use bot_gateway::lifecycle::{signals, Shutdown};
use bot_gateway::observability::{logging, metrics};
use bot_gateway::{Gateway, HttpServer};

#[derive(Parser)]
#[command(name = "bot-gateway")]
#[command(about = "Inline bot-detection gateway", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => default_config()?,
    };

    logging::init(&config.observability.log_level);
    tracing::info!("bot-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        validation_enabled = config.validation.enabled,
        validation_timeout_ms = config.validation.timeout_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let gateway = Arc::new(Gateway::from_config(config.validation.clone())?);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, gateway);
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        signals::wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
