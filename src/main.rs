//! Application server entry point.
//!
//! ```text
//!     Client Request
//!     ──▶ transport layers (trace, request id)
//!     ──▶ pipeline stages
//!           security_headers → cors → body → cookies → access_log → security
//!     ──▶ route table
//!           GET /         → greeting
//!           /api/auth/*   → authentication route group
//!           otherwise     → 404
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use app_pipeline::config::load_config;
use app_pipeline::lifecycle::{wait_for_shutdown_signal, Shutdown};
use app_pipeline::observability::{logging, metrics};
use app_pipeline::stages::TracingSink;
use app_pipeline::{auth, build_pipeline, HttpServer};

#[derive(Debug, Parser)]
#[command(name = "app-pipeline", version, about = "HTTP application server")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "APP_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    logging::init(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
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

    let pipeline = build_pipeline(&config, auth::routes(), Arc::new(TracingSink))?;
    tracing::info!(stages = ?pipeline.stage_names(), "Pipeline ready");

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            wait_for_shutdown_signal().await;
            shutdown.trigger();
        }
    });

    HttpServer::new(config, pipeline).run(listener, receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
