//! formrpc server
//!
//! Serves the sample user-directory procedures over HTTP.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ content-type chain ──▶ router ──▶ executor
//!                     (layers)        (json | form-data)     (path,     (validate,
//!                                                             kind)      callback)
//!     Client Response                                                      │
//!     ◀────────────── response.rs ◀──────── envelope(s) ◀──────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use formrpc::config::{load_config, RpcConfig};
use formrpc::lifecycle::{signals, Shutdown};
use formrpc::observability::{logging, metrics};
use formrpc::{app, RpcServer};

#[derive(Parser)]
#[command(name = "formrpc-server")]
#[command(about = "Serve the sample formrpc procedures", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `server.bind_address`
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => RpcConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }

    logging::init_logging(&config.observability);
    tracing::info!("formrpc-server v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.server.bind_address,
        max_body_size = config.server.max_body_size,
        request_timeout_secs = config.server.request_timeout_secs,
        spool_to_disk = config.uploads.spool_to_disk,
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

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    tokio::spawn(signals::trigger_on_signal(shutdown.clone()));

    let server = RpcServer::new(app::router()?, &config);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
