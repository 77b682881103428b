use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use gamelib_gate::admin::setup_admin_router;
use gamelib_gate::config::{load_config, watcher::ConfigWatcher, GateConfig};
use gamelib_gate::lifecycle::{wait_for_signal, Shutdown};
use gamelib_gate::observability::{logging, metrics};
use gamelib_gate::HttpServer;

#[derive(Parser)]
#[command(name = "gamelib-gate")]
#[command(about = "Rate limiting, bot protection and security headers in front of the game library", long_about = None)]
struct Args {
    /// Path to the TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GateConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "gamelib-gate starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        rate_limit_enabled = config.rate_limit.enabled,
        bot_protection_enabled = config.bot_protection.enabled,
        storage_dir = %config.storage.directory.display(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    // The watcher handle must outlive the server.
    let (config_updates, _watcher) = match &args.config {
        Some(path) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            (rx, Some(watcher.run()?))
        }
        None => (mpsc::unbounded_channel().1, None),
    };

    let shutdown = Shutdown::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let admin = config.admin.clone();
    let server = HttpServer::new(config)?;

    if admin.enabled {
        let admin_listener = TcpListener::bind(&admin.bind_address).await?;
        let admin_app = setup_admin_router(server.state());
        let mut admin_shutdown = shutdown.subscribe();
        tracing::info!(address = %admin_listener.local_addr()?, "Admin API listening");
        tokio::spawn(async move {
            let result = axum::serve(admin_listener, admin_app)
                .with_graceful_shutdown(async move {
                    let _ = admin_shutdown.recv().await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "Admin API stopped");
            }
        });
    }

    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
