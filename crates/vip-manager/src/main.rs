//! vip-manager binary

use clap::Parser;
use std::path::PathBuf;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use vip_manager::{Config, LogFormat, VipManager};

#[derive(Parser, Debug)]
#[command(name = "vip-manager", version, about = "Keeps a virtual IP on the current leader node")]
struct Args {
    /// Configuration file (defaults to the standard search paths)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Can't use tracing yet - not initialized
    let config = match Config::load(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return Err(e.into());
        }
    };

    match config.logging.format {
        LogFormat::Text => common::logging::init(config.log_level()),
        LogFormat::Json => common::logging::init_json(config.log_level()),
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "vip-manager starting");

    let manager = VipManager::new(&config)?;

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(cancel.clone()));

    let stats = manager.run(cancel).await;

    tracing::info!(
        passes = stats.passes,
        configures = stats.configures,
        deconfigures = stats.deconfigures,
        failures = stats.failures,
        "vip-manager stopped"
    );

    Ok(())
}

/// Cancel on SIGINT or SIGTERM
async fn shutdown_on_signal(cancel: CancellationToken) {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = interrupt => tracing::info!("Received SIGINT, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }

    cancel.cancel();
}
