//! AlertRelay - Alertmanager webhook to Telegram relay
//!
//! Receives alert webhooks, normalizes whatever payload shape arrives, and
//! forwards every alert to a Telegram chat.

use alertrelay::{app::App, cli::Cli, config::Config};
use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = Config::load(&cli)?;

    // Initialize logging. RUST_LOG takes precedence over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("AlertRelay starting up...");

    // Log the loaded configuration settings for visibility
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Listen Address: {}", config.server.listen_address());
    info!("Max Body Size: {} bytes", config.server.max_body_bytes);
    info!("Token File: {}", config.auth.token_file.display());
    info!(
        "Telegram Delivery: {}",
        if config.telegram.credentials().is_some() {
            "Enabled"
        } else {
            "Disabled (missing bot token or chat id)"
        }
    );
    info!("Telegram API: {}", config.telegram.api_base_url);
    info!(
        "Delivery Attempts: {} (timeout {}s each, backoff unit {}ms)",
        config.telegram.max_attempts,
        config.telegram.attempt_timeout.as_secs(),
        config.telegram.backoff_unit.as_millis()
    );
    info!(
        "Metrics: {}",
        if config.metrics.enabled {
            format!("Enabled ({})", config.metrics.listen_address)
        } else {
            "Disabled".to_string()
        }
    );
    info!("-------------------------------------------------------");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app = App::builder(config).build(shutdown_rx).await?;

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown signal received. Shutting down gracefully...");
        let _ = shutdown_tx.send(true);
    });

    app.run().await?;

    info!("Exiting.");
    Ok(())
}
