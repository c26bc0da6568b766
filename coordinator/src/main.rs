//! LRA Coordinator Binary
//!
//! Serves the coordinator HTTP surface and runs the recovery loop.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lra_coordinator::{api, Coordinator, CoordinatorConfig, RecoveryEngine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting LRA Coordinator");

    // Load configuration
    let config = CoordinatorConfig::from_env();
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let coordinator = Arc::new(Coordinator::new(&config)?);
    let recovery = Arc::new(RecoveryEngine::new(
        Arc::clone(&coordinator),
        config.recovery_config.clone(),
    ));

    // Background recovery loop
    tokio::spawn(Arc::clone(&recovery).run());

    let app = api::router(
        Arc::clone(&coordinator),
        recovery,
        config.client_config.lra_base_url.clone(),
    );

    let bind_addr = format!("{}:{}", config.listen_addr, config.listen_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(
        listen_addr = %config.listen_addr,
        listen_port = config.listen_port,
        base_url = %config.client_config.lra_base_url,
        "Coordinator running"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to listen for Ctrl+C");
            info!("Shutdown signal received");
        })
        .await?;

    info!("Coordinator shutdown complete");
    Ok(())
}
