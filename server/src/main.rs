//! Parley Server - Main Entry Point
//!
//! Signaling and admission-control hub for self-hosted video meetings.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use parley_server::config::Config;
use parley_server::hub::{sweeper, Hub};
use parley_server::store::MeetingStore;
use parley_server::api;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley_server=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Arc::new(Config::from_env()?);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Parley Server"
    );

    // Meeting store adapter (optional; persistence disabled if unset)
    let store = MeetingStore::from_config(&config);
    if matches!(store, MeetingStore::Disabled) {
        tracing::warn!("STORE_BASE_URL not set; transcript persistence disabled");
    }

    // The hub and its expiry sweeper
    let hub = Arc::new(Hub::new(config.clone(), store));
    let sweeper_handle = sweeper::spawn(hub.clone());

    // Build router
    let state = api::AppState {
        hub,
        config: config.clone(),
    };
    let app = api::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "Server listening");

    // Graceful shutdown handler
    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
        info!("Received shutdown signal, cleaning up...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    sweeper_handle.abort();
    info!("Server shutdown complete");

    Ok(())
}
