//! Phantom Mask Service - HTTP API for the mask marketplace ledger.
//!
//! This is the main entry point for the phantom-service binary.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use phantom_service::{create_router, open_backend, AppState, ServiceConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,phantom=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Phantom Mask Service");

    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir,
        lock_timeout_ms = config.lock_timeout.as_millis(),
        request_deadline = ?config.request_deadline,
        "Service configuration loaded"
    );

    let store = open_backend(&config)?;
    let state = AppState::new(store, config.clone());

    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
