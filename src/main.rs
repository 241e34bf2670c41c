//! relay-hub server entry point.
//!
//! Starts the Axum HTTP server with the WebSocket upgrade and system
//! endpoints, and runs until a shutdown signal arrives.

use std::net::SocketAddr;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use relay_hub::api;
use relay_hub::app_state::AppState;
use relay_hub::config::HubConfig;
use relay_hub::hub::Hub;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = HubConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, name = %config.hub_name, "starting relay-hub");

    // Spawn the dispatcher and build application state
    let hub = Hub::new(&config);
    let state = AppState {
        hub: hub.clone(),
        origin_policy: None,
    };

    // Build router
    let app = api::build_router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "hub listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(hub.clone()))
    .await?;

    hub.shutdown();
    Ok(())
}

/// Resolves when Ctrl-C arrives, after signalling the hub to unwind.
async fn shutdown_signal(hub: Hub) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
    hub.shutdown();
}
