use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use syncroom::room::{start_cleanup_task, CleanupConfig};
use syncroom::{app_router, AppState, BroadcastHub, RoomStore, ServerConfig};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "syncroom=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting room sync server");

    let config = ServerConfig::from_env();
    info!(config = ?config, "Configuration loaded");

    let store = match RoomStore::from_config(&config).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!(error = %e, "Invalid media root");
            std::process::exit(1);
        }
    };
    let hub = Arc::new(BroadcastHub::new(config.outbound_capacity));

    let shutdown = CancellationToken::new();
    let cleanup = tokio::spawn(start_cleanup_task(
        store.clone(),
        hub.clone(),
        CleanupConfig::from(&config),
        shutdown.clone(),
    ));

    let listen_addr = config.listen_addr.clone();
    let app = app_router(AppState::new(store, hub, Arc::new(config)));

    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %listen_addr, error = %e, "Failed to bind listener");
            std::process::exit(1);
        }
    };
    info!("Server running on http://{}", listen_addr);

    let serve_shutdown = shutdown.clone();
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
                _ = serve_shutdown.cancelled() => {}
            }
        })
        .await;

    shutdown.cancel();
    let _ = cleanup.await;

    if let Err(e) = result {
        error!(error = %e, "Server exited with error");
        std::process::exit(1);
    }
}
