// Library crate for the room sync server
// This file exposes the public API for integration tests

pub mod config;
pub mod media;
pub mod room;
pub mod shared;
pub mod websockets;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

// Re-export commonly used types for easier access in tests
pub use config::ServerConfig;
pub use media::broker::{MediaHandle, MediaTarget, MediaTokenBroker};
pub use room::{Role, RoomState, RoomStore};
pub use shared::{AppError, AppState};
pub use websockets::{
    BroadcastHub, ClientMessage, ConnectionSession, MessageHandler, ServerMessage,
    SessionCredentials, SessionState, SocketError, SocketWrapper,
};

/// Builds the HTTP surface around a shared `AppState`
pub fn app_router(state: AppState) -> Router {
    let mut media_root = get(media::get_media_root);
    if state.config.allow_media_root_update {
        media_root = media_root.post(media::set_media_root);
    }

    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/api/room/join", post(room::join_room))
        .route("/api/media/resolve", post(media::resolve_media))
        .route("/api/media/root", media_root)
        .route("/media/:token", get(media::media_stream))
        .route("/ws", get(websockets::websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
