use axum::{
    extract::{Query, State, WebSocketUpgrade},
    response::Response,
};
use serde::Deserialize;
use tracing::{info, instrument};

use super::session::{ConnectionSession, SessionCredentials};
use crate::shared::{AppError, AppState};

/// Query parameters presented on the upgrade request
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WsQuery {
    pub room: String,
    pub password: String,
    #[serde(alias = "tempUser")]
    pub identity: String,
}

/// WebSocket endpoint
/// GET /ws?room=..&password=..&identity=..
///
/// Credentials are checked before the upgrade, so a rejected client gets a
/// plain HTTP error and is never registered with the hub.
#[instrument(name = "websocket_handler", skip(ws, query, state), fields(room = %query.room))]
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let credentials = SessionCredentials {
        room: query.room.trim().to_string(),
        password: query.password.trim().to_string(),
        identity: query.identity.trim().to_string(),
    };

    let session = ConnectionSession::new(
        state.store.clone(),
        state.hub.clone(),
        state.config.send_timeout,
    );
    let ctx = session.authorize(&credentials).await?;

    info!(
        room = %ctx.room,
        identity = %ctx.identity,
        role = ?ctx.role,
        "WebSocket authorized, upgrading"
    );

    Ok(ws.on_upgrade(move |socket| async move {
        session.run(Box::new(socket), ctx).await;
    }))
}
