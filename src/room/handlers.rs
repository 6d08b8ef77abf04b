use axum::{extract::State, Json};
use tracing::{info, instrument};

use super::types::{JoinRequest, JoinResponse};
use crate::shared::{AppError, AppState};

/// HTTP handler for joining a room
///
/// POST /api/room/join
/// Creates the room on first use; the first joiner becomes its host
#[instrument(name = "join_room", skip(state, request), fields(room = %request.room))]
pub async fn join_room(
    State(state): State<AppState>,
    Json(request): Json<JoinRequest>,
) -> Result<Json<JoinResponse>, AppError> {
    let (identity, role) = state.store.join(&request.room, &request.password).await?;

    info!(identity = %identity, role = ?role, "Join accepted");

    Ok(Json(JoinResponse { identity, role }))
}
