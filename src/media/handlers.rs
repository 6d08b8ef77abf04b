use axum::{
    extract::{Path, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{debug, instrument, warn};

use super::broker::MediaTarget;
use super::types::{MediaRootRequest, MediaRootResponse, ResolveRequest, ResolveResponse};
use crate::shared::{AppError, AppState};

/// HTTP handler for minting a media handle
///
/// POST /api/media/resolve
/// Host only; the password is re-checked on every call
#[instrument(
    name = "resolve_media",
    skip(state, request),
    fields(room = %request.room, identity = %request.identity)
)]
pub async fn resolve_media(
    State(state): State<AppState>,
    Json(request): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>, AppError> {
    let room = request.room.trim();
    let password = request.password.trim();
    let identity = request.identity.trim();
    if room.is_empty() || identity.is_empty() {
        return Err(AppError::bad_request("room and identity required"));
    }

    state.store.authorize(room, password, identity).await?;

    let handle = state
        .store
        .resolve_media(room, identity, &request.path)
        .await?;

    Ok(Json(ResolveResponse {
        url: format!("/media/{}", handle.token),
        source_type: handle.target.source_type().to_string(),
        expires_at: handle.expires_at.timestamp_millis(),
        token: handle.token,
    }))
}

/// HTTP handler for dereferencing a media handle
///
/// GET /media/{token}
/// Local files are streamed with range support, remote sources redirect.
/// Unknown and expired handles are indistinguishable.
pub async fn media_stream(
    State(state): State<AppState>,
    Path(token): Path<String>,
    request: Request,
) -> Result<Response, AppError> {
    match state.store.open_media(&token).await? {
        MediaTarget::Remote(url) => {
            debug!("Redirecting media handle to remote source");
            Ok((StatusCode::TEMPORARY_REDIRECT, [(header::LOCATION, url)]).into_response())
        }
        MediaTarget::Local(path) => {
            let response = match ServeFile::new(&path).oneshot(request).await {
                Ok(response) => response,
                Err(never) => match never {},
            };
            if response.status() == StatusCode::NOT_FOUND {
                warn!(path = %path.display(), "Media file disappeared after resolve");
                return Err(AppError::NotFound);
            }
            Ok(response.into_response())
        }
    }
}

/// GET /api/media/root
pub async fn get_media_root(State(state): State<AppState>) -> Json<MediaRootResponse> {
    Json(MediaRootResponse {
        media_root: state
            .store
            .media_root()
            .await
            .map(|root| root.to_string_lossy().into_owned()),
    })
}

/// POST /api/media/root
/// Only routed when runtime media-root updates are enabled
#[instrument(name = "set_media_root", skip(state))]
pub async fn set_media_root(
    State(state): State<AppState>,
    Json(request): Json<MediaRootRequest>,
) -> Result<Json<MediaRootResponse>, AppError> {
    if request.path.trim().is_empty() {
        return Err(AppError::bad_request("path required"));
    }
    let root = state.store.set_media_root(&request.path).await?;
    Ok(Json(MediaRootResponse {
        media_root: Some(root.to_string_lossy().into_owned()),
    }))
}
