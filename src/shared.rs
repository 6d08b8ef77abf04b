use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

use crate::config::ServerConfig;
use crate::room::store::RoomStore;
use crate::websockets::BroadcastHub;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RoomStore>,
    pub hub: Arc<BroadcastHub>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(store: Arc<RoomStore>, hub: Arc<BroadcastHub>, config: Arc<ServerConfig>) -> Self {
        Self { store, hub, config }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("room password mismatch")]
    SecretMismatch,

    #[error("operation allowed for host only")]
    NotHost,

    #[error("identity is not a member of this room")]
    UnknownIdentity,

    #[error("media path forbidden")]
    MediaForbidden,

    #[error("room not found")]
    RoomNotFound,

    /// Unknown and expired media handles share this variant and message
    #[error("not found")]
    NotFound,

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        AppError::BadRequest(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::SecretMismatch
            | AppError::NotHost
            | AppError::UnknownIdentity
            | AppError::MediaForbidden => StatusCode::FORBIDDEN,
            AppError::RoomNotFound | AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let AppError::Internal(detail) = &self {
            error!(error = %detail, "Internal error while serving request");
        }

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
