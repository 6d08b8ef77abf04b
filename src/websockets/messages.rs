use serde::{Deserialize, Serialize};

use crate::room::models::RoomState;

/// Client -> Server envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    HostUpdate {
        #[serde(default)]
        state: Option<RoomState>,
    },
    MemberPing,
    /// Any tag we do not recognise
    #[serde(other)]
    Unknown,
}

/// Server -> Client envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    RoomState { state: RoomState },
    Error { error: String },
}

/// Why an inbound frame could not be acted on
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InboundError {
    #[error("invalid message format")]
    Malformed,
    #[error("unknown message type")]
    UnknownType,
    #[error("only host can update")]
    NotHost,
    #[error("state required")]
    MissingState,
    #[error("{0}")]
    Rejected(String),
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, InboundError> {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(ClientMessage::Unknown) => Err(InboundError::UnknownType),
            Ok(message) => Ok(message),
            Err(_) => Err(InboundError::Malformed),
        }
    }
}

impl ServerMessage {
    pub fn room_state(state: RoomState) -> Self {
        ServerMessage::RoomState { state }
    }

    pub fn error(error: impl Into<String>) -> Self {
        ServerMessage::Error {
            error: error.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<InboundError> for ServerMessage {
    fn from(err: InboundError) -> Self {
        ServerMessage::error(err.to_string())
    }
}
