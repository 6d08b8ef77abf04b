use serde::{Deserialize, Serialize};

use super::models::Role;

/// Request payload for joining (or creating) a room
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct JoinRequest {
    pub room: String,
    pub password: String,
}

/// Response for a successful join
#[derive(Debug, Serialize, Deserialize)]
pub struct JoinResponse {
    pub identity: String,
    pub role: Role,
}
