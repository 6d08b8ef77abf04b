use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Role a joined identity holds inside its room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Member,
}

impl Role {
    pub fn from_is_host(is_host: bool) -> Self {
        if is_host {
            Role::Host
        } else {
            Role::Member
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self, Role::Host)
    }
}

/// Publishable playback descriptor
///
/// Every field has a default so partial updates from a host deserialize;
/// `updated_at` is always overwritten by the store on acceptance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomState {
    pub url: String,
    pub title: String,
    pub current_time: f64,
    pub duration: f64,
    pub paused: bool,
    pub playback_rate: f64,
    pub source_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    /// Unix milliseconds, stamped by the store
    pub updated_at: i64,
}

impl Default for RoomState {
    fn default() -> Self {
        Self {
            url: String::new(),
            title: String::new(),
            current_time: 0.0,
            duration: 0.0,
            paused: true,
            playback_rate: 1.0,
            source_type: String::new(),
            cover: None,
            updated_at: 0,
        }
    }
}

/// In-memory room record owned by the store
#[derive(Debug, Clone)]
pub struct Room {
    pub name: String,
    pub secret: String,
    /// Pinned at creation, never reassigned
    pub host_identity: String,
    /// identity -> last seen
    pub members: HashMap<String, DateTime<Utc>>,
    pub state: Option<RoomState>,
    /// Initialized to creation time so rooms that never publish still age out
    pub last_update: DateTime<Utc>,
}

impl Room {
    /// Creates a room whose creator is both host and first member
    pub fn new(name: String, secret: String, host_identity: String, now: DateTime<Utc>) -> Self {
        let mut members = HashMap::new();
        members.insert(host_identity.clone(), now);

        Self {
            name,
            secret,
            host_identity,
            members,
            state: None,
            last_update: now,
        }
    }

    pub fn is_host(&self, identity: &str) -> bool {
        self.host_identity == identity
    }

    pub fn has_member(&self, identity: &str) -> bool {
        self.members.contains_key(identity)
    }

    /// Latest of the last state update and every member's last-seen time
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.members
            .values()
            .copied()
            .fold(self.last_update, |latest, seen| latest.max(seen))
    }
}
