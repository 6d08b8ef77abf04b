use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::models::{Role, Room, RoomState};
use crate::config::ServerConfig;
use crate::media::broker::{
    canonicalize_within, is_remote_source, MediaHandle, MediaTarget, MediaTokenBroker,
};
use crate::shared::AppError;

/// Authoritative room, membership and media-handle state.
///
/// The room map and the media root each sit behind their own `RwLock`; the
/// handle map lives in the broker. Lookups take shared locks, mutations take
/// exclusive ones, and every value handed out is a copy.
pub struct RoomStore {
    rooms: RwLock<HashMap<String, Room>>,
    media_root: RwLock<Option<PathBuf>>,
    broker: MediaTokenBroker,
}

impl RoomStore {
    pub fn new(token_ttl: Duration) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            media_root: RwLock::new(None),
            broker: MediaTokenBroker::new(token_ttl),
        }
    }

    /// Builds a store and installs the configured media root, if any
    pub async fn from_config(config: &ServerConfig) -> Result<Self, AppError> {
        let store = Self::new(config.token_ttl);
        if let Some(root) = &config.media_root {
            store.set_media_root(&root.to_string_lossy()).await?;
        }
        Ok(store)
    }

    /// Joins `room_name`, creating it (with the caller as host) if unseen.
    ///
    /// Each call mints a fresh identity.
    #[instrument(skip(self, secret))]
    pub async fn join(&self, room_name: &str, secret: &str) -> Result<(String, Role), AppError> {
        let name = room_name.trim();
        let secret = secret.trim();
        if name.is_empty() || secret.is_empty() {
            return Err(AppError::bad_request("room name and password required"));
        }

        let identity = Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut rooms = self.rooms.write().await;

        match rooms.get_mut(name) {
            None => {
                rooms.insert(
                    name.to_string(),
                    Room::new(name.to_string(), secret.to_string(), identity.clone(), now),
                );
                info!(room = %name, identity = %identity, "Room created, joining identity is host");
                Ok((identity, Role::Host))
            }
            Some(room) => {
                if room.secret != secret {
                    warn!(room = %name, "Join rejected: password mismatch");
                    return Err(AppError::SecretMismatch);
                }
                room.members.insert(identity.clone(), now);
                let role = Role::from_is_host(room.is_host(&identity));
                info!(
                    room = %name,
                    identity = %identity,
                    member_count = room.members.len(),
                    "Identity joined room"
                );
                Ok((identity, role))
            }
        }
    }

    /// Re-validates credentials before a connection upgrade
    #[instrument(skip(self, secret))]
    pub async fn authorize(
        &self,
        room_name: &str,
        secret: &str,
        identity: &str,
    ) -> Result<Role, AppError> {
        let rooms = self.rooms.read().await;
        let room = rooms.get(room_name).ok_or(AppError::RoomNotFound)?;
        if room.secret != secret {
            return Err(AppError::SecretMismatch);
        }
        if !room.has_member(identity) {
            return Err(AppError::UnknownIdentity);
        }
        Ok(Role::from_is_host(room.is_host(identity)))
    }

    /// Refreshes a member's last-seen time; unknown room or identity is ignored
    pub async fn touch(&self, room_name: &str, identity: &str) {
        let mut rooms = self.rooms.write().await;
        if let Some(seen) = rooms
            .get_mut(room_name)
            .and_then(|room| room.members.get_mut(identity))
        {
            *seen = Utc::now();
            debug!(room = %room_name, identity = %identity, "Member touched");
        }
    }

    /// Accepts a host update, stamping the server time into it
    #[instrument(skip(self, proposed))]
    pub async fn update_state(
        &self,
        room_name: &str,
        identity: &str,
        proposed: RoomState,
    ) -> Result<RoomState, AppError> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(room_name).ok_or(AppError::RoomNotFound)?;
        if !room.is_host(identity) {
            warn!(room = %room_name, identity = %identity, "State update rejected: not host");
            return Err(AppError::NotHost);
        }

        let now = Utc::now();
        let accepted = RoomState {
            updated_at: now.timestamp_millis(),
            ..proposed
        };
        room.state = Some(accepted.clone());
        room.last_update = now;

        debug!(
            room = %room_name,
            updated_at = accepted.updated_at,
            paused = accepted.paused,
            current_time = accepted.current_time,
            "Room state accepted"
        );
        Ok(accepted)
    }

    pub async fn current_state(&self, room_name: &str) -> Option<RoomState> {
        let rooms = self.rooms.read().await;
        rooms.get(room_name).and_then(|room| room.state.clone())
    }

    /// Mints a handle for a host-supplied path or URL
    #[instrument(skip(self))]
    pub async fn resolve_media(
        &self,
        room_name: &str,
        identity: &str,
        raw_path: &str,
    ) -> Result<MediaHandle, AppError> {
        if raw_path.trim().is_empty() {
            return Err(AppError::bad_request("path required"));
        }

        {
            let rooms = self.rooms.read().await;
            let room = rooms.get(room_name).ok_or(AppError::RoomNotFound)?;
            if !room.is_host(identity) {
                warn!(room = %room_name, identity = %identity, "Media resolve rejected: not host");
                return Err(AppError::NotHost);
            }
        }

        let target = if is_remote_source(raw_path) {
            MediaTarget::Remote(raw_path.trim().to_string())
        } else {
            let root = self
                .media_root
                .read()
                .await
                .clone()
                .ok_or_else(|| AppError::bad_request("media root not configured"))?;
            let canonical = canonicalize_within(&root, raw_path).await.map_err(|e| {
                warn!(room = %room_name, error = %e, "Media path rejected");
                e
            })?;
            MediaTarget::Local(canonical)
        };

        Ok(self.broker.issue(room_name, target, Utc::now()).await)
    }

    /// Dereferences a handle; unknown and expired handles fail identically
    pub async fn open_media(&self, token: &str) -> Result<MediaTarget, AppError> {
        self.broker.open(token, Utc::now()).await
    }

    /// Installs a new media root after checking it is an existing directory
    #[instrument(skip(self))]
    pub async fn set_media_root(&self, raw: &str) -> Result<PathBuf, AppError> {
        let canonical = tokio::fs::canonicalize(Path::new(raw.trim()))
            .await
            .map_err(|_| AppError::bad_request("media root not found"))?;
        let meta = tokio::fs::metadata(&canonical)
            .await
            .map_err(|_| AppError::bad_request("media root not found"))?;
        if !meta.is_dir() {
            return Err(AppError::bad_request("media root must be a directory"));
        }

        *self.media_root.write().await = Some(canonical.clone());
        info!(media_root = %canonical.display(), "Media root installed");
        Ok(canonical)
    }

    pub async fn media_root(&self) -> Option<PathBuf> {
        self.media_root.read().await.clone()
    }

    /// Removes every room whose last activity is older than `inactivity`,
    /// returning the evicted names
    pub async fn evict_inactive_rooms(
        &self,
        now: DateTime<Utc>,
        inactivity: Duration,
    ) -> Vec<String> {
        let window =
            chrono::Duration::from_std(inactivity).unwrap_or_else(|_| chrono::Duration::days(365));
        let mut rooms = self.rooms.write().await;

        let evicted: Vec<String> = rooms
            .iter()
            .filter(|(_, room)| now - room.last_activity() > window)
            .map(|(name, _)| name.clone())
            .collect();

        for name in &evicted {
            rooms.remove(name);
            debug!(room = %name, "Room evicted");
        }
        evicted
    }

    pub async fn purge_expired_tokens(&self, now: DateTime<Utc>) -> usize {
        self.broker.purge_expired(now).await
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn token_count(&self) -> usize {
        self.broker.len().await
    }

    /// Copy of a room's host identity and member identities
    pub async fn membership(&self, room_name: &str) -> Option<(String, Vec<String>)> {
        let rooms = self.rooms.read().await;
        rooms.get(room_name).map(|room| {
            (
                room.host_identity.clone(),
                room.members.keys().cloned().collect(),
            )
        })
    }

    #[cfg(test)]
    pub(crate) async fn backdate_room(&self, room_name: &str, by: chrono::Duration) {
        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.get_mut(room_name) {
            room.last_update -= by;
            for seen in room.members.values_mut() {
                *seen -= by;
            }
        }
    }
}
