use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::shared::AppError;

/// 32 random bytes, hex encoded
const TOKEN_BYTES: usize = 32;

/// What a media handle dereferences to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaTarget {
    /// Canonical file path inside the media root
    Local(PathBuf),
    /// Upstream URL the dereference endpoint redirects to
    Remote(String),
}

impl MediaTarget {
    pub fn source_type(&self) -> &'static str {
        match self {
            MediaTarget::Local(_) => "file",
            MediaTarget::Remote(_) => "remote",
        }
    }
}

/// A minted handle
#[derive(Debug, Clone)]
pub struct MediaHandle {
    pub token: String,
    pub target: MediaTarget,
    pub room: String,
    pub expires_at: DateTime<Utc>,
}

impl MediaHandle {
    /// Valid strictly before expiry; use never extends it
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Issues and validates opaque media handles
pub struct MediaTokenBroker {
    tokens: RwLock<HashMap<String, MediaHandle>>,
    ttl: chrono::Duration,
}

impl MediaTokenBroker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365)),
        }
    }

    /// Mints and stores a handle expiring `ttl` after `now`
    #[instrument(skip(self, target))]
    pub async fn issue(&self, room: &str, target: MediaTarget, now: DateTime<Utc>) -> MediaHandle {
        let handle = MediaHandle {
            token: generate_token(),
            target,
            room: room.to_string(),
            expires_at: now
                .checked_add_signed(self.ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        self.tokens
            .write()
            .await
            .insert(handle.token.clone(), handle.clone());

        info!(
            room = %room,
            source_type = handle.target.source_type(),
            expires_at = %handle.expires_at,
            "Media handle issued"
        );
        handle
    }

    /// Resolves a token; unknown and expired tokens fail identically
    pub async fn open(&self, token: &str, now: DateTime<Utc>) -> Result<MediaTarget, AppError> {
        let tokens = self.tokens.read().await;
        match tokens.get(token) {
            Some(handle) if handle.is_valid_at(now) => Ok(handle.target.clone()),
            _ => {
                debug!("Media handle lookup failed");
                Err(AppError::NotFound)
            }
        }
    }

    /// Drops every handle whose expiry has passed, returning how many went
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, handle| handle.is_valid_at(now));
        before - tokens.len()
    }

    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }
}

/// Unguessable handle identifier (256 bits from the thread CSPRNG)
pub fn generate_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::random();
    hex::encode(bytes)
}

pub fn is_remote_source(raw: &str) -> bool {
    let lower = raw.trim().to_ascii_lowercase();
    ["http://", "https://"]
        .iter()
        .any(|scheme| lower.starts_with(scheme) && lower.len() > scheme.len())
}

/// Canonicalizes `raw` and requires it to be a regular file strictly inside `root`.
///
/// `root` must already be canonical. Relative inputs are taken relative to the
/// root. Containment is checked on the symlink- and `..`-resolved path, never
/// on the raw string.
pub async fn canonicalize_within(root: &Path, raw: &str) -> Result<PathBuf, AppError> {
    let candidate = Path::new(raw.trim());
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };

    let canonical = match tokio::fs::canonicalize(&joined).await {
        Ok(canonical) => canonical,
        // paths outside the root are forbidden whether or not they exist
        Err(_) => {
            let lexical = normalize_lexically(&joined);
            if lexical == root || !lexical.starts_with(root) {
                return Err(AppError::MediaForbidden);
            }
            return Err(AppError::bad_request("media path not found"));
        }
    };

    if canonical == root || !canonical.starts_with(root) {
        return Err(AppError::MediaForbidden);
    }

    let meta = tokio::fs::metadata(&canonical)
        .await
        .map_err(|_| AppError::bad_request("media path not found"))?;
    if meta.is_dir() {
        return Err(AppError::bad_request("path is a directory"));
    }

    Ok(canonical)
}

/// Resolves `.` and `..` without touching the filesystem
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
