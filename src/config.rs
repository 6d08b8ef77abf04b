use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_ROOM_TTL_SECS: u64 = 30 * 60;
const DEFAULT_TOKEN_TTL_SECS: u64 = 60 * 60;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_SEND_TIMEOUT_SECS: u64 = 5;
const DEFAULT_OUTBOUND_CAPACITY: usize = 64;

/// Process-wide configuration, read once at startup
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Directory that local media handles must resolve inside of
    pub media_root: Option<PathBuf>,
    /// How long a room may sit without updates or pings before eviction
    pub room_ttl: Duration,
    /// Lifetime of a media handle from the moment it is minted
    pub token_ttl: Duration,
    /// How often the reclamation sweep runs
    pub sweep_interval: Duration,
    /// Deadline for a single outbound websocket send
    pub send_timeout: Duration,
    /// Per-session outbound queue bound; a full queue disconnects the session
    pub outbound_capacity: usize,
    /// Mounts `POST /api/media/root` when true
    pub allow_media_root_update: bool,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let media_root = std::env::var("MEDIA_ROOT")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Self {
            listen_addr: std::env::var("SYNC_LISTEN_ADDR")
                .unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string()),
            media_root,
            room_ttl: Duration::from_secs(env_or("ROOM_TTL_SECS", DEFAULT_ROOM_TTL_SECS)),
            token_ttl: Duration::from_secs(env_or("TOKEN_TTL_SECS", DEFAULT_TOKEN_TTL_SECS)),
            sweep_interval: Duration::from_secs(env_nonzero(
                "SWEEP_INTERVAL_SECS",
                DEFAULT_SWEEP_INTERVAL_SECS,
            )),
            send_timeout: Duration::from_secs(env_nonzero(
                "WS_SEND_TIMEOUT_SECS",
                DEFAULT_SEND_TIMEOUT_SECS,
            )),
            outbound_capacity: env_or("WS_OUTBOUND_CAPACITY", DEFAULT_OUTBOUND_CAPACITY).max(1),
            allow_media_root_update: env_flag("ALLOW_MEDIA_ROOT_UPDATE"),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            media_root: None,
            room_ttl: Duration::from_secs(DEFAULT_ROOM_TTL_SECS),
            token_ttl: Duration::from_secs(DEFAULT_TOKEN_TTL_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            send_timeout: Duration::from_secs(DEFAULT_SEND_TIMEOUT_SECS),
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            allow_media_root_update: false,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key = %key, value = %raw, "Unparseable config value, using default");
            default
        }),
        Err(_) => default,
    }
}

/// Like `env_or`, but zero is rejected in favour of the default
fn env_nonzero(key: &str, default: u64) -> u64 {
    match env_or(key, default) {
        0 => {
            warn!(key = %key, "Zero is not a valid value here, using default");
            default
        }
        value => value,
    }
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
