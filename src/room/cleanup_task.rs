use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::store::RoomStore;
use crate::config::ServerConfig;
use crate::websockets::BroadcastHub;

const MIN_CLEANUP_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for the cleanup task
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// How often to run the cleanup task
    pub cleanup_interval: Duration,
    /// How long a room must be inactive before deletion
    pub inactivity_threshold: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for CleanupConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            cleanup_interval: config.sweep_interval,
            inactivity_threshold: config.room_ttl,
        }
    }
}

/// What one sweep reclaimed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub evicted_rooms: Vec<String>,
    pub purged_tokens: usize,
    pub closed_sessions: usize,
}

/// Starts the background cleanup task that periodically removes inactive
/// rooms and expired media handles. Returns when `shutdown` is cancelled.
#[instrument(skip(store, hub, shutdown))]
pub async fn start_cleanup_task(
    store: Arc<RoomStore>,
    hub: Arc<BroadcastHub>,
    config: CleanupConfig,
    shutdown: CancellationToken,
) {
    info!(
        cleanup_interval_secs = config.cleanup_interval.as_secs(),
        inactivity_threshold_secs = config.inactivity_threshold.as_secs(),
        "Starting room cleanup background task"
    );

    // tokio rejects a zero period
    let period = config.cleanup_interval.max(MIN_CLEANUP_INTERVAL);
    let mut cleanup_interval = interval(period);
    cleanup_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // first tick completes immediately
    cleanup_interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Room cleanup task stopped");
                return;
            }
            _ = cleanup_interval.tick() => {
                let report = run_sweep(&store, &hub, Utc::now(), config.inactivity_threshold).await;
                if report.evicted_rooms.is_empty() && report.purged_tokens == 0 {
                    debug!("Sweep found nothing to reclaim");
                } else {
                    info!(
                        evicted_rooms = report.evicted_rooms.len(),
                        purged_tokens = report.purged_tokens,
                        closed_sessions = report.closed_sessions,
                        "Room cleanup completed"
                    );
                }
            }
        }
    }
}

/// One reclamation pass: evict idle rooms, close their sessions, drop
/// expired media handles.
///
/// Handles are purged by their own expiry only; evicting a room leaves its
/// still-valid handles usable.
pub async fn run_sweep(
    store: &RoomStore,
    hub: &BroadcastHub,
    now: DateTime<Utc>,
    inactivity_threshold: Duration,
) -> SweepReport {
    let evicted_rooms = store.evict_inactive_rooms(now, inactivity_threshold).await;

    let mut closed_sessions = 0;
    for room in &evicted_rooms {
        info!(room = %room, "Deleted inactive room");
        closed_sessions += hub.close_room(room).await;
    }

    let purged_tokens = store.purge_expired_tokens(now).await;

    SweepReport {
        evicted_rooms,
        purged_tokens,
        closed_sessions,
    }
}
