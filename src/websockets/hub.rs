use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::messages::ServerMessage;
use crate::room::models::{Role, RoomState};

/// Non-owning handle the hub keeps for one open session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub session_id: Uuid,
    pub room: String,
    pub identity: String,
    pub role: Role,
    sender: mpsc::Sender<String>,
    cancel: CancellationToken,
}

impl SessionHandle {
    pub fn new(
        room: String,
        identity: String,
        role: Role,
        sender: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            room,
            identity,
            role,
            sender,
            cancel,
        }
    }

    /// Queues a payload without waiting; fails if the queue is full or gone
    fn offer(&self, payload: String) -> Result<(), mpsc::error::TrySendError<String>> {
        self.sender.try_send(payload)
    }

    fn close(&self) {
        self.cancel.cancel();
    }
}

/// Per-room index of connected sessions and the fan-out over them.
///
/// Each session owns a bounded outbound queue drained by its own connection
/// loop; the hub only ever `try_send`s into it. A session whose queue is full
/// is disconnected instead of blocking the broadcaster.
pub struct BroadcastHub {
    // room -> session_id -> handle
    sessions: RwLock<HashMap<String, HashMap<Uuid, SessionHandle>>>,
    // room -> lock held from state acceptance through fan-out
    publishers: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    outbound_capacity: usize,
}

impl BroadcastHub {
    pub fn new(outbound_capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            publishers: Mutex::new(HashMap::new()),
            outbound_capacity: outbound_capacity.max(1),
        }
    }

    /// Capacity to use for each session's outbound queue
    pub fn outbound_capacity(&self) -> usize {
        self.outbound_capacity
    }

    /// Registers `session` and queues the bootstrap snapshot before any
    /// broadcast can reach it.
    ///
    /// The exclusive lock is held across `snapshot`, so a concurrent broadcast
    /// either lands before registration (and is covered by the snapshot) or
    /// after the snapshot in the queue.
    pub async fn register<F>(&self, session: SessionHandle, snapshot: F)
    where
        F: Future<Output = Option<RoomState>>,
    {
        let mut sessions = self.sessions.write().await;

        if let Some(state) = snapshot.await {
            match ServerMessage::room_state(state).to_json() {
                Ok(payload) => {
                    if session.offer(payload).is_err() {
                        warn!(session_id = %session.session_id, "Bootstrap snapshot could not be queued");
                    }
                }
                Err(e) => error!(error = %e, "Failed to serialize bootstrap snapshot"),
            }
        }

        info!(
            room = %session.room,
            session_id = %session.session_id,
            identity = %session.identity,
            role = ?session.role,
            "Session registered"
        );
        sessions
            .entry(session.room.clone())
            .or_default()
            .insert(session.session_id, session);
    }

    /// Removes a session; calling it twice is harmless
    pub async fn unregister(&self, room: &str, session_id: Uuid) {
        let mut sessions = self.sessions.write().await;
        if let Some(room_sessions) = sessions.get_mut(room) {
            if room_sessions.remove(&session_id).is_some() {
                debug!(room = %room, session_id = %session_id, "Session unregistered");
            }
            if room_sessions.is_empty() {
                sessions.remove(room);
            }
        }
    }

    /// Runs `accept` and broadcasts what it yields, one publisher per room at
    /// a time, so sessions see accepted states in acceptance order.
    ///
    /// `accept` may take store locks but must not call back into the hub.
    pub async fn publish<F, E>(&self, room: &str, accept: F) -> Result<usize, E>
    where
        F: Future<Output = Result<RoomState, E>>,
    {
        let publisher = self
            .publishers
            .lock()
            .await
            .entry(room.to_string())
            .or_default()
            .clone();
        let _turn = publisher.lock().await;

        let accepted = accept.await?;
        Ok(self.broadcast(room, &accepted).await)
    }

    /// Serializes `state` once and offers it to every session in `room`.
    ///
    /// Returns how many sessions accepted the payload.
    pub async fn broadcast(&self, room: &str, state: &RoomState) -> usize {
        let payload = match ServerMessage::room_state(state.clone()).to_json() {
            Ok(payload) => payload,
            Err(e) => {
                error!(room = %room, error = %e, "Failed to serialize room state");
                return 0;
            }
        };

        let mut delivered = 0;
        let mut dropped = Vec::new();
        {
            let sessions = self.sessions.read().await;
            let Some(room_sessions) = sessions.get(room) else {
                debug!(room = %room, "Broadcast to room with no sessions");
                return 0;
            };

            for handle in room_sessions.values() {
                match handle.offer(payload.clone()) {
                    Ok(()) => delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!(
                            room = %room,
                            session_id = %handle.session_id,
                            "Outbound queue full, disconnecting session"
                        );
                        handle.close();
                        dropped.push(handle.session_id);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        debug!(room = %room, session_id = %handle.session_id, "Session already gone");
                        dropped.push(handle.session_id);
                    }
                }
            }
        }

        for session_id in dropped {
            self.unregister(room, session_id).await;
        }

        debug!(room = %room, delivered = delivered, "Room state broadcast");
        delivered
    }

    /// Cancels and forgets every session registered under `room`
    pub async fn close_room(&self, room: &str) -> usize {
        self.publishers.lock().await.remove(room);
        let removed = self.sessions.write().await.remove(room);
        match removed {
            Some(room_sessions) => {
                for handle in room_sessions.values() {
                    handle.close();
                }
                info!(room = %room, closed = room_sessions.len(), "Closed sessions for evicted room");
                room_sessions.len()
            }
            None => 0,
        }
    }

    pub async fn session_count(&self, room: &str) -> usize {
        self.sessions
            .read()
            .await
            .get(room)
            .map(|room_sessions| room_sessions.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(
        hub: &BroadcastHub,
        room: &str,
    ) -> (SessionHandle, mpsc::Receiver<String>, CancellationToken) {
        let (tx, rx) = mpsc::channel(hub.outbound_capacity());
        let cancel = CancellationToken::new();
        let handle = SessionHandle::new(
            room.to_string(),
            Uuid::new_v4().to_string(),
            Role::Member,
            tx,
            cancel.clone(),
        );
        (handle, rx, cancel)
    }

    fn state(url: &str) -> RoomState {
        RoomState {
            url: url.to_string(),
            updated_at: 7,
            ..RoomState::default()
        }
    }

    #[tokio::test]
    async fn test_broadcast_reaches_only_target_room() {
        let hub = BroadcastHub::new(8);
        let (a, mut rx_a, _) = session(&hub, "r1");
        let (b, mut rx_b, _) = session(&hub, "r1");
        let (c, mut rx_c, _) = session(&hub, "r2");
        hub.register(a, async { None }).await;
        hub.register(b, async { None }).await;
        hub.register(c, async { None }).await;

        let delivered = hub.broadcast("r1", &state("x")).await;
        assert_eq!(delivered, 2);

        let payload_a = rx_a.try_recv().unwrap();
        let payload_b = rx_b.try_recv().unwrap();
        assert_eq!(payload_a, payload_b);
        assert!(payload_a.contains(r#""type":"room_state""#));
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_register_queues_snapshot_first() {
        let hub = BroadcastHub::new(8);
        let (a, mut rx, _) = session(&hub, "r1");
        hub.register(a, async { Some(state("snapshot")) }).await;
        hub.broadcast("r1", &state("later")).await;

        let first: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        let second: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(first["state"]["url"], "snapshot");
        assert_eq!(second["state"]["url"], "later");
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let hub = BroadcastHub::new(8);
        let (a, _rx, _) = session(&hub, "r1");
        let id = a.session_id;
        hub.register(a, async { None }).await;

        hub.unregister("r1", id).await;
        hub.unregister("r1", id).await;
        hub.unregister("unknown", id).await;
        assert_eq!(hub.session_count("r1").await, 0);
    }

    #[tokio::test]
    async fn test_full_queue_disconnects_only_slow_session() {
        let hub = BroadcastHub::new(1);
        let (slow, _rx_slow, slow_cancel) = session(&hub, "r1");
        let (fast, mut rx_fast, fast_cancel) = session(&hub, "r1");
        hub.register(slow, async { None }).await;
        hub.register(fast, async { None }).await;

        hub.broadcast("r1", &state("one")).await;
        rx_fast.try_recv().unwrap();
        let delivered = hub.broadcast("r1", &state("two")).await;

        assert_eq!(delivered, 1);
        assert!(slow_cancel.is_cancelled());
        assert!(!fast_cancel.is_cancelled());
        assert_eq!(hub.session_count("r1").await, 1);
        assert!(rx_fast.try_recv().unwrap().contains("two"));
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_pruned() {
        let hub = BroadcastHub::new(4);
        let (a, rx, _) = session(&hub, "r1");
        hub.register(a, async { None }).await;
        drop(rx);

        assert_eq!(hub.broadcast("r1", &state("x")).await, 0);
        assert_eq!(hub.session_count("r1").await, 0);
    }

    #[tokio::test]
    async fn test_publish_rejection_broadcasts_nothing() {
        let hub = BroadcastHub::new(4);
        let (a, mut rx, _) = session(&hub, "r1");
        hub.register(a, async { None }).await;

        let result = hub
            .publish("r1", async { Err::<RoomState, _>("rejected") })
            .await;
        assert_eq!(result, Err("rejected"));
        assert!(rx.try_recv().is_err());

        let delivered = hub.publish("r1", async { Ok::<_, ()>(state("x")) }).await;
        assert_eq!(delivered, Ok(1));
        assert!(rx.try_recv().unwrap().contains(r#""url":"x""#));
    }

    #[tokio::test]
    async fn test_publish_holds_room_turn_until_fan_out() {
        let hub = Arc::new(BroadcastHub::new(8));
        let (a, mut rx, _) = session(&hub, "r1");
        hub.register(a, async { None }).await;
        let (release, gate) = tokio::sync::oneshot::channel::<()>();

        let slow_hub = hub.clone();
        let slow = tokio::spawn(async move {
            slow_hub
                .publish("r1", async {
                    let _ = gate.await;
                    Ok::<_, ()>(state("first"))
                })
                .await
        });
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let fast_hub = hub.clone();
        let fast = tokio::spawn(async move {
            fast_hub
                .publish("r1", async { Ok::<_, ()>(state("second")) })
                .await
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());

        release.send(()).unwrap();
        slow.await.unwrap().unwrap();
        fast.await.unwrap().unwrap();
        assert!(rx.try_recv().unwrap().contains("first"));
        assert!(rx.try_recv().unwrap().contains("second"));
    }

    #[tokio::test]
    async fn test_close_room_cancels_sessions() {
        let hub = BroadcastHub::new(4);
        let (a, _rx_a, cancel_a) = session(&hub, "r1");
        let (b, _rx_b, cancel_b) = session(&hub, "r2");
        hub.register(a, async { None }).await;
        hub.register(b, async { None }).await;

        assert_eq!(hub.close_room("r1").await, 1);
        assert!(cancel_a.is_cancelled());
        assert!(!cancel_b.is_cancelled());
        assert_eq!(hub.close_room("r1").await, 0);
    }
}
