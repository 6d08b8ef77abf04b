#![allow(dead_code)] // Test utilities may not all be used in every test

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use syncroom::{
    AppError, AppState, BroadcastHub, ConnectionSession, Role, RoomStore, ServerConfig,
    SessionCredentials, SessionState,
};

use super::mocks::{mock_socket, MockPeer};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub const PASSWORD: &str = "pw";

pub struct TestSetup {
    pub store: Arc<RoomStore>,
    pub hub: Arc<BroadcastHub>,
    pub config: Arc<ServerConfig>,
}

/// A connected client: the peer end of its socket plus the running session
pub struct TestClient {
    pub identity: String,
    pub role: Role,
    pub peer: MockPeer,
    pub task: JoinHandle<SessionState>,
}

pub struct TestSetupBuilder {
    config: ServerConfig,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig {
                send_timeout: Duration::from_millis(200),
                ..ServerConfig::default()
            },
        }
    }

    pub fn with_outbound_capacity(mut self, capacity: usize) -> Self {
        self.config.outbound_capacity = capacity;
        self
    }

    pub fn with_media_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.media_root = Some(root.into());
        self
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.config.token_ttl = ttl;
        self
    }

    pub fn with_media_root_updates(mut self) -> Self {
        self.config.allow_media_root_update = true;
        self
    }

    pub async fn build(self) -> TestSetup {
        let store = RoomStore::from_config(&self.config)
            .await
            .expect("test config should be valid");
        TestSetup {
            store: Arc::new(store),
            hub: Arc::new(BroadcastHub::new(self.config.outbound_capacity)),
            config: Arc::new(self.config),
        }
    }
}

impl TestSetup {
    pub fn app_state(&self) -> AppState {
        AppState::new(self.store.clone(), self.hub.clone(), self.config.clone())
    }

    pub async fn join(&self, room: &str) -> (String, Role) {
        self.store
            .join(room, PASSWORD)
            .await
            .expect("join should succeed")
    }

    /// Authorizes and starts a session over a mock socket, returning once the
    /// hub has registered it
    pub async fn connect(
        &self,
        room: &str,
        password: &str,
        identity: &str,
    ) -> Result<TestClient, AppError> {
        let session = ConnectionSession::new(
            self.store.clone(),
            self.hub.clone(),
            self.config.send_timeout,
        );
        let ctx = session
            .authorize(&SessionCredentials {
                room: room.to_string(),
                password: password.to_string(),
                identity: identity.to_string(),
            })
            .await?;
        let role = ctx.role;

        let before = self.hub.session_count(room).await;
        let (socket, peer) = mock_socket();
        let task = tokio::spawn(session.run(Box::new(socket), ctx));
        wait_until(|| async move { self.hub.session_count(room).await > before }).await;

        Ok(TestClient {
            identity: identity.to_string(),
            role,
            peer,
            task,
        })
    }

    /// Joins and connects in one step
    pub async fn join_and_connect(&self, room: &str) -> TestClient {
        let (identity, _) = self.join(room).await;
        self.connect(room, PASSWORD, &identity)
            .await
            .expect("connect should succeed")
    }
}

/// Polls `condition` until it holds, panicking after one second
pub async fn wait_until<F, Fut>(condition: F)
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while !condition().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within one second"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
