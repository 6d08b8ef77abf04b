use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::hub::{BroadcastHub, SessionHandle};
use super::messages::{ClientMessage, InboundError, ServerMessage};
use super::socket::{Connection, MessageHandler, SocketWrapper};
use crate::room::models::Role;
use crate::room::store::RoomStore;
use crate::shared::AppError;

/// Lifecycle of one client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Credentials presented, not yet authorized
    Connecting,
    /// Authorized, registered with the hub, receive loop active
    Open,
    /// Receive loop exited
    Closing,
    /// Unregistered and transport released
    Closed,
}

/// Who is on the other end of a connection, as established by `authorize`
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub room: String,
    pub identity: String,
    pub role: Role,
}

/// Connection parameters as presented by the client
#[derive(Debug, Clone)]
pub struct SessionCredentials {
    pub room: String,
    pub password: String,
    pub identity: String,
}

/// Drives one connection through Connecting -> Open -> Closing -> Closed
pub struct ConnectionSession {
    store: Arc<RoomStore>,
    hub: Arc<BroadcastHub>,
    send_timeout: Duration,
    state: SessionState,
}

impl ConnectionSession {
    pub fn new(store: Arc<RoomStore>, hub: Arc<BroadcastHub>, send_timeout: Duration) -> Self {
        Self {
            store,
            hub,
            send_timeout,
            state: SessionState::Connecting,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Connecting -> Open precondition; nothing is registered on failure
    #[instrument(skip(self, credentials), fields(room = %credentials.room, identity = %credentials.identity))]
    pub async fn authorize(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<SessionContext, AppError> {
        if credentials.room.is_empty()
            || credentials.password.is_empty()
            || credentials.identity.is_empty()
        {
            return Err(AppError::bad_request("room, password, identity required"));
        }

        let role = self
            .store
            .authorize(&credentials.room, &credentials.password, &credentials.identity)
            .await
            .map_err(|e| {
                warn!(error = %e, "Connection authorization failed");
                e
            })?;

        Ok(SessionContext {
            room: credentials.room.clone(),
            identity: credentials.identity.clone(),
            role,
        })
    }

    /// Runs an authorized connection to completion and returns its final state
    pub async fn run(
        mut self,
        socket: Box<dyn SocketWrapper>,
        ctx: SessionContext,
    ) -> SessionState {
        let (outbound_sender, outbound_receiver) =
            mpsc::channel::<String>(self.hub.outbound_capacity());
        let cancel = CancellationToken::new();
        let handle = SessionHandle::new(
            ctx.room.clone(),
            ctx.identity.clone(),
            ctx.role,
            outbound_sender,
            cancel.clone(),
        );
        let session_id = handle.session_id;

        // Register first, snapshot under the same lock
        self.hub
            .register(handle, self.store.current_state(&ctx.room))
            .await;
        self.transition(SessionState::Open, session_id);

        let handler = Arc::new(SessionMessageHandler::new(
            self.store.clone(),
            self.hub.clone(),
            ctx.clone(),
        ));
        let connection = Connection::new(
            session_id,
            ctx.room.clone(),
            socket,
            outbound_receiver,
            handler,
            cancel,
            self.send_timeout,
        );

        match connection.run().await {
            Ok(reason) => {
                info!(room = %ctx.room, session_id = %session_id, reason = ?reason, "Connection closed");
            }
            Err(e) => {
                warn!(room = %ctx.room, session_id = %session_id, error = %e, "Connection error");
            }
        }
        self.transition(SessionState::Closing, session_id);

        self.hub.unregister(&ctx.room, session_id).await;
        self.transition(SessionState::Closed, session_id);
        self.state
    }

    fn transition(&mut self, next: SessionState, session_id: Uuid) {
        debug!(session_id = %session_id, from = ?self.state, to = ?next, "Session state change");
        self.state = next;
    }
}

/// Interprets inbound frames for one open session
pub struct SessionMessageHandler {
    store: Arc<RoomStore>,
    hub: Arc<BroadcastHub>,
    ctx: SessionContext,
}

impl SessionMessageHandler {
    pub fn new(store: Arc<RoomStore>, hub: Arc<BroadcastHub>, ctx: SessionContext) -> Self {
        Self { store, hub, ctx }
    }

    async fn dispatch(&self, message: ClientMessage) -> Result<(), InboundError> {
        match message {
            ClientMessage::HostUpdate { state } => {
                if !self.ctx.role.is_host() {
                    return Err(InboundError::NotHost);
                }
                let proposed = state.ok_or(InboundError::MissingState)?;
                self.hub
                    .publish(
                        &self.ctx.room,
                        self.store
                            .update_state(&self.ctx.room, &self.ctx.identity, proposed),
                    )
                    .await
                    .map_err(|e| InboundError::Rejected(e.to_string()))?;
                Ok(())
            }
            ClientMessage::MemberPing => {
                self.store.touch(&self.ctx.room, &self.ctx.identity).await;
                Ok(())
            }
            ClientMessage::Unknown => Err(InboundError::UnknownType),
        }
    }
}

#[async_trait]
impl MessageHandler for SessionMessageHandler {
    async fn handle_message(&self, message: String) -> Option<ServerMessage> {
        let result = match ClientMessage::parse(&message) {
            Ok(parsed) => self.dispatch(parsed).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => None,
            Err(e) => {
                warn!(
                    room = %self.ctx.room,
                    identity = %self.ctx.identity,
                    error = %e,
                    "Inbound message rejected"
                );
                Some(ServerMessage::from(e))
            }
        }
    }
}
