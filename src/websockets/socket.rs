use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use uuid::Uuid;

use super::messages::ServerMessage;

/// Simple WebSocket abstraction - all we care about is send/receive
#[async_trait]
pub trait SocketWrapper: Send {
    /// Send a text message to the client
    async fn send_message(&mut self, message: String) -> Result<(), SocketError>;

    /// Receive the next text message from the client (None if connection closed)
    async fn receive_message(&mut self) -> Result<Option<String>, SocketError>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), SocketError>;
}

/// Handler for incoming WebSocket messages
///
/// Returning `Some` sends a direct reply to this connection only.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle_message(&self, message: String) -> Option<ServerMessage>;
}

#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}

/// Direct implementation on axum's WebSocket
#[async_trait]
impl SocketWrapper for WebSocket {
    async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
        self.send(Message::Text(message))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
        loop {
            match self.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // ping/pong are answered by axum; binary frames carry nothing for us
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(SocketError::ReceiveFailed(e.to_string())),
            }
        }
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        self.send(Message::Close(None))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }
}

/// Why a connection's run loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Peer sent a close frame or the stream ended
    PeerClosed,
    /// The hub cancelled the session (room evicted or queue overflow)
    Cancelled,
    /// Every sender for the outbound queue is gone
    OutboundClosed,
}

/// Connection represents a managed WebSocket connection.
///
/// All writes to the socket happen from this loop, so broadcast payloads and
/// direct error replies can never interleave on the wire.
pub struct Connection {
    pub session_id: Uuid,
    pub room: String,
    socket: Box<dyn SocketWrapper>,
    outbound_receiver: mpsc::Receiver<String>,
    message_handler: Arc<dyn MessageHandler>,
    cancel: CancellationToken,
    send_timeout: Duration,
}

impl Connection {
    pub fn new(
        session_id: Uuid,
        room: String,
        socket: Box<dyn SocketWrapper>,
        outbound_receiver: mpsc::Receiver<String>,
        message_handler: Arc<dyn MessageHandler>,
        cancel: CancellationToken,
        send_timeout: Duration,
    ) -> Self {
        Self {
            session_id,
            room,
            socket,
            outbound_receiver,
            message_handler,
            cancel,
            send_timeout,
        }
    }

    /// Run the connection - handles both sending and receiving until disconnect
    pub async fn run(mut self) -> Result<DisconnectReason, SocketError> {
        let reason = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break DisconnectReason::Cancelled,

                // Handle outbound messages (from our app to client)
                msg = self.outbound_receiver.recv() => {
                    match msg {
                        Some(message) => self.send_with_deadline(message).await?,
                        None => break DisconnectReason::OutboundClosed,
                    }
                }

                // Handle inbound messages (from client to our app)
                msg = self.socket.receive_message() => {
                    match msg {
                        Ok(Some(message)) => {
                            if let Some(reply) = self.message_handler.handle_message(message).await {
                                match reply.to_json() {
                                    Ok(json) => self.send_with_deadline(json).await?,
                                    Err(e) => error!(
                                        session_id = %self.session_id,
                                        error = %e,
                                        "Failed to serialize reply"
                                    ),
                                }
                            }
                        }
                        Ok(None) => break DisconnectReason::PeerClosed,
                        Err(e) => return Err(e),
                    }
                }
            }
        };

        // Clean disconnect
        let _ = self.socket.close().await;
        Ok(reason)
    }

    /// A send that misses its deadline is dropped, not retried
    async fn send_with_deadline(&mut self, message: String) -> Result<(), SocketError> {
        match tokio::time::timeout(self.send_timeout, self.socket.send_message(message)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    session_id = %self.session_id,
                    room = %self.room,
                    timeout_ms = self.send_timeout.as_millis() as u64,
                    "Outbound send exceeded deadline, message abandoned"
                );
                Ok(())
            }
        }
    }
}
