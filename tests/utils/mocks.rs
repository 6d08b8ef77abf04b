#![allow(dead_code)] // Test utilities may not all be used in every test

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use syncroom::{SocketError, SocketWrapper};

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// In-memory socket: inbound frames come from a channel, sent frames are recorded
pub struct MockSocket {
    inbound: mpsc::UnboundedReceiver<Option<String>>,
    sent: Arc<RwLock<Vec<String>>>,
    closed: Arc<RwLock<bool>>,
}

/// The test's end of a `MockSocket`
#[derive(Clone)]
pub struct MockPeer {
    inbound: mpsc::UnboundedSender<Option<String>>,
    sent: Arc<RwLock<Vec<String>>>,
    closed: Arc<RwLock<bool>>,
}

pub fn mock_socket() -> (MockSocket, MockPeer) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sent = Arc::new(RwLock::new(Vec::new()));
    let closed = Arc::new(RwLock::new(false));
    (
        MockSocket {
            inbound: rx,
            sent: sent.clone(),
            closed: closed.clone(),
        },
        MockPeer {
            inbound: tx,
            sent,
            closed,
        },
    )
}

#[async_trait]
impl SocketWrapper for MockSocket {
    async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
        self.sent.write().await.push(message);
        Ok(())
    }

    async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
        match self.inbound.recv().await {
            Some(frame) => Ok(frame),
            // test dropped its peer: behave like an idle client
            None => futures::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        *self.closed.write().await = true;
        Ok(())
    }
}

impl MockPeer {
    /// Deliver a text frame as if the client sent it
    pub fn send(&self, frame: impl Into<String>) {
        let _ = self.inbound.send(Some(frame.into()));
    }

    /// Deliver a close frame
    pub fn hang_up(&self) {
        let _ = self.inbound.send(None);
    }

    pub async fn sent_messages(&self) -> Vec<String> {
        self.sent.read().await.clone()
    }

    pub async fn is_closed(&self) -> bool {
        *self.closed.read().await
    }
}
