// Public API
pub use handler::{websocket_handler, WsQuery};
pub use hub::{BroadcastHub, SessionHandle};
pub use messages::{ClientMessage, InboundError, ServerMessage};
pub use session::{
    ConnectionSession, SessionContext, SessionCredentials, SessionMessageHandler, SessionState,
};
pub use socket::{Connection, DisconnectReason, MessageHandler, SocketError, SocketWrapper};

// Internal modules
mod handler;
mod hub;
mod messages;
mod session;
mod socket;
