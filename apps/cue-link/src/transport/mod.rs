use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

pub mod mock;
pub mod websocket;

pub use websocket::WebSocketConnector;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),
    #[error("connection refused: {0}")]
    Refused(String),
    #[error("socket already closed")]
    Closed,
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),
}

/// Frames travelling from the session to the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Close,
}

/// What the socket reports back to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Message(String),
    Closed { code: Option<u16>, reason: String },
}

/// An open socket, split into the half the session writes to and the half
/// it reads events from. Dropping `outbound` closes the socket.
#[derive(Debug)]
pub struct Connection {
    pub outbound: mpsc::UnboundedSender<Outbound>,
    pub events: mpsc::UnboundedReceiver<SocketEvent>,
}

/// Opens sockets to the automation server.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &url::Url) -> Result<Connection, TransportError>;
}
