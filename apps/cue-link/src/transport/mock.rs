//! In-process stand-in for the automation server, for driving a session
//! without a network.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{Connection, Connector, Outbound, SocketEvent, TransportError};

#[derive(Debug, Clone)]
enum Behaviour {
    Accept,
    Refuse(String),
    Stall,
}

/// Hands every accepted connection's server end to the test through the
/// receiver returned by [`MockConnector::new`].
#[derive(Clone)]
pub struct MockConnector {
    behaviour: Arc<Mutex<Behaviour>>,
    peers: mpsc::UnboundedSender<MockPeer>,
    urls: Arc<Mutex<Vec<String>>>,
}

impl MockConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MockPeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        (
            Self {
                behaviour: Arc::new(Mutex::new(Behaviour::Accept)),
                peers,
                urls: Arc::new(Mutex::new(Vec::new())),
            },
            rx,
        )
    }

    pub fn refuse(&self, reason: &str) {
        *self.behaviour.lock() = Behaviour::Refuse(reason.to_string());
    }

    /// Connect attempts never complete; only a timeout ends them.
    pub fn stall(&self) {
        *self.behaviour.lock() = Behaviour::Stall;
    }

    pub fn attempted_urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &url::Url) -> Result<Connection, TransportError> {
        self.urls.lock().push(url.to_string());
        let behaviour = self.behaviour.lock().clone();
        match behaviour {
            Behaviour::Accept => {
                let (outbound, sent) = mpsc::unbounded_channel();
                let (events_tx, events) = mpsc::unbounded_channel();
                let peer = MockPeer {
                    sent,
                    events: events_tx,
                };
                self.peers.send(peer).map_err(|_| TransportError::Closed)?;
                Ok(Connection { outbound, events })
            }
            Behaviour::Refuse(reason) => Err(TransportError::Refused(reason)),
            Behaviour::Stall => std::future::pending().await,
        }
    }
}

/// Server end of one mock connection.
pub struct MockPeer {
    sent: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<SocketEvent>,
}

impl MockPeer {
    pub fn push_text(&self, text: impl Into<String>) {
        let _ = self.events.send(SocketEvent::Message(text.into()));
    }

    pub fn push_json(&self, value: serde_json::Value) {
        self.push_text(value.to_string());
    }

    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.events.send(SocketEvent::Closed {
            code: Some(code),
            reason: reason.to_string(),
        });
    }

    /// Next frame the client sent, parsed as JSON. `None` once the client
    /// closed or dropped the socket.
    pub async fn next_json(&mut self) -> Option<serde_json::Value> {
        match self.sent.recv().await? {
            Outbound::Text(text) => serde_json::from_str(&text).ok(),
            Outbound::Close => None,
        }
    }

    /// Frames sent so far without waiting.
    pub fn drain_sent(&mut self) -> Vec<Outbound> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.sent.try_recv() {
            frames.push(frame);
        }
        frames
    }
}
