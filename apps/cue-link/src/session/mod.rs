//! Connection lifecycle for the editor link.
//!
//! The socket lives on a tokio worker. Everything it receives is parsed and
//! queued; the editor drains the queue from its own thread on each tick, so
//! document mutation never happens on a network task.

mod queue;
mod scheduler;
mod state;

pub use queue::InboundQueue;
pub use scheduler::{DrainScheduler, PollingScheduler};
pub use state::ConnectionState;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use cue_wire::{parse_frame, ClientPacket, ServerPacket, WireError};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{pipe_url, Config, ConfigError, SERVER_PORT_RANGE};
use crate::model::TimelineHost;
use crate::reconcile::{apply_project, build_project, ApplyReport, ReconcileError};
use crate::transport::{Connection, Connector, Outbound, SocketEvent, TransportError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("not connected to the automation server")]
    NotConnected,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Wire(#[from] WireError),
}

/// What a drain pass did with each dispatched message.
#[derive(Debug, PartialEq)]
pub enum SessionEvent {
    /// The server acknowledged our identity; source and scene lists were
    /// requested.
    Identified,
    Sources(Vec<String>),
    Scenes(Vec<String>),
    ActiveScene(Option<String>),
    ProjectApplied(ApplyReport),
    /// A downloaded project failed validation; the document is untouched.
    ProjectRejected(ReconcileError),
    /// A message carried a known opcode with a payload that did not decode.
    Rejected { reason: String },
}

/// Server-side state as last reported. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteView {
    pub sources: BTreeSet<String>,
    pub scenes: Vec<String>,
    pub active_scene: Option<String>,
}

#[derive(Debug, Default)]
struct Link {
    state: ConnectionState,
    /// Bumped on every connect and disconnect. Workers compare against it so
    /// a superseded socket cannot overwrite the state of its successor.
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
}

struct Shared {
    link: Mutex<Link>,
    queue: InboundQueue,
    remote: Mutex<RemoteView>,
    scheduler: Arc<dyn DrainScheduler>,
    drain_interval: Duration,
}

impl Shared {
    fn arm_tick(&self) {
        if !self.scheduler.is_registered() {
            self.scheduler.register(self.drain_interval);
        }
    }

    fn cancel_tick(&self) {
        if self.scheduler.is_registered() {
            self.scheduler.unregister();
        }
    }

    /// Promotes a freshly opened socket to the live one. Returns `false` if
    /// the attempt was superseded while it was connecting.
    fn open(
        &self,
        generation: u64,
        outbound: mpsc::UnboundedSender<Outbound>,
        identity: u32,
    ) -> bool {
        let mut link = self.link.lock();
        if link.generation != generation {
            return false;
        }
        link.state = ConnectionState::Connected;
        match (ClientPacket::Identity { identity }).to_frame() {
            Ok(frame) => {
                let _ = outbound.send(Outbound::Text(frame));
            }
            Err(err) => warn!(error = %err, "failed to encode identity"),
        }
        link.outbound = Some(outbound);
        self.arm_tick();
        true
    }

    /// Queues a message from the worker of `generation`. Messages from a
    /// superseded socket are dropped; the check and the push share the link
    /// lock, so nothing slips in after `connect` clears the queue.
    fn enqueue(&self, generation: u64, message: serde_json::Value) -> bool {
        let link = self.link.lock();
        if link.generation != generation {
            return false;
        }
        self.queue.push(message);
        true
    }

    fn fail(&self, generation: u64) {
        let mut link = self.link.lock();
        if link.generation == generation {
            link.state = ConnectionState::Failed;
            link.outbound = None;
        }
    }

    fn closed(&self, generation: u64) {
        let mut link = self.link.lock();
        if link.generation == generation {
            link.state = ConnectionState::Disconnected;
            link.outbound = None;
            self.cancel_tick();
        }
    }
}

/// The editor's link to one automation server at a time.
pub struct Session {
    config: Config,
    connector: Arc<dyn Connector>,
    runtime: Handle,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    pub fn new(
        config: Config,
        connector: Arc<dyn Connector>,
        scheduler: Arc<dyn DrainScheduler>,
        runtime: Handle,
    ) -> Self {
        let shared = Arc::new(Shared {
            link: Mutex::new(Link::default()),
            queue: InboundQueue::new(),
            remote: Mutex::new(RemoteView::default()),
            scheduler,
            drain_interval: config.drain_interval,
        });
        Self {
            config,
            connector,
            runtime,
            shared,
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.link.lock().state
    }

    pub fn remote(&self) -> RemoteView {
        self.shared.remote.lock().clone()
    }

    pub fn sources(&self) -> BTreeSet<String> {
        self.shared.remote.lock().sources.clone()
    }

    pub fn remote_scenes(&self) -> Vec<String> {
        self.shared.remote.lock().scenes.clone()
    }

    pub fn active_scene(&self) -> Option<String> {
        self.shared.remote.lock().active_scene.clone()
    }

    /// Messages received but not yet drained.
    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn connect_configured(&self) -> Result<(), SessionError> {
        let addr = self.config.server_addr.clone();
        self.connect(&addr, self.config.server_port)
    }

    /// Starts connecting to `ws://{addr}:{port}/pipe` and returns at once with
    /// the state set to `Connecting`. Any existing socket is closed first.
    pub fn connect(&self, addr: &str, port: u16) -> Result<(), SessionError> {
        if addr.trim().is_empty() {
            return Err(ConfigError::EmptyAddress.into());
        }
        if !SERVER_PORT_RANGE.contains(&port) {
            return Err(ConfigError::PortOutOfRange(port).into());
        }
        let url = pipe_url(addr, port)?;

        self.disconnect();
        *self.shared.remote.lock() = RemoteView::default();

        let generation = {
            let mut link = self.shared.link.lock();
            let stale = self.shared.queue.clear();
            if stale > 0 {
                debug!(stale, "discarded messages from previous connection");
            }
            link.generation += 1;
            link.state = ConnectionState::Connecting;
            link.generation
        };
        info!(%url, "connecting to automation server");

        let worker = self.runtime.spawn(run_link(
            Arc::clone(&self.shared),
            Arc::clone(&self.connector),
            url,
            self.config.connect_timeout,
            self.config.identity,
            generation,
        ));
        *self.worker.lock() = Some(worker);
        Ok(())
    }

    /// Closes the socket if there is one. Never fails; closing a dead socket
    /// is not an error.
    pub fn disconnect(&self) {
        let (outbound, previous) = {
            let mut link = self.shared.link.lock();
            link.generation += 1;
            let previous = std::mem::take(&mut link.state);
            (link.outbound.take(), previous)
        };
        if let Some(outbound) = outbound {
            if outbound.send(Outbound::Close).is_err() {
                debug!("socket was already gone");
            }
        }
        if let Some(worker) = self.worker.lock().take() {
            worker.abort();
        }
        self.shared.cancel_tick();
        if previous != ConnectionState::Disconnected {
            info!(from = %previous, "disconnected");
        }
    }

    /// Sends `packet` if connected; otherwise does nothing.
    pub fn send(&self, packet: &ClientPacket) {
        match self.try_send(packet) {
            Ok(()) => {}
            Err(SessionError::NotConnected) => {
                debug!(op = packet.opcode(), "not connected, dropping outbound message")
            }
            Err(err) => warn!(op = packet.opcode(), error = %err, "failed to send"),
        }
    }

    /// Like [`send`](Session::send) but reports when nothing was sent.
    pub fn try_send(&self, packet: &ClientPacket) -> Result<(), SessionError> {
        let link = self.shared.link.lock();
        let outbound = match (&link.outbound, link.state) {
            (Some(outbound), ConnectionState::Connected) => outbound,
            _ => return Err(SessionError::NotConnected),
        };
        let frame = packet.to_frame()?;
        outbound
            .send(Outbound::Text(frame))
            .map_err(|_| SessionError::NotConnected)?;
        debug!(op = packet.opcode(), "sent");
        Ok(())
    }

    pub fn request_sources(&self) -> Result<(), SessionError> {
        self.try_send(&ClientPacket::ListSources)
    }

    pub fn request_scenes(&self) -> Result<(), SessionError> {
        self.try_send(&ClientPacket::ListScenes)
    }

    pub fn request_active_scene(&self) -> Result<(), SessionError> {
        self.try_send(&ClientPacket::GetActiveScene)
    }

    /// Asks the server for its project. The reply is applied on a later drain.
    pub fn request_download(&self) -> Result<(), SessionError> {
        self.try_send(&ClientPacket::DownloadProject)
    }

    /// Serialises every synchronised scene in `host` and sends it as one
    /// upload. Returns the number of scenes sent.
    pub fn upload_project<H: TimelineHost + ?Sized>(&self, host: &H) -> Result<usize, SessionError> {
        if !self.state().is_connected() {
            return Err(SessionError::NotConnected);
        }
        let project = build_project(host, &self.config.project_name);
        let scenes = project.scenes.len();
        self.try_send(&ClientPacket::UploadProject { project })?;
        info!(scenes, "uploaded project");
        Ok(scenes)
    }

    /// Dispatches every message queued so far, in arrival order. Call from
    /// the thread that owns `host`.
    pub fn drain<H: TimelineHost + ?Sized>(&self, host: &mut H) -> Vec<SessionEvent> {
        let messages = self.shared.queue.drain();
        let mut events = Vec::with_capacity(messages.len());
        for message in messages {
            match ServerPacket::from_value(message) {
                Ok(packet) => events.extend(self.dispatch(packet, host)),
                Err(err) => {
                    warn!(error = %err, "discarding undecodable message");
                    events.push(SessionEvent::Rejected {
                        reason: err.to_string(),
                    });
                }
            }
        }
        events
    }

    /// Host loop for editors without a timer of their own: drains on every
    /// tick of `scheduler` until `done` accepts an event. The whole batch is
    /// reported before returning the first accepted event.
    pub async fn drain_until<H, F>(
        &self,
        scheduler: &PollingScheduler,
        host: &mut H,
        done: F,
    ) -> Result<SessionEvent, SessionError>
    where
        H: TimelineHost + ?Sized,
        F: Fn(&SessionEvent) -> bool,
    {
        loop {
            if scheduler.is_armed() {
                let mut accepted = None;
                for event in self.drain(host) {
                    if accepted.is_none() && done(&event) {
                        accepted = Some(event);
                    } else {
                        debug!(?event, "drained while waiting");
                    }
                }
                if let Some(event) = accepted {
                    return Ok(event);
                }
            }
            if !self.state().is_connected() {
                return Err(SessionError::NotConnected);
            }
            tokio::time::sleep(scheduler.interval()).await;
        }
    }

    fn dispatch<H: TimelineHost + ?Sized>(
        &self,
        packet: ServerPacket,
        host: &mut H,
    ) -> Option<SessionEvent> {
        match packet {
            ServerPacket::Identity => {
                self.send(&ClientPacket::ListSources);
                self.send(&ClientPacket::ListScenes);
                Some(SessionEvent::Identified)
            }
            ServerPacket::ListSources { sources } => {
                debug!(count = sources.len(), "sources updated");
                self.shared.remote.lock().sources = sources.iter().cloned().collect();
                Some(SessionEvent::Sources(sources))
            }
            ServerPacket::ListScenes { scenes } => {
                debug!(count = scenes.len(), "remote scenes updated");
                self.shared.remote.lock().scenes = scenes.clone();
                Some(SessionEvent::Scenes(scenes))
            }
            ServerPacket::ActiveScene { scene } => {
                self.shared.remote.lock().active_scene = scene.clone();
                Some(SessionEvent::ActiveScene(scene))
            }
            ServerPacket::DownloadProject(project) => match apply_project(host, &project) {
                Ok(report) => Some(SessionEvent::ProjectApplied(report)),
                Err(err) => {
                    warn!(error = %err, "rejected downloaded project");
                    Some(SessionEvent::ProjectRejected(err))
                }
            },
            ServerPacket::Unknown => {
                debug!("ignoring unknown opcode");
                None
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.disconnect();
    }
}

async fn run_link(
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    url: url::Url,
    connect_timeout: Duration,
    identity: u32,
    generation: u64,
) {
    let attempt = tokio::time::timeout(connect_timeout, connector.connect(&url))
        .await
        .unwrap_or(Err(TransportError::Timeout(connect_timeout)));
    let Connection {
        outbound,
        mut events,
    } = match attempt {
        Ok(connection) => connection,
        Err(err) => {
            warn!(%url, error = %err, "failed to connect");
            shared.fail(generation);
            return;
        }
    };

    if !shared.open(generation, outbound.clone(), identity) {
        let _ = outbound.send(Outbound::Close);
        return;
    }
    info!(%url, "connected");

    while let Some(event) = events.recv().await {
        match event {
            SocketEvent::Message(text) => match parse_frame(&text) {
                Ok(message) => {
                    if !shared.enqueue(generation, message) {
                        debug!("dropping message from superseded connection");
                        break;
                    }
                }
                Err(err) => warn!(error = %err, "dropping malformed message"),
            },
            SocketEvent::Closed { code, reason } => {
                info!(?code, %reason, "connection closed by server");
                break;
            }
        }
    }
    shared.closed(generation);
}
