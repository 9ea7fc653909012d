//! Keeps a timeline editor's cue sheet in sync with a theatre automation
//! server over the `/pipe` WebSocket.

pub mod commands;
pub mod config;
pub mod model;
pub mod naming;
pub mod reconcile;
pub mod session;
pub mod telemetry;
pub mod timebase;
pub mod transport;

pub use config::Config;
pub use model::{MemoryTimeline, TimelineHost};
pub use session::{ConnectionState, PollingScheduler, Session, SessionError, SessionEvent};
pub use timebase::FrameRate;
