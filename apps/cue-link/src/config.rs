use std::env;
use std::ops::RangeInclusive;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1";
pub const DEFAULT_SERVER_PORT: u16 = 19531;
pub const DEFAULT_PROJECT_NAME: &str = "Untitled Project";
pub const SERVER_PORT_RANGE: RangeInclusive<u16> = 1024..=65535;

const PIPE_PATH: &str = "/pipe";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("server address must not be empty")]
    EmptyAddress,
    #[error("server port {0} is outside 1024-65535")]
    PortOutOfRange(u16),
    #[error("frame rate must be a positive finite number, got {0}")]
    InvalidFrameRate(f64),
    #[error("invalid server url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Settings the editor link needs to reach the automation server.
#[derive(Debug, Clone)]
pub struct Config {
    pub server_addr: String,
    pub server_port: u16,
    /// Name reported in uploads when the document has none of its own.
    pub project_name: String,
    /// Upper bound on a single connect attempt.
    pub connect_timeout: Duration,
    /// Cadence of the inbound queue drain tick.
    pub drain_interval: Duration,
    /// Bitmask announced in `CMSG_IDENTITY`.
    pub identity: u32,
}

impl Config {
    /// Load configuration from `CUE_LINK_*` environment variables, falling
    /// back to the defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let server_addr = env::var("CUE_LINK_SERVER_ADDR").unwrap_or(defaults.server_addr);
        let server_port = env::var("CUE_LINK_SERVER_PORT")
            .ok()
            .and_then(|val| val.parse().ok())
            .unwrap_or(defaults.server_port);
        let project_name = env::var("CUE_LINK_PROJECT_NAME").unwrap_or(defaults.project_name);
        let connect_timeout = env::var("CUE_LINK_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|val| val.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.connect_timeout);

        Self {
            server_addr,
            server_port,
            project_name,
            connect_timeout,
            ..defaults
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_addr.trim().is_empty() {
            return Err(ConfigError::EmptyAddress);
        }
        if !SERVER_PORT_RANGE.contains(&self.server_port) {
            return Err(ConfigError::PortOutOfRange(self.server_port));
        }
        self.server_url().map(|_| ())
    }

    /// `ws://{addr}:{port}/pipe`, with `localhost` pinned to IPv4.
    pub fn server_url(&self) -> Result<url::Url, ConfigError> {
        pipe_url(&self.server_addr, self.server_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_SERVER_ADDR.to_string(),
            server_port: DEFAULT_SERVER_PORT,
            project_name: DEFAULT_PROJECT_NAME.to_string(),
            connect_timeout: Duration::from_secs(5),
            drain_interval: Duration::from_millis(100),
            identity: cue_wire::identity::TIMELINE_EDITOR,
        }
    }
}

pub fn pipe_url(addr: &str, port: u16) -> Result<url::Url, ConfigError> {
    let host = if addr.trim().eq_ignore_ascii_case("localhost") {
        "127.0.0.1"
    } else {
        addr.trim()
    };
    let raw = format!("ws://{host}:{port}{PIPE_PATH}");
    url::Url::parse(&raw).map_err(|err| ConfigError::InvalidUrl {
        url: raw,
        reason: err.to_string(),
    })
}
