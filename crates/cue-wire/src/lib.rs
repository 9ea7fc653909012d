//! Message shapes spoken on the `/pipe` WebSocket between the cue-sheet
//! editor link and the theatre automation server. Every message is a single
//! JSON object whose `op` field names the operation; the remaining fields are
//! the payload for that operation.

mod packet;
mod project;

pub use packet::{ClientPacket, ServerPacket};
pub use project::{MarkerData, ProjectData, SceneData, ZoneData};

use thiserror::Error;

/// Operation codes carried in the `op` field.
pub mod op {
    pub const CMSG_IDENTITY: &str = "CMSG_IDENTITY";
    pub const SMSG_IDENTITY: &str = "SMSG_IDENTITY";
    pub const CMSG_LIST_SOURCES: &str = "CMSG_LIST_SOURCES";
    pub const SMSG_LIST_SOURCES: &str = "SMSG_LIST_SOURCES";
    pub const CMSG_LIST_SCENES: &str = "CMSG_LIST_SCENES";
    pub const SMSG_LIST_SCENES: &str = "SMSG_LIST_SCENES";
    pub const CMSG_GET_ACTIVE_SCENE: &str = "CMSG_GET_ACTIVE_SCENE";
    pub const SMSG_GET_ACTIVE_SCENE: &str = "SMSG_GET_ACTIVE_SCENE";
    pub const CMSG_UPLOAD_PROJECT: &str = "CMSG_UPLOAD_PROJECT";
    pub const CMSG_DOWNLOAD_PROJECT: &str = "CMSG_DOWNLOAD_PROJECT";
    pub const SMSG_DOWNLOAD_PROJECT: &str = "SMSG_DOWNLOAD_PROJECT";
}

/// Bits announced in `CMSG_IDENTITY` describing what kind of client connected.
pub mod identity {
    pub const CONTROLLER: u32 = 1 << 0;
    pub const PROJECTOR: u32 = 1 << 1;
    pub const TIMELINE_EDITOR: u32 = 1 << 2;
}

/// Wire value of a zone that is not bound to any source.
pub const NO_SOURCE: &str = "NONE";

/// Marker type reported for markers that carry no type tag.
pub const UNKNOWN_MARKER_TYPE: &str = "UNKNOWN";

#[derive(Debug, Error)]
pub enum WireError {
    #[error("message is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message has no string `op` field")]
    MissingOp,
    #[error("malformed {op} payload: {source}")]
    Payload {
        op: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type WireResult<T> = Result<T, WireError>;

/// Parses one inbound text frame into a JSON object, checking that it carries
/// an opcode. Payload validation is deferred to [`ServerPacket::from_value`].
pub fn parse_frame(text: &str) -> WireResult<serde_json::Value> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    if opcode_of(&value).is_none() {
        return Err(WireError::MissingOp);
    }
    Ok(value)
}

/// Returns the `op` field of a message if it is present and a string.
pub fn opcode_of(value: &serde_json::Value) -> Option<&str> {
    value.get("op").and_then(serde_json::Value::as_str)
}
