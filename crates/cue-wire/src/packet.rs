use serde::{Deserialize, Serialize};

use crate::{op, opcode_of, ProjectData, WireError, WireResult};

/// Messages sent from the editor link to the automation server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum ClientPacket {
    #[serde(rename = "CMSG_IDENTITY")]
    Identity { identity: u32 },
    #[serde(rename = "CMSG_LIST_SOURCES")]
    ListSources,
    #[serde(rename = "CMSG_LIST_SCENES")]
    ListScenes,
    #[serde(rename = "CMSG_GET_ACTIVE_SCENE")]
    GetActiveScene,
    #[serde(rename = "CMSG_UPLOAD_PROJECT")]
    UploadProject { project: ProjectData },
    #[serde(rename = "CMSG_DOWNLOAD_PROJECT")]
    DownloadProject,
}

impl ClientPacket {
    pub fn opcode(&self) -> &'static str {
        match self {
            ClientPacket::Identity { .. } => op::CMSG_IDENTITY,
            ClientPacket::ListSources => op::CMSG_LIST_SOURCES,
            ClientPacket::ListScenes => op::CMSG_LIST_SCENES,
            ClientPacket::GetActiveScene => op::CMSG_GET_ACTIVE_SCENE,
            ClientPacket::UploadProject { .. } => op::CMSG_UPLOAD_PROJECT,
            ClientPacket::DownloadProject => op::CMSG_DOWNLOAD_PROJECT,
        }
    }

    /// Encodes the packet as one JSON text frame: `{ "op": ..., ...payload }`.
    pub fn to_frame(&self) -> WireResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Messages received from the automation server. Opcodes this client does
/// not know decode to [`ServerPacket::Unknown`] and are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum ServerPacket {
    #[serde(rename = "SMSG_IDENTITY")]
    Identity,
    #[serde(rename = "SMSG_LIST_SOURCES")]
    ListSources {
        #[serde(default)]
        sources: Vec<String>,
    },
    #[serde(rename = "SMSG_LIST_SCENES")]
    ListScenes {
        #[serde(default)]
        scenes: Vec<String>,
    },
    #[serde(rename = "SMSG_GET_ACTIVE_SCENE")]
    ActiveScene {
        #[serde(default)]
        scene: Option<String>,
    },
    /// Project fields are merged into the envelope rather than nested.
    #[serde(rename = "SMSG_DOWNLOAD_PROJECT")]
    DownloadProject(ProjectData),
    #[serde(other)]
    Unknown,
}

impl ServerPacket {
    /// Decodes a message previously accepted by [`crate::parse_frame`].
    pub fn from_value(value: serde_json::Value) -> WireResult<Self> {
        let op = opcode_of(&value).ok_or(WireError::MissingOp)?.to_string();
        serde_json::from_value(value).map_err(|source| WireError::Payload { op, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse_frame, SceneData};
    use serde_json::json;

    #[test]
    fn client_packets_merge_opcode_into_payload() {
        let identity = ClientPacket::Identity { identity: 4 };
        let value: serde_json::Value =
            serde_json::from_str(&identity.to_frame().expect("encode")).expect("json");
        assert_eq!(value, json!({ "op": "CMSG_IDENTITY", "identity": 4 }));

        let value: serde_json::Value =
            serde_json::from_str(&ClientPacket::DownloadProject.to_frame().expect("encode"))
                .expect("json");
        assert_eq!(value, json!({ "op": "CMSG_DOWNLOAD_PROJECT" }));
    }

    #[test]
    fn upload_nests_project_under_key() {
        let packet = ClientPacket::UploadProject {
            project: ProjectData {
                project_name: Some("Show".into()),
                scenes: vec![],
            },
        };
        let value = serde_json::to_value(&packet).expect("encode");
        assert_eq!(value["op"], json!("CMSG_UPLOAD_PROJECT"));
        assert_eq!(value["project"]["project_name"], json!("Show"));
        assert_eq!(packet.opcode(), op::CMSG_UPLOAD_PROJECT);
    }

    #[test]
    fn download_reads_project_fields_from_envelope() {
        let frame = json!({
            "op": "SMSG_DOWNLOAD_PROJECT",
            "project_name": "Show",
            "scenes": [{
                "name": "Act1",
                "frame_start": 100,
                "frame_final_duration": 200,
                "markers": [{ "name": "CUE 1", "type": "cue", "position_ms": 500 }],
                "zones": []
            }]
        })
        .to_string();

        let value = parse_frame(&frame).expect("frame");
        let packet = ServerPacket::from_value(value).expect("decode");
        let ServerPacket::DownloadProject(project) = packet else {
            panic!("expected download, got {packet:?}");
        };
        assert_eq!(project.project_name.as_deref(), Some("Show"));
        let SceneData { name, markers, .. } = &project.scenes[0];
        assert_eq!(name, "Act1");
        assert_eq!(markers[0].marker_type, "cue");
        assert_eq!(markers[0].position_ms, 500.0);
    }

    #[test]
    fn identity_ignores_extra_fields() {
        let value = parse_frame(r#"{"op":"SMSG_IDENTITY","server":"krulabs"}"#).expect("frame");
        assert_eq!(ServerPacket::from_value(value).expect("decode"), ServerPacket::Identity);
    }

    #[test]
    fn unknown_opcodes_are_tolerated() {
        let value = parse_frame(r#"{"op":"SMSG_SOMETHING_NEW","x":1}"#).expect("frame");
        assert_eq!(ServerPacket::from_value(value).expect("decode"), ServerPacket::Unknown);
    }

    #[test]
    fn frames_without_opcode_are_rejected() {
        assert!(matches!(parse_frame(r#"{"scenes":[]}"#), Err(WireError::MissingOp)));
        assert!(matches!(parse_frame(r#"{"op":7}"#), Err(WireError::MissingOp)));
        assert!(matches!(parse_frame("not json"), Err(WireError::Json(_))));
    }

    #[test]
    fn bad_payload_reports_opcode() {
        let value = parse_frame(r#"{"op":"SMSG_LIST_SOURCES","sources":"cam"}"#).expect("frame");
        match ServerPacket::from_value(value) {
            Err(WireError::Payload { op, .. }) => assert_eq!(op, "SMSG_LIST_SOURCES"),
            other => panic!("expected payload error, got {other:?}"),
        }
    }
}
