use serde::{Deserialize, Serialize};

/// A whole project as exchanged by `CMSG_UPLOAD_PROJECT` and
/// `SMSG_DOWNLOAD_PROJECT`. There is no delta form; every transfer carries
/// every scene.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default)]
    pub scenes: Vec<SceneData>,
}

/// One cue-sheet segment. Frame fields are absolute timeline positions; the
/// markers and zones it carries are positioned relative to `frame_start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneData {
    pub name: String,
    pub frame_start: f64,
    pub frame_final_duration: f64,
    #[serde(default)]
    pub markers: Vec<MarkerData>,
    #[serde(default)]
    pub zones: Vec<ZoneData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerData {
    pub name: String,
    #[serde(rename = "type")]
    pub marker_type: String,
    /// Milliseconds after the owning scene's start.
    pub position_ms: f64,
}

/// A projection zone. `channel_offset` is relative to the owning scene's
/// channel and may be negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneData {
    pub name: String,
    pub channel_offset: i32,
    pub offset_x: f64,
    pub offset_y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub rotation: f64,
    pub crop_min_x: f64,
    pub crop_min_y: f64,
    pub crop_max_x: f64,
    pub crop_max_y: f64,
    #[serde(default, with = "source_field")]
    pub source: Option<String>,
}

impl ZoneData {
    /// All floating point fields of the zone, paired with their wire names.
    pub fn numeric_fields(&self) -> [(&'static str, f64); 9] {
        [
            ("offset_x", self.offset_x),
            ("offset_y", self.offset_y),
            ("scale_x", self.scale_x),
            ("scale_y", self.scale_y),
            ("rotation", self.rotation),
            ("crop_min_x", self.crop_min_x),
            ("crop_min_y", self.crop_min_y),
            ("crop_max_x", self.crop_max_x),
            ("crop_max_y", self.crop_max_y),
        ]
    }
}

/// Maps the `"NONE"` sentinel to `None` and back.
mod source_field {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::NO_SOURCE;

    pub fn serialize<S>(source: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(source.as_deref().unwrap_or(NO_SOURCE))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.filter(|value| !value.is_empty() && value != NO_SOURCE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn zone(source: Option<&str>) -> ZoneData {
        ZoneData {
            name: "Cyc".into(),
            channel_offset: 1,
            offset_x: 0.0,
            offset_y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
            crop_min_x: 0.0,
            crop_min_y: 0.0,
            crop_max_x: 1.0,
            crop_max_y: 1.0,
            source: source.map(str::to_string),
        }
    }

    #[test]
    fn missing_source_serialises_as_sentinel() {
        let value = serde_json::to_value(zone(None)).expect("serialise");
        assert_eq!(value["source"], json!("NONE"));

        let value = serde_json::to_value(zone(Some("Camera 2"))).expect("serialise");
        assert_eq!(value["source"], json!("Camera 2"));
    }

    #[test]
    fn sentinel_and_null_source_parse_as_none() {
        let mut value = serde_json::to_value(zone(None)).expect("serialise");
        let parsed: ZoneData = serde_json::from_value(value.clone()).expect("parse");
        assert_eq!(parsed.source, None);

        value["source"] = serde_json::Value::Null;
        let parsed: ZoneData = serde_json::from_value(value.clone()).expect("parse");
        assert_eq!(parsed.source, None);

        value.as_object_mut().expect("object").remove("source");
        let parsed: ZoneData = serde_json::from_value(value).expect("parse");
        assert_eq!(parsed.source, None);
    }

    #[test]
    fn scene_lists_default_to_empty() {
        let scene: SceneData = serde_json::from_value(json!({
            "name": "Act1",
            "frame_start": 100,
            "frame_final_duration": 200
        }))
        .expect("parse");
        assert_eq!(scene.frame_start, 100.0);
        assert!(scene.markers.is_empty());
        assert!(scene.zones.is_empty());
    }

    #[test]
    fn project_name_is_omitted_when_absent() {
        let value = serde_json::to_value(ProjectData::default()).expect("serialise");
        assert_eq!(value, json!({ "scenes": [] }));
    }
}
