//! Timeline document model.
//!
//! The editor owns the document; this crate only sees it through
//! [`TimelineHost`]. Scenes and zones are tagged strips, cue markers are
//! tagged point markers, and everything else on the timeline is foreign
//! content that must never be touched by synchronisation.

mod document;
mod memory;

pub use document::{best_scene_channel, next_free_channel, SceneEntry, SceneIndex};
pub use memory::MemoryTimeline;

use serde::{Deserialize, Serialize};

use crate::timebase::FrameRate;

/// Marker type tag given to markers created by the add-cue command.
pub const CUE_MARKER_TYPE: &str = "CUE";

/// Display color given to scene strips.
pub const SCENE_COLOR: [f32; 3] = [1.0, 0.5625, 0.0];
/// Display color given to zone strips.
pub const ZONE_COLOR: [f32; 3] = [0.0, 0.6, 1.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StripId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerId(pub u64);

/// Closed frame interval `[start, start + duration]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRange {
    pub start: i64,
    pub end: i64,
}

impl FrameRange {
    pub fn new(start: i64, duration: i64) -> Self {
        Self {
            start,
            end: start.saturating_add(duration),
        }
    }

    pub fn contains(&self, frame: i64) -> bool {
        frame >= self.start && frame <= self.end
    }

    pub fn overlaps(&self, other: &FrameRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub offset_x: f64,
    pub offset_y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub rotation: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            offset_x: 0.0,
            offset_y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Crop {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Default for Crop {
    fn default() -> Self {
        Self {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 0.0,
            max_y: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneSettings {
    pub transform: Transform,
    pub crop: Crop,
    pub source: Option<String>,
}

/// What a strip is, as far as synchronisation is concerned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StripKind {
    /// Content the editor owns that is not part of the cue sheet.
    #[default]
    Foreign,
    Scene,
    Zone(ZoneSettings),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strip {
    pub name: String,
    pub channel: i32,
    pub frame_start: i64,
    pub duration: i64,
    #[serde(flatten)]
    pub kind: StripKind,
    #[serde(default)]
    pub color: Option<[f32; 3]>,
    #[serde(default)]
    pub selected: bool,
}

impl Strip {
    pub fn scene(name: impl Into<String>, channel: i32, frame_start: i64, duration: i64) -> Self {
        Self {
            name: name.into(),
            channel,
            frame_start,
            duration,
            kind: StripKind::Scene,
            color: Some(SCENE_COLOR),
            selected: false,
        }
    }

    pub fn zone(
        name: impl Into<String>,
        channel: i32,
        range: FrameRange,
        settings: ZoneSettings,
    ) -> Self {
        Self {
            name: name.into(),
            channel,
            frame_start: range.start,
            duration: range.end - range.start,
            kind: StripKind::Zone(settings),
            color: Some(ZONE_COLOR),
            selected: false,
        }
    }

    pub fn range(&self) -> FrameRange {
        FrameRange::new(self.frame_start, self.duration)
    }

    pub fn is_scene(&self) -> bool {
        matches!(self.kind, StripKind::Scene)
    }

    pub fn zone_settings(&self) -> Option<&ZoneSettings> {
        match &self.kind {
            StripKind::Zone(settings) => Some(settings),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub name: String,
    pub frame: i64,
    /// Type tag; `None` for markers the editor created on its own.
    #[serde(default)]
    pub marker_type: Option<String>,
    #[serde(default)]
    pub selected: bool,
}

impl Marker {
    pub fn new(name: impl Into<String>, frame: i64, marker_type: Option<String>) -> Self {
        Self {
            name: name.into(),
            frame,
            marker_type,
            selected: false,
        }
    }

    pub fn is_cue(&self) -> bool {
        self.marker_type
            .as_deref()
            .is_some_and(|kind| kind.eq_ignore_ascii_case(CUE_MARKER_TYPE))
    }
}

/// The editor document as seen by the synchroniser. Implementations must
/// enumerate entities in a stable scan order; "first match" rules depend on it.
pub trait TimelineHost {
    fn frame_rate(&self) -> FrameRate;
    fn current_frame(&self) -> i64;
    fn project_name(&self) -> Option<&str>;
    fn set_project_name(&mut self, name: &str);

    fn strip_ids(&self) -> Vec<StripId>;
    fn strip(&self, id: StripId) -> Option<&Strip>;
    fn strip_mut(&mut self, id: StripId) -> Option<&mut Strip>;
    fn insert_strip(&mut self, strip: Strip) -> StripId;
    fn remove_strip(&mut self, id: StripId) -> Option<Strip>;

    fn marker_ids(&self) -> Vec<MarkerId>;
    fn marker(&self, id: MarkerId) -> Option<&Marker>;
    fn marker_mut(&mut self, id: MarkerId) -> Option<&mut Marker>;
    fn insert_marker(&mut self, marker: Marker) -> MarkerId;
    fn remove_marker(&mut self, id: MarkerId) -> Option<Marker>;

    fn strips(&self) -> Vec<(StripId, &Strip)> {
        self.strip_ids()
            .into_iter()
            .filter_map(|id| self.strip(id).map(|strip| (id, strip)))
            .collect()
    }

    fn markers(&self) -> Vec<(MarkerId, &Marker)> {
        self.marker_ids()
            .into_iter()
            .filter_map(|id| self.marker(id).map(|marker| (id, marker)))
            .collect()
    }

    /// Synchronised scene strips in scan order.
    fn scenes(&self) -> Vec<(StripId, &Strip)> {
        self.strips()
            .into_iter()
            .filter(|(_, strip)| strip.is_scene())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_is_closed_on_both_ends() {
        let range = FrameRange::new(100, 200);
        assert!(range.contains(100));
        assert!(range.contains(300));
        assert!(!range.contains(99));
        assert!(!range.contains(301));
    }

    #[test]
    fn ranges_touching_at_an_edge_overlap() {
        let a = FrameRange::new(0, 10);
        assert!(a.overlaps(&FrameRange::new(10, 5)));
        assert!(!a.overlaps(&FrameRange::new(11, 5)));
    }

    #[test]
    fn range_end_saturates() {
        let range = FrameRange::new(i64::MAX - 1, 10);
        assert_eq!(range.end, i64::MAX);
        assert!(range.contains(i64::MAX));
    }

    #[test]
    fn cue_detection_ignores_case() {
        assert!(Marker::new("1 CUE", 0, Some("CUE".into())).is_cue());
        assert!(Marker::new("1 CUE", 0, Some("cue".into())).is_cue());
        assert!(!Marker::new("note", 0, Some("NOTE".into())).is_cue());
        assert!(!Marker::new("plain", 0, None).is_cue());
    }
}
