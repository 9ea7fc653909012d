use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Marker, MarkerId, Strip, StripId, TimelineHost};
use crate::timebase::FrameRate;

/// Self-contained timeline document. Ids are handed out in creation order, so
/// scan order is creation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryTimeline {
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub frame_rate: FrameRate,
    #[serde(default)]
    pub current_frame: i64,
    #[serde(default)]
    strips: BTreeMap<StripId, Strip>,
    #[serde(default)]
    markers: BTreeMap<MarkerId, Marker>,
    #[serde(default)]
    next_id: u64,
}

impl MemoryTimeline {
    pub fn new(frame_rate: FrameRate) -> Self {
        Self {
            frame_rate,
            ..Self::default()
        }
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        let mut doc: Self = serde_json::from_str(text)?;
        let highest = doc
            .strips
            .keys()
            .map(|id| id.0)
            .chain(doc.markers.keys().map(|id| id.0))
            .max();
        if let Some(highest) = highest {
            doc.next_id = doc.next_id.max(highest + 1);
        }
        Ok(doc)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl TimelineHost for MemoryTimeline {
    fn frame_rate(&self) -> FrameRate {
        self.frame_rate
    }

    fn current_frame(&self) -> i64 {
        self.current_frame
    }

    fn project_name(&self) -> Option<&str> {
        self.project_name.as_deref()
    }

    fn set_project_name(&mut self, name: &str) {
        self.project_name = Some(name.to_string());
    }

    fn strip_ids(&self) -> Vec<StripId> {
        self.strips.keys().copied().collect()
    }

    fn strip(&self, id: StripId) -> Option<&Strip> {
        self.strips.get(&id)
    }

    fn strip_mut(&mut self, id: StripId) -> Option<&mut Strip> {
        self.strips.get_mut(&id)
    }

    fn insert_strip(&mut self, strip: Strip) -> StripId {
        let id = StripId(self.allocate());
        self.strips.insert(id, strip);
        id
    }

    fn remove_strip(&mut self, id: StripId) -> Option<Strip> {
        self.strips.remove(&id)
    }

    fn marker_ids(&self) -> Vec<MarkerId> {
        self.markers.keys().copied().collect()
    }

    fn marker(&self, id: MarkerId) -> Option<&Marker> {
        self.markers.get(&id)
    }

    fn marker_mut(&mut self, id: MarkerId) -> Option<&mut Marker> {
        self.markers.get_mut(&id)
    }

    fn insert_marker(&mut self, marker: Marker) -> MarkerId {
        let id = MarkerId(self.allocate());
        self.markers.insert(id, marker);
        id
    }

    fn remove_marker(&mut self, id: MarkerId) -> Option<Marker> {
        self.markers.remove(&id)
    }
}
