use super::{FrameRange, MarkerId, StripId, StripKind, TimelineHost};

/// A scene together with the markers and zones that belong to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneEntry {
    pub scene: StripId,
    pub channel: i32,
    pub range: FrameRange,
    pub markers: Vec<MarkerId>,
    pub zones: Vec<StripId>,
}

/// Explicit scene ownership for markers and zones.
///
/// The editor only relates them by position: a marker belongs to a scene if
/// its frame lies in the scene's closed range, a zone if its start frame does.
/// The index resolves that once, giving each marker and zone to the first
/// scene in scan order that contains it, so overlapping scenes never both
/// claim the same entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneIndex {
    entries: Vec<SceneEntry>,
}

impl SceneIndex {
    pub fn build<H: TimelineHost + ?Sized>(host: &H) -> Self {
        let mut entries: Vec<SceneEntry> = host
            .scenes()
            .into_iter()
            .map(|(id, strip)| SceneEntry {
                scene: id,
                channel: strip.channel,
                range: strip.range(),
                markers: Vec::new(),
                zones: Vec::new(),
            })
            .collect();

        for (marker_id, marker) in host.markers() {
            if let Some(entry) = entries
                .iter_mut()
                .find(|entry| entry.range.contains(marker.frame))
            {
                entry.markers.push(marker_id);
            }
        }

        for (strip_id, strip) in host.strips() {
            if !matches!(strip.kind, StripKind::Zone(_)) {
                continue;
            }
            if let Some(entry) = entries
                .iter_mut()
                .find(|entry| entry.range.contains(strip.frame_start))
            {
                entry.zones.push(strip_id);
            }
        }

        Self { entries }
    }

    pub fn entries(&self) -> &[SceneEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn scene_of_marker(&self, marker: MarkerId) -> Option<StripId> {
        self.entries
            .iter()
            .find(|entry| entry.markers.contains(&marker))
            .map(|entry| entry.scene)
    }
}

/// Channel new scenes should be placed on: that of the first scene in scan
/// order, otherwise one above the highest occupied channel (1 when empty).
pub fn best_scene_channel<H: TimelineHost + ?Sized>(host: &H) -> i32 {
    let mut highest: Option<i32> = None;
    for (_, strip) in host.strips() {
        if strip.is_scene() {
            return strip.channel;
        }
        highest = Some(highest.map_or(strip.channel, |h| h.max(strip.channel)));
    }
    highest.map_or(1, |channel| channel + 1)
}

/// Lowest channel above `above` with no strip overlapping `range`.
pub fn next_free_channel<H: TimelineHost + ?Sized>(host: &H, above: i32, range: FrameRange) -> i32 {
    let strips = host.strips();
    let mut channel = above + 1;
    while strips
        .iter()
        .any(|(_, strip)| strip.channel == channel && strip.range().overlaps(&range))
    {
        channel += 1;
    }
    channel
}
