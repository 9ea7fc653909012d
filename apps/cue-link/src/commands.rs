//! Editor commands that create or tidy synchronised content.

use tracing::debug;

use crate::model::{
    best_scene_channel, next_free_channel, Marker, MarkerId, Strip, StripId,
    TimelineHost, ZoneSettings, CUE_MARKER_TYPE,
};
use crate::naming::{cue_name, next_cue_prefix};

/// Length of a scene created from the editor, in frames.
pub const DEFAULT_SCENE_DURATION: i64 = 14_400;

/// Adds a scene at the current frame on the best scene channel.
pub fn add_scene<H: TimelineHost + ?Sized>(host: &mut H, name: &str) -> StripId {
    let channel = best_scene_channel(host);
    let start = host.current_frame();
    let id = host.insert_strip(Strip::scene(name, channel, start, DEFAULT_SCENE_DURATION));
    debug!(scene = %name, channel, start, "added scene");
    id
}

/// Adds a cue marker at the current frame. With `auto_prefix` the name is
/// numbered after the closest earlier cue. The new marker ends up the only
/// selected one when numbering, since the scan deselects everything.
pub fn add_cue_marker<H: TimelineHost + ?Sized>(
    host: &mut H,
    text: &str,
    auto_prefix: bool,
) -> MarkerId {
    let frame = host.current_frame();
    let prefix = auto_prefix.then(|| next_cue_prefix(host, frame));
    let mut marker = Marker::new(cue_name(prefix, text), frame, Some(CUE_MARKER_TYPE.into()));
    marker.selected = true;
    host.insert_marker(marker)
}

/// Removes markers tagged `marker_type`. With `scene_only`, only those inside
/// a selected scene are removed. Returns how many were removed.
pub fn delete_markers<H: TimelineHost + ?Sized>(
    host: &mut H,
    marker_type: &str,
    scene_only: bool,
) -> usize {
    let ranges: Vec<_> = host
        .scenes()
        .into_iter()
        .filter(|(_, scene)| scene.selected)
        .map(|(_, scene)| scene.range())
        .collect();

    let doomed: Vec<MarkerId> = host
        .markers()
        .into_iter()
        .filter(|(_, marker)| marker.marker_type.as_deref() == Some(marker_type))
        .filter(|(_, marker)| !scene_only || ranges.iter().any(|r| r.contains(marker.frame)))
        .map(|(id, _)| id)
        .collect();

    doomed
        .into_iter()
        .filter(|id| host.remove_marker(*id).is_some())
        .count()
}

/// Selects exactly the markers inside selected scenes. Returns how many were
/// selected.
pub fn select_scene_markers<H: TimelineHost + ?Sized>(host: &mut H) -> usize {
    let ranges: Vec<_> = host
        .scenes()
        .into_iter()
        .filter(|(_, scene)| scene.selected)
        .map(|(_, scene)| scene.range())
        .collect();

    let mut selected = 0;
    for id in host.marker_ids() {
        if let Some(marker) = host.marker_mut(id) {
            marker.selected = ranges.iter().any(|r| r.contains(marker.frame));
            if marker.selected {
                selected += 1;
            }
        }
    }
    selected
}

/// Adds a zone spanning `scene` on the first free channel above it. Returns
/// `None` if `scene` is not a synchronised scene.
pub fn add_zone<H: TimelineHost + ?Sized>(
    host: &mut H,
    scene: StripId,
    name: &str,
) -> Option<StripId> {
    let (channel, range) = host
        .strip(scene)
        .filter(|strip| strip.is_scene())
        .map(|strip| (strip.channel, strip.range()))?;
    let zone_channel = next_free_channel(host, channel, range);
    debug!(zone = %name, channel = zone_channel, "added zone");
    Some(host.insert_strip(Strip::zone(name, zone_channel, range, ZoneSettings::default())))
}
