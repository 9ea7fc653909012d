//! Numeric prefixes for cue marker names (`"4 CUE fly out"`).

use crate::model::{MarkerId, TimelineHost};

/// Leading number of a marker name, or 0 when the name does not start with a
/// digit or the leading token does not parse.
pub fn marker_prefix(name: &str) -> f64 {
    if !name.starts_with(|c: char| c.is_ascii_digit()) {
        return 0.0;
    }
    let head = name.split(' ').next().unwrap_or_default();
    head.parse().unwrap_or(0.0)
}

/// Prefix for a cue added at `current_frame`: one more than the closest cue
/// strictly before it, or 1 if there is none.
///
/// Clears the selection of every marker as it scans.
pub fn next_cue_prefix<H: TimelineHost + ?Sized>(host: &mut H, current_frame: i64) -> u64 {
    let mut last_cue: Option<(i64, MarkerId)> = None;

    for id in host.marker_ids() {
        let Some(marker) = host.marker_mut(id) else {
            continue;
        };
        marker.selected = false;
        let closer = last_cue.map_or(true, |(frame, _)| frame < marker.frame);
        if marker.frame < current_frame && closer && marker.is_cue() {
            last_cue = Some((marker.frame, id));
        }
    }

    last_cue
        .and_then(|(_, id)| host.marker(id))
        .map(|marker| (marker_prefix(&marker.name).round().max(0.0) as u64).saturating_add(1))
        .unwrap_or(1)
}

pub fn cue_name(prefix: Option<u64>, text: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix} CUE {text}"),
        None => format!("CUE {text}"),
    }
}
