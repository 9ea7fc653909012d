//! Translation between the editor document and the wire project.
//!
//! Upload walks every synchronised scene and re-serialises it in full.
//! Download replaces every synchronised scene, marker and zone with the
//! incoming project; foreign strips and untagged markers outside any scene
//! are left alone.

use cue_wire::{MarkerData, ProjectData, SceneData, ZoneData, UNKNOWN_MARKER_TYPE};
use thiserror::Error;
use tracing::{debug, info};

use crate::model::{
    best_scene_channel, Crop, FrameRange, Marker, SceneIndex, Strip, TimelineHost,
    Transform, ZoneSettings,
};
use crate::timebase::{frames_to_millis, millis_to_frames, FrameRate};

#[derive(Debug, Error, PartialEq)]
pub enum ReconcileError {
    #[error("scene {scene}: field {field} is not a finite number")]
    NonFinite { scene: String, field: String },
    #[error("scene {scene}: duration {duration} is negative")]
    NegativeDuration { scene: String, duration: f64 },
    #[error("scene {scene}: field {field} value {value} is outside the timeline")]
    OutOfRange {
        scene: String,
        field: String,
        value: f64,
    },
}

/// Largest frame magnitude accepted from the wire. Sums of two such values
/// still fit in an `i64`.
pub const MAX_WIRE_FRAME: i64 = 1 << 40;

/// What a download replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub channel: i32,
    pub removed_scenes: usize,
    pub removed_markers: usize,
    pub removed_zones: usize,
    pub created_scenes: usize,
    pub created_markers: usize,
    pub created_zones: usize,
}

/// Serialises every synchronised scene with the markers and zones it owns.
/// Marker and zone positions become offsets from the scene start.
pub fn build_project<H: TimelineHost + ?Sized>(host: &H, fallback_name: &str) -> ProjectData {
    let rate = host.frame_rate();
    let index = SceneIndex::build(host);

    let scenes = index
        .entries()
        .iter()
        .filter_map(|entry| {
            let scene = host.strip(entry.scene)?;
            let markers = entry
                .markers
                .iter()
                .filter_map(|id| host.marker(*id))
                .map(|marker| MarkerData {
                    name: marker.name.clone(),
                    marker_type: marker
                        .marker_type
                        .clone()
                        .unwrap_or_else(|| UNKNOWN_MARKER_TYPE.to_string()),
                    position_ms: frames_to_millis(marker.frame - scene.frame_start, rate),
                })
                .collect();
            let zones = entry
                .zones
                .iter()
                .filter_map(|id| host.strip(*id))
                .filter_map(|strip| {
                    let settings = strip.zone_settings()?;
                    Some(zone_to_wire(strip, settings, scene.channel))
                })
                .collect();

            Some(SceneData {
                name: scene.name.clone(),
                frame_start: scene.frame_start as f64,
                frame_final_duration: scene.duration as f64,
                markers,
                zones,
            })
        })
        .collect();

    ProjectData {
        project_name: Some(
            host.project_name()
                .unwrap_or(fallback_name)
                .to_string(),
        ),
        scenes,
    }
}

fn zone_to_wire(strip: &Strip, settings: &ZoneSettings, scene_channel: i32) -> ZoneData {
    let Transform {
        offset_x,
        offset_y,
        scale_x,
        scale_y,
        rotation,
    } = settings.transform;
    let Crop {
        min_x,
        min_y,
        max_x,
        max_y,
    } = settings.crop;

    ZoneData {
        name: strip.name.clone(),
        channel_offset: strip.channel - scene_channel,
        offset_x,
        offset_y,
        scale_x,
        scale_y,
        rotation,
        crop_min_x: min_x,
        crop_min_y: min_y,
        crop_max_x: max_x,
        crop_max_y: max_y,
        source: settings.source.clone(),
    }
}

/// Replaces every synchronised entity in `host` with `project`.
///
/// The payload is validated in full before anything is removed, so a bad
/// project leaves the document untouched. The target channel is chosen
/// before deletion so that re-applying a project lands on the same channel.
pub fn apply_project<H: TimelineHost + ?Sized>(
    host: &mut H,
    project: &ProjectData,
) -> Result<ApplyReport, ReconcileError> {
    let rate = host.frame_rate();
    let channel = best_scene_channel(host);
    validate(project, rate, channel)?;
    let mut report = ApplyReport {
        channel,
        ..ApplyReport::default()
    };

    for entry in SceneIndex::build(host).entries() {
        for marker_id in &entry.markers {
            let tagged = host
                .marker(*marker_id)
                .is_some_and(|marker| marker.marker_type.is_some());
            if tagged && host.remove_marker(*marker_id).is_some() {
                report.removed_markers += 1;
            }
        }
        for zone_id in &entry.zones {
            if host.remove_strip(*zone_id).is_some() {
                report.removed_zones += 1;
            }
        }
        if host.remove_strip(entry.scene).is_some() {
            report.removed_scenes += 1;
        }
    }

    for scene in &project.scenes {
        materialise_scene(host, scene, channel, rate, &mut report);
    }

    if let Some(name) = &project.project_name {
        host.set_project_name(name);
    }

    info!(
        channel,
        removed_scenes = report.removed_scenes,
        created_scenes = report.created_scenes,
        created_markers = report.created_markers,
        created_zones = report.created_zones,
        "applied downloaded project"
    );
    Ok(report)
}

fn materialise_scene<H: TimelineHost + ?Sized>(
    host: &mut H,
    scene: &SceneData,
    channel: i32,
    rate: FrameRate,
    report: &mut ApplyReport,
) {
    let start = scene.frame_start.round() as i64;
    let duration = scene.frame_final_duration.round() as i64;
    host.insert_strip(Strip::scene(scene.name.clone(), channel, start, duration));
    report.created_scenes += 1;

    for marker in &scene.markers {
        let frame = start + millis_to_frames(marker.position_ms, rate);
        debug!(scene = %scene.name, marker = %marker.name, frame, "creating marker");
        host.insert_marker(Marker::new(
            marker.name.clone(),
            frame,
            Some(marker.marker_type.clone()),
        ));
        report.created_markers += 1;
    }

    let range = FrameRange::new(start, duration);
    for zone in &scene.zones {
        let settings = ZoneSettings {
            transform: Transform {
                offset_x: zone.offset_x,
                offset_y: zone.offset_y,
                scale_x: zone.scale_x,
                scale_y: zone.scale_y,
                rotation: zone.rotation,
            },
            crop: Crop {
                min_x: zone.crop_min_x,
                min_y: zone.crop_min_y,
                max_x: zone.crop_max_x,
                max_y: zone.crop_max_y,
            },
            source: zone.source.clone(),
        };
        host.insert_strip(Strip::zone(
            zone.name.clone(),
            channel + zone.channel_offset,
            range,
            settings,
        ));
        report.created_zones += 1;
    }
}

fn validate(project: &ProjectData, rate: FrameRate, channel: i32) -> Result<(), ReconcileError> {
    for scene in &project.scenes {
        let non_finite = |field: String| ReconcileError::NonFinite {
            scene: scene.name.clone(),
            field,
        };
        let out_of_range = |field: String, value: f64| ReconcileError::OutOfRange {
            scene: scene.name.clone(),
            field,
            value,
        };
        let frame_fits = |frames: f64| frames.round().abs() <= MAX_WIRE_FRAME as f64;

        if !scene.frame_start.is_finite() {
            return Err(non_finite("frame_start".into()));
        }
        if !scene.frame_final_duration.is_finite() {
            return Err(non_finite("frame_final_duration".into()));
        }
        if scene.frame_final_duration < 0.0 {
            return Err(ReconcileError::NegativeDuration {
                scene: scene.name.clone(),
                duration: scene.frame_final_duration,
            });
        }
        if !frame_fits(scene.frame_start) {
            return Err(out_of_range("frame_start".into(), scene.frame_start));
        }
        if !frame_fits(scene.frame_final_duration) {
            return Err(out_of_range(
                "frame_final_duration".into(),
                scene.frame_final_duration,
            ));
        }
        for marker in &scene.markers {
            let field = || format!("markers[{}].position_ms", marker.name);
            if !marker.position_ms.is_finite() {
                return Err(non_finite(field()));
            }
            if !frame_fits(marker.position_ms / rate.frame_millis()) {
                return Err(out_of_range(field(), marker.position_ms));
            }
        }
        for zone in &scene.zones {
            if let Some((field, _)) = zone
                .numeric_fields()
                .into_iter()
                .find(|(_, value)| !value.is_finite())
            {
                return Err(non_finite(format!("zones[{}].{field}", zone.name)));
            }
            if channel.checked_add(zone.channel_offset).is_none() {
                return Err(out_of_range(
                    format!("zones[{}].channel_offset", zone.name),
                    f64::from(zone.channel_offset),
                ));
            }
        }
    }
    Ok(())
}
