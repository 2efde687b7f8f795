// src/seed.rs
//
// Pinned reference records: events the sync engine protects across full
// resyncs. Two families exist — operator-placed manual markers and the
// photographed calibration seeds — both recognizable by id prefix.

use crate::coordinate_transform::CameraCalibration;
use crate::event_adapter::{AdaptOptions, EventAdapter};
use crate::geometry::{apply_homography, clamp01, compute_homography, Homography};
use crate::probe;
use crate::types::{Event, EventSource, ReferencePoint};
use serde_json::json;
use tracing::{debug, warn};

pub const MANUAL_MAP_EVENT_PREFIX: &str = "manual-map";
pub const PHOTO_SEED_EVENT_PREFIX: &str = "photo-log";
pub const DEFAULT_MANUAL_CAMERA_ID: &str = "camera-edge-01";

/// Reference points that become standing map events.
const PHOTO_SEED_LOG_TRACK_IDS: [i64; 6] = [0, 1, 2, 3, 5, 6];
/// Anchor subset for the photo-world calibration (widest floor spread).
const PHOTO_WORLD_ANCHOR_TRACK_IDS: [i64; 4] = [2, 6, 5, 1];

pub fn is_manual_map_event_id(event_id: &str) -> bool {
    event_id.starts_with(&format!("{}-", MANUAL_MAP_EVENT_PREFIX))
}

pub fn is_photo_seed_event_id(event_id: &str) -> bool {
    event_id.starts_with(&format!("{}-", PHOTO_SEED_EVENT_PREFIX))
}

/// Pinned records survive a replace-mode resync.
pub fn is_pinned_event_id(event_id: &str) -> bool {
    is_manual_map_event_id(event_id) || is_photo_seed_event_id(event_id)
}

// ============================================================================
// PHOTO SEED EVENTS
// ============================================================================

/// Build one pinned event per enabled reference point, staggered slightly in
/// time so the feed keeps a stable order. Every seed routes through the
/// adapter so canonical invariants hold for pinned records too.
pub fn build_photo_seed_events(
    adapter: &EventAdapter,
    reference_points: &[ReferencePoint],
    now: i64,
) -> Vec<Event> {
    let mut events = Vec::new();

    for (idx, point) in reference_points.iter().enumerate() {
        if !PHOTO_SEED_LOG_TRACK_IDS.contains(&point.track_id) {
            continue;
        }

        let record = json!({
            "eventId": format!("{}-{}", PHOTO_SEED_EVENT_PREFIX, point.track_id),
            "timestamp": now - (idx as i64) * 120,
            "camera_id": DEFAULT_MANUAL_CAMERA_ID,
            "track_id": format!("{}", point.track_id),
            "label": "person",
            "status": point.status,
            "eventType": "crowd",
            "severity": 2,
            "confidence": 0.97,
            "world": { "x": point.world[0], "z": point.world[1] },
            "note": format!(
                "{} pred({},{}) -> w({:.2},{:.2})",
                point.note, point.pred[0], point.pred[1], point.world[0], point.world[1]
            ),
        });

        let Some(normalized) = adapter.adapt_raw_event(
            &record,
            &AdaptOptions {
                fallback_store_id: Some("s001".to_string()),
                default_source: EventSource::Camera,
            },
        ) else {
            debug!(track_id = point.track_id, "photo seed rejected by adapter");
            continue;
        };

        let note = format!(
            "{} | model-norm({:.3},{:.3})",
            normalized.note.as_deref().unwrap_or_default(),
            normalized.x,
            normalized.y
        );
        events.push(Event {
            source: EventSource::Camera,
            object_label: Some("photo-ref".to_string()),
            raw_status: Some("photo_ref".to_string()),
            severity: 2,
            world_x_m: Some(point.world[0]),
            world_z_m: Some(point.world[1]),
            note: Some(note),
            ..normalized
        });
    }

    events
}

// ============================================================================
// MANUAL MARKERS
// ============================================================================

/// How the operator expressed a manual marker position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualCoordinateMode {
    /// Photo-referenced world meters (x, z).
    World,
    /// Camera-frame pixels (x, y).
    Pixel,
}

/// The composed photo-world -> floor-norm homography: each anchor's frame
/// pixel is mapped through the camera calibration, then the world -> norm
/// fit runs over those floor positions.
pub fn photo_world_to_norm_homography(
    reference_points: &[ReferencePoint],
    calibration: &CameraCalibration,
    camera_id: &str,
) -> Option<Homography> {
    if reference_points.len() < 4 {
        return None;
    }

    let anchors: Vec<&ReferencePoint> = {
        let preferred: Vec<&ReferencePoint> = PHOTO_WORLD_ANCHOR_TRACK_IDS
            .iter()
            .filter_map(|track_id| {
                reference_points
                    .iter()
                    .find(|point| point.track_id == *track_id)
            })
            .collect();
        if preferred.len() >= 4 {
            preferred
        } else {
            reference_points.iter().collect()
        }
    };

    let mut src_world = Vec::new();
    let mut dst_norm = Vec::new();
    for point in anchors {
        let Some((x, y)) = calibration.pixel_to_norm(camera_id, point.pred[0], point.pred[1])
        else {
            continue;
        };
        src_world.push([point.world[0], point.world[1]]);
        dst_norm.push([x, y]);
    }

    if src_world.len() < 4 {
        return None;
    }
    compute_homography(&src_world[..4], &dst_norm[..4])
}

/// Place an operator marker on the floor plan as a pinned event.
///
/// World mode projects photo-referenced meters through the composed
/// homography; pixel mode maps a camera-frame pixel through the per-camera
/// calibration. Returns None when the needed calibration is unavailable or
/// the adapter rejects the synthesized record.
#[allow(clippy::too_many_arguments)]
pub fn build_manual_map_event(
    adapter: &EventAdapter,
    calibration: &CameraCalibration,
    reference_points: &[ReferencePoint],
    marker_id: &str,
    camera_id: &str,
    mode: ManualCoordinateMode,
    coord_x: f64,
    coord_y: f64,
) -> Option<Event> {
    let camera_id = if camera_id.trim().is_empty() {
        DEFAULT_MANUAL_CAMERA_ID
    } else {
        camera_id
    };
    let event_id = format!("{}-{}", MANUAL_MAP_EVENT_PREFIX, marker_id);
    let track_id = format!("manual-{}", marker_id);

    let (norm_x, norm_y, note) = match mode {
        ManualCoordinateMode::World => {
            let h = photo_world_to_norm_homography(reference_points, calibration, camera_id)?;
            let (x, y) = apply_homography(&h, coord_x, coord_y)?;
            (
                clamp01(x),
                clamp01(y),
                format!("manual photo world ({:.2}, {:.2})", coord_x, coord_y),
            )
        }
        ManualCoordinateMode::Pixel => {
            let Some((x, y)) = calibration.pixel_to_norm(camera_id, coord_x, coord_y) else {
                warn!(camera_id, "no pixel calibration for manual marker");
                return None;
            };
            (x, y, format!("manual pixel ({:.1}, {:.1})", coord_x, coord_y))
        }
    };

    let record = json!({
        "eventId": event_id,
        "timestamp": probe::now_ms(),
        "eventType": "unknown",
        "severity": 2,
        "confidence": 0.99,
        "camera_id": camera_id,
        "track_id": track_id,
        "label": "manual-target",
        "status": "manual_target",
        "x_norm": norm_x,
        "y_norm": norm_y,
        "note": note,
    });

    let normalized = adapter.adapt_raw_event(
        &record,
        &AdaptOptions {
            fallback_store_id: Some("s001".to_string()),
            default_source: EventSource::Camera,
        },
    )?;

    Some(Event {
        severity: 2,
        confidence: normalized.confidence.max(0.95),
        raw_status: Some("manual_target".to_string()),
        world_x_m: if mode == ManualCoordinateMode::World {
            Some(coord_x)
        } else {
            normalized.world_x_m
        },
        world_z_m: if mode == ManualCoordinateMode::World {
            Some(coord_y)
        } else {
            normalized.world_z_m
        },
        ..normalized
    })
}
