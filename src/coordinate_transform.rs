// src/coordinate_transform.rs
//
// World-meter <-> normalized floor-plan mapping.
//
// The forward transform is a homography fitted once from the photographed
// reference points: each point pairs a camera-frame prediction (pixels) with
// a measured world position (meters). Four anchors give the projective fit;
// when the fit is unavailable or degenerate the mapping falls back to a
// centered affine approximation over the model reference extents.

use crate::geometry::{apply_homography, clamp01, compute_homography, Homography};
use crate::types::{CameraCalibrationDoc, ReferencePoint};
use std::collections::HashMap;
use tracing::{debug, warn};

pub const CAMERA_FRAME_WIDTH_PX: f64 = 1280.0;
pub const CAMERA_FRAME_HEIGHT_PX: f64 = 720.0;

/// Physical extents of the reference floor model, meters.
pub const MODEL_REF_WIDTH_M: f64 = 13.0;
pub const MODEL_REF_DEPTH_M: f64 = 15.12058;

/// Track ids whose photographed positions spread widest across the floor.
/// Used as calibration anchors when all four are present.
const PREFERRED_ANCHOR_TRACK_IDS: [i64; 4] = [2, 6, 5, 1];

pub struct CoordinateTransform {
    world_to_norm: Option<Homography>,
}

impl CoordinateTransform {
    /// Calibrate from the photographed reference points. Fewer than four
    /// usable points, or a singular fit, leaves only the affine fallback.
    pub fn new(reference_points: &[ReferencePoint]) -> Self {
        let world_to_norm = calibrate(reference_points);
        if world_to_norm.is_none() {
            warn!(
                "world->norm homography unavailable ({} reference points), using affine fallback",
                reference_points.len()
            );
        }
        Self { world_to_norm }
    }

    /// Transform with no calibration data at all. Affine fallback only.
    pub fn uncalibrated() -> Self {
        Self {
            world_to_norm: None,
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.world_to_norm.is_some()
    }

    /// World meters to normalized floor-plan coordinates, clamped to [0, 1].
    ///
    /// World Z is negated before projection. The calibration data was fitted
    /// under that convention; keep it, do not re-derive it.
    pub fn world_to_map_norm(&self, world_x: f64, world_z: f64) -> (f64, f64) {
        let source_x = world_x;
        let source_z = -world_z;

        if let Some(h) = &self.world_to_norm {
            if let Some((x, y)) = apply_homography(h, source_x, source_z) {
                return (clamp01(x), clamp01(y));
            }
            debug!(
                "homography projection degenerate at world ({:.2}, {:.2}), affine fallback",
                world_x, world_z
            );
        }

        (
            clamp01(source_x / MODEL_REF_WIDTH_M + 0.5),
            clamp01(source_z / MODEL_REF_DEPTH_M + 0.5),
        )
    }

    /// Inverse affine: normalized position back to world meters relative to
    /// the model reference extents (offsets are the caller's concern).
    pub fn norm_to_world(&self, norm_x: f64, norm_y: f64) -> (f64, f64) {
        (
            (clamp01(norm_x) - 0.5) * MODEL_REF_WIDTH_M,
            -((clamp01(norm_y) - 0.5) * MODEL_REF_DEPTH_M),
        )
    }
}

/// Normalized position to scene meters at an arbitrary physical scale.
/// Pure affine inverse used by the 3-D floor renderer.
pub fn map_norm_to_scene(norm_x: f64, norm_y: f64, width_m: f64, depth_m: f64) -> (f64, f64) {
    let width = if width_m.is_finite() && width_m > 0.0 {
        width_m
    } else {
        MODEL_REF_WIDTH_M
    };
    let depth = if depth_m.is_finite() && depth_m > 0.0 {
        depth_m
    } else {
        MODEL_REF_DEPTH_M
    };
    (
        (clamp01(norm_x) - 0.5) * width,
        (clamp01(norm_y) - 0.5) * depth,
    )
}

fn calibrate(reference_points: &[ReferencePoint]) -> Option<Homography> {
    if reference_points.len() < 4 {
        return None;
    }

    let by_track_id: HashMap<i64, &ReferencePoint> = reference_points
        .iter()
        .map(|point| (point.track_id, point))
        .collect();
    let preferred: Vec<&ReferencePoint> = PREFERRED_ANCHOR_TRACK_IDS
        .iter()
        .filter_map(|track_id| by_track_id.get(track_id).copied())
        .collect();
    let anchors: Vec<&ReferencePoint> = if preferred.len() >= 4 {
        preferred
    } else {
        reference_points.iter().collect()
    };

    let mut src = Vec::with_capacity(4);
    let mut dst = Vec::with_capacity(4);
    for point in &anchors {
        src.push([point.world[0], -point.world[1]]);
        dst.push([
            clamp01(point.pred[0] / CAMERA_FRAME_WIDTH_PX),
            clamp01(point.pred[1] / CAMERA_FRAME_HEIGHT_PX),
        ]);
    }

    if src.len() < 4 {
        return None;
    }
    compute_homography(&src[..4], &dst[..4])
}

// ============================================================================
// PER-CAMERA PIXEL CALIBRATION
// ============================================================================

/// Pixel -> map-norm homographies taken from the calibration document.
/// One row per camera; lookup is case-insensitive with a first-enabled
/// fallback so a lone calibrated camera covers unlabeled devices.
pub struct CameraCalibration {
    doc: CameraCalibrationDoc,
}

impl CameraCalibration {
    pub fn new(doc: CameraCalibrationDoc) -> Self {
        Self { doc }
    }

    pub fn empty() -> Self {
        Self {
            doc: CameraCalibrationDoc::default(),
        }
    }

    fn row_for(&self, camera_id: &str) -> Option<&crate::types::CameraCalibrationRow> {
        let key = camera_id.trim().to_lowercase();
        let enabled = |row: &&crate::types::CameraCalibrationRow| row.enabled != Some(false);
        self.doc
            .cameras
            .iter()
            .filter(enabled)
            .find(|row| row.camera_id.trim().to_lowercase() == key)
            .or_else(|| self.doc.cameras.iter().find(enabled))
    }

    pub fn pixel_to_norm_homography(&self, camera_id: &str) -> Option<Homography> {
        let row = self.row_for(camera_id)?;
        if row.image_points.len() < 4 || row.map_norm_points.len() < 4 {
            return None;
        }
        compute_homography(&row.image_points[..4], &row.map_norm_points[..4])
    }

    /// Map a camera-frame pixel onto the floor plan, clamped to [0, 1].
    pub fn pixel_to_norm(&self, camera_id: &str, pred_x: f64, pred_y: f64) -> Option<(f64, f64)> {
        let h = self.pixel_to_norm_homography(camera_id)?;
        let (x, y) = apply_homography(&h, pred_x, pred_y)?;
        Some((clamp01(x), clamp01(y)))
    }
}
