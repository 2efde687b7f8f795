// src/config.rs

use crate::types::{CameraCalibrationDoc, Config, ReferencePoint, ZoneMapDoc};
use anyhow::{Context, Result};
use std::fs;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing config {}", path))?;
        Ok(config)
    }
}

impl ZoneMapDoc {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading zone map {}", path))?;
        let doc: ZoneMapDoc = serde_json::from_str(&contents)
            .with_context(|| format!("parsing zone map {}", path))?;
        anyhow::ensure!(!doc.zones.is_empty(), "zone map {} has no zones", path);
        anyhow::ensure!(
            doc.map.width > 0.0 && doc.map.height > 0.0,
            "zone map {} has non-positive extents",
            path
        );
        Ok(doc)
    }
}

pub fn load_reference_points(path: &str) -> Result<Vec<ReferencePoint>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading reference points {}", path))?;
    let points: Vec<ReferencePoint> = serde_json::from_str(&contents)
        .with_context(|| format!("parsing reference points {}", path))?;
    Ok(points)
}

pub fn load_camera_calibration(path: &str) -> Result<CameraCalibrationDoc> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading camera calibration {}", path))?;
    let doc: CameraCalibrationDoc = serde_json::from_str(&contents)
        .with_context(|| format!("parsing camera calibration {}", path))?;
    Ok(doc)
}
