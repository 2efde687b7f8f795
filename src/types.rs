// src/types.rs

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub feed: FeedConfig,
    pub data: DataConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub input_dir: String,
    pub output_dir: String,
    /// Upper bound on the retained event set. Clamped to [1, 1000] at use.
    pub max_events: usize,
    pub fallback_store_id: String,
    /// Source tag applied to records that carry no recognizable origin.
    pub default_source: String,
    /// Install the photographed reference points as pinned map events at startup.
    pub seed_reference_events: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub zone_map_path: String,
    pub reference_points_path: String,
    pub camera_calibration_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed: FeedConfig {
                input_dir: "feed_in".to_string(),
                output_dir: "feed_out".to_string(),
                max_events: 300,
                fallback_store_id: "s001".to_string(),
                default_source: "api".to_string(),
                seed_reference_events: true,
            },
            data: DataConfig {
                zone_map_path: "data/zone_map_s001.json".to_string(),
                reference_points_path: "data/photo_reference_points.json".to_string(),
                camera_calibration_path: "data/camera_calibration.json".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

// ============================================================================
// CANONICAL EVENT MODEL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Crowd,
    Fall,
    Fight,
    Loitering,
    Unknown,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crowd => "crowd",
            Self::Fall => "fall",
            Self::Fight => "fight",
            Self::Loitering => "loitering",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    New,
    Ack,
    Resolved,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Ack => "ack",
            Self::Resolved => "resolved",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    Demo,
    Camera,
    Api,
    Unknown,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Demo => "demo",
            Self::Camera => "camera",
            Self::Api => "api",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentAction {
    Detected,
    Ack,
    Dispatch,
    Resolved,
}

/// One normalized telemetry record placed on the floor plan.
///
/// Constructed only by the event adapter; `x`/`y` are always inside [0, 1]
/// and `severity` inside {1, 2, 3} by the time a value of this type exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub store_id: String,
    /// Epoch ms, when the model detected the event.
    pub detected_at: i64,
    /// Epoch ms, when the platform received it.
    pub ingested_at: i64,
    /// ingested_at - detected_at, floored at zero.
    pub latency_ms: i64,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub severity: u8,
    pub confidence: f64,
    pub zone_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_status: Option<String>,
    pub source: EventSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    pub incident_status: IncidentStatus,
    /// Normalized floor-plan position, 0..1.
    pub x: f64,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub world_x_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub world_z_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Append-only audit record owned by the incident-management layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentTimelineEntry {
    pub id: String,
    pub event_id: String,
    pub zone_id: String,
    pub action: IncidentAction,
    pub actor: String,
    pub at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_status: Option<IncidentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_status: Option<IncidentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

// ============================================================================
// STATIC DOCUMENTS (read-only, loaded at startup)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneMapDoc {
    pub store_id: String,
    pub map: MapInfo,
    pub zones: Vec<ZoneDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapInfo {
    pub image_name: String,
    /// Reference pixel extents all zone coordinates are expressed in.
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world: Option<WorldInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldInfo {
    pub width_m: f64,
    pub depth_m: f64,
    #[serde(default)]
    pub offset_x_m: f64,
    #[serde(default)]
    pub offset_z_m: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneDoc {
    pub zone_id: String,
    #[serde(default)]
    pub name: String,
    /// Closed polygon in source pixel coordinates.
    pub polygon: Vec<[f64; 2]>,
    pub centroid: [f64; 2],
    /// Optional cut-outs (fixtures) that subtract from containment.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub holes: Vec<Vec<[f64; 2]>>,
}

/// A photographed calibration point: where a track appeared in the camera
/// frame (`pred`, pixels) and where it actually stood (`world`, meters).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferencePoint {
    pub track_id: i64,
    pub pred: [f64; 2],
    pub world: [f64; 2],
    #[serde(default = "default_reference_status")]
    pub status: String,
    #[serde(default)]
    pub note: String,
}

fn default_reference_status() -> String {
    "walking".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CameraCalibrationDoc {
    #[serde(default)]
    pub cameras: Vec<CameraCalibrationRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraCalibrationRow {
    pub camera_id: String,
    /// Rows with `enabled: false` are skipped during lookup.
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub image_points: Vec<[f64; 2]>,
    #[serde(default)]
    pub map_norm_points: Vec<[f64; 2]>,
}
