// src/event_adapter.rs
//
// Normalization of one arbitrary upstream record into the canonical Event.
//
// Upstream shapes are schema-free: every logical field is probed through an
// ordered alias table accumulated from the producers seen in production
// (camera-edge envelopes, the generic alert API, batch generators). The
// tables are plain data so a new producer vocabulary is one more entry, not
// another branch. Rejection is the normal path for garbage — the adapter
// returns None, never errors.

use crate::coordinate_transform::CoordinateTransform;
use crate::probe::{self, pick};
use crate::types::{Event, EventSource, EventType, IncidentStatus, ZoneMapDoc};
use crate::zone_resolver::ZoneResolver;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

// ============================================================================
// ALIAS TABLES
// ============================================================================

const ID_PATHS: &[&str] = &[
    "id", "event_id", "eventId", "uuid", "alarm_id", "alarmId", "alert_id", "alertId",
];
const CAMERA_ID_PATHS: &[&str] = &[
    "camera_id", "cameraId", "camera.id", "device_id", "deviceId", "device.id",
];
const TRACK_ID_PATHS: &[&str] = &[
    "track_id", "trackId", "tracking_id", "trackingId", "object_id", "objectId",
];
const DETECTED_AT_PATHS: &[&str] = &[
    "detected_at", "detectedAt", "ts", "timestamp", "created_at", "createdAt", "time",
];
const INGESTED_AT_PATHS: &[&str] = &[
    "ingested_at", "ingestedAt", "received_at", "receivedAt", "updated_at", "updatedAt",
];
const LATENCY_PATHS: &[&str] = &["latency_ms", "latencyMs", "latency", "delay_ms"];
const TYPE_PATHS: &[&str] = &[
    "type", "event_type", "eventType", "category", "event_name", "label",
];
const TYPE_FALLBACK_PATHS: &[&str] = &["status", "state", "event_status", "eventState"];
const SEVERITY_PATHS: &[&str] = &[
    "severity", "priority", "level", "risk", "risk_level", "riskLevel", "status", "state",
];
const CONFIDENCE_PATHS: &[&str] = &[
    "confidence", "score", "probability", "confidence_score", "confidenceScore",
];
const INCIDENT_STATUS_PATHS: &[&str] = &[
    "incident_status", "incidentStatus", "status", "state", "resolution", "result.status",
];
const SOURCE_PATHS: &[&str] = &["source", "provider", "channel", "origin", "ingest_source"];
const STORE_PATHS: &[&str] = &[
    "store_id", "storeId", "store.id", "site_id", "siteId", "shop_id", "shopId",
];
const ZONE_PATHS: &[&str] = &[
    "zone_id", "zoneId", "zone.id", "zone.zone_id", "location.zone_id", "location.zoneId",
    "area_id", "areaId",
];
const NORM_X_PATHS: &[&str] = &[
    "x", "x_norm", "xNorm", "position.x", "position.x_norm", "position.xNorm", "location.x",
    "location.x_norm", "location.xNorm", "coord.x", "coordinates.x", "point.x", "geo.x",
];
const NORM_Y_PATHS: &[&str] = &[
    "y", "y_norm", "yNorm", "position.y", "position.y_norm", "position.yNorm", "location.y",
    "location.y_norm", "location.yNorm", "coord.y", "coordinates.y", "point.y", "geo.y",
];
const PAIR_PATHS: &[&str] = &["position", "location", "coord", "coordinates", "point"];
const WORLD_X_PATHS: &[&str] = &[
    "world.x", "worldX", "world_x", "position.world.x", "position_world.x", "location.world.x",
    "location.world_x", "location.x_m", "x_m",
];
const WORLD_Z_PATHS: &[&str] = &[
    "world.z", "worldZ", "world_z", "position.world.z", "position_world.z", "location.world.z",
    "location.world_z", "location.z_m", "z_m",
];
const NOTE_PATHS: &[&str] = &[
    "note", "message", "description", "reason", "summary", "vlm_analysis.summary",
];
const CAUSE_PATHS: &[&str] = &["vlm_analysis.cause", "analysis.cause"];
const ACTION_PATHS: &[&str] = &[
    "vlm_analysis.action", "analysis.action", "action", "recommended_action",
];
const LABEL_PATHS: &[&str] = &[
    "label", "object.label", "class", "class_name", "object.class", "event_label",
];
const RAW_STATUS_PATHS: &[&str] = &[
    "status", "state", "event_status", "result.status", "payload.status",
];
const MODEL_VERSION_PATHS: &[&str] = &["model_version", "modelVersion", "model.version"];

// ============================================================================
// OPTIONS
// ============================================================================

#[derive(Debug, Clone)]
pub struct AdaptOptions {
    pub fallback_store_id: Option<String>,
    pub default_source: EventSource,
}

impl Default for AdaptOptions {
    fn default() -> Self {
        Self {
            fallback_store_id: None,
            default_source: EventSource::Unknown,
        }
    }
}

struct NormalizedCoordinates {
    x: f64,
    y: f64,
    world_x: f64,
    world_z: f64,
}

// ============================================================================
// VOCABULARY NORMALIZATION
// ============================================================================

fn normalize_type_str(text: &str) -> EventType {
    match text.trim().to_lowercase().as_str() {
        "crowd" | "queue" | "congestion" | "crowding" => EventType::Crowd,
        "fall" | "fall_down" | "slip" | "slipfall" | "trip" => EventType::Fall,
        "fight" | "violence" | "assault" | "aggressive" => EventType::Fight,
        "loitering" | "loiter" | "idle" | "linger" => EventType::Loitering,
        _ => EventType::Unknown,
    }
}

fn normalize_type(value: Option<&Value>) -> EventType {
    match value.and_then(Value::as_str) {
        Some(text) => normalize_type_str(text),
        None => EventType::Unknown,
    }
}

fn default_severity(event_type: EventType) -> u8 {
    match event_type {
        EventType::Fall | EventType::Fight => 3,
        EventType::Crowd => 2,
        _ => 1,
    }
}

fn normalize_severity(value: Option<&Value>, event_type: EventType) -> u8 {
    if let Some(value) = value {
        if let Some(text) = value.as_str() {
            let normalized = text.trim().to_lowercase();
            match normalized.as_str() {
                "p1" | "l3" | "high" | "critical" | "severe" | "urgent" => return 3,
                "p2" | "l2" | "medium" | "med" | "moderate" => return 2,
                "p3" | "l1" | "low" | "minor" => return 1,
                _ => {}
            }
            // "level 2", "sev-3": strip everything but digits and dots.
            let digits: String = normalized
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            if let Ok(as_num) = digits.parse::<f64>() {
                if (1.0..=3.0).contains(&as_num) {
                    return as_num.round() as u8;
                }
            }
        }

        if let Some(as_num) = value.as_f64() {
            if as_num.is_finite() {
                if as_num >= 3.0 {
                    return 3;
                }
                if as_num >= 2.0 {
                    return 2;
                }
                return 1;
            }
        }
    }

    default_severity(event_type)
}

fn normalize_incident_status(value: Option<&Value>) -> IncidentStatus {
    let Some(text) = value.and_then(Value::as_str) else {
        return IncidentStatus::New;
    };
    match text.trim().to_lowercase().as_str() {
        "new" | "open" | "opened" | "detected" | "created" | "new_alert" => IncidentStatus::New,
        "ack" | "acknowledged" | "acknowledge" | "in_progress" | "processing" | "dispatched" => {
            IncidentStatus::Ack
        }
        "resolved" | "closed" | "done" | "resolved_done" | "complete" | "completed" => {
            IncidentStatus::Resolved
        }
        _ => IncidentStatus::New,
    }
}

fn normalize_source(value: Option<&Value>, fallback: EventSource) -> EventSource {
    let Some(text) = value.and_then(Value::as_str) else {
        return fallback;
    };
    let normalized = text.trim().to_lowercase();
    match normalized.as_str() {
        "demo" => return EventSource::Demo,
        "camera" => return EventSource::Camera,
        "api" => return EventSource::Api,
        "unknown" => return EventSource::Unknown,
        _ => {}
    }
    if normalized.contains("camera") {
        EventSource::Camera
    } else if normalized.contains("demo") {
        EventSource::Demo
    } else if !normalized.is_empty() {
        EventSource::Api
    } else {
        fallback
    }
}

fn normalize_confidence(value: Option<&Value>, severity: u8) -> f64 {
    if let Some(parsed) = value.and_then(probe::parse_number) {
        if parsed > 1.0 && parsed <= 100.0 {
            return (parsed / 100.0).clamp(0.0, 1.0);
        }
        return parsed.clamp(0.0, 1.0);
    }
    match severity {
        3 => 0.92,
        2 => 0.84,
        _ => 0.78,
    }
}

/// A coordinate that is either already normalized (0..1) or a percentage
/// (0..100). Anything negative or beyond 100 is not a position.
fn normalize_coordinate_num(parsed: f64) -> Option<f64> {
    if (0.0..=1.0).contains(&parsed) {
        return Some(parsed);
    }
    if (0.0..=100.0).contains(&parsed) {
        return Some((parsed / 100.0).clamp(0.0, 1.0));
    }
    None
}

fn normalize_coordinate(value: &Value) -> Option<f64> {
    normalize_coordinate_num(probe::parse_number(value)?)
}

// ============================================================================
// ADAPTER
// ============================================================================

/// Stateless normalizer from raw upstream records to canonical Events.
/// Owns the calibrated transform and the zone resolver; pure function of its
/// construction data and each input record.
pub struct EventAdapter {
    transform: CoordinateTransform,
    resolver: ZoneResolver,
    world_offset_x_m: f64,
    world_offset_z_m: f64,
}

impl EventAdapter {
    pub fn new(transform: CoordinateTransform, resolver: ZoneResolver, zone_map: &ZoneMapDoc) -> Self {
        let (offset_x, offset_z) = zone_map
            .map
            .world
            .as_ref()
            .map(|world| (world.offset_x_m, world.offset_z_m))
            .unwrap_or((0.0, 0.0));
        Self {
            transform,
            resolver,
            world_offset_x_m: offset_x,
            world_offset_z_m: offset_z,
        }
    }

    pub fn transform(&self) -> &CoordinateTransform {
        &self.transform
    }

    fn extract_norm_xy(&self, record: &Value) -> Option<(f64, f64)> {
        let x = normalize_coordinate(pick(record, NORM_X_PATHS)?)?;
        let y = normalize_coordinate(pick(record, NORM_Y_PATHS)?)?;
        Some((x, y))
    }

    fn extract_norm_pair(&self, record: &Value) -> Option<(f64, f64)> {
        let pair = probe::parse_pair(pick(record, PAIR_PATHS)?)?;
        let x = normalize_coordinate_num(pair[0])?;
        let y = normalize_coordinate_num(pair[1])?;
        Some((x, y))
    }

    fn extract_world_coordinates(&self, record: &Value) -> Option<NormalizedCoordinates> {
        let world_x = pick(record, WORLD_X_PATHS).and_then(probe::parse_number)?;
        let world_z = pick(record, WORLD_Z_PATHS).and_then(probe::parse_number)?;
        let (x, y) = self.transform.world_to_map_norm(
            world_x - self.world_offset_x_m,
            world_z - self.world_offset_z_m,
        );
        Some(NormalizedCoordinates {
            x,
            y,
            world_x,
            world_z,
        })
    }

    fn extract_coordinates(&self, record: &Value) -> Option<NormalizedCoordinates> {
        let explicit = self
            .extract_norm_xy(record)
            .or_else(|| self.extract_norm_pair(record));
        if let Some((x, y)) = explicit {
            let (rel_x, rel_z) = self.transform.norm_to_world(x, y);
            return Some(NormalizedCoordinates {
                x,
                y,
                world_x: self.world_offset_x_m + rel_x,
                world_z: self.world_offset_z_m + rel_z,
            });
        }
        self.extract_world_coordinates(record)
    }

    fn extract_note(&self, record: &Value) -> Option<String> {
        let direct = pick(record, NOTE_PATHS).and_then(probe::parse_text);
        let cause = pick(record, CAUSE_PATHS).and_then(probe::parse_text);
        let action = pick(record, ACTION_PATHS).and_then(probe::parse_text);

        let mut chunks = Vec::new();
        if let Some(direct) = direct {
            chunks.push(direct);
        }
        if let Some(cause) = cause {
            chunks.push(format!("cause:{}", cause));
        }
        if let Some(action) = action {
            chunks.push(format!("action:{}", action));
        }

        if chunks.is_empty() {
            None
        } else {
            Some(chunks.join(" | "))
        }
    }

    fn resolve_event_type(&self, record: &Value) -> EventType {
        let primary = normalize_type(pick(record, TYPE_PATHS));
        if primary != EventType::Unknown {
            return primary;
        }
        normalize_type(pick(record, TYPE_FALLBACK_PATHS))
    }

    /// Normalize one upstream record, or reject it (None).
    ///
    /// Rejection reasons: not an object, no id (and no track id to
    /// synthesize one from), no in-range detection timestamp, no resolvable
    /// coordinate. Everything else degrades to a conservative default.
    pub fn adapt_raw_event(&self, record: &Value, options: &AdaptOptions) -> Option<Event> {
        if !record.is_object() {
            return None;
        }
        let now = probe::now_ms();

        let camera_id = pick(record, CAMERA_ID_PATHS).and_then(probe::parse_id);
        let track_id = pick(record, TRACK_ID_PATHS).and_then(probe::parse_id);
        let explicit_id = pick(record, ID_PATHS).and_then(probe::parse_id);
        let id = explicit_id.or_else(|| {
            track_id.as_ref().map(|track| {
                format!(
                    "{}:track-{}",
                    camera_id.as_deref().unwrap_or("cam-unknown"),
                    track
                )
            })
        })?;

        let detected_at = pick(record, DETECTED_AT_PATHS)
            .and_then(|value| probe::parse_epoch_ms(value, now))?;
        let ingested_at = pick(record, INGESTED_AT_PATHS)
            .and_then(|value| probe::parse_epoch_ms(value, now))
            .unwrap_or(detected_at);

        let latency_ms = pick(record, LATENCY_PATHS)
            .and_then(probe::parse_number)
            .map(|latency| (latency.round() as i64).max(0))
            .unwrap_or_else(|| (ingested_at - detected_at).max(0));

        let event_type = self.resolve_event_type(record);
        let severity = normalize_severity(pick(record, SEVERITY_PATHS), event_type);
        let confidence = normalize_confidence(pick(record, CONFIDENCE_PATHS), severity);
        let incident_status = normalize_incident_status(pick(record, INCIDENT_STATUS_PATHS));

        let Some(coordinates) = self.extract_coordinates(record) else {
            debug!(event_id = %id, "record rejected: no resolvable coordinate");
            return None;
        };
        let zone_candidate = pick(record, ZONE_PATHS).and_then(probe::parse_id);
        let zone_id = self
            .resolver
            .resolve(zone_candidate.as_deref(), coordinates.x, coordinates.y);

        let store_id = pick(record, STORE_PATHS)
            .and_then(probe::parse_id)
            .or_else(|| options.fallback_store_id.clone())
            .unwrap_or_else(|| "s001".to_string());
        let source = normalize_source(pick(record, SOURCE_PATHS), options.default_source);

        let object_label = pick(record, LABEL_PATHS)
            .and_then(Value::as_str)
            .map(str::to_string);
        let raw_status = pick(record, RAW_STATUS_PATHS)
            .and_then(Value::as_str)
            .map(str::to_string);
        let model_version = pick(record, MODEL_VERSION_PATHS).and_then(probe::parse_id);

        Some(Event {
            id,
            store_id,
            detected_at,
            ingested_at,
            latency_ms,
            event_type,
            severity,
            confidence,
            zone_id,
            camera_id,
            track_id,
            object_label,
            raw_status,
            source,
            model_version,
            incident_status,
            x: coordinates.x.clamp(0.0, 1.0),
            y: coordinates.y.clamp(0.0, 1.0),
            world_x_m: Some(coordinates.world_x),
            world_z_m: Some(coordinates.world_z),
            note: self.extract_note(record),
        })
    }

    /// Normalize a raw record list into a bounded, deduplicated, and
    /// deterministically ordered feed.
    ///
    /// Duplicate ids keep the record with the greatest detected_at (ties by
    /// greatest ingested_at). Order is (detected_at desc, ingested_at desc,
    /// id asc); the bound is clamped to [1, 1000].
    pub fn normalize_event_feed(
        &self,
        raw: &[Value],
        max_events: usize,
        options: &AdaptOptions,
    ) -> Vec<Event> {
        let safe_max_events = max_events.clamp(1, 1000);

        let mut deduped: HashMap<String, Event> = HashMap::new();
        for item in raw {
            let Some(event) = self.adapt_raw_event(item, options) else {
                continue;
            };
            match deduped.get(&event.id) {
                Some(existing)
                    if (event.detected_at, event.ingested_at)
                        <= (existing.detected_at, existing.ingested_at) => {}
                _ => {
                    deduped.insert(event.id.clone(), event);
                }
            }
        }

        let mut events: Vec<Event> = deduped.into_values().collect();
        events.sort_by(compare_feed_order);
        events.truncate(safe_max_events);
        events
    }
}

/// (detected_at desc, ingested_at desc, id asc) — the feed's total order.
pub fn compare_feed_order(a: &Event, b: &Event) -> std::cmp::Ordering {
    b.detected_at
        .cmp(&a.detected_at)
        .then_with(|| b.ingested_at.cmp(&a.ingested_at))
        .then_with(|| a.id.cmp(&b.id))
}
