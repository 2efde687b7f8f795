// src/signals.rs
//
// Live-condition summaries derived from the same envelope stream that feeds
// the event collection. Three independent slots — crowd density, safety
// severity, cleaning severity — each replaced only by a patch that is at
// least as new as what it holds, so duplicated or out-of-order deliveries
// can never regress a tile.

use crate::event_adapter::{AdaptOptions, EventAdapter};
use crate::probe::{self, pick};
use crate::types::{Event, EventSource};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const CROWD_LABEL: &str = "혼잡도";
pub const SAFETY_LABEL: &str = "이상행동";
pub const TRASH_LABEL: &str = "쓰레기";

const DEFAULT_DEVICE_ID: &str = "camera-edge-01";
const DEFAULT_SIGNAL_ZONE: &str = "Store_Main";
const DEFAULT_FRAME_WIDTH: f64 = 1280.0;
const DEFAULT_FRAME_HEIGHT: f64 = 720.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalTone {
    Idle,
    Ok,
    Watch,
    Critical,
}

impl SignalTone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Ok => "ok",
            Self::Watch => "watch",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrowdSignal {
    pub updated_at: Option<i64>,
    pub device_id: String,
    pub zone_id: String,
    pub count: u64,
    pub tone: SignalTone,
    pub congestion_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetySignal {
    pub updated_at: Option<i64>,
    pub device_id: String,
    pub zone_id: String,
    pub count: u64,
    pub tone: SignalTone,
    pub severity: String,
    pub fall_count: u64,
    pub summary: String,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrashSignal {
    pub updated_at: Option<i64>,
    pub device_id: String,
    pub zone_id: String,
    pub count: u64,
    pub tone: SignalTone,
    pub severity: String,
    pub trash_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalChecksState {
    pub crowd: CrowdSignal,
    pub safety: SafetySignal,
    pub trash: TrashSignal,
}

impl Default for SignalChecksState {
    fn default() -> Self {
        Self {
            crowd: CrowdSignal {
                updated_at: None,
                device_id: "-".to_string(),
                zone_id: "-".to_string(),
                count: 0,
                tone: SignalTone::Idle,
                congestion_level: "-".to_string(),
            },
            safety: SafetySignal {
                updated_at: None,
                device_id: "-".to_string(),
                zone_id: "-".to_string(),
                count: 0,
                tone: SignalTone::Idle,
                severity: "-".to_string(),
                fall_count: 0,
                summary: "-".to_string(),
                action: "-".to_string(),
            },
            trash: TrashSignal {
                updated_at: None,
                device_id: "-".to_string(),
                zone_id: "-".to_string(),
                count: 0,
                tone: SignalTone::Idle,
                severity: "-".to_string(),
                trash_count: 0,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalChecksPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crowd: Option<CrowdSignal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety: Option<SafetySignal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trash: Option<TrashSignal>,
}

impl SignalChecksPatch {
    pub fn is_empty(&self) -> bool {
        self.crowd.is_none() && self.safety.is_none() && self.trash.is_none()
    }
}

#[derive(Debug, Default)]
pub struct ParsedSignals {
    pub generated_events: Vec<Event>,
    pub patch: SignalChecksPatch,
    pub labels: Vec<String>,
}

// ============================================================================
// TONE DERIVATION
// ============================================================================

fn severity_to_tone(severity: Option<&str>) -> SignalTone {
    let normalized = severity.unwrap_or_default().to_lowercase();
    if normalized.contains("critical") {
        SignalTone::Critical
    } else if normalized.contains("warn") {
        SignalTone::Watch
    } else if normalized.contains("info") {
        SignalTone::Ok
    } else {
        SignalTone::Idle
    }
}

fn severity_to_level(severity: Option<&str>) -> u8 {
    let normalized = severity.unwrap_or_default().to_lowercase();
    if normalized.contains("critical") {
        3
    } else if normalized.contains("warn") {
        2
    } else {
        1
    }
}

fn congestion_to_tone(level: Option<&str>) -> SignalTone {
    let normalized = level.unwrap_or_default().to_lowercase();
    if normalized.contains("high") {
        SignalTone::Critical
    } else if normalized.contains("medium") {
        SignalTone::Watch
    } else if normalized.contains("low") {
        SignalTone::Ok
    } else {
        SignalTone::Idle
    }
}

// ============================================================================
// NEWEST-WINS MERGE
// ============================================================================

fn should_replace_by_time(current_at: Option<i64>, next_at: Option<i64>) -> bool {
    match (current_at, next_at) {
        // A timestampless patch only seeds a never-updated slot.
        (current, None) => current.is_none(),
        (None, Some(_)) => true,
        (Some(current), Some(next)) => next >= current,
    }
}

/// Per-slot merge: the incoming patch wins only when it is at least as new
/// as the held value (ties favor the incoming patch).
pub fn merge_signal_checks(prev: &SignalChecksState, patch: &SignalChecksPatch) -> SignalChecksState {
    let crowd = match &patch.crowd {
        Some(next) if should_replace_by_time(prev.crowd.updated_at, next.updated_at) => next.clone(),
        _ => prev.crowd.clone(),
    };
    let safety = match &patch.safety {
        Some(next) if should_replace_by_time(prev.safety.updated_at, next.updated_at) => {
            next.clone()
        }
        _ => prev.safety.clone(),
    };
    let trash = match &patch.trash {
        Some(next) if should_replace_by_time(prev.trash.updated_at, next.updated_at) => next.clone(),
        _ => prev.trash.clone(),
    };
    SignalChecksState {
        crowd,
        safety,
        trash,
    }
}

// ============================================================================
// ENVELOPE PARSING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnvelopeKind {
    Safety,
    Cleaning,
}

impl EnvelopeKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Safety => "safety",
            Self::Cleaning => "cleaning",
        }
    }
}

struct ObjectEventInput<'a> {
    envelope: EnvelopeKind,
    device_id: &'a str,
    severity_text: Option<&'a str>,
    timestamp_ms: i64,
    default_zone_id: &'a str,
    store_id: &'a str,
    source: EventSource,
    object: &'a Map<String, Value>,
    index: usize,
    frame_width: f64,
    frame_height: f64,
}

fn object_text(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(probe::parse_text)
}

fn object_number(object: &Map<String, Value>, key: &str) -> Option<f64> {
    object.get(key).and_then(probe::parse_number)
}

/// One detected object out of a safety/cleaning envelope, rebuilt as a raw
/// record and pushed through the shared adapter so the canonical invariants
/// hold for generated events too.
fn build_object_event(adapter: &EventAdapter, input: &ObjectEventInput) -> Option<Event> {
    let track_id = object_number(input.object, "track_id")
        .map(|track| format!("{}", track.trunc() as i64))
        .unwrap_or_else(|| format!("{}", input.index));
    let status = object_text(input.object, "status").unwrap_or_else(|| "unknown".to_string());
    let status_key = status.to_lowercase();
    let label = match input.envelope {
        // Cleaning alerts are never shown with an object classification.
        EnvelopeKind::Cleaning => None,
        EnvelopeKind::Safety => {
            Some(object_text(input.object, "label").unwrap_or_else(|| "unknown".to_string()))
        }
    };
    let confidence = object_number(input.object, "confidence").unwrap_or(0.75);

    let location = input
        .object
        .get("location")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let world = location.get("world").and_then(Value::as_object);
    let world_x = world.and_then(|w| w.get("x")).and_then(probe::parse_number);
    let world_z = world.and_then(|w| w.get("z")).and_then(probe::parse_number);
    let zone_id = location
        .get("zone_id")
        .and_then(probe::parse_text)
        .unwrap_or_else(|| input.default_zone_id.to_string());

    let bbox: Vec<f64> = location
        .get("bbox")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(probe::parse_number).collect())
        .unwrap_or_default();

    let event_type = match input.envelope {
        EnvelopeKind::Safety => {
            if status_key.contains("fall") {
                "fall"
            } else if status_key.contains("fight") || status_key.contains("aggressive") {
                "fight"
            } else {
                "unknown"
            }
        }
        EnvelopeKind::Cleaning => "unknown",
    };
    let severity = match input.envelope {
        EnvelopeKind::Cleaning => 2,
        EnvelopeKind::Safety => severity_to_level(input.severity_text),
    };

    let mut base = json!({
        "eventId": format!(
            "{}:{}:{}:{}",
            input.device_id,
            input.envelope.as_str(),
            track_id,
            input.timestamp_ms
        ),
        "timestamp": input.timestamp_ms,
        "camera_id": input.device_id,
        "track_id": track_id,
        "status": status,
        "eventType": event_type,
        "severity": severity,
        "confidence": confidence,
        "zone_id": zone_id,
        "source": input.source.as_str(),
    });
    let base_map = base.as_object_mut().expect("object literal");
    if let Some(label) = &label {
        base_map.insert("label".to_string(), json!(label));
    }

    if let (Some(x), Some(z)) = (world_x, world_z) {
        base_map.insert("world".to_string(), json!({ "x": x, "z": z }));
    } else if bbox.len() >= 4 && input.frame_width > 0.0 && input.frame_height > 0.0 {
        let center_x = (bbox[0] + bbox[2]) / 2.0 / input.frame_width;
        let center_y = (bbox[1] + bbox[3]) / 2.0 / input.frame_height;
        base_map.insert("x_norm".to_string(), json!(center_x.clamp(0.0, 1.0)));
        base_map.insert("y_norm".to_string(), json!(center_y.clamp(0.0, 1.0)));
    } else {
        return None;
    }

    let vlm = input.object.get("vlm_analysis").and_then(Value::as_object);
    let summary = vlm.and_then(|v| v.get("summary")).and_then(probe::parse_text);
    let cause = vlm.and_then(|v| v.get("cause")).and_then(probe::parse_text);
    let action = vlm.and_then(|v| v.get("action")).and_then(probe::parse_text);
    let mut note_parts = Vec::new();
    if let Some(summary) = summary {
        note_parts.push(summary);
    }
    if let Some(cause) = cause {
        note_parts.push(format!("cause:{}", cause));
    }
    if let Some(action) = action {
        note_parts.push(format!("action:{}", action));
    }
    if !note_parts.is_empty() {
        base_map.insert("note".to_string(), json!(note_parts.join(" | ")));
    }

    adapter.adapt_raw_event(
        &base,
        &AdaptOptions {
            fallback_store_id: Some(input.store_id.to_string()),
            default_source: input.source,
        },
    )
}

/// Walk a payload tree for crowd/safety/cleaning envelopes and fold them
/// into summary patches plus generated map events. Wrapper objects without
/// an event type are descended; typed envelopes of other kinds are ignored.
pub fn parse_signal_payload(
    adapter: &EventAdapter,
    payload: &Value,
    options: &AdaptOptions,
) -> ParsedSignals {
    let store_id = options
        .fallback_store_id
        .clone()
        .unwrap_or_else(|| "s001".to_string());
    let source = options.default_source;
    let mut result = ParsedSignals::default();
    let now = probe::now_ms();
    visit(adapter, payload, &store_id, source, now, &mut result);
    result
}

fn apply_label(labels: &mut Vec<String>, label: &str) {
    if !labels.iter().any(|existing| existing == label) {
        labels.push(label.to_string());
    }
}

fn visit(
    adapter: &EventAdapter,
    value: &Value,
    store_id: &str,
    source: EventSource,
    now: i64,
    result: &mut ParsedSignals,
) {
    if let Some(items) = value.as_array() {
        for item in items {
            visit(adapter, item, store_id, source, now, result);
        }
        return;
    }
    let Some(row) = value.as_object() else {
        return;
    };

    let envelope_type = pick(value, &["eventType", "event_type", "type"]).and_then(probe::parse_text);
    let Some(envelope_type) = envelope_type else {
        for wrapper in [
            "event", "alert", "events", "items", "records", "results", "alerts", "data",
            "payload", "message", "sync",
        ] {
            if let Some(inner) = row.get(wrapper) {
                visit(adapter, inner, store_id, source, now, result);
            }
        }
        return;
    };

    let envelope_type = envelope_type.to_lowercase();
    if !matches!(envelope_type.as_str(), "crowd" | "safety" | "cleaning") {
        return;
    }

    let empty = Map::new();
    let data = row.get("data").and_then(Value::as_object).unwrap_or(&empty);
    let timestamp_ms = row
        .get("timestamp")
        .and_then(|value| probe::parse_epoch_ms(value, now))
        .unwrap_or(now);
    let device_id = pick(value, &["deviceId", "device_id", "camera_id"])
        .and_then(probe::parse_text)
        .unwrap_or_else(|| DEFAULT_DEVICE_ID.to_string());
    let severity_text = row.get("severity").and_then(probe::parse_text);
    let zone_id = data
        .get("zone_id")
        .and_then(probe::parse_text)
        .or_else(|| row.get("zone_id").and_then(probe::parse_text))
        .unwrap_or_else(|| DEFAULT_SIGNAL_ZONE.to_string());
    let count = data
        .get("count")
        .and_then(probe::parse_number)
        .map(|count| count.round().max(0.0) as u64)
        .unwrap_or(0);

    if envelope_type == "crowd" {
        let congestion_level = data
            .get("congestion_level")
            .and_then(probe::parse_text)
            .unwrap_or_else(|| "Unknown".to_string());
        result.patch.crowd = Some(CrowdSignal {
            updated_at: Some(timestamp_ms),
            device_id,
            zone_id,
            count,
            tone: congestion_to_tone(Some(&congestion_level)),
            congestion_level,
        });
        apply_label(&mut result.labels, CROWD_LABEL);
        return;
    }

    let objects: Vec<&Map<String, Value>> = data
        .get("objects")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_object).collect())
        .unwrap_or_default();

    let frame = data
        .get("frame")
        .and_then(Value::as_object)
        .or_else(|| row.get("frame").and_then(Value::as_object));
    let frame_width = frame
        .and_then(|f| f.get("width"))
        .and_then(probe::parse_number)
        .unwrap_or(DEFAULT_FRAME_WIDTH)
        .max(1.0);
    let frame_height = frame
        .and_then(|f| f.get("height"))
        .and_then(probe::parse_number)
        .unwrap_or(DEFAULT_FRAME_HEIGHT)
        .max(1.0);

    let envelope = if envelope_type == "safety" {
        EnvelopeKind::Safety
    } else {
        EnvelopeKind::Cleaning
    };

    for (index, object) in objects.iter().enumerate() {
        let built = build_object_event(
            adapter,
            &ObjectEventInput {
                envelope,
                device_id: &device_id,
                severity_text: severity_text.as_deref(),
                timestamp_ms,
                default_zone_id: &zone_id,
                store_id,
                source,
                object,
                index,
                frame_width,
                frame_height,
            },
        );
        if let Some(event) = built {
            result.generated_events.push(event);
        }
    }

    if envelope == EnvelopeKind::Safety {
        let fall_count = objects
            .iter()
            .filter(|object| {
                object_text(object, "status")
                    .unwrap_or_default()
                    .to_lowercase()
                    .contains("fall")
            })
            .count() as u64;
        let first_vlm = objects
            .first()
            .and_then(|object| object.get("vlm_analysis"))
            .and_then(Value::as_object);
        result.patch.safety = Some(SafetySignal {
            updated_at: Some(timestamp_ms),
            device_id,
            zone_id,
            count: if count > 0 { count } else { objects.len() as u64 },
            tone: severity_to_tone(severity_text.as_deref()),
            severity: severity_text.clone().unwrap_or_else(|| "-".to_string()),
            fall_count,
            summary: first_vlm
                .and_then(|vlm| vlm.get("summary"))
                .and_then(probe::parse_text)
                .unwrap_or_else(|| "-".to_string()),
            action: first_vlm
                .and_then(|vlm| vlm.get("action"))
                .and_then(probe::parse_text)
                .unwrap_or_else(|| "-".to_string()),
        });
        apply_label(&mut result.labels, SAFETY_LABEL);
        return;
    }

    let trash_count = objects
        .iter()
        .filter(|object| {
            object_text(object, "status")
                .unwrap_or_default()
                .to_lowercase()
                .contains("trash")
        })
        .count() as u64;
    result.patch.trash = Some(TrashSignal {
        updated_at: Some(timestamp_ms),
        device_id,
        zone_id,
        count: if count > 0 { count } else { objects.len() as u64 },
        tone: severity_to_tone(Some(
            severity_text.as_deref().unwrap_or("warning"),
        )),
        severity: severity_text.unwrap_or_else(|| "Warning".to_string()),
        trash_count: if trash_count > 0 {
            trash_count
        } else {
            objects.len() as u64
        },
    });
    apply_label(&mut result.labels, TRASH_LABEL);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::adapter;
    use crate::types::EventType;
    use serde_json::json;

    fn parse(payload: &Value) -> ParsedSignals {
        let adapter = adapter();
        parse_signal_payload(
            &adapter,
            payload,
            &AdaptOptions {
                fallback_store_id: Some("s001".to_string()),
                default_source: EventSource::Api,
            },
        )
    }

    #[test]
    fn test_crowd_envelope_fills_crowd_slot() {
        let payload = json!({
            "deviceId": "camera-edge-01",
            "timestamp": "2026-02-12T12:00:00Z",
            "eventType": "CROWD",
            "severity": "Info",
            "data": {
                "count": 5,
                "zone_id": "Store_Main",
                "congestion_level": "High",
            },
        });

        let parsed = parse(&payload);
        assert!(parsed.generated_events.is_empty());
        assert!(parsed.labels.iter().any(|label| label == CROWD_LABEL));

        let crowd = parsed.patch.crowd.expect("crowd patch");
        assert_eq!(crowd.device_id, "camera-edge-01");
        assert_eq!(crowd.zone_id, "Store_Main");
        assert_eq!(crowd.count, 5);
        assert_eq!(crowd.congestion_level, "High");
        assert_eq!(crowd.tone, SignalTone::Critical);
    }

    #[test]
    fn test_safety_envelope_generates_fall_event() {
        let payload = json!({
            "deviceId": "camera-edge-01",
            "timestamp": "2026-02-12T12:05:00Z",
            "eventType": "SAFETY",
            "severity": "Critical",
            "data": {
                "count": 1,
                "objects": [{
                    "track_id": 101,
                    "label": "person",
                    "status": "fall_down",
                    "confidence": 0.95,
                    "location": {
                        "bbox": [655, 307, 819, 472],
                        "world": { "x": 12.5, "z": 8.2 },
                        "zone_id": "Store_Main",
                    },
                    "vlm_analysis": {
                        "summary": "A person collapsed suddenly in the aisle.",
                        "cause": "Faint",
                        "action": "Call_119",
                    },
                }],
            },
        });

        let parsed = parse(&payload);
        assert!(parsed.labels.iter().any(|label| label == SAFETY_LABEL));

        let safety = parsed.patch.safety.expect("safety patch");
        assert_eq!(safety.device_id, "camera-edge-01");
        assert_eq!(safety.count, 1);
        assert_eq!(safety.fall_count, 1);
        assert_eq!(safety.severity, "Critical");
        assert_eq!(safety.tone, SignalTone::Critical);
        assert_eq!(safety.summary, "A person collapsed suddenly in the aisle.");
        assert_eq!(safety.action, "Call_119");

        assert_eq!(parsed.generated_events.len(), 1);
        let event = &parsed.generated_events[0];
        assert_eq!(event.event_type, EventType::Fall);
        assert_eq!(event.raw_status.as_deref(), Some("fall_down"));
        assert_eq!(event.world_x_m, Some(12.5));
        assert_eq!(event.world_z_m, Some(8.2));
        assert!((0.0..=1.0).contains(&event.x));
        assert!((0.0..=1.0).contains(&event.y));
        assert_eq!(event.severity, 3);
    }

    #[test]
    fn test_cleaning_envelope_fills_trash_slot_without_label() {
        let payload = json!({
            "deviceId": "camera-edge-01",
            "timestamp": "2026-02-12T12:10:00Z",
            "eventType": "CLEANING",
            "severity": "Warning",
            "data": {
                "count": 1,
                "objects": [{
                    "track_id": 1,
                    "status": "trash",
                    "confidence": 0.88,
                    "location": {
                        "bbox": [100, 200, 150, 250],
                        "world": { "x": 5.1, "z": 3.4 },
                        "zone_id": "Store_Main",
                    },
                }],
            },
        });

        let parsed = parse(&payload);
        assert!(parsed.labels.iter().any(|label| label == TRASH_LABEL));

        let trash = parsed.patch.trash.expect("trash patch");
        assert_eq!(trash.count, 1);
        assert_eq!(trash.trash_count, 1);
        assert_eq!(trash.severity, "Warning");
        assert_eq!(trash.tone, SignalTone::Watch);

        assert_eq!(parsed.generated_events.len(), 1);
        let event = &parsed.generated_events[0];
        assert!(event.id.contains("cleaning"));
        assert!(event.object_label.is_none());
        assert_eq!(event.severity, 2);
    }

    #[test]
    fn test_envelope_found_through_wrappers() {
        let payload = json!({
            "payload": {
                "message": {
                    "events": [{
                        "deviceId": "camera-edge-02",
                        "timestamp": 1_739_168_718i64,
                        "eventType": "crowd",
                        "data": { "count": 2, "congestion_level": "Low" },
                    }],
                },
            },
        });

        let parsed = parse(&payload);
        let crowd = parsed.patch.crowd.expect("crowd patch");
        assert_eq!(crowd.device_id, "camera-edge-02");
        assert_eq!(crowd.tone, SignalTone::Ok);
    }

    #[test]
    fn test_bbox_center_when_world_missing() {
        let payload = json!({
            "deviceId": "camera-edge-01",
            "timestamp": 1_739_168_718i64,
            "eventType": "SAFETY",
            "severity": "Warning",
            "data": {
                "frame": { "width": 1000, "height": 500 },
                "objects": [{
                    "track_id": 7,
                    "status": "fall_down",
                    "location": { "bbox": [400, 100, 600, 300] },
                }],
            },
        });

        let parsed = parse(&payload);
        assert_eq!(parsed.generated_events.len(), 1);
        let event = &parsed.generated_events[0];
        assert!((event.x - 0.5).abs() < 1e-9);
        assert!((event.y - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_object_without_position_is_skipped() {
        let payload = json!({
            "eventType": "SAFETY",
            "severity": "Critical",
            "timestamp": 1_739_168_718i64,
            "data": { "objects": [{ "track_id": 9, "status": "fall_down" }] },
        });

        let parsed = parse(&payload);
        assert!(parsed.generated_events.is_empty());
        // The slot still updates: the envelope itself was valid.
        assert_eq!(parsed.patch.safety.expect("safety patch").fall_count, 1);
    }

    #[test]
    fn test_merge_ignores_older_updates() {
        let mut prev = SignalChecksState::default();
        prev.safety.updated_at = Some(2_000);
        prev.safety.summary = "newer".to_string();

        let mut older = SignalChecksState::default().safety;
        older.updated_at = Some(1_000);
        older.summary = "older".to_string();

        let merged = merge_signal_checks(
            &prev,
            &SignalChecksPatch {
                safety: Some(older),
                ..SignalChecksPatch::default()
            },
        );
        assert_eq!(merged.safety.summary, "newer");
        assert_eq!(merged.safety.updated_at, Some(2_000));
    }

    #[test]
    fn test_merge_tie_favors_incoming() {
        let mut prev = SignalChecksState::default();
        prev.crowd.updated_at = Some(5_000);
        prev.crowd.count = 3;

        let mut tied = SignalChecksState::default().crowd;
        tied.updated_at = Some(5_000);
        tied.count = 9;

        let merged = merge_signal_checks(
            &prev,
            &SignalChecksPatch {
                crowd: Some(tied),
                ..SignalChecksPatch::default()
            },
        );
        assert_eq!(merged.crowd.count, 9);
    }

    #[test]
    fn test_timestampless_patch_only_seeds_empty_slot() {
        let mut seeded = SignalChecksState::default().trash;
        seeded.updated_at = None;
        seeded.trash_count = 4;

        let patch = SignalChecksPatch {
            trash: Some(seeded),
            ..SignalChecksPatch::default()
        };

        // Applies to the initial slot.
        let merged = merge_signal_checks(&SignalChecksState::default(), &patch);
        assert_eq!(merged.trash.trash_count, 4);

        // Never regresses an updated slot.
        let mut updated = SignalChecksState::default();
        updated.trash.updated_at = Some(1_000);
        updated.trash.trash_count = 7;
        let merged = merge_signal_checks(&updated, &patch);
        assert_eq!(merged.trash.trash_count, 7);
    }
}
