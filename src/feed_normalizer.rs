// src/feed_normalizer.rs
//
// Decomposition of one arbitrary top-level payload into a sync batch.
//
// A payload can be a bare array, an enveloped batch, an edge-device objects
// list, a single record, a heartbeat, or a deletion directive — and a single
// payload may carry upserts, removals, and signal patches at once. The
// decision tree below is evaluated once per payload; per-record work is
// delegated to the event adapter, signal extraction to the signal parser.

use crate::event_adapter::{AdaptOptions, EventAdapter};
use crate::probe::{self, pick};
use crate::signals::{parse_signal_payload, SignalChecksPatch};
use crate::types::{Event, EventType};
use serde_json::{Map, Value};
use tracing::debug;

/// Events this weak are template noise from demo generators, not signal.
const LOW_SIGNAL_CONFIDENCE_CUTOFF: f64 = 0.2;

const EVENT_ID_PATHS: &[&str] = &[
    "id", "event_id", "eventId", "uuid", "alarm_id", "alarmId", "alert_id", "alertId",
    "payload.id", "payload.event_id", "payload.eventId",
];
const SYNC_MODE_FIELD_PATHS: &[&str] = &[
    "sync_mode", "syncMode", "sync.mode", "sync.strategy", "payload.sync_mode",
    "payload.sync.mode", "meta.sync_mode", "meta.sync.mode", "payload.mode", "mode",
];
const SYNC_MODE_FLAG_PATHS: &[&str] = &[
    "snapshot", "full_sync", "fullSync", "sync.snapshot", "sync.full_sync",
];
const TYPE_HINT_PATHS: &[&str] = &[
    "type", "event_type", "eventType", "kind", "topic", "message_type",
];
const OPERATION_PATHS: &[&str] = &[
    "op", "operation", "event_op", "event_operation", "sync.op", "sync.operation",
    "meta.op", "meta.operation",
];
const REMOVE_ID_LIST_PATHS: &[&str] = &[
    "deleted_ids", "removed_ids", "delete_ids", "remove_ids",
    "payload.deleted_ids", "payload.removed_ids", "payload.delete_ids", "payload.remove_ids",
    "sync.deleted_ids", "sync.removed_ids",
    "payload.sync.deleted_ids", "payload.sync.removed_ids",
];
const REMOVE_RECORD_LIST_PATHS: &[&str] = &[
    "deleted", "removed", "payload.deleted", "payload.removed",
    "sync.deleted", "sync.removed", "payload.sync.deleted", "payload.sync.removed",
];
const OBJECT_LIST_PATHS: &[&str] = &[
    "data.objects", "payload.data.objects", "payload.objects",
    "message.data.objects", "message.objects",
];
const ARRAY_CANDIDATE_PATHS: &[&str] = &[
    "events", "data", "records", "results", "items", "alerts",
    "payload.events", "payload.records", "payload.items", "payload.alerts",
    "message.events", "message.items", "stream.events", "sync.events",
    "payload.sync.events",
];
const SINGLE_RECORD_PATHS: &[&str] = &[
    "event", "alert", "payload.event", "payload.alert", "payload.data",
    "message.event", "message.alert",
];
const NESTED_DELETE_PATHS: &[&str] = &[
    "event", "alert", "payload.event", "payload.alert", "payload.data.event",
    "message.event", "message.alert",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Merge,
    Replace,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Replace => "replace",
        }
    }
}

/// One decomposed payload, ready for the sync engine.
#[derive(Debug)]
pub struct SyncBatch {
    pub mode: SyncMode,
    pub upsert: Vec<Event>,
    pub remove_ids: Vec<String>,
    pub signal_patch: SignalChecksPatch,
    pub signal_labels: Vec<String>,
}

impl SyncBatch {
    pub fn empty(mode: SyncMode) -> Self {
        Self {
            mode,
            upsert: Vec::new(),
            remove_ids: Vec::new(),
            signal_patch: SignalChecksPatch::default(),
            signal_labels: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordOperation {
    Upsert,
    Remove,
}

// ============================================================================
// FIELD PARSERS
// ============================================================================

fn dedupe_ids(ids: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

fn event_id_from_record(record: &Value) -> Option<String> {
    pick(record, EVENT_ID_PATHS).and_then(probe::parse_id)
}

fn parse_sync_mode_value(value: &Value) -> Option<SyncMode> {
    if let Some(flag) = value.as_bool() {
        return Some(if flag { SyncMode::Replace } else { SyncMode::Merge });
    }
    let text = probe::parse_text(value)?.to_lowercase();
    if ["replace", "snapshot", "full_sync", "full-sync", "fullsync", "resync"]
        .iter()
        .any(|token| text.contains(token))
    {
        return Some(SyncMode::Replace);
    }
    if ["merge", "upsert", "delta", "incremental", "patch"]
        .iter()
        .any(|token| text.contains(token))
    {
        return Some(SyncMode::Merge);
    }
    None
}

fn parse_sync_mode(record: &Value) -> Option<SyncMode> {
    if let Some(mode) = pick(record, SYNC_MODE_FIELD_PATHS).and_then(parse_sync_mode_value) {
        return Some(mode);
    }
    if let Some(mode) = pick(record, SYNC_MODE_FLAG_PATHS).and_then(parse_sync_mode_value) {
        return Some(mode);
    }
    pick(record, TYPE_HINT_PATHS).and_then(parse_sync_mode_value)
}

fn record_operation(record: &Value) -> Option<RecordOperation> {
    let op = pick(record, OPERATION_PATHS)
        .and_then(probe::parse_text)?
        .to_lowercase();
    match op.as_str() {
        "delete" | "deleted" | "remove" | "removed" | "clear" | "cleared" | "dismiss"
        | "dismissed" => Some(RecordOperation::Remove),
        "upsert" | "create" | "created" | "insert" | "update" | "updated" | "patch" | "add" => {
            Some(RecordOperation::Upsert)
        }
        _ => None,
    }
}

fn id_list(value: &Value) -> Vec<String> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    let mut ids = Vec::new();
    for item in items {
        if let Some(id) = probe::parse_id(item) {
            ids.push(id);
            continue;
        }
        if item.is_object() {
            if let Some(id) = event_id_from_record(item) {
                ids.push(id);
            }
        }
    }
    ids
}

/// A type string like "event.deleted" is itself a removal directive; the id
/// comes from the record or a nested event/alert sub-object.
fn delete_type_event_id(record: &Value) -> Option<String> {
    let type_text = pick(record, TYPE_HINT_PATHS)
        .and_then(probe::parse_text)?
        .to_lowercase();
    let implies_delete = ["deleted", "delete", "removed", "remove", "cleared", "clear"]
        .iter()
        .any(|token| type_text.contains(token));
    if !implies_delete {
        return None;
    }

    if let Some(id) = event_id_from_record(record) {
        return Some(id);
    }
    pick(record, NESTED_DELETE_PATHS).and_then(event_id_from_record)
}

fn collect_remove_ids(record: &Value) -> Vec<String> {
    let mut ids = Vec::new();

    for &path in REMOVE_ID_LIST_PATHS {
        if let Some(value) = pick(record, &[path]) {
            ids.extend(id_list(value));
        }
    }
    for &path in REMOVE_RECORD_LIST_PATHS {
        if let Some(value) = pick(record, &[path]) {
            ids.extend(id_list(value));
        }
    }

    if record_operation(record) == Some(RecordOperation::Remove) {
        if let Some(id) = event_id_from_record(record) {
            ids.push(id);
        }
    }
    if let Some(id) = delete_type_event_id(record) {
        ids.push(id);
    }

    dedupe_ids(ids)
}

// ============================================================================
// EDGE-DEVICE OBJECT FLATTENING
// ============================================================================

/// Merge one entry of an edge-device objects array with the envelope fields
/// it inherits (timestamp, device, event type, severity, source, frame,
/// store), producing a record the adapter understands. The object's own
/// fields win over the parent's.
fn normalize_edge_object_payload(parent: &Value, value: &Value) -> Option<Value> {
    let object = value.as_object()?;
    let mut merged: Map<String, Value> = object.clone();

    let inherit = |merged: &mut Map<String, Value>,
                   key: &str,
                   own_paths: &[&str],
                   parent_paths: &[&str]| {
        let picked = pick(value, own_paths)
            .or_else(|| pick(parent, parent_paths))
            .cloned();
        if let Some(picked) = picked {
            merged.insert(key.to_string(), picked);
        }
    };

    let time_paths = ["timestamp", "detected_at", "detectedAt", "ts", "time"];
    inherit(&mut merged, "timestamp", &time_paths, &time_paths);
    let device_paths = ["deviceId", "device_id", "cameraId", "camera_id", "camera.id"];
    inherit(&mut merged, "deviceId", &device_paths, &device_paths);
    let type_paths = ["eventType", "event_type", "type", "category", "event_name"];
    inherit(&mut merged, "eventType", &type_paths, &type_paths);
    let severity_paths = ["severity", "priority", "level", "risk", "risk_level"];
    inherit(&mut merged, "severity", &severity_paths, &severity_paths);
    let source_paths = ["source", "provider", "channel", "origin"];
    inherit(&mut merged, "source", &source_paths, &source_paths);
    inherit(
        &mut merged,
        "frame",
        &["frame", "location.frame"],
        &["frame", "data.frame", "meta.frame"],
    );
    let store_paths = [
        "store_id", "storeId", "store.id", "site_id", "siteId", "shop_id", "shopId",
    ];
    inherit(&mut merged, "store_id", &store_paths, &store_paths);

    Some(Value::Object(merged))
}

fn drop_low_signal_events(events: Vec<Event>) -> Vec<Event> {
    events
        .into_iter()
        .filter(|event| {
            !(event.event_type == EventType::Unknown
                && event.severity == 1
                && event.confidence < LOW_SIGNAL_CONFIDENCE_CUTOFF)
        })
        .collect()
}

/// Split rows into removal directives and upsert candidates, then run the
/// candidates through feed normalization.
fn normalize_records_for_sync(
    adapter: &EventAdapter,
    rows: &[Value],
    max_events: usize,
    options: &AdaptOptions,
) -> (Vec<Event>, Vec<String>) {
    let mut upsert_candidates = Vec::new();
    let mut remove_ids = Vec::new();

    for row in rows {
        if row.is_object() && record_operation(row) == Some(RecordOperation::Remove) {
            if let Some(id) = event_id_from_record(row) {
                remove_ids.push(id);
            }
            continue;
        }
        upsert_candidates.push(row.clone());
    }

    let upsert = if upsert_candidates.is_empty() {
        Vec::new()
    } else {
        drop_low_signal_events(adapter.normalize_event_feed(&upsert_candidates, max_events, options))
    };

    (upsert, dedupe_ids(remove_ids))
}

// ============================================================================
// PAYLOAD DECOMPOSITION
// ============================================================================

/// Decompose a raw payload into a sync batch. String payloads are parsed as
/// JSON first; unparsable text is an empty batch, never an error.
pub fn normalize_incoming_payload(
    adapter: &EventAdapter,
    payload: &Value,
    max_events: usize,
    options: &AdaptOptions,
) -> SyncBatch {
    let parsed;
    let payload = match payload {
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return SyncBatch::empty(SyncMode::Merge);
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(value) => {
                    parsed = value;
                    &parsed
                }
                Err(error) => {
                    debug!(%error, "payload is not JSON, treating as empty batch");
                    return SyncBatch::empty(SyncMode::Merge);
                }
            }
        }
        other => other,
    };
    if payload.is_null() || payload.is_string() {
        return SyncBatch::empty(SyncMode::Merge);
    }

    let signal = parse_signal_payload(adapter, payload, options);

    if let Some(rows) = payload.as_array() {
        let (upsert, remove_ids) = normalize_records_for_sync(adapter, rows, max_events, options);
        return SyncBatch {
            mode: SyncMode::Merge,
            upsert,
            remove_ids,
            signal_patch: signal.patch,
            signal_labels: signal.labels,
        };
    }
    if !payload.is_object() {
        return SyncBatch::empty(SyncMode::Merge);
    }

    let mode = parse_sync_mode(payload).unwrap_or(SyncMode::Merge);
    let root_remove_ids = collect_remove_ids(payload);

    let root_type = payload.get("type").and_then(Value::as_str);
    if matches!(root_type, Some("ping") | Some("heartbeat")) {
        return SyncBatch {
            mode,
            upsert: Vec::new(),
            remove_ids: root_remove_ids,
            signal_patch: signal.patch,
            signal_labels: signal.labels,
        };
    }

    if let Some(object_rows) = pick(payload, OBJECT_LIST_PATHS).and_then(Value::as_array) {
        let merged_rows: Vec<Value> = object_rows
            .iter()
            .filter_map(|row| normalize_edge_object_payload(payload, row))
            .collect();
        let (upsert, remove_ids) =
            normalize_records_for_sync(adapter, &merged_rows, max_events, options);
        let mut all_remove_ids = root_remove_ids;
        all_remove_ids.extend(remove_ids);
        return SyncBatch {
            mode,
            upsert,
            remove_ids: dedupe_ids(all_remove_ids),
            signal_patch: signal.patch,
            signal_labels: signal.labels,
        };
    }

    if let Some(rows) = pick(payload, ARRAY_CANDIDATE_PATHS).and_then(Value::as_array) {
        let (upsert, remove_ids) =
            normalize_records_for_sync(adapter, rows, max_events, options);
        let mut all_remove_ids = root_remove_ids;
        all_remove_ids.extend(remove_ids);
        return SyncBatch {
            mode,
            upsert,
            remove_ids: dedupe_ids(all_remove_ids),
            signal_patch: signal.patch,
            signal_labels: signal.labels,
        };
    }

    let single_candidate = pick(payload, SINGLE_RECORD_PATHS).unwrap_or(payload);
    if single_candidate.is_object()
        && record_operation(single_candidate) == Some(RecordOperation::Remove)
    {
        let mut remove_ids = root_remove_ids;
        if let Some(id) = event_id_from_record(single_candidate) {
            remove_ids.push(id);
        }
        return SyncBatch {
            mode,
            upsert: Vec::new(),
            remove_ids: dedupe_ids(remove_ids),
            signal_patch: signal.patch,
            signal_labels: signal.labels,
        };
    }

    let upsert = adapter
        .adapt_raw_event(single_candidate, options)
        .map(|event| drop_low_signal_events(vec![event]))
        .unwrap_or_default();

    SyncBatch {
        mode,
        upsert,
        remove_ids: root_remove_ids,
        signal_patch: signal.patch,
        signal_labels: signal.labels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::adapter;
    use serde_json::json;

    fn options() -> AdaptOptions {
        AdaptOptions {
            fallback_store_id: Some("s001".to_string()),
            default_source: crate::types::EventSource::Api,
        }
    }

    fn normalize(payload: &Value) -> SyncBatch {
        let adapter = adapter();
        normalize_incoming_payload(&adapter, payload, 50, &options())
    }

    fn record(id: &str) -> Value {
        json!({
            "eventId": id,
            "timestamp": 1_739_168_718i64,
            "eventType": "crowd",
            "position": { "x": 0.4, "y": 0.6 },
        })
    }

    #[test]
    fn test_top_level_array_splits_upserts_and_removals() {
        let payload = json!([
            record("evt-1"),
            { "op": "delete", "event_id": "evt-gone" },
            record("evt-2"),
        ]);

        let batch = normalize(&payload);
        assert_eq!(batch.mode, SyncMode::Merge);
        assert_eq!(batch.upsert.len(), 2);
        assert_eq!(batch.remove_ids, vec!["evt-gone".to_string()]);
    }

    #[test]
    fn test_json_string_payload_decomposes_like_parsed() {
        let parsed = json!({ "events": [record("evt-1")] });
        let as_string = Value::String(parsed.to_string());

        let from_value = normalize(&parsed);
        let from_string = normalize(&as_string);
        assert_eq!(from_value.upsert.len(), 1);
        assert_eq!(from_string.upsert.len(), 1);
        assert_eq!(from_value.upsert[0].id, from_string.upsert[0].id);
    }

    #[test]
    fn test_unparsable_string_is_empty_batch() {
        let batch = normalize(&Value::String("not json at all {{{".to_string()));
        assert!(batch.upsert.is_empty());
        assert!(batch.remove_ids.is_empty());
    }

    #[test]
    fn test_ping_surfaces_root_removals_without_upserts() {
        let payload = json!({
            "type": "ping",
            "deleted_ids": ["evt-1", "evt-2"],
            "events": [record("evt-3")],
        });

        let batch = normalize(&payload);
        assert!(batch.upsert.is_empty());
        assert_eq!(
            batch.remove_ids,
            vec!["evt-1".to_string(), "evt-2".to_string()]
        );
    }

    #[test]
    fn test_edge_device_objects_inherit_envelope_fields() {
        let payload = json!({
            "deviceId": "camera-edge-01",
            "timestamp": "2026-02-12T12:05:00Z",
            "eventType": "SAFETY",
            "severity": "Critical",
            "data": {
                "frame": { "width": 1280, "height": 720 },
                "objects": [{
                    "track_id": 101,
                    "label": "person",
                    "status": "fall_down",
                    "confidence": 0.95,
                    "location": {
                        "bbox": [655, 307, 819, 472],
                        "world": { "x": 12.5, "z": 8.2 },
                        "zone_id": "Store",
                    },
                    "vlm_analysis": {
                        "summary": "A person collapsed suddenly in the aisle.",
                        "cause": "Faint",
                        "action": "Call_119",
                    },
                }],
            },
        });

        let batch = normalize(&payload);
        assert_eq!(batch.upsert.len(), 1);
        let event = &batch.upsert[0];
        assert_eq!(event.id, "camera-edge-01:track-101");
        assert_eq!(event.event_type, crate::types::EventType::Fall);
        assert_eq!(event.severity, 3);
        assert_eq!(event.camera_id.as_deref(), Some("camera-edge-01"));
        assert!(event
            .note
            .as_deref()
            .is_some_and(|note| note.contains("cause:Faint") && note.contains("action:Call_119")));

        // The same envelope also patches the safety signal.
        assert!(batch.signal_patch.safety.is_some());
        assert_eq!(batch.signal_labels, vec!["이상행동".to_string()]);
    }

    #[test]
    fn test_enveloped_array_fields() {
        for payload in [
            json!({ "events": [record("evt-a")] }),
            json!({ "payload": { "items": [record("evt-a")] } }),
            json!({ "message": { "events": [record("evt-a")] } }),
        ] {
            let batch = normalize(&payload);
            assert_eq!(batch.upsert.len(), 1, "payload {payload}");
            assert_eq!(batch.upsert[0].id, "evt-a");
        }
    }

    #[test]
    fn test_single_record_and_nested_single_record() {
        let direct = normalize(&record("evt-solo"));
        assert_eq!(direct.upsert.len(), 1);

        let nested = normalize(&json!({ "event": record("evt-nested") }));
        assert_eq!(nested.upsert.len(), 1);
        assert_eq!(nested.upsert[0].id, "evt-nested");
    }

    #[test]
    fn test_single_removal_directive() {
        let batch = normalize(&json!({ "op": "remove", "event_id": "evt-x" }));
        assert!(batch.upsert.is_empty());
        assert_eq!(batch.remove_ids, vec!["evt-x".to_string()]);
    }

    #[test]
    fn test_delete_implied_by_type_string() {
        let batch = normalize(&json!({
            "type": "event.deleted",
            "event": { "id": "evt-y" },
        }));
        assert_eq!(batch.remove_ids, vec!["evt-y".to_string()]);
        assert!(batch.upsert.is_empty());
    }

    #[test]
    fn test_sync_mode_detection() {
        assert_eq!(
            normalize(&json!({ "sync_mode": "replace", "events": [] })).mode,
            SyncMode::Replace
        );
        assert_eq!(
            normalize(&json!({ "snapshot": true, "events": [] })).mode,
            SyncMode::Replace
        );
        assert_eq!(
            normalize(&json!({ "type": "events.resync", "events": [] })).mode,
            SyncMode::Replace
        );
        assert_eq!(
            normalize(&json!({ "type": "events.delta", "events": [] })).mode,
            SyncMode::Merge
        );
        assert_eq!(normalize(&json!({ "events": [] })).mode, SyncMode::Merge);
    }

    #[test]
    fn test_low_signal_events_dropped() {
        let payload = json!([{
            "eventId": "evt-noise",
            "timestamp": 1_739_168_718i64,
            "confidence": 0.1,
            "position": { "x": 0.5, "y": 0.5 },
        }]);

        let batch = normalize(&payload);
        assert!(batch.upsert.is_empty());
    }

    #[test]
    fn test_empty_object_payload() {
        let batch = normalize(&json!({}));
        assert!(batch.upsert.is_empty());
        assert!(batch.remove_ids.is_empty());
        assert!(batch.signal_patch.is_empty());
    }
}
