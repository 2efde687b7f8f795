// src/probe.rs
//
// Schema-free field lookup over decoded JSON. Upstream producers disagree on
// field names, nesting, and scalar encodings, so every extraction runs an
// ordered list of dotted-path candidates and takes the first value that is
// present and non-null. The scalar parsers below are deliberately tolerant:
// numbers may arrive as strings, timestamps as epoch seconds, epoch
// milliseconds, or ISO-8601 text.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Epoch ms for 2000-01-01T00:00:00Z. Anything earlier is unit-confusion
/// garbage, not a real detection.
pub const MIN_VALID_EPOCH_MS: i64 = 946_684_800_000;
/// Accept timestamps at most one year into the future.
pub const MAX_FUTURE_DRIFT_MS: i64 = 1000 * 60 * 60 * 24 * 365;

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn as_object(value: &Value) -> Option<&Map<String, Value>> {
    value.as_object()
}

/// Walk a dotted path (`"location.world.x"`) through nested objects.
/// Arrays are not indexed; a path step into anything but an object stops.
pub fn read_path<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    let mut cursor = record;
    for chunk in path.split('.') {
        cursor = cursor.as_object()?.get(chunk)?;
    }
    Some(cursor)
}

/// First present-and-non-null value among the candidate paths.
pub fn pick<'a>(record: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    for path in paths {
        if let Some(value) = read_path(record, path) {
            if !value.is_null() {
                return Some(value);
            }
        }
    }
    None
}

/// Trimmed non-empty string.
pub fn parse_text(value: &Value) -> Option<String> {
    let text = value.as_str()?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Finite number, accepting numeric strings.
pub fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => {
            let parsed = n.as_f64()?;
            parsed.is_finite().then_some(parsed)
        }
        Value::String(s) => {
            let parsed: f64 = s.trim().parse().ok()?;
            parsed.is_finite().then_some(parsed)
        }
        _ => None,
    }
}

/// Identifier from a string (trimmed) or a number (rounded).
pub fn parse_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => {
            let parsed = n.as_f64()?;
            parsed.is_finite().then(|| format!("{}", parsed.round() as i64))
        }
        _ => None,
    }
}

/// A 2-element array of finite numbers.
pub fn parse_pair(value: &Value) -> Option<[f64; 2]> {
    let items = value.as_array()?;
    if items.len() < 2 {
        return None;
    }
    let x = parse_number(&items[0])?;
    let y = parse_number(&items[1])?;
    Some([x, y])
}

fn bounded_epoch(epoch_ms: f64, now: i64) -> Option<i64> {
    if !epoch_ms.is_finite() {
        return None;
    }
    let rounded = epoch_ms.round() as i64;
    if rounded < MIN_VALID_EPOCH_MS {
        return None;
    }
    if rounded > now + MAX_FUTURE_DRIFT_MS {
        return None;
    }
    Some(rounded)
}

fn scale_numeric_epoch(raw: f64, now: i64) -> Option<i64> {
    if raw >= 1e12 {
        return bounded_epoch(raw, now);
    }
    // Epoch seconds land in [1e9, 1e11] for any plausible date.
    if (1e9..=1e11).contains(&raw) {
        return bounded_epoch(raw * 1000.0, now);
    }
    bounded_epoch(raw, now)
}

/// Epoch milliseconds from any of the accepted encodings, bounded to
/// [2000-01-01, now + 1 year]. Out-of-range values are rejected, not clamped.
pub fn parse_epoch_ms(value: &Value, now: i64) -> Option<i64> {
    match value {
        Value::Number(n) => scale_numeric_epoch(n.as_f64()?, now),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            if let Ok(as_num) = trimmed.parse::<f64>() {
                return scale_numeric_epoch(as_num, now);
            }
            let parsed = DateTime::parse_from_rfc3339(trimmed).ok()?;
            bounded_epoch(parsed.timestamp_millis() as f64, now)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: i64 = 1_750_000_000_000;

    #[test]
    fn test_read_path_nested() {
        let record = json!({ "payload": { "event": { "id": "evt-1" } } });
        assert_eq!(
            read_path(&record, "payload.event.id").and_then(|v| v.as_str()),
            Some("evt-1")
        );
        assert!(read_path(&record, "payload.missing.id").is_none());
    }

    #[test]
    fn test_pick_skips_null() {
        let record = json!({ "event_id": null, "uuid": "u-9" });
        let picked = pick(&record, &["id", "event_id", "uuid"]).unwrap();
        assert_eq!(picked.as_str(), Some("u-9"));
    }

    #[test]
    fn test_parse_id_from_number() {
        assert_eq!(parse_id(&json!(101)).as_deref(), Some("101"));
        assert_eq!(parse_id(&json!("  alm-8f91 ")).as_deref(), Some("alm-8f91"));
        assert_eq!(parse_id(&json!("   ")), None);
    }

    #[test]
    fn test_parse_number_from_string() {
        assert_eq!(parse_number(&json!(" 88.4 ")), Some(88.4));
        assert_eq!(parse_number(&json!("not a number")), None);
    }

    #[test]
    fn test_epoch_seconds_scale_to_ms() {
        assert_eq!(parse_epoch_ms(&json!(1_739_168_718i64), NOW), Some(1_739_168_718_000));
        assert_eq!(parse_epoch_ms(&json!("1739168718"), NOW), Some(1_739_168_718_000));
    }

    #[test]
    fn test_epoch_ms_passthrough() {
        assert_eq!(
            parse_epoch_ms(&json!(1_739_168_718_822i64), NOW),
            Some(1_739_168_718_822)
        );
    }

    #[test]
    fn test_epoch_iso_string() {
        let parsed = parse_epoch_ms(&json!("2026-02-10T05:09:50.014Z"), NOW).unwrap();
        assert_eq!(parsed, 1_770_700_190_014);
    }

    #[test]
    fn test_epoch_out_of_range_rejected() {
        assert_eq!(parse_epoch_ms(&json!(123), NOW), None);
        assert_eq!(parse_epoch_ms(&json!("3026-01-01T00:00:00Z"), NOW), None);
    }
}
