// src/timeline.rs
//
// Incident audit timeline. Entries are produced by the incident-management
// collaborator; this side only parses them tolerantly (bad rows are skipped,
// never fatal) and keeps the event's incident status consistent with the
// transitions an operator can take.

use crate::types::{IncidentAction, IncidentStatus, IncidentTimelineEntry};
use serde_json::Value;

pub const TIMELINE_MAX: usize = 240;

impl IncidentStatus {
    /// Operator state machine: new -> ack -> resolved, never backward.
    /// A dispatch is a side-action that also counts as acknowledgement.
    pub fn apply(self, action: IncidentAction) -> IncidentStatus {
        match (self, action) {
            (status, IncidentAction::Detected) => status,
            (IncidentStatus::Resolved, _) => IncidentStatus::Resolved,
            (_, IncidentAction::Resolved) => IncidentStatus::Resolved,
            (IncidentStatus::New, IncidentAction::Ack | IncidentAction::Dispatch) => {
                IncidentStatus::Ack
            }
            (status, IncidentAction::Ack | IncidentAction::Dispatch) => status,
        }
    }
}

fn parse_action(value: Option<&Value>) -> Option<IncidentAction> {
    match value.and_then(Value::as_str)? {
        "detected" => Some(IncidentAction::Detected),
        "ack" => Some(IncidentAction::Ack),
        "dispatch" => Some(IncidentAction::Dispatch),
        "resolved" => Some(IncidentAction::Resolved),
        _ => None,
    }
}

fn parse_status(value: Option<&Value>) -> Option<IncidentStatus> {
    match value.and_then(Value::as_str)? {
        "new" => Some(IncidentStatus::New),
        "ack" => Some(IncidentStatus::Ack),
        "resolved" => Some(IncidentStatus::Resolved),
        _ => None,
    }
}

fn required_text(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

/// Parse an incident timeline document: malformed entries are dropped, the
/// rest sort newest-first and truncate to the retention bound.
pub fn parse_timeline(raw: &Value) -> Vec<IncidentTimelineEntry> {
    let Some(items) = raw.as_array() else {
        return Vec::new();
    };

    let mut rows: Vec<IncidentTimelineEntry> = items
        .iter()
        .filter_map(|entry| {
            let row = entry.as_object()?;
            let action = parse_action(row.get("action"))?;
            let id = required_text(row.get("id"))?;
            let event_id = required_text(row.get("event_id"))?;
            let zone_id = required_text(row.get("zone_id"))?;
            let actor = required_text(row.get("actor"))?;
            let at = row.get("at").and_then(Value::as_i64)?;

            Some(IncidentTimelineEntry {
                id,
                event_id,
                zone_id,
                action,
                actor,
                at,
                from_status: parse_status(row.get("from_status")),
                to_status: parse_status(row.get("to_status")),
                note: row.get("note").and_then(Value::as_str).map(str::to_string),
            })
        })
        .collect();

    rows.sort_by(|a, b| b.at.cmp(&a.at));
    rows.truncate(TIMELINE_MAX);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(id: &str, action: &str, at: i64) -> Value {
        json!({
            "id": id,
            "event_id": "evt-1",
            "zone_id": "zone-s001-center",
            "action": action,
            "actor": "operator-1",
            "at": at,
        })
    }

    #[test]
    fn test_parse_skips_malformed_entries() {
        let raw = json!([
            entry("t-1", "ack", 2_000),
            { "id": "t-bad", "action": "shrug", "at": 1_500 },
            { "action": "ack" },
            "not an object",
            entry("t-2", "detected", 1_000),
        ]);

        let rows = parse_timeline(&raw);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "t-1");
        assert_eq!(rows[1].id, "t-2");
    }

    #[test]
    fn test_parse_orders_newest_first_and_truncates() {
        let raw = Value::Array(
            (0..300i64)
                .map(|i| entry(&format!("t-{i}"), "detected", i))
                .collect(),
        );

        let rows = parse_timeline(&raw);
        assert_eq!(rows.len(), TIMELINE_MAX);
        assert_eq!(rows[0].at, 299);
        assert!(rows.windows(2).all(|pair| pair[0].at >= pair[1].at));
    }

    #[test]
    fn test_parse_keeps_status_fields_when_valid() {
        let raw = json!([{
            "id": "t-1",
            "event_id": "evt-1",
            "zone_id": "zone-s001-center",
            "action": "ack",
            "actor": "operator-1",
            "at": 1_000,
            "from_status": "new",
            "to_status": "ack",
            "note": "picked up",
        }]);

        let rows = parse_timeline(&raw);
        assert_eq!(rows[0].from_status, Some(IncidentStatus::New));
        assert_eq!(rows[0].to_status, Some(IncidentStatus::Ack));
        assert_eq!(rows[0].note.as_deref(), Some("picked up"));
    }

    #[test]
    fn test_status_machine_moves_forward_only() {
        use IncidentAction as A;
        use IncidentStatus as S;

        assert_eq!(S::New.apply(A::Detected), S::New);
        assert_eq!(S::New.apply(A::Ack), S::Ack);
        assert_eq!(S::New.apply(A::Resolved), S::Resolved);
        assert_eq!(S::Ack.apply(A::Resolved), S::Resolved);

        // Resolved is terminal.
        assert_eq!(S::Resolved.apply(A::Ack), S::Resolved);
        assert_eq!(S::Resolved.apply(A::Dispatch), S::Resolved);
        assert_eq!(S::Resolved.apply(A::Detected), S::Resolved);

        // No backward transitions.
        assert_eq!(S::Ack.apply(A::Detected), S::Ack);
        assert_eq!(S::Ack.apply(A::Ack), S::Ack);
    }

    #[test]
    fn test_dispatch_promotes_new_to_ack() {
        assert_eq!(
            IncidentStatus::New.apply(IncidentAction::Dispatch),
            IncidentStatus::Ack
        );
        assert_eq!(
            IncidentStatus::Ack.apply(IncidentAction::Dispatch),
            IncidentStatus::Ack
        );
    }
}
