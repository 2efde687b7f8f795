// src/sync_engine.rs
//
// Application of a decomposed sync batch to the bounded event collection.
// Merge mode upserts onto the full existing set; replace mode first prunes
// everything except pinned records so a resync clears stale state without
// touching operator-placed markers. Applying the same batch twice yields the
// same collection as applying it once.

use crate::event_adapter::compare_feed_order;
use crate::feed_normalizer::{SyncBatch, SyncMode};
use crate::seed::is_pinned_event_id;
use crate::types::Event;
use std::collections::{HashMap, HashSet};

/// Shallow merge of an incoming record over an existing one with the same
/// id: the incoming record wins, but optional metadata it does not carry is
/// kept from the previous record.
fn merge_record(previous: &Event, incoming: &Event) -> Event {
    let mut merged = incoming.clone();
    merged.camera_id = merged.camera_id.or_else(|| previous.camera_id.clone());
    merged.track_id = merged.track_id.or_else(|| previous.track_id.clone());
    merged.object_label = merged.object_label.or_else(|| previous.object_label.clone());
    merged.raw_status = merged.raw_status.or_else(|| previous.raw_status.clone());
    merged.model_version = merged.model_version.or_else(|| previous.model_version.clone());
    merged.world_x_m = merged.world_x_m.or(previous.world_x_m);
    merged.world_z_m = merged.world_z_m.or(previous.world_z_m);
    merged.note = merged.note.or_else(|| previous.note.clone());
    merged
}

/// Merge incoming records into an existing collection by id, newest-first
/// ordered, optionally bounded.
pub fn merge_events(existing: &[Event], incoming: &[Event], max_events: Option<usize>) -> Vec<Event> {
    let mut merged: Vec<Event> = existing.to_vec();
    let mut index_by_id: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(idx, event)| (event.id.clone(), idx))
        .collect();

    for event in incoming {
        match index_by_id.get(&event.id) {
            Some(&idx) => merged[idx] = merge_record(&merged[idx], event),
            None => {
                index_by_id.insert(event.id.clone(), merged.len());
                merged.push(event.clone());
            }
        }
    }

    merged.sort_by(compare_feed_order);
    if let Some(max_events) = max_events {
        merged.truncate(max_events.max(1));
    }
    merged
}

/// Apply one decomposed batch: prune (replace mode only), merge upserts,
/// drop removed ids, re-sort, truncate. Removal of an absent id and merging
/// an unchanged record are both no-ops, which makes the whole step
/// idempotent.
pub fn apply_incoming_sync_batch(
    existing: &[Event],
    batch: &SyncBatch,
    max_events: usize,
) -> Vec<Event> {
    let preserved: Vec<Event> = match batch.mode {
        SyncMode::Replace => existing
            .iter()
            .filter(|event| is_pinned_event_id(&event.id))
            .cloned()
            .collect(),
        SyncMode::Merge => existing.to_vec(),
    };

    let mut next = merge_events(&preserved, &batch.upsert, None);

    if !batch.remove_ids.is_empty() {
        let remove_set: HashSet<&str> = batch.remove_ids.iter().map(String::as_str).collect();
        next.retain(|event| !remove_set.contains(event.id.as_str()));
    }

    next.sort_by(compare_feed_order);
    next.truncate(max_events.max(1));
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed_normalizer::{SyncBatch, SyncMode};
    use crate::test_support::event;

    fn batch(mode: SyncMode, upsert: Vec<Event>, remove_ids: Vec<&str>) -> SyncBatch {
        SyncBatch {
            mode,
            upsert,
            remove_ids: remove_ids.into_iter().map(String::from).collect(),
            ..SyncBatch::empty(mode)
        }
    }

    #[test]
    fn test_merge_inserts_and_updates() {
        let existing = vec![event("evt-1", 1_000), event("evt-2", 2_000)];
        let mut updated = event("evt-1", 5_000);
        updated.severity = 3;
        let incoming = batch(SyncMode::Merge, vec![updated, event("evt-3", 3_000)], vec![]);

        let next = apply_incoming_sync_batch(&existing, &incoming, 50);
        assert_eq!(next.len(), 3);
        assert_eq!(next[0].id, "evt-1");
        assert_eq!(next[0].severity, 3);
        assert_eq!(next[1].id, "evt-3");
        assert_eq!(next[2].id, "evt-2");
    }

    #[test]
    fn test_merge_backfills_optional_metadata() {
        let mut existing = event("evt-1", 1_000);
        existing.camera_id = Some("cam-9".to_string());
        existing.note = Some("first sighting".to_string());

        let incoming = batch(SyncMode::Merge, vec![event("evt-1", 2_000)], vec![]);
        let next = apply_incoming_sync_batch(&[existing], &incoming, 50);

        assert_eq!(next.len(), 1);
        assert_eq!(next[0].detected_at, 2_000);
        assert_eq!(next[0].camera_id.as_deref(), Some("cam-9"));
        assert_eq!(next[0].note.as_deref(), Some("first sighting"));
    }

    #[test]
    fn test_replace_preserves_only_pinned_records() {
        let existing = vec![
            event("evt-stale", 1_000),
            event("photo-log-3", 2_000),
            event("manual-map-abc", 3_000),
        ];
        let incoming = batch(SyncMode::Replace, vec![event("evt-fresh", 4_000)], vec![]);

        let next = apply_incoming_sync_batch(&existing, &incoming, 50);
        let ids: Vec<&str> = next.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["evt-fresh", "manual-map-abc", "photo-log-3"]);
    }

    #[test]
    fn test_removals_apply_in_any_mode() {
        let existing = vec![event("evt-1", 1_000), event("evt-2", 2_000)];

        let merge_remove = batch(SyncMode::Merge, vec![], vec!["evt-1", "evt-absent"]);
        let next = apply_incoming_sync_batch(&existing, &merge_remove, 50);
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].id, "evt-2");

        // Replace mode removes even a record its own upsert just added.
        let replace_remove = batch(
            SyncMode::Replace,
            vec![event("evt-3", 3_000)],
            vec!["evt-3"],
        );
        let next = apply_incoming_sync_batch(&existing, &replace_remove, 50);
        assert!(next.is_empty());
    }

    #[test]
    fn test_apply_is_idempotent() {
        let existing = vec![
            event("evt-1", 1_000),
            event("photo-log-0", 1_500),
            event("evt-2", 2_000),
        ];
        for mode in [SyncMode::Merge, SyncMode::Replace] {
            let incoming = batch(
                mode,
                vec![event("evt-2", 5_000), event("evt-new", 4_000)],
                vec!["evt-1"],
            );
            let once = apply_incoming_sync_batch(&existing, &incoming, 50);
            let twice = apply_incoming_sync_batch(&once, &incoming, 50);
            assert_eq!(
                once.iter().map(|e| &e.id).collect::<Vec<_>>(),
                twice.iter().map(|e| &e.id).collect::<Vec<_>>(),
                "mode {:?}",
                mode
            );
            assert_eq!(once.len(), twice.len());
        }
    }

    #[test]
    fn test_result_bounded_and_ordered() {
        let existing: Vec<Event> = (0..10i64)
            .map(|i| event(&format!("evt-{i}"), i * 100))
            .collect();
        let incoming = batch(SyncMode::Merge, vec![event("evt-top", 99_999)], vec![]);

        let next = apply_incoming_sync_batch(&existing, &incoming, 4);
        assert_eq!(next.len(), 4);
        assert_eq!(next[0].id, "evt-top");
        assert!(next.windows(2).all(|pair| {
            pair[0].detected_at > pair[1].detected_at
                || (pair[0].detected_at == pair[1].detected_at && pair[0].id < pair[1].id)
        }));
    }
}
