// src/feed_processor.rs
//
// Batch runner: discovers payload files under the feed input directory and
// plays them through the normalize -> sync -> signal pipeline in filename
// order, as if they had arrived over a live transport. Outputs the resulting
// event set and signal summaries as JSON.

use crate::event_adapter::{AdaptOptions, EventAdapter};
use crate::feed_normalizer::normalize_incoming_payload;
use crate::signals::{merge_signal_checks, SignalChecksState};
use crate::sync_engine::{apply_incoming_sync_batch, merge_events};
use crate::types::{Event, EventSource, FeedConfig};
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Mutable pipeline state threaded through the payload files.
#[derive(Default)]
pub struct FeedState {
    pub events: Vec<Event>,
    pub signals: SignalChecksState,
    pub signal_labels: Vec<String>,
}

#[derive(Debug, Default)]
pub struct FileStats {
    pub payloads: usize,
    pub upserts: usize,
    pub removals: usize,
}

pub struct FeedProcessor {
    config: FeedConfig,
    adapter: EventAdapter,
}

impl FeedProcessor {
    pub fn new(config: FeedConfig, adapter: EventAdapter) -> Self {
        Self { config, adapter }
    }

    pub fn adapter(&self) -> &EventAdapter {
        &self.adapter
    }

    pub fn adapt_options(&self) -> AdaptOptions {
        AdaptOptions {
            fallback_store_id: Some(self.config.fallback_store_id.clone()),
            default_source: source_from_config(&self.config.default_source),
        }
    }

    pub fn find_payload_files(&self) -> Result<Vec<PathBuf>> {
        let mut payloads = Vec::new();

        for entry in WalkDir::new(&self.config.input_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
                if ext.eq_ignore_ascii_case("json") || ext.eq_ignore_ascii_case("ndjson") {
                    payloads.push(path.to_path_buf());
                }
            }
        }

        // Filename order stands in for arrival order.
        payloads.sort();
        info!("Found {} payload files", payloads.len());
        Ok(payloads)
    }

    /// Install standing records (photo seeds) before any payload applies.
    pub fn install_seed_events(&self, state: &mut FeedState, seeds: Vec<Event>) {
        state.events = merge_events(&state.events, &seeds, Some(self.config.max_events));
        info!("Installed {} seed events", seeds.len());
    }

    /// Apply one raw payload to the running state.
    pub fn apply_payload(&self, state: &mut FeedState, payload: &Value) -> (usize, usize) {
        let batch = normalize_incoming_payload(
            &self.adapter,
            payload,
            self.config.max_events,
            &self.adapt_options(),
        );

        let upserts = batch.upsert.len();
        let removals = batch.remove_ids.len();

        state.events = apply_incoming_sync_batch(&state.events, &batch, self.config.max_events);
        if !batch.signal_patch.is_empty() {
            state.signals = merge_signal_checks(&state.signals, &batch.signal_patch);
        }
        for label in batch.signal_labels {
            if !state.signal_labels.contains(&label) {
                state.signal_labels.push(label);
            }
        }

        (upserts, removals)
    }

    /// One file is one payload, except .ndjson where every non-empty line is
    /// its own payload. File contents go in as raw text; the normalizer owns
    /// the parsing and treats garbage as an empty batch.
    pub fn process_file(&self, state: &mut FeedState, path: &Path) -> Result<FileStats> {
        debug!("Processing payload file: {}", path.display());
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading payload {}", path.display()))?;

        let mut stats = FileStats::default();
        let is_ndjson = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("ndjson"));

        if is_ndjson {
            for line in contents.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                let (upserts, removals) =
                    self.apply_payload(state, &Value::String(line.to_string()));
                stats.payloads += 1;
                stats.upserts += upserts;
                stats.removals += removals;
            }
        } else {
            let (upserts, removals) = self.apply_payload(state, &Value::String(contents));
            stats.payloads = 1;
            stats.upserts = upserts;
            stats.removals = removals;
        }

        info!(
            "{}: {} payloads, {} upserts, {} removals, {} events held",
            path.display(),
            stats.payloads,
            stats.upserts,
            stats.removals,
            state.events.len()
        );
        Ok(stats)
    }

    pub fn write_outputs(&self, state: &FeedState) -> Result<()> {
        std::fs::create_dir_all(&self.config.output_dir)
            .with_context(|| format!("creating output dir {}", self.config.output_dir))?;

        let events_path = PathBuf::from(&self.config.output_dir).join("events.json");
        let events_json = serde_json::to_string_pretty(&state.events)?;
        std::fs::write(&events_path, events_json)
            .with_context(|| format!("writing {}", events_path.display()))?;

        let signals_path = PathBuf::from(&self.config.output_dir).join("signal_checks.json");
        let signals_json = serde_json::to_string_pretty(&state.signals)?;
        std::fs::write(&signals_path, signals_json)
            .with_context(|| format!("writing {}", signals_path.display()))?;

        info!(
            "Wrote {} events to {}",
            state.events.len(),
            events_path.display()
        );
        Ok(())
    }
}

fn source_from_config(source: &str) -> EventSource {
    match source.trim().to_lowercase().as_str() {
        "demo" => EventSource::Demo,
        "camera" => EventSource::Camera,
        "api" => EventSource::Api,
        "unknown" => EventSource::Unknown,
        other => {
            warn!("Unrecognized default_source '{}', using api", other);
            EventSource::Api
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{adapter, event};
    use serde_json::json;

    fn processor() -> FeedProcessor {
        FeedProcessor::new(
            FeedConfig {
                input_dir: "feed_in".to_string(),
                output_dir: "feed_out".to_string(),
                max_events: 50,
                fallback_store_id: "s001".to_string(),
                default_source: "api".to_string(),
                seed_reference_events: true,
            },
            adapter(),
        )
    }

    #[test]
    fn test_apply_payload_updates_events_and_signals() {
        let processor = processor();
        let mut state = FeedState::default();

        let payload = json!({
            "deviceId": "camera-edge-01",
            "timestamp": 1_739_168_718i64,
            "eventType": "SAFETY",
            "severity": "Critical",
            "data": {
                "count": 1,
                "objects": [{
                    "track_id": 7,
                    "status": "fall_down",
                    "confidence": 0.9,
                    "location": { "world": { "x": 1.0, "z": 2.0 } },
                }],
            },
        });

        let (upserts, removals) = processor.apply_payload(&mut state, &payload);
        assert_eq!(upserts, 1);
        assert_eq!(removals, 0);
        assert_eq!(state.events.len(), 1);
        assert!(state.signals.safety.updated_at.is_some());
        assert_eq!(state.signal_labels, vec!["이상행동".to_string()]);
    }

    #[test]
    fn test_seed_events_survive_replace_payload() {
        let processor = processor();
        let mut state = FeedState::default();
        processor.install_seed_events(
            &mut state,
            vec![event("photo-log-1", 1_000), event("evt-normal", 1_500)],
        );
        processor.apply_payload(
            &mut state,
            &json!({
                "sync_mode": "replace",
                "events": [{
                    "eventId": "evt-fresh",
                    "timestamp": 1_739_168_718i64,
                    "eventType": "crowd",
                    "position": { "x": 0.5, "y": 0.5 },
                }],
            }),
        );

        let ids: Vec<&str> = state.events.iter().map(|e| e.id.as_str()).collect();
        assert!(ids.contains(&"photo-log-1"));
        assert!(ids.contains(&"evt-fresh"));
        assert!(!ids.contains(&"evt-normal"));
    }

    #[test]
    fn test_garbage_payload_leaves_state_intact() {
        let processor = processor();
        let mut state = FeedState::default();
        processor.install_seed_events(&mut state, vec![event("photo-log-1", 1_000)]);

        let (upserts, removals) =
            processor.apply_payload(&mut state, &Value::String("%%% not json".to_string()));
        assert_eq!(upserts, 0);
        assert_eq!(removals, 0);
        assert_eq!(state.events.len(), 1);
    }
}
