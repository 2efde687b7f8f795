// src/test_support.rs
//
// Shared fixtures for the module tests: a two-zone floor map and an adapter
// wired with an uncalibrated transform (affine fallback only), so expected
// coordinates stay easy to compute by hand.

use crate::coordinate_transform::CoordinateTransform;
use crate::event_adapter::EventAdapter;
use crate::types::{
    Event, EventSource, EventType, IncidentStatus, MapInfo, WorldInfo, ZoneDoc, ZoneMapDoc,
};
use crate::zone_resolver::ZoneResolver;

pub fn zone_map() -> ZoneMapDoc {
    ZoneMapDoc {
        store_id: "s001".to_string(),
        map: MapInfo {
            image_name: "floor.png".to_string(),
            width: 800.0,
            height: 427.0,
            world: Some(WorldInfo {
                width_m: 13.0,
                depth_m: 15.12058,
                offset_x_m: 0.0,
                offset_z_m: 0.0,
            }),
        },
        zones: vec![
            ZoneDoc {
                zone_id: "zone-s001-entry".to_string(),
                name: "Entry".to_string(),
                polygon: vec![[0.0, 0.0], [400.0, 0.0], [400.0, 427.0], [0.0, 427.0]],
                centroid: [200.0, 213.0],
                holes: vec![],
            },
            ZoneDoc {
                zone_id: "zone-s001-center".to_string(),
                name: "Center".to_string(),
                polygon: vec![[400.0, 0.0], [800.0, 0.0], [800.0, 427.0], [400.0, 427.0]],
                centroid: [600.0, 213.0],
                holes: vec![],
            },
        ],
    }
}

pub fn adapter() -> EventAdapter {
    let map = zone_map();
    EventAdapter::new(
        CoordinateTransform::uncalibrated(),
        ZoneResolver::new(&map),
        &map,
    )
}

/// A fully-populated event for sync/merge tests.
pub fn event(id: &str, detected_at: i64) -> Event {
    Event {
        id: id.to_string(),
        store_id: "s001".to_string(),
        detected_at,
        ingested_at: detected_at,
        latency_ms: 0,
        event_type: EventType::Crowd,
        severity: 2,
        confidence: 0.84,
        zone_id: "zone-s001-center".to_string(),
        camera_id: None,
        track_id: None,
        object_label: None,
        raw_status: None,
        source: EventSource::Api,
        model_version: None,
        incident_status: IncidentStatus::New,
        x: 0.5,
        y: 0.5,
        world_x_m: None,
        world_z_m: None,
        note: None,
    }
}
