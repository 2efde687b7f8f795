// src/zone_resolver.rs
//
// Zone assignment for a normalized floor-plan point, degrading gracefully:
// explicit zone id -> polygon containment -> nearest centroid. Zone polygons
// arrive in source pixel space and are normalized exactly once at load.

use crate::geometry::{clamp01, point_in_polygon};
use crate::types::ZoneMapDoc;

/// Placeholder ids some producers stamp on every record. These carry no
/// spatial information and fall through to geometric resolution.
const GENERIC_ZONE_IDS: [&str; 5] = ["store", "site", "shop", "global", "all"];

struct ResolvedZone {
    zone_id: String,
    polygon: Vec<[f64; 2]>,
    holes: Vec<Vec<[f64; 2]>>,
    centroid: [f64; 2],
}

pub struct ZoneResolver {
    zones: Vec<ResolvedZone>,
}

impl ZoneResolver {
    pub fn new(doc: &ZoneMapDoc) -> Self {
        let width = doc.map.width.max(1.0);
        let height = doc.map.height.max(1.0);

        let norm_point = |p: &[f64; 2]| [clamp01(p[0] / width), clamp01(p[1] / height)];
        let norm_ring = |ring: &[[f64; 2]]| -> Vec<[f64; 2]> {
            ring.iter()
                .filter(|p| p[0].is_finite() && p[1].is_finite())
                .map(norm_point)
                .collect()
        };

        let zones = doc
            .zones
            .iter()
            .map(|zone| {
                let centroid = if zone.centroid[0].is_finite() && zone.centroid[1].is_finite() {
                    norm_point(&zone.centroid)
                } else {
                    [0.5, 0.5]
                };
                ResolvedZone {
                    zone_id: zone.zone_id.clone(),
                    polygon: norm_ring(&zone.polygon),
                    holes: zone.holes.iter().map(|hole| norm_ring(hole)).collect(),
                    centroid,
                }
            })
            .collect();

        Self { zones }
    }

    pub fn knows(&self, zone_id: &str) -> bool {
        self.zones.iter().any(|zone| zone.zone_id == zone_id)
    }

    /// Resolve the owning zone for a normalized point.
    ///
    /// An explicit candidate wins when it names a known zone; an unknown
    /// non-generic candidate is trusted as-is (upstream custom zoning).
    /// Otherwise: first containing polygon in document order (holes
    /// subtract), else the nearest centroid. Total whenever the map has at
    /// least one zone.
    pub fn resolve(&self, candidate: Option<&str>, x: f64, y: f64) -> String {
        if let Some(candidate) = candidate {
            if self.knows(candidate) {
                return candidate.to_string();
            }
            let lowered = candidate.to_lowercase();
            if !GENERIC_ZONE_IDS.contains(&lowered.as_str()) {
                return candidate.to_string();
            }
        }

        for zone in &self.zones {
            if !point_in_polygon(x, y, &zone.polygon) {
                continue;
            }
            if zone.holes.iter().any(|hole| point_in_polygon(x, y, hole)) {
                continue;
            }
            return zone.zone_id.clone();
        }

        self.nearest_centroid(x, y)
    }

    fn nearest_centroid(&self, x: f64, y: f64) -> String {
        let mut nearest_zone_id = self
            .zones
            .first()
            .map(|zone| zone.zone_id.clone())
            .unwrap_or_else(|| "zone-s001-center".to_string());
        let mut nearest_dist = f64::INFINITY;

        for zone in &self.zones {
            let dx = x - zone.centroid[0];
            let dy = y - zone.centroid[1];
            let dist = dx * dx + dy * dy;
            if dist < nearest_dist {
                nearest_dist = dist;
                nearest_zone_id = zone.zone_id.clone();
            }
        }

        nearest_zone_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MapInfo, ZoneDoc, ZoneMapDoc};

    fn zone_map() -> ZoneMapDoc {
        ZoneMapDoc {
            store_id: "s001".to_string(),
            map: MapInfo {
                image_name: "floor.png".to_string(),
                width: 800.0,
                height: 400.0,
                world: None,
            },
            zones: vec![
                ZoneDoc {
                    zone_id: "zone-left".to_string(),
                    name: "Left".to_string(),
                    polygon: vec![[0.0, 0.0], [400.0, 0.0], [400.0, 400.0], [0.0, 400.0]],
                    centroid: [200.0, 200.0],
                    holes: vec![],
                },
                ZoneDoc {
                    zone_id: "zone-right".to_string(),
                    name: "Right".to_string(),
                    polygon: vec![[400.0, 0.0], [800.0, 0.0], [800.0, 400.0], [400.0, 400.0]],
                    centroid: [600.0, 200.0],
                    holes: vec![vec![
                        [500.0, 100.0],
                        [600.0, 100.0],
                        [600.0, 200.0],
                        [500.0, 200.0],
                    ]],
                },
            ],
        }
    }

    #[test]
    fn test_explicit_known_zone_wins() {
        let resolver = ZoneResolver::new(&zone_map());
        // Point sits in zone-left; the explicit id still wins.
        assert_eq!(resolver.resolve(Some("zone-right"), 0.1, 0.5), "zone-right");
    }

    #[test]
    fn test_unknown_non_generic_id_trusted() {
        let resolver = ZoneResolver::new(&zone_map());
        assert_eq!(
            resolver.resolve(Some("custom-backroom"), 0.1, 0.5),
            "custom-backroom"
        );
    }

    #[test]
    fn test_generic_id_falls_through_to_containment() {
        let resolver = ZoneResolver::new(&zone_map());
        assert_eq!(resolver.resolve(Some("Store"), 0.25, 0.5), "zone-left");
        assert_eq!(resolver.resolve(Some("global"), 0.75, 0.9), "zone-right");
    }

    #[test]
    fn test_containment_in_document_order() {
        let resolver = ZoneResolver::new(&zone_map());
        assert_eq!(resolver.resolve(None, 0.25, 0.5), "zone-left");
        assert_eq!(resolver.resolve(None, 0.75, 0.9), "zone-right");
    }

    #[test]
    fn test_hole_subtracts_then_nearest_centroid() {
        let resolver = ZoneResolver::new(&zone_map());
        // (0.69, 0.38) is inside zone-right's fixture hole; no other polygon
        // contains it, so assignment falls to the nearest centroid.
        assert_eq!(resolver.resolve(None, 0.69, 0.38), "zone-right");
    }

    #[test]
    fn test_outside_every_polygon_uses_nearest_centroid() {
        let resolver = ZoneResolver::new(&zone_map());
        // Polygons span y in [0, 1] here, so pick an x beyond both and rely
        // on the centroid distance.
        assert_eq!(resolver.resolve(None, 1.0, 1.0), "zone-right");
    }
}
