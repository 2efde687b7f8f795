// src/main.rs

use anyhow::Result;
use floorwatch::config::load_reference_points;
use floorwatch::coordinate_transform::CoordinateTransform;
use floorwatch::event_adapter::EventAdapter;
use floorwatch::feed_processor::{FeedProcessor, FeedState};
use floorwatch::probe;
use floorwatch::seed;
use floorwatch::types::{Config, ZoneMapDoc};
use floorwatch::zone_resolver::ZoneResolver;
use tracing::{error, info, warn};

fn main() -> Result<()> {
    let config = Config::load("config.yaml").unwrap_or_else(|error| {
        eprintln!("config.yaml not loaded ({error:#}), using defaults");
        Config::default()
    });

    tracing_subscriber::fmt()
        .with_env_filter(format!("floorwatch={}", config.logging.level))
        .init();

    info!("Floorwatch telemetry pipeline starting");

    let zone_map = ZoneMapDoc::load(&config.data.zone_map_path)?;
    info!(
        "✓ Zone map loaded: {} zones over {}x{}px",
        zone_map.zones.len(),
        zone_map.map.width,
        zone_map.map.height
    );

    let reference_points = match load_reference_points(&config.data.reference_points_path) {
        Ok(points) => {
            info!("✓ {} reference points loaded", points.len());
            points
        }
        Err(error) => {
            warn!("Reference points unavailable ({error:#}), affine fallback only");
            Vec::new()
        }
    };

    let transform = CoordinateTransform::new(&reference_points);
    if transform.is_calibrated() {
        info!("✓ World->floor homography calibrated");
    }

    let resolver = ZoneResolver::new(&zone_map);
    let adapter = EventAdapter::new(transform, resolver, &zone_map);
    let processor = FeedProcessor::new(config.feed.clone(), adapter);

    let mut state = FeedState::default();
    if config.feed.seed_reference_events {
        let seeds = seed::build_photo_seed_events(
            processor.adapter(),
            &reference_points,
            probe::now_ms(),
        );
        processor.install_seed_events(&mut state, seeds);
    }

    let payload_files = processor.find_payload_files()?;
    if payload_files.is_empty() {
        warn!("No payload files in {}", config.feed.input_dir);
    }

    let mut total_payloads = 0usize;
    for path in &payload_files {
        match processor.process_file(&mut state, path) {
            Ok(stats) => total_payloads += stats.payloads,
            Err(error) => error!("Skipping {}: {error:#}", path.display()),
        }
    }

    processor.write_outputs(&state)?;

    info!(
        "Done: {} payloads applied, {} events held, crowd={} safety={} trash={}",
        total_payloads,
        state.events.len(),
        state.signals.crowd.tone.as_str(),
        state.signals.safety.tone.as_str(),
        state.signals.trash.tone.as_str()
    );

    Ok(())
}
