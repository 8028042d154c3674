//! Compile-time seed set of risk zones.
//!
//! The zones are embedded from `seeds/chennai.toml`. Seeding only happens on
//! an empty store; see [`crate::RiskScoringPipeline::seed`].

use floodguard_models::{GeoPoint, RiskZone};
use serde::Deserialize;

const SEED_TOML: &str = include_str!("../seeds/chennai.toml");

#[cfg(test)]
const EXPECTED_ZONE_COUNT: usize = 12;

#[derive(Debug, Deserialize)]
struct SeedFile {
    zones: Vec<SeedZone>,
}

#[derive(Debug, Deserialize)]
struct SeedZone {
    id: String,
    name: String,
    latitude: f64,
    longitude: f64,
    avg_flood_depth: f64,
}

/// Returns the initial zone set with zero scores and empty history.
///
/// # Panics
///
/// Panics if the embedded TOML is malformed or holds an invalid
/// coordinate. The file is a compile-time constant, so this indicates a
/// development error and is caught by tests.
#[must_use]
pub fn seed_zones() -> Vec<RiskZone> {
    let file: SeedFile = toml::de::from_str(SEED_TOML)
        .unwrap_or_else(|e| panic!("Failed to parse seed zones: {e}"));

    file.zones
        .into_iter()
        .map(|z| {
            let center = GeoPoint::new(z.latitude, z.longitude)
                .unwrap_or_else(|e| panic!("Seed zone '{}' has a bad center: {e}", z.id));
            RiskZone::new(z.id, z.name, center, z.avg_flood_depth)
        })
        .collect()
}
