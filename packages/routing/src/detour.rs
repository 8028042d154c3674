//! Detour waypoint selection for the alternative tier.

use floodguard_models::{GeoPoint, RiskZone};

/// Below this separation the midpoint is treated as sitting on the hazard
/// centroid and the detour is pushed perpendicular to the route instead.
const COINCIDENT_KM: f64 = 1e-3;

/// Risk-weighted centroid of `zones`, or `None` if the slice is empty or
/// carries no risk.
#[must_use]
pub fn risk_centroid(zones: &[&RiskZone]) -> Option<GeoPoint> {
    let total: f64 = zones.iter().map(|z| z.risk_score).sum();
    if zones.is_empty() || total <= 0.0 {
        return None;
    }

    let (lat, lon) = zones.iter().fold((0.0, 0.0), |(lat, lon), z| {
        (
            z.center.latitude.mul_add(z.risk_score, lat),
            z.center.longitude.mul_add(z.risk_score, lon),
        )
    });

    Some(GeoPoint {
        latitude: lat / total,
        longitude: lon / total,
    })
}

/// A waypoint `offset_km` away from the centroid of `risky` zones, on the
/// side of the route midpoint.
///
/// Returns `None` when there is nothing to steer around.
#[must_use]
pub fn detour_point(
    start: &GeoPoint,
    end: &GeoPoint,
    risky: &[&RiskZone],
    offset_km: f64,
) -> Option<GeoPoint> {
    let centroid = risk_centroid(risky)?;
    let mid = start.midpoint(end);

    let bearing = if centroid.distance_km(&mid) < COINCIDENT_KM {
        (start.bearing_to(end) + 90.0).rem_euclid(360.0)
    } else {
        centroid.bearing_to(&mid)
    };

    Some(centroid.destination(bearing, offset_km))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    fn zone(center: GeoPoint, score: f64) -> RiskZone {
        let mut z = RiskZone::new("z".to_string(), "Z".to_string(), center, 4.0);
        z.risk_score = score;
        z
    }

    #[test]
    fn centroid_leans_towards_riskier_zone() {
        let a = zone(p(13.00, 80.20), 9.0);
        let b = zone(p(13.00, 80.30), 1.0);
        let c = risk_centroid(&[&a, &b]).unwrap();
        assert!((c.longitude - 80.21).abs() < 1e-9);
    }

    #[test]
    fn detour_lands_offset_away_from_hazard() {
        let start = p(13.00, 80.20);
        let end = p(13.00, 80.30);
        let hazard = zone(p(13.00, 80.25), 8.5);

        let detour = detour_point(&start, &end, &[&hazard], 2.0).unwrap();
        assert!((detour.distance_km(&hazard.center) - 2.0).abs() < 0.01);
    }

    #[test]
    fn off_route_hazard_pushes_detour_through_midpoint_side() {
        let start = p(13.00, 80.20);
        let end = p(13.00, 80.30);
        let hazard = zone(p(13.01, 80.25), 8.0);

        let detour = detour_point(&start, &end, &[&hazard], 2.0).unwrap();
        assert!(detour.latitude < hazard.center.latitude);
    }

    #[test]
    fn nothing_to_avoid_yields_none() {
        assert!(detour_point(&p(13.0, 80.2), &p(13.0, 80.3), &[], 2.0).is_none());
    }
}
