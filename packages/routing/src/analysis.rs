//! Scores a waypoint chain against risk zones.

use floodguard_models::{GeoPoint, RiskZone};

/// Risk and length of a candidate route.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteAnalysis {
    /// Sum of consecutive segment lengths.
    pub distance_km: f64,
    /// Accumulated zone risk divided by the number of near-zone waypoints,
    /// or `0` when no waypoint is near a zone.
    pub avg_risk_score: f64,
    /// Waypoints within the proximity threshold of at least one zone.
    pub near_zone_waypoints: usize,
}

/// Total length of a waypoint chain in kilometres.
#[must_use]
pub fn path_distance_km(waypoints: &[GeoPoint]) -> f64 {
    waypoints
        .windows(2)
        .map(|pair| pair[0].distance_km(&pair[1]))
        .sum()
}

/// Walks the route and accumulates zone risk for every waypoint within
/// `proximity_km` of a zone center. A waypoint near several zones counts
/// the riskiest one.
#[must_use]
pub fn analyze_route(waypoints: &[GeoPoint], zones: &[RiskZone], proximity_km: f64) -> RouteAnalysis {
    let mut accumulated = 0.0;
    let mut near = 0usize;

    for waypoint in waypoints {
        let worst = zones
            .iter()
            .filter(|z| waypoint.distance_km(&z.center) <= proximity_km)
            .map(|z| z.risk_score)
            .reduce(f64::max);

        if let Some(score) = worst {
            accumulated += score;
            near += 1;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let avg_risk_score = if near == 0 {
        0.0
    } else {
        accumulated / near as f64
    };

    RouteAnalysis {
        distance_km: path_distance_km(waypoints),
        avg_risk_score,
        near_zone_waypoints: near,
    }
}

/// Zones scoring above `min_score` that some waypoint passes within
/// `proximity_km` of.
#[must_use]
pub fn risky_zones_on_route<'a>(
    waypoints: &[GeoPoint],
    zones: &'a [RiskZone],
    proximity_km: f64,
    min_score: f64,
) -> Vec<&'a RiskZone> {
    zones
        .iter()
        .filter(|z| z.risk_score > min_score)
        .filter(|z| {
            waypoints
                .iter()
                .any(|w| w.distance_km(&z.center) <= proximity_km)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    fn zone(id: &str, center: GeoPoint, score: f64) -> RiskZone {
        let mut z = RiskZone::new(id.to_string(), id.to_string(), center, 3.0);
        z.risk_score = score;
        z
    }

    #[test]
    fn route_far_from_zones_has_zero_risk() {
        let route = [p(13.10, 80.20), p(13.10, 80.21), p(13.10, 80.22)];
        let zones = [zone("far", p(12.90, 80.20), 9.0)];
        let analysis = analyze_route(&route, &zones, 1.0);
        assert!(analysis.avg_risk_score.abs() < f64::EPSILON);
        assert_eq!(analysis.near_zone_waypoints, 0);
        assert!(analysis.distance_km > 2.0);
    }

    #[test]
    fn route_through_risky_zone_carries_its_score() {
        let route = [p(13.00, 80.245), p(13.00, 80.25), p(13.00, 80.30)];
        let zones = [zone("flooded", p(13.00, 80.25), 8.0)];
        let analysis = analyze_route(&route, &zones, 1.0);
        assert!(analysis.avg_risk_score > 0.0);
        assert!((analysis.avg_risk_score - 8.0).abs() < 1e-9);
        assert_eq!(analysis.near_zone_waypoints, 2);
    }

    #[test]
    fn overlapping_zones_count_the_riskiest_once() {
        let route = [p(13.00, 80.25)];
        let zones = [
            zone("a", p(13.001, 80.25), 3.0),
            zone("b", p(13.00, 80.251), 9.0),
        ];
        let analysis = analyze_route(&route, &zones, 1.0);
        assert_eq!(analysis.near_zone_waypoints, 1);
        assert!((analysis.avg_risk_score - 9.0).abs() < 1e-9);
    }

    #[test]
    fn only_near_and_risky_zones_are_reported() {
        let route = [p(13.00, 80.24), p(13.00, 80.26)];
        let zones = [
            zone("near_high", p(13.00, 80.2405), 8.0),
            zone("near_low", p(13.00, 80.2595), 2.0),
            zone("far_high", p(12.80, 80.10), 9.5),
        ];
        let risky = risky_zones_on_route(&route, &zones, 1.0, 7.0);
        assert_eq!(risky.len(), 1);
        assert_eq!(risky[0].id, "near_high");
    }
}
