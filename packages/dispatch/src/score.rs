//! Responder ranking.

/// Weight of proximity to the incident.
pub const DISTANCE_WEIGHT: f64 = 0.4;
/// Weight of the normalised rating.
pub const RATING_WEIGHT: f64 = 0.3;
/// Weight of the completion rate.
pub const COMPLETION_WEIGHT: f64 = 0.2;
/// Flat bonus every available responder receives.
pub const AVAILABILITY_BONUS: f64 = 0.1;

/// Highest rating a responder can hold.
pub const MAX_RATING: f64 = 5.0;

/// Scores a responder for an incident. The result lies in `[0.1, 1.0]`.
///
/// `distance_km` beyond `max_distance_km` earns no proximity credit; the
/// matcher filters those candidates out before scoring anyway.
#[must_use]
pub fn calculate_driver_score(
    distance_km: f64,
    max_distance_km: f64,
    rating: f64,
    completion_rate: f64,
) -> f64 {
    let proximity = if max_distance_km > 0.0 {
        (1.0 - distance_km / max_distance_km).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let rating = (rating / MAX_RATING).clamp(0.0, 1.0);
    let completion = completion_rate.clamp(0.0, 1.0);

    DISTANCE_WEIGHT * proximity
        + RATING_WEIGHT * rating
        + COMPLETION_WEIGHT * completion
        + AVAILABILITY_BONUS
}

/// Matching radius around an incident, widened by the riskiest nearby
/// zone: `base * (1 + risk / divisor)`.
#[must_use]
pub fn risk_adjusted_radius(base_km: f64, max_nearby_risk: f64, divisor: f64) -> f64 {
    if divisor <= 0.0 {
        return base_km;
    }
    base_km * (1.0 + max_nearby_risk.clamp(0.0, 10.0) / divisor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_possible_responder_scores_one() {
        let score = calculate_driver_score(0.0, 15.0, 5.0, 1.0);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn worst_in_range_responder_scores_availability_bonus() {
        let score = calculate_driver_score(15.0, 15.0, 0.0, 0.0);
        assert!((score - 0.1).abs() < 1e-9);
    }

    #[test]
    fn closer_responder_scores_strictly_higher() {
        let mut previous = f64::NEG_INFINITY;
        for tenth in (0..=150).rev() {
            let distance = f64::from(tenth) / 10.0;
            let score = calculate_driver_score(distance, 15.0, 4.2, 0.8);
            assert!(score > previous, "score at {distance} km not above farther one");
            previous = score;
        }
    }

    #[test]
    fn score_stays_in_bounds_for_odd_inputs() {
        let inputs = [
            (0.0, 15.0, 5.0, 1.0),
            (30.0, 15.0, 0.0, 0.0),
            (5.0, 0.0, 7.5, 2.0),
            (5.0, 15.0, -1.0, -0.5),
        ];
        for (d, max, rating, rate) in inputs {
            let score = calculate_driver_score(d, max, rating, rate);
            assert!(score > 0.0 && score <= 1.0, "{score} out of range");
        }
    }

    #[test]
    fn radius_widens_with_nearby_risk() {
        assert!((risk_adjusted_radius(15.0, 0.0, 20.0) - 15.0).abs() < 1e-9);
        assert!((risk_adjusted_radius(15.0, 10.0, 20.0) - 22.5).abs() < 1e-9);
        assert!((risk_adjusted_radius(15.0, 8.0, 0.0) - 15.0).abs() < 1e-9);
    }
}
