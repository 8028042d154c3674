//! Zone risk formula.
//!
//! ```text
//! base  = 0.6 * min(rainfall / 100, 1) + 0.4 * min(depth / 10, 1)
//! score = clamp(base * 10 * wind? * humidity? * cold?, 0, 10)
//! ```
//!
//! Weights, saturation points and the conditional multipliers come from
//! [`RiskScoreConfig`].

use floodguard_config::RiskScoreConfig;

/// Computes a `0..=10` risk score.
///
/// Multipliers apply independently and in order: wind above
/// `wind_threshold_kmh`, humidity above `humidity_threshold_pct`,
/// temperature below `cold_threshold_c`. Negative or non-finite inputs
/// count as zero.
#[must_use]
pub fn compute_risk_score(
    predicted_rainfall_mm: f64,
    avg_flood_depth: f64,
    wind_speed_kmh: f64,
    humidity_pct: f64,
    temperature_c: f64,
    params: &RiskScoreConfig,
) -> f64 {
    let rain_norm = normalise(predicted_rainfall_mm, params.rainfall_saturation_mm);
    let depth_norm = normalise(avg_flood_depth, params.depth_saturation);

    let mut score = (params.rainfall_weight * rain_norm + params.depth_weight * depth_norm) * 10.0;

    if wind_speed_kmh > params.wind_threshold_kmh {
        score *= params.wind_multiplier;
    }
    if humidity_pct > params.humidity_threshold_pct {
        score *= params.humidity_multiplier;
    }
    if temperature_c < params.cold_threshold_c {
        score *= params.cold_multiplier;
    }

    if score.is_finite() {
        score.clamp(0.0, 10.0)
    } else {
        0.0
    }
}

fn normalise(value: f64, saturation: f64) -> f64 {
    if !value.is_finite() || saturation <= 0.0 {
        return 0.0;
    }
    (value / saturation).clamp(0.0, 1.0)
}
