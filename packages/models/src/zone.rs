use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::GeoPoint;

/// Coarse risk band used for map colouring and alerts.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RiskLevel {
    /// Score below 4.
    Low,
    /// Score from 4 up to 7.
    Moderate,
    /// Score of 7 or more.
    High,
}

impl RiskLevel {
    /// Classifies a `0..=10` score.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 7.0 {
            Self::High
        } else if score >= 4.0 {
            Self::Moderate
        } else {
            Self::Low
        }
    }
}

/// One historical observation for a zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSample {
    /// When the sample was taken.
    pub timestamp: DateTime<Utc>,
    /// Score at that time.
    pub score: f64,
    /// Predicted rainfall (mm) used for the score.
    pub rainfall_mm: f64,
    /// Historical depth used for the score.
    pub flood_depth: f64,
}

/// A geographic area with a flood-risk posture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskZone {
    /// Stable identifier (e.g. `"velachery"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Zone center.
    pub center: GeoPoint,
    /// Historical average flood depth.
    pub avg_flood_depth: f64,
    /// Current score, always within `0..=10`.
    pub risk_score: f64,
    /// Precipitation expected over the short forecast horizon (mm).
    pub predicted_rainfall_mm: f64,
    /// Past samples, oldest first, bounded by the retention window.
    pub history: Vec<RiskSample>,
    /// When the score was last recomputed.
    pub updated_at: Option<DateTime<Utc>>,
}

impl RiskZone {
    /// Creates a zone with zero score and empty history.
    #[must_use]
    pub const fn new(id: String, name: String, center: GeoPoint, avg_flood_depth: f64) -> Self {
        Self {
            id,
            name,
            center,
            avg_flood_depth,
            risk_score: 0.0,
            predicted_rainfall_mm: 0.0,
            history: Vec::new(),
            updated_at: None,
        }
    }

    /// Band for the current score.
    #[must_use]
    pub fn risk_level(&self) -> RiskLevel {
        RiskLevel::from_score(self.risk_score)
    }

    /// Records a new score and appends it to the history, dropping samples
    /// older than `retention`.
    pub fn record(&mut self, score: f64, rainfall_mm: f64, now: DateTime<Utc>, retention: Duration) {
        self.risk_score = score.clamp(0.0, 10.0);
        self.predicted_rainfall_mm = rainfall_mm;
        self.updated_at = Some(now);
        self.history.push(RiskSample {
            timestamp: now,
            score: self.risk_score,
            rainfall_mm,
            flood_depth: self.avg_flood_depth,
        });
        self.prune_history(now, retention);
    }

    fn prune_history(&mut self, now: DateTime<Utc>, retention: Duration) {
        let cutoff = now - retention;
        self.history.retain(|s| s.timestamp >= cutoff);
    }
}
