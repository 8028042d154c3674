use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::{GeoPoint, ResponderId};

/// Availability of a [`Responder`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ResponderStatus {
    /// Free to take an incident.
    Available,
    /// Holding an incident.
    Busy,
    /// Off shift.
    Offline,
}

/// A mobile unit (vehicle and operator) that can be dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Responder {
    /// Unique identifier.
    pub id: ResponderId,
    /// Display name.
    pub name: String,
    /// Last reported position. `None` means unknown and unmatchable.
    pub location: Option<GeoPoint>,
    /// Current availability.
    pub status: ResponderStatus,
    /// Jobs finished, successful or not.
    pub total_jobs: u32,
    /// Jobs completed successfully.
    pub completed_jobs: u32,
    /// Quality rating, `0..=5`.
    pub rating: f64,
    /// Time of the last location heartbeat.
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl Responder {
    /// Registers a new, available responder.
    #[must_use]
    pub fn new(name: String, location: Option<GeoPoint>, rating: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            name,
            location,
            status: ResponderStatus::Available,
            total_jobs: 0,
            completed_jobs: 0,
            rating: rating.clamp(0.0, 5.0),
            last_seen_at: location.map(|_| Utc::now()),
        }
    }

    /// Share of jobs completed. New responders count as `1.0`.
    #[must_use]
    pub fn completion_rate(&self) -> f64 {
        if self.total_jobs == 0 {
            1.0
        } else {
            f64::from(self.completed_jobs) / f64::from(self.total_jobs)
        }
    }

    /// Available and with a known location.
    #[must_use]
    pub const fn is_matchable(&self) -> bool {
        matches!(self.status, ResponderStatus::Available) && self.location.is_some()
    }
}

/// A scored (responder, incident) pairing considered during one matching
/// decision. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    /// The responder being considered.
    pub responder_id: ResponderId,
    /// Where the responder is.
    pub responder_location: GeoPoint,
    /// Great-circle distance to the incident.
    pub distance_km: f64,
    /// Rating at decision time.
    pub rating: f64,
    /// Completion rate at decision time.
    pub completion_rate: f64,
    /// Weighted score in `(0, 1]`.
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_responders_are_not_penalised() {
        let r = Responder::new("Boat 7".to_string(), None, 4.0);
        assert!((r.completion_rate() - 1.0).abs() < f64::EPSILON);
        assert!(!r.is_matchable());
    }

    #[test]
    fn completion_rate_uses_counters() {
        let mut r = Responder::new(
            "Truck 2".to_string(),
            Some(GeoPoint::new(13.0, 80.2).unwrap()),
            9.0,
        );
        r.total_jobs = 4;
        r.completed_jobs = 3;
        assert!((r.completion_rate() - 0.75).abs() < f64::EPSILON);
        assert!((r.rating - 5.0).abs() < f64::EPSILON);
        assert!(r.is_matchable());
    }
}
