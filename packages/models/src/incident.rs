use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::{GeoPoint, IncidentId, ResponderId, SafeRoute};

/// Dispatch priority, derived from the [`EmergencyCategory`].
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
pub enum Priority {
    /// Can wait for the next free responder.
    Low = 1,
    /// Needs attention within the hour.
    Medium = 2,
    /// Property or displacement at stake.
    High = 3,
    /// Life at risk.
    Critical = 4,
}

impl Priority {
    /// Returns the numeric value of this priority (1-4).
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }
}

/// The kind of emergency a citizen reports.
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
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum EmergencyCategory {
    /// Injury or illness needing transport or care.
    Medical,
    /// People trapped by rising water.
    Rescue,
    /// Households that must leave a flooding area.
    Evacuation,
    /// Displaced people needing a place to stay.
    Shelter,
    /// Food or drinking water shortage.
    FoodWater,
    /// Anything else.
    Other,
}

impl EmergencyCategory {
    /// Returns the dispatch priority for this category.
    #[must_use]
    pub const fn priority(self) -> Priority {
        match self {
            Self::Medical | Self::Rescue => Priority::Critical,
            Self::Evacuation => Priority::High,
            Self::Shelter | Self::FoodWater => Priority::Medium,
            Self::Other => Priority::Low,
        }
    }
}

/// Lifecycle state of an [`Incident`].
///
/// ```text
/// pending -> assigned -> in_progress -> completed
///    \          \
///     +----------+--> cancelled
/// ```
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
pub enum IncidentStatus {
    /// Reported, waiting for a responder.
    Pending,
    /// A responder holds the incident and has a route.
    Assigned,
    /// The responder is on site.
    InProgress,
    /// Resolved. Terminal.
    Completed,
    /// Withdrawn before work started. Terminal.
    Cancelled,
}

impl IncidentStatus {
    /// Whether the state machine permits moving from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Assigned | Self::Cancelled)
                | (Self::Assigned, Self::InProgress | Self::Cancelled)
                | (Self::InProgress, Self::Completed)
        )
    }

    /// Whether an incident in this state must hold an assigned responder.
    #[must_use]
    pub const fn holds_responder(self) -> bool {
        matches!(self, Self::Assigned | Self::InProgress)
    }
}

/// A single emergency report and everything that happened to it.
///
/// Incidents are never deleted. `version` increases on every stored write
/// and is the basis for compare-and-set updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Unique identifier.
    pub id: IncidentId,
    /// The citizen who reported it.
    pub reporter_id: String,
    /// Where help is needed.
    pub location: GeoPoint,
    /// Kind of emergency.
    pub category: EmergencyCategory,
    /// Free-text description from the reporter.
    pub description: String,
    /// Derived from `category` at creation.
    pub priority: Priority,
    /// Current lifecycle state.
    pub status: IncidentStatus,
    /// Set iff `status` is `assigned` or `in_progress`.
    pub assigned_responder: Option<ResponderId>,
    /// The last responder that held this incident, kept after release.
    pub completed_by: Option<ResponderId>,
    /// Route computed at assignment time.
    pub route: Option<SafeRoute>,
    /// When the report was received.
    pub reported_at: DateTime<Utc>,
    /// When a responder was assigned.
    pub assigned_at: Option<DateTime<Utc>>,
    /// When work started on site.
    pub started_at: Option<DateTime<Utc>>,
    /// When the incident was resolved.
    pub completed_at: Option<DateTime<Utc>>,
    /// When the incident was cancelled.
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Why the incident was cancelled.
    pub cancellation_reason: Option<String>,
    /// Optimistic concurrency version.
    pub version: u64,
}

impl Incident {
    /// Creates a new `pending` incident.
    #[must_use]
    pub fn new(
        reporter_id: String,
        location: GeoPoint,
        category: EmergencyCategory,
        description: String,
        reported_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            reporter_id,
            location,
            category,
            description,
            priority: category.priority(),
            status: IncidentStatus::Pending,
            assigned_responder: None,
            completed_by: None,
            route: None,
            reported_at,
            assigned_at: None,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            version: 0,
        }
    }

    /// Checks the assigned-responder invariant.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.status.holds_responder() == self.assigned_responder.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_machine_allows_only_documented_moves() {
        use IncidentStatus::{Assigned, Cancelled, Completed, InProgress, Pending};

        assert!(Pending.can_transition_to(Assigned));
        assert!(Assigned.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Assigned.can_transition_to(Cancelled));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(InProgress));
        assert!(!InProgress.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Pending));
        for next in [Pending, Assigned, InProgress, Completed, Cancelled] {
            assert!(!Completed.can_transition_to(next));
            assert!(!Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn category_drives_priority_ordering() {
        assert_eq!(EmergencyCategory::Medical.priority(), Priority::Critical);
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::Medium > Priority::Low);
        assert_eq!(
            "food_water".parse::<EmergencyCategory>().unwrap(),
            EmergencyCategory::FoodWater
        );
        assert_eq!(
            "MEDICAL".parse::<EmergencyCategory>().unwrap(),
            EmergencyCategory::Medical
        );
    }

    #[test]
    fn new_incident_is_pending_and_consistent() {
        let incident = Incident::new(
            "citizen-1".to_string(),
            GeoPoint::new(13.04, 80.23).unwrap(),
            EmergencyCategory::Rescue,
            "Family stuck on roof".to_string(),
            Utc::now(),
        );
        assert_eq!(incident.status, IncidentStatus::Pending);
        assert_eq!(incident.priority, Priority::Critical);
        assert!(incident.is_consistent());
    }
}
