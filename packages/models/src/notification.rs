use serde::{Deserialize, Serialize};

use crate::{IncidentId, ResponderId};

/// A notification to deliver to one or more users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Recipient user ids.
    pub targets: Vec<String>,
    /// What happened, with its payload.
    pub kind: NotificationKind,
}

/// Notification kinds, each with its own payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationKind {
    /// A responder is on the way.
    ResponderAssigned {
        /// The incident.
        incident_id: IncidentId,
        /// Who is coming.
        responder_id: ResponderId,
        /// Responder display name.
        responder_name: String,
        /// Route length.
        distance_km: f64,
        /// Estimated arrival.
        eta_minutes: f64,
    },
    /// The incident was resolved.
    JobCompleted {
        /// The incident.
        incident_id: IncidentId,
        /// Who resolved it.
        responder_id: ResponderId,
    },
    /// The incident was withdrawn.
    IncidentCancelled {
        /// The incident.
        incident_id: IncidentId,
        /// Reason given, if any.
        reason: Option<String>,
    },
}

impl NotificationKind {
    /// Short tag used in logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::ResponderAssigned { .. } => "responder_assigned",
            Self::JobCompleted { .. } => "job_completed",
            Self::IncidentCancelled { .. } => "incident_cancelled",
        }
    }
}

/// Fire-and-forget hand-off of notifications to the delivery pipeline.
/// Implementations queue and return immediately.
pub trait NotificationDispatcher: Send + Sync {
    /// Queues `notification` for delivery.
    fn enqueue(&self, notification: Notification);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let n = Notification {
            targets: vec!["citizen-1".to_string()],
            kind: NotificationKind::IncidentCancelled {
                incident_id: uuid::Uuid::nil(),
                reason: Some("duplicate".to_string()),
            },
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["kind"]["type"], "incident_cancelled");
        assert_eq!(json["kind"]["reason"], "duplicate");
    }
}
