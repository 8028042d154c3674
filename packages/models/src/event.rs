use serde::{Deserialize, Serialize};

use crate::{Incident, IncidentId, ResponderId, RiskLevel};

/// Externally visible state changes pushed to connected clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum BroadcastEvent {
    /// A zone's score was recomputed.
    ZoneUpdated {
        /// Zone id.
        zone_id: String,
        /// New score.
        risk_score: f64,
        /// New band.
        risk_level: RiskLevel,
    },
    /// A citizen reported a new incident.
    NewIncident(Box<Incident>),
    /// An incident changed state.
    IncidentUpdated(Box<Incident>),
    /// A responder was bound to an incident.
    ResponderAssigned {
        /// The incident.
        incident_id: IncidentId,
        /// The responder.
        responder_id: ResponderId,
    },
}

impl BroadcastEvent {
    /// Event name as seen by subscribers.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ZoneUpdated { .. } => "zone_updated",
            Self::NewIncident(_) => "new_incident",
            Self::IncidentUpdated(_) => "incident_updated",
            Self::ResponderAssigned { .. } => "responder_assigned",
        }
    }
}

/// One-way sink for [`BroadcastEvent`]s (the websocket fan-out lives
/// behind it). Must not block.
pub trait PresenceBroadcaster: Send + Sync {
    /// Publishes an event to whoever is listening.
    fn emit(&self, event: BroadcastEvent);
}
