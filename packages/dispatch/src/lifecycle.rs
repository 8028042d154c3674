//! The incident state machine.
//!
//! ```text
//! pending ──> assigned ──> in_progress ──> completed
//!    │            │
//!    └────────────┴──> cancelled
//! ```
//!
//! `assigned` is reached only through [`DriverMatcher::assign`]. Every
//! write is a versioned compare-and-set; a writer that loses re-reads the
//! incident and validates its move again.

use std::sync::Arc;

use chrono::Utc;
use floodguard_models::{
    BroadcastEvent, EmergencyCategory, GeoPoint, Incident, IncidentId, IncidentStatus,
    Notification, NotificationDispatcher, NotificationKind, PresenceBroadcaster, ResponderId,
    ResponderStatus, ValidationError,
};
use floodguard_store::{DispatchStore, StoreError};
use tokio::task::JoinHandle;

use crate::matcher::DriverMatcher;
use crate::score::MAX_RATING;
use crate::DispatchError;

const MAX_TRANSITION_ATTEMPTS: u32 = 5;

/// A citizen report before validation.
#[derive(Debug, Clone)]
pub struct NewIncident {
    /// The reporting citizen. Must not be empty.
    pub reporter_id: String,
    /// Latitude of the emergency.
    pub latitude: f64,
    /// Longitude of the emergency.
    pub longitude: f64,
    /// Kind of emergency; decides the priority.
    pub category: EmergencyCategory,
    /// Free-text description.
    pub description: String,
}

/// Result of [`IncidentLifecycleManager::report`].
#[derive(Debug)]
pub struct Reported {
    /// The stored `pending` incident.
    pub incident: Incident,
    /// The background matching attempt. Dropping it detaches the task.
    pub matching: JoinHandle<()>,
}

/// Extra inputs for a transition.
#[derive(Debug, Clone, Default)]
pub struct TransitionOptions {
    /// Recorded on cancellation.
    pub reason: Option<String>,
    /// Citizen rating (0 to 5) recorded on completion.
    pub rating: Option<f64>,
}

/// Takes incidents from report to a terminal state.
pub struct IncidentLifecycleManager {
    store: Arc<dyn DispatchStore>,
    matcher: Arc<DriverMatcher>,
    notifier: Arc<dyn NotificationDispatcher>,
    broadcaster: Arc<dyn PresenceBroadcaster>,
}

impl IncidentLifecycleManager {
    /// Creates a lifecycle manager that hands new incidents to `matcher`.
    #[must_use]
    pub fn new(
        store: Arc<dyn DispatchStore>,
        matcher: Arc<DriverMatcher>,
        notifier: Arc<dyn NotificationDispatcher>,
        broadcaster: Arc<dyn PresenceBroadcaster>,
    ) -> Self {
        Self {
            store,
            matcher,
            notifier,
            broadcaster,
        }
    }

    /// Stores a new `pending` incident and starts matching in the
    /// background. Returns as soon as the incident is stored.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Validation`] for bad coordinates or an
    /// empty reporter id.
    pub async fn report(&self, report: NewIncident) -> Result<Reported, DispatchError> {
        let location = GeoPoint::new(report.latitude, report.longitude)?;
        let reporter_id = report.reporter_id.trim();
        if reporter_id.is_empty() {
            return Err(ValidationError::EmptyField {
                field: "reporter_id",
            }
            .into());
        }

        let incident = Incident::new(
            reporter_id.to_string(),
            location,
            report.category,
            report.description.trim().to_string(),
            Utc::now(),
        );
        self.store.insert_incident(incident.clone()).await?;

        log::info!(
            "Incident {} reported at {location}: {} ({})",
            incident.id,
            incident.category,
            incident.priority
        );
        self.broadcaster
            .emit(BroadcastEvent::NewIncident(Box::new(incident.clone())));

        let matcher = Arc::clone(&self.matcher);
        let id = incident.id;
        let matching = tokio::spawn(async move {
            if let Err(e) = matcher.assign(id).await {
                log::error!("Matching failed for incident {id}: {e}");
            }
        });

        Ok(Reported { incident, matching })
    }

    /// Reads an incident.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NotFound`] for an unknown id.
    pub async fn get(&self, id: IncidentId) -> Result<Incident, DispatchError> {
        Ok(self.store.get_incident(id).await?)
    }

    /// Lists incidents, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Store`] on storage failure.
    pub async fn list(&self, status: Option<IncidentStatus>) -> Result<Vec<Incident>, DispatchError> {
        Ok(self.store.list_incidents(status).await?)
    }

    /// Moves an incident to `target`.
    ///
    /// # Errors
    ///
    /// * [`DispatchError::InvalidTransition`] if the state machine forbids
    ///   the move, including any move to `assigned`
    /// * [`DispatchError::Validation`] for a rating outside `0..=5`
    /// * [`DispatchError::NotFound`] for an unknown incident
    /// * [`DispatchError::Store`] if the incident keeps changing underneath
    pub async fn transition(
        &self,
        id: IncidentId,
        target: IncidentStatus,
        options: TransitionOptions,
    ) -> Result<Incident, DispatchError> {
        if let Some(rating) = options.rating
            && !(0.0..=MAX_RATING).contains(&rating)
        {
            return Err(ValidationError::OutOfRange {
                field: "rating",
                value: rating,
            }
            .into());
        }

        let mut last_version = 0;
        for attempt in 1..=MAX_TRANSITION_ATTEMPTS {
            let mut incident = self.store.get_incident(id).await?;
            let from = incident.status;
            if target == IncidentStatus::Assigned || !from.can_transition_to(target) {
                return Err(DispatchError::InvalidTransition { from, to: target });
            }

            let now = Utc::now();
            let released = apply(&mut incident, target, &options, now);
            last_version = incident.version;

            match self.store.update_incident(incident).await {
                Ok(stored) => {
                    log::info!("Incident {id}: {from} -> {target}");
                    self.after_commit(&stored, released, &options).await;
                    return Ok(stored);
                }
                Err(StoreError::ConcurrentConflict { .. }) => {
                    log::debug!("Incident {id} changed during {target} transition (attempt {attempt})");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(DispatchError::Store(StoreError::ConcurrentConflict {
            id,
            expected_version: last_version,
        }))
    }

    async fn after_commit(
        &self,
        incident: &Incident,
        released: Option<ResponderId>,
        options: &TransitionOptions,
    ) {
        match incident.status {
            IncidentStatus::Completed => {
                if let Some(responder_id) = released {
                    if let Err(e) = self
                        .store
                        .complete_responder_job(responder_id, options.rating)
                        .await
                    {
                        log::error!("Failed to close out job for responder {responder_id}: {e}");
                    }
                    self.notifier.enqueue(Notification {
                        targets: vec![incident.reporter_id.clone(), responder_id.to_string()],
                        kind: NotificationKind::JobCompleted {
                            incident_id: incident.id,
                            responder_id,
                        },
                    });
                }
            }
            IncidentStatus::Cancelled => {
                let mut targets = vec![incident.reporter_id.clone()];
                if let Some(responder_id) = released {
                    match self
                        .store
                        .compare_and_set_responder_status(
                            responder_id,
                            ResponderStatus::Busy,
                            ResponderStatus::Available,
                        )
                        .await
                    {
                        Ok(true) => {}
                        Ok(false) => log::warn!("Responder {responder_id} was not busy on cancel"),
                        Err(e) => log::error!("Failed to release responder {responder_id}: {e}"),
                    }
                    targets.push(responder_id.to_string());
                }
                self.notifier.enqueue(Notification {
                    targets,
                    kind: NotificationKind::IncidentCancelled {
                        incident_id: incident.id,
                        reason: incident.cancellation_reason.clone(),
                    },
                });
            }
            _ => {}
        }

        self.broadcaster
            .emit(BroadcastEvent::IncidentUpdated(Box::new(incident.clone())));
    }
}

/// Applies the field changes for `target`. Returns the responder released
/// by this move, if any.
fn apply(
    incident: &mut Incident,
    target: IncidentStatus,
    options: &TransitionOptions,
    now: chrono::DateTime<Utc>,
) -> Option<ResponderId> {
    incident.status = target;
    match target {
        IncidentStatus::InProgress => {
            incident.started_at = Some(now);
            None
        }
        IncidentStatus::Completed => {
            incident.completed_at = Some(now);
            let released = incident.assigned_responder.take();
            incident.completed_by = released.or(incident.completed_by);
            released
        }
        IncidentStatus::Cancelled => {
            incident.cancelled_at = Some(now);
            incident.cancellation_reason.clone_from(&options.reason);
            let released = incident.assigned_responder.take();
            incident.completed_by = released.or(incident.completed_by);
            released
        }
        IncidentStatus::Pending | IncidentStatus::Assigned => None,
    }
}
