//! Responder selection and assignment.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use floodguard_config::MatchingConfig;
use floodguard_models::{
    BroadcastEvent, EmergencyCategory, GeoPoint, IncidentId, IncidentStatus, MatchCandidate,
    Notification, NotificationDispatcher, NotificationKind, PresenceBroadcaster, Responder,
    ResponderId, ResponderStatus, ValidationError,
};
use floodguard_routing::SafeRouteResolver;
use floodguard_store::{DispatchStore, StoreError};

use crate::DispatchError;
use crate::score::{MAX_RATING, calculate_driver_score, risk_adjusted_radius};

/// Binds available responders to pending incidents.
pub struct DriverMatcher {
    store: Arc<dyn DispatchStore>,
    resolver: Arc<SafeRouteResolver>,
    notifier: Arc<dyn NotificationDispatcher>,
    broadcaster: Arc<dyn PresenceBroadcaster>,
    config: MatchingConfig,
}

impl DriverMatcher {
    /// Creates a matcher over the given store and route resolver.
    #[must_use]
    pub fn new(
        store: Arc<dyn DispatchStore>,
        resolver: Arc<SafeRouteResolver>,
        notifier: Arc<dyn NotificationDispatcher>,
        broadcaster: Arc<dyn PresenceBroadcaster>,
        config: MatchingConfig,
    ) -> Self {
        Self {
            store,
            resolver,
            notifier,
            broadcaster,
            config,
        }
    }

    /// The best available responder within `max_distance_km` of `point`,
    /// or `None` if nobody is in range.
    ///
    /// Ties on score go to the nearer responder, then to the lower id.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Store`] if responders cannot be listed.
    pub async fn find_best(
        &self,
        point: GeoPoint,
        category: EmergencyCategory,
        max_distance_km: f64,
    ) -> Result<Option<MatchCandidate>, DispatchError> {
        self.best_excluding(point, category, max_distance_km, &BTreeSet::new())
            .await
    }

    async fn best_excluding(
        &self,
        point: GeoPoint,
        category: EmergencyCategory,
        max_distance_km: f64,
        excluded: &BTreeSet<ResponderId>,
    ) -> Result<Option<MatchCandidate>, DispatchError> {
        let responders = self.store.list_available_responders().await?;

        let best = responders
            .iter()
            .filter(|r| !excluded.contains(&r.id))
            .filter_map(|r| candidate_for(r, point, max_distance_km))
            .min_by(rank);

        match &best {
            Some(c) => log::debug!(
                "Best {category} candidate near {point}: {} at {:.2} km (score {:.3})",
                c.responder_id,
                c.distance_km,
                c.score
            ),
            None => log::debug!(
                "No available responder within {max_distance_km:.1} km of {point} for {category}"
            ),
        }

        Ok(best)
    }

    /// Matching radius for an incident at `point`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Store`] if zones cannot be listed.
    pub async fn max_distance_for(&self, point: GeoPoint) -> Result<f64, DispatchError> {
        let nearby_risk = self
            .store
            .list_zones()
            .await?
            .iter()
            .filter(|z| z.center.distance_km(&point) <= self.config.zone_proximity_km)
            .map(|z| z.risk_score)
            .fold(0.0, f64::max);

        Ok(risk_adjusted_radius(
            self.config.base_max_distance_km,
            nearby_risk,
            self.config.risk_radius_divisor,
        ))
    }

    /// Tries to assign a responder to a pending incident.
    ///
    /// Returns `Ok(false)` when the incident is no longer pending, when no
    /// responder is eligible, or when no route can be found. The responder
    /// is reserved with a status compare-and-set before routing; losing
    /// that race moves on to the next best candidate.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NotFound`] for an unknown incident, or
    /// [`DispatchError::Store`] on storage failure.
    pub async fn assign(&self, incident_id: IncidentId) -> Result<bool, DispatchError> {
        let incident = self.store.get_incident(incident_id).await?;
        if incident.status != IncidentStatus::Pending {
            log::debug!(
                "Incident {incident_id} is {}, not pending; skipping assignment",
                incident.status
            );
            return Ok(false);
        }

        let max_distance_km = self.max_distance_for(incident.location).await?;
        let mut lost = BTreeSet::new();

        let candidate = loop {
            let Some(candidate) = self
                .best_excluding(incident.location, incident.category, max_distance_km, &lost)
                .await?
            else {
                log::info!("No eligible responder for incident {incident_id}; leaving it pending");
                return Ok(false);
            };

            if self
                .store
                .compare_and_set_responder_status(
                    candidate.responder_id,
                    ResponderStatus::Available,
                    ResponderStatus::Busy,
                )
                .await?
            {
                break candidate;
            }

            log::warn!(
                "Responder {} was taken concurrently; retrying incident {incident_id}",
                candidate.responder_id
            );
            lost.insert(candidate.responder_id);
        };

        let route = match self
            .resolver
            .resolve(candidate.responder_location, incident.location)
            .await
        {
            Ok(route) => route,
            Err(e) => {
                log::warn!("No route for incident {incident_id}: {e}; leaving it pending");
                self.release(candidate.responder_id).await;
                return Ok(false);
            }
        };

        let mut assigned = incident.clone();
        assigned.status = IncidentStatus::Assigned;
        assigned.assigned_responder = Some(candidate.responder_id);
        assigned.route = Some(route);
        assigned.assigned_at = Some(Utc::now());

        let stored = match self.store.update_incident(assigned).await {
            Ok(stored) => stored,
            Err(StoreError::ConcurrentConflict { .. }) => {
                log::info!("Incident {incident_id} changed during assignment; releasing responder");
                self.release(candidate.responder_id).await;
                return Ok(false);
            }
            Err(e) => {
                self.release(candidate.responder_id).await;
                return Err(e.into());
            }
        };

        log::info!(
            "Assigned responder {} to incident {incident_id} ({:.2} km, score {:.3})",
            candidate.responder_id,
            candidate.distance_km,
            candidate.score
        );

        self.announce(&stored, &candidate).await;
        Ok(true)
    }

    /// Runs [`Self::assign`] over every pending incident, highest priority
    /// first and oldest first within a priority. Returns how many were
    /// assigned.
    ///
    /// A failure on one incident is logged and does not stop the batch.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Store`] if pending incidents cannot be
    /// listed.
    pub async fn auto_assign_pending(&self) -> Result<usize, DispatchError> {
        let mut pending = self
            .store
            .list_incidents(Some(IncidentStatus::Pending))
            .await?;
        pending.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.reported_at.cmp(&b.reported_at))
        });

        let mut assigned = 0;
        for incident in &pending {
            match self.assign(incident.id).await {
                Ok(true) => assigned += 1,
                Ok(false) => {}
                Err(e) => log::error!("Auto-assign failed for incident {}: {e}", incident.id),
            }
        }

        if !pending.is_empty() {
            log::info!("Auto-assigned {assigned} of {} pending incidents", pending.len());
        }
        Ok(assigned)
    }

    /// Registers a new available responder.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Validation`] for an empty name or a rating
    /// outside `0..=5`.
    pub async fn register(
        &self,
        name: &str,
        location: Option<GeoPoint>,
        rating: f64,
    ) -> Result<Responder, DispatchError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyField { field: "name" }.into());
        }
        if !(0.0..=MAX_RATING).contains(&rating) {
            return Err(ValidationError::OutOfRange {
                field: "rating",
                value: rating,
            }
            .into());
        }

        let responder = Responder::new(name.to_string(), location, rating);
        self.store.insert_responder(responder.clone()).await?;
        log::info!("Registered responder {} ({})", responder.id, responder.name);
        Ok(responder)
    }

    /// Records a location heartbeat.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NotFound`] for an unknown responder.
    pub async fn heartbeat(
        &self,
        id: ResponderId,
        location: GeoPoint,
    ) -> Result<Responder, DispatchError> {
        Ok(self.store.update_responder_location(id, location).await?)
    }

    /// Moves a responder between `available` and `offline`.
    ///
    /// `busy` is only ever set by assignment, and a busy responder cannot
    /// go off shift until its incident is released.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Conflict`] if the responder is busy or the
    /// target is `busy`, or [`DispatchError::NotFound`] for an unknown id.
    pub async fn set_availability(
        &self,
        id: ResponderId,
        status: ResponderStatus,
    ) -> Result<Responder, DispatchError> {
        if status == ResponderStatus::Busy {
            return Err(DispatchError::Conflict {
                message: "responders become busy only through assignment".to_string(),
            });
        }

        let current = self.store.get_responder(id).await?;
        if current.status == status {
            return Ok(current);
        }
        if current.status == ResponderStatus::Busy
            || !self
                .store
                .compare_and_set_responder_status(id, current.status, status)
                .await?
        {
            return Err(DispatchError::Conflict {
                message: format!("responder {id} is busy with an incident"),
            });
        }

        Ok(self.store.get_responder(id).await?)
    }

    async fn release(&self, responder_id: ResponderId) {
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
            Ok(false) => log::warn!("Responder {responder_id} was not busy on release"),
            Err(e) => log::error!("Failed to release responder {responder_id}: {e}"),
        }
    }

    async fn announce(&self, incident: &floodguard_models::Incident, candidate: &MatchCandidate) {
        let responder_name = match self.store.get_responder(candidate.responder_id).await {
            Ok(responder) => responder.name,
            Err(e) => {
                log::error!(
                    "Could not load responder {} for assignment notice: {e}",
                    candidate.responder_id
                );
                String::new()
            }
        };
        let (distance_km, eta_minutes) = incident
            .route
            .as_ref()
            .map_or((candidate.distance_km, 0.0), |r| {
                (r.distance_km, r.estimated_minutes)
            });

        self.notifier.enqueue(Notification {
            targets: vec![
                incident.reporter_id.clone(),
                candidate.responder_id.to_string(),
            ],
            kind: NotificationKind::ResponderAssigned {
                incident_id: incident.id,
                responder_id: candidate.responder_id,
                responder_name,
                distance_km,
                eta_minutes,
            },
        });

        self.broadcaster.emit(BroadcastEvent::ResponderAssigned {
            incident_id: incident.id,
            responder_id: candidate.responder_id,
        });
        self.broadcaster
            .emit(BroadcastEvent::IncidentUpdated(Box::new(incident.clone())));
    }
}

fn candidate_for(
    responder: &Responder,
    point: GeoPoint,
    max_distance_km: f64,
) -> Option<MatchCandidate> {
    let location = responder.location?;
    let distance_km = location.distance_km(&point);
    if distance_km > max_distance_km {
        return None;
    }

    let completion_rate = responder.completion_rate();
    Some(MatchCandidate {
        responder_id: responder.id,
        responder_location: location,
        distance_km,
        rating: responder.rating,
        completion_rate,
        score: calculate_driver_score(
            distance_km,
            max_distance_km,
            responder.rating,
            completion_rate,
        ),
    })
}

/// Orders candidates best first.
fn rank(a: &MatchCandidate, b: &MatchCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.distance_km.total_cmp(&b.distance_km))
        .then_with(|| a.responder_id.cmp(&b.responder_id))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

    use async_trait::async_trait;
    use chrono::{DateTime, Duration};
    use floodguard_config::FloodguardConfig;
    use floodguard_models::{Incident, RiskZone};
    use floodguard_store::MemoryStore;

    use super::*;
    use crate::test_support::{
        Down, RecordingBroadcaster, RecordingNotifier, StraightLine, harness, harness_with, p,
    };

    /// Another instance reserves the first responder this one tries to.
    struct Contested {
        inner: MemoryStore,
        taken: AtomicBool,
    }

    #[async_trait]
    impl DispatchStore for Contested {
        async fn insert_incident(&self, incident: Incident) -> Result<(), StoreError> {
            self.inner.insert_incident(incident).await
        }

        async fn get_incident(&self, id: IncidentId) -> Result<Incident, StoreError> {
            self.inner.get_incident(id).await
        }

        async fn list_incidents(
            &self,
            status: Option<IncidentStatus>,
        ) -> Result<Vec<Incident>, StoreError> {
            self.inner.list_incidents(status).await
        }

        async fn update_incident(&self, incident: Incident) -> Result<Incident, StoreError> {
            self.inner.update_incident(incident).await
        }

        async fn insert_responder(&self, responder: Responder) -> Result<(), StoreError> {
            self.inner.insert_responder(responder).await
        }

        async fn get_responder(&self, id: ResponderId) -> Result<Responder, StoreError> {
            self.inner.get_responder(id).await
        }

        async fn list_available_responders(&self) -> Result<Vec<Responder>, StoreError> {
            self.inner.list_available_responders().await
        }

        async fn update_responder_location(
            &self,
            id: ResponderId,
            location: GeoPoint,
        ) -> Result<Responder, StoreError> {
            self.inner.update_responder_location(id, location).await
        }

        async fn compare_and_set_responder_status(
            &self,
            id: ResponderId,
            expected: ResponderStatus,
            new: ResponderStatus,
        ) -> Result<bool, StoreError> {
            if new == ResponderStatus::Busy && !self.taken.swap(true, AtomicOrdering::SeqCst) {
                self.inner
                    .compare_and_set_responder_status(id, expected, new)
                    .await?;
                return Ok(false);
            }
            self.inner
                .compare_and_set_responder_status(id, expected, new)
                .await
        }

        async fn complete_responder_job(
            &self,
            id: ResponderId,
            rating: Option<f64>,
        ) -> Result<Responder, StoreError> {
            self.inner.complete_responder_job(id, rating).await
        }

        async fn count_zones(&self) -> Result<usize, StoreError> {
            self.inner.count_zones().await
        }

        async fn insert_zones(&self, zones: Vec<RiskZone>) -> Result<usize, StoreError> {
            self.inner.insert_zones(zones).await
        }

        async fn list_zones(&self) -> Result<Vec<RiskZone>, StoreError> {
            self.inner.list_zones().await
        }

        async fn get_zone(&self, id: &str) -> Result<RiskZone, StoreError> {
            self.inner.get_zone(id).await
        }

        async fn record_zone_score(
            &self,
            id: &str,
            score: f64,
            rainfall_mm: f64,
            at: DateTime<Utc>,
            retention: Duration,
        ) -> Result<RiskZone, StoreError> {
            self.inner
                .record_zone_score(id, score, rainfall_mm, at, retention)
                .await
        }
    }

    async fn pending_incident(store: &dyn DispatchStore, at: GeoPoint) -> Incident {
        let incident = Incident::new(
            "citizen-1".to_string(),
            at,
            EmergencyCategory::Medical,
            "Water entering ground floor".to_string(),
            Utc::now(),
        );
        store.insert_incident(incident.clone()).await.unwrap();
        incident
    }

    #[tokio::test]
    async fn find_best_prefers_nearer_responder_and_skips_out_of_range() {
        let h = harness();
        let near = h.matcher.register("Near", Some(p(13.05, 80.23)), 4.0).await.unwrap();
        h.matcher.register("Far", Some(p(13.10, 80.23)), 4.0).await.unwrap();
        h.matcher.register("Too far", Some(p(13.60, 80.23)), 5.0).await.unwrap();
        h.matcher.register("Nowhere", None, 5.0).await.unwrap();

        let best = h
            .matcher
            .find_best(p(13.04, 80.23), EmergencyCategory::Rescue, 15.0)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(best.responder_id, near.id);
        assert!(best.score > 0.0 && best.score <= 1.0);
    }

    #[tokio::test]
    async fn find_best_breaks_exact_ties_by_id() {
        let h = harness();
        let a = h.matcher.register("A", Some(p(13.05, 80.23)), 4.0).await.unwrap();
        let b = h.matcher.register("B", Some(p(13.05, 80.23)), 4.0).await.unwrap();

        let best = h
            .matcher
            .find_best(p(13.04, 80.23), EmergencyCategory::Rescue, 15.0)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(best.responder_id, a.id.min(b.id));
    }

    #[tokio::test]
    async fn find_best_with_nobody_in_range_is_none() {
        let h = harness();
        let best = h
            .matcher
            .find_best(p(13.04, 80.23), EmergencyCategory::Medical, 15.0)
            .await
            .unwrap();
        assert!(best.is_none());
    }

    #[tokio::test]
    async fn assign_binds_responder_route_and_notifies() {
        let h = harness();
        let responder = h.matcher.register("Unit 7", Some(p(13.05, 80.24)), 4.5).await.unwrap();
        let incident = pending_incident(h.store.as_ref(), p(13.04, 80.23)).await;

        assert!(h.matcher.assign(incident.id).await.unwrap());

        let stored = h.store.get_incident(incident.id).await.unwrap();
        assert_eq!(stored.status, IncidentStatus::Assigned);
        assert_eq!(stored.assigned_responder, Some(responder.id));
        assert!(stored.route.is_some());
        assert!(stored.assigned_at.is_some());
        assert!(stored.is_consistent());

        let busy = h.store.get_responder(responder.id).await.unwrap();
        assert_eq!(busy.status, ResponderStatus::Busy);

        let sent = h.notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind.label(), "responder_assigned");
    }

    #[tokio::test]
    async fn assign_on_non_pending_incident_is_a_no_op() {
        let h = harness();
        h.matcher.register("Unit 7", Some(p(13.05, 80.24)), 4.5).await.unwrap();
        let incident = pending_incident(h.store.as_ref(), p(13.04, 80.23)).await;

        assert!(h.matcher.assign(incident.id).await.unwrap());
        assert!(!h.matcher.assign(incident.id).await.unwrap());
    }

    #[tokio::test]
    async fn assign_unknown_incident_is_not_found() {
        let h = harness();
        let result = h.matcher.assign(uuid::Uuid::new_v4()).await;
        assert!(matches!(result, Err(DispatchError::NotFound { kind: "incident", .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_assign_of_one_incident_has_one_winner() {
        let h = harness();
        h.matcher.register("Unit 1", Some(p(13.05, 80.24)), 4.5).await.unwrap();
        h.matcher.register("Unit 2", Some(p(13.06, 80.24)), 4.0).await.unwrap();
        let incident = pending_incident(h.store.as_ref(), p(13.04, 80.23)).await;

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let matcher = Arc::clone(&h.matcher);
                tokio::spawn(async move { matcher.assign(incident.id).await.unwrap() })
            })
            .collect();

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);

        // Every loser released whatever it reserved.
        let busy = h.store.list_available_responders().await.unwrap();
        assert_eq!(busy.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn two_incidents_competing_for_one_responder() {
        let h = harness();
        let only = h.matcher.register("Only unit", Some(p(13.05, 80.24)), 4.5).await.unwrap();
        let first = pending_incident(h.store.as_ref(), p(13.04, 80.23)).await;
        let second = pending_incident(h.store.as_ref(), p(13.045, 80.235)).await;

        let (a, b) = tokio::join!(
            tokio::spawn({
                let matcher = Arc::clone(&h.matcher);
                async move { matcher.assign(first.id).await.unwrap() }
            }),
            tokio::spawn({
                let matcher = Arc::clone(&h.matcher);
                async move { matcher.assign(second.id).await.unwrap() }
            }),
        );
        assert!(a.unwrap() ^ b.unwrap());

        let holders = h
            .store
            .list_incidents(Some(IncidentStatus::Assigned))
            .await
            .unwrap();
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].assigned_responder, Some(only.id));
    }

    #[tokio::test]
    async fn losing_the_reservation_falls_back_to_next_responder() {
        let config = FloodguardConfig::defaults();
        let store = Arc::new(Contested {
            inner: MemoryStore::new(),
            taken: AtomicBool::new(false),
        });
        let resolver = Arc::new(SafeRouteResolver::new(
            Arc::new(StraightLine),
            store.clone(),
            config.routing.clone(),
        ));
        let matcher = DriverMatcher::new(
            store.clone(),
            resolver,
            Arc::new(RecordingNotifier::default()),
            Arc::new(RecordingBroadcaster::default()),
            config.matching,
        );
        let near = matcher.register("Near", Some(p(13.05, 80.24)), 4.5).await.unwrap();
        let next = matcher.register("Next", Some(p(13.07, 80.24)), 4.5).await.unwrap();
        let incident = pending_incident(store.as_ref(), p(13.04, 80.23)).await;

        assert!(matcher.assign(incident.id).await.unwrap());

        let stored = store.get_incident(incident.id).await.unwrap();
        assert_eq!(stored.assigned_responder, Some(next.id));
        let taken = store.get_responder(near.id).await.unwrap();
        assert_eq!(taken.status, ResponderStatus::Busy);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn two_incidents_racing_for_the_same_best_responder_both_get_one() {
        for _ in 0..20 {
            let h = harness();
            let near = h.matcher.register("Near", Some(p(13.05, 80.24)), 4.5).await.unwrap();
            let next = h.matcher.register("Next", Some(p(13.07, 80.24)), 4.5).await.unwrap();
            let first = pending_incident(h.store.as_ref(), p(13.04, 80.23)).await;
            let second = pending_incident(h.store.as_ref(), p(13.041, 80.231)).await;

            let (a, b) = tokio::join!(
                tokio::spawn({
                    let matcher = Arc::clone(&h.matcher);
                    async move { matcher.assign(first.id).await.unwrap() }
                }),
                tokio::spawn({
                    let matcher = Arc::clone(&h.matcher);
                    async move { matcher.assign(second.id).await.unwrap() }
                }),
            );
            assert!(a.unwrap());
            assert!(b.unwrap());

            let mut holders: Vec<_> = h
                .store
                .list_incidents(Some(IncidentStatus::Assigned))
                .await
                .unwrap()
                .into_iter()
                .filter_map(|i| i.assigned_responder)
                .collect();
            holders.sort_unstable();
            let mut expected = vec![near.id, next.id];
            expected.sort_unstable();
            assert_eq!(holders, expected);
            assert!(h.store.list_available_responders().await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn nearby_flood_risk_widens_radius() {
        let h = harness();
        // ~20 km north of the incident: outside 15 km, inside 22.5 km.
        h.matcher.register("Distant", Some(p(13.22, 80.23)), 4.0).await.unwrap();
        let incident = pending_incident(h.store.as_ref(), p(13.04, 80.23)).await;

        assert!(!h.matcher.assign(incident.id).await.unwrap());

        let mut zone = RiskZone::new("here".to_string(), "Here".to_string(), p(13.04, 80.23), 9.0);
        zone.risk_score = 10.0;
        h.store.insert_zones(vec![zone]).await.unwrap();

        let radius = h.matcher.max_distance_for(p(13.04, 80.23)).await.unwrap();
        assert!((radius - 22.5).abs() < 1e-9);
        assert!(h.matcher.assign(incident.id).await.unwrap());
    }

    #[tokio::test]
    async fn unroutable_assignment_releases_responder() {
        let mut config = FloodguardConfig::defaults();
        config.routing.max_hop_km = 0.1;
        let h = harness_with(Arc::new(Down), config);
        let responder = h.matcher.register("Unit 7", Some(p(13.05, 80.24)), 4.5).await.unwrap();
        let incident = pending_incident(h.store.as_ref(), p(13.04, 80.23)).await;

        assert!(!h.matcher.assign(incident.id).await.unwrap());

        let stored = h.store.get_incident(incident.id).await.unwrap();
        assert_eq!(stored.status, IncidentStatus::Pending);
        let released = h.store.get_responder(responder.id).await.unwrap();
        assert_eq!(released.status, ResponderStatus::Available);
    }

    #[tokio::test]
    async fn auto_assign_serves_highest_priority_first() {
        let h = harness();
        let only = h.matcher.register("Only unit", Some(p(13.05, 80.24)), 4.5).await.unwrap();

        let shelter = Incident::new(
            "c1".to_string(),
            p(13.04, 80.23),
            EmergencyCategory::Shelter,
            String::new(),
            Utc::now() - chrono::Duration::minutes(10),
        );
        let medical = Incident::new(
            "c2".to_string(),
            p(13.04, 80.23),
            EmergencyCategory::Medical,
            String::new(),
            Utc::now(),
        );
        h.store.insert_incident(shelter.clone()).await.unwrap();
        h.store.insert_incident(medical.clone()).await.unwrap();

        assert_eq!(h.matcher.auto_assign_pending().await.unwrap(), 1);

        let stored = h.store.get_incident(medical.id).await.unwrap();
        assert_eq!(stored.assigned_responder, Some(only.id));
        let waiting = h.store.get_incident(shelter.id).await.unwrap();
        assert_eq!(waiting.status, IncidentStatus::Pending);
    }

    #[tokio::test]
    async fn availability_changes_respect_busy_responders() {
        let h = harness();
        let responder = h.matcher.register("Unit 7", Some(p(13.05, 80.24)), 4.5).await.unwrap();

        let offline = h
            .matcher
            .set_availability(responder.id, ResponderStatus::Offline)
            .await
            .unwrap();
        assert_eq!(offline.status, ResponderStatus::Offline);

        assert!(matches!(
            h.matcher.set_availability(responder.id, ResponderStatus::Busy).await,
            Err(DispatchError::Conflict { .. })
        ));

        h.matcher
            .set_availability(responder.id, ResponderStatus::Available)
            .await
            .unwrap();
        let incident = pending_incident(h.store.as_ref(), p(13.04, 80.23)).await;
        assert!(h.matcher.assign(incident.id).await.unwrap());

        assert!(matches!(
            h.matcher.set_availability(responder.id, ResponderStatus::Offline).await,
            Err(DispatchError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn register_rejects_bad_input() {
        let h = harness();
        assert!(matches!(
            h.matcher.register("  ", None, 3.0).await,
            Err(DispatchError::Validation(_))
        ));
        assert!(matches!(
            h.matcher.register("Unit", None, 6.0).await,
            Err(DispatchError::Validation(_))
        ));
    }
}
