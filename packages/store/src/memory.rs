//! In-process [`DispatchStore`] backed by `tokio` read/write locks.
//!
//! Each conditional operation holds the write lock for the whole
//! compare-and-write, so it behaves like a single conditional `UPDATE`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use floodguard_models::{
    GeoPoint, Incident, IncidentId, IncidentStatus, Responder, ResponderId, ResponderStatus,
    RiskZone,
};
use tokio::sync::RwLock;

use crate::{DispatchStore, StoreError};

/// In-memory store. Cheap to construct; share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    incidents: RwLock<BTreeMap<IncidentId, Incident>>,
    responders: RwLock<BTreeMap<ResponderId, Responder>>,
    zones: RwLock<BTreeMap<String, RiskZone>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DispatchStore for MemoryStore {
    async fn insert_incident(&self, incident: Incident) -> Result<(), StoreError> {
        let mut incidents = self.incidents.write().await;
        if incidents.contains_key(&incident.id) {
            return Err(StoreError::AlreadyExists {
                id: incident.id.to_string(),
            });
        }
        incidents.insert(incident.id, incident);
        Ok(())
    }

    async fn get_incident(&self, id: IncidentId) -> Result<Incident, StoreError> {
        self.incidents
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::IncidentNotFound { id })
    }

    async fn list_incidents(
        &self,
        status: Option<IncidentStatus>,
    ) -> Result<Vec<Incident>, StoreError> {
        let mut rows: Vec<Incident> = self
            .incidents
            .read()
            .await
            .values()
            .filter(|i| status.is_none_or(|s| i.status == s))
            .cloned()
            .collect();
        rows.sort_by_key(|i| i.reported_at);
        Ok(rows)
    }

    async fn update_incident(&self, mut incident: Incident) -> Result<Incident, StoreError> {
        let mut incidents = self.incidents.write().await;
        let stored = incidents
            .get_mut(&incident.id)
            .ok_or(StoreError::IncidentNotFound { id: incident.id })?;

        if stored.version != incident.version {
            return Err(StoreError::ConcurrentConflict {
                id: incident.id,
                expected_version: incident.version,
            });
        }

        incident.version += 1;
        *stored = incident.clone();
        Ok(incident)
    }

    async fn insert_responder(&self, responder: Responder) -> Result<(), StoreError> {
        let mut responders = self.responders.write().await;
        if responders.contains_key(&responder.id) {
            return Err(StoreError::AlreadyExists {
                id: responder.id.to_string(),
            });
        }
        responders.insert(responder.id, responder);
        Ok(())
    }

    async fn get_responder(&self, id: ResponderId) -> Result<Responder, StoreError> {
        self.responders
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::ResponderNotFound { id })
    }

    async fn list_available_responders(&self) -> Result<Vec<Responder>, StoreError> {
        Ok(self
            .responders
            .read()
            .await
            .values()
            .filter(|r| r.is_matchable())
            .cloned()
            .collect())
    }

    async fn update_responder_location(
        &self,
        id: ResponderId,
        location: GeoPoint,
    ) -> Result<Responder, StoreError> {
        let mut responders = self.responders.write().await;
        let responder = responders
            .get_mut(&id)
            .ok_or(StoreError::ResponderNotFound { id })?;
        responder.location = Some(location);
        responder.last_seen_at = Some(Utc::now());
        Ok(responder.clone())
    }

    async fn compare_and_set_responder_status(
        &self,
        id: ResponderId,
        expected: ResponderStatus,
        new: ResponderStatus,
    ) -> Result<bool, StoreError> {
        let mut responders = self.responders.write().await;
        let responder = responders
            .get_mut(&id)
            .ok_or(StoreError::ResponderNotFound { id })?;

        if responder.status != expected {
            log::debug!(
                "Status CAS on responder {id} failed: expected {expected}, found {}",
                responder.status
            );
            return Ok(false);
        }

        responder.status = new;
        Ok(true)
    }

    async fn complete_responder_job(
        &self,
        id: ResponderId,
        rating: Option<f64>,
    ) -> Result<Responder, StoreError> {
        let mut responders = self.responders.write().await;
        let responder = responders
            .get_mut(&id)
            .ok_or(StoreError::ResponderNotFound { id })?;

        if let Some(rating) = rating {
            let rated = f64::from(responder.completed_jobs);
            responder.rating =
                ((responder.rating * rated + rating.clamp(0.0, 5.0)) / (rated + 1.0)).clamp(0.0, 5.0);
        }
        responder.total_jobs += 1;
        responder.completed_jobs += 1;
        if responder.status == ResponderStatus::Busy {
            responder.status = ResponderStatus::Available;
        }
        Ok(responder.clone())
    }

    async fn count_zones(&self) -> Result<usize, StoreError> {
        Ok(self.zones.read().await.len())
    }

    async fn insert_zones(&self, zones: Vec<RiskZone>) -> Result<usize, StoreError> {
        let mut stored = self.zones.write().await;
        let mut added = 0;
        for zone in zones {
            if !stored.contains_key(&zone.id) {
                stored.insert(zone.id.clone(), zone);
                added += 1;
            }
        }
        Ok(added)
    }

    async fn list_zones(&self) -> Result<Vec<RiskZone>, StoreError> {
        Ok(self.zones.read().await.values().cloned().collect())
    }

    async fn get_zone(&self, id: &str) -> Result<RiskZone, StoreError> {
        self.zones
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::ZoneNotFound { id: id.to_string() })
    }

    async fn record_zone_score(
        &self,
        id: &str,
        score: f64,
        rainfall_mm: f64,
        at: DateTime<Utc>,
        retention: Duration,
    ) -> Result<RiskZone, StoreError> {
        let mut zones = self.zones.write().await;
        let zone = zones
            .get_mut(id)
            .ok_or_else(|| StoreError::ZoneNotFound { id: id.to_string() })?;
        zone.record(score, rainfall_mm, at, retention);
        Ok(zone.clone())
    }
}
