#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Persistence for incidents, responders and risk zones.
//!
//! [`DispatchStore`] is the contract the dispatch core talks to. Every
//! write that can race is a single conditional operation:
//!
//! * incidents are written with [`DispatchStore::update_incident`], which
//!   only succeeds if the stored `version` still equals the version the
//!   caller read;
//! * responder availability flips with
//!   [`DispatchStore::compare_and_set_responder_status`], which only
//!   succeeds if the stored status equals the expected one.
//!
//! Both map onto a single `UPDATE ... WHERE` in a SQL backend, so several
//! process instances can share one database without in-process locks.
//! [`MemoryStore`] is the in-process implementation.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use floodguard_models::{
    GeoPoint, Incident, IncidentId, IncidentStatus, Responder, ResponderId, ResponderStatus,
    RiskZone,
};
use thiserror::Error;

/// Errors from store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No incident with this id.
    #[error("Incident not found: {id}")]
    IncidentNotFound {
        /// The missing id.
        id: IncidentId,
    },

    /// No responder with this id.
    #[error("Responder not found: {id}")]
    ResponderNotFound {
        /// The missing id.
        id: ResponderId,
    },

    /// No zone with this id.
    #[error("Risk zone not found: {id}")]
    ZoneNotFound {
        /// The missing id.
        id: String,
    },

    /// A record with this id already exists.
    #[error("Record already exists: {id}")]
    AlreadyExists {
        /// The duplicate id.
        id: String,
    },

    /// The incident changed since it was read.
    #[error("Concurrent update on incident {id}: expected version {expected_version}")]
    ConcurrentConflict {
        /// The incident.
        id: IncidentId,
        /// The version the caller read.
        expected_version: u64,
    },
}

/// Storage contract for the dispatch core.
///
/// Implementations must be `Send + Sync` so a single instance can be shared
/// behind an `Arc` by request handlers and background workers.
#[async_trait]
pub trait DispatchStore: Send + Sync {
    // ── Incidents ──────────────────────────────────────────────────────

    /// Inserts a new incident.
    async fn insert_incident(&self, incident: Incident) -> Result<(), StoreError>;

    /// Reads an incident by id.
    async fn get_incident(&self, id: IncidentId) -> Result<Incident, StoreError>;

    /// Lists incidents, optionally filtered by status, oldest report first.
    async fn list_incidents(
        &self,
        status: Option<IncidentStatus>,
    ) -> Result<Vec<Incident>, StoreError>;

    /// Replaces an incident if its stored version equals
    /// `incident.version`. Returns the stored copy with the bumped version.
    ///
    /// Returns [`StoreError::ConcurrentConflict`] if another writer got
    /// there first.
    async fn update_incident(&self, incident: Incident) -> Result<Incident, StoreError>;

    // ── Responders ─────────────────────────────────────────────────────

    /// Registers a responder.
    async fn insert_responder(&self, responder: Responder) -> Result<(), StoreError>;

    /// Reads a responder by id.
    async fn get_responder(&self, id: ResponderId) -> Result<Responder, StoreError>;

    /// All responders that are `available` with a known location.
    async fn list_available_responders(&self) -> Result<Vec<Responder>, StoreError>;

    /// Records a location heartbeat.
    async fn update_responder_location(
        &self,
        id: ResponderId,
        location: GeoPoint,
    ) -> Result<Responder, StoreError>;

    /// Sets the status to `new` only if it is currently `expected`.
    ///
    /// Returns `Ok(false)` when the current status differs.
    async fn compare_and_set_responder_status(
        &self,
        id: ResponderId,
        expected: ResponderStatus,
        new: ResponderStatus,
    ) -> Result<bool, StoreError>;

    /// Closes out a job: bumps both job counters, folds `rating` into the
    /// running average and releases a `busy` responder to `available`, in
    /// one write.
    async fn complete_responder_job(
        &self,
        id: ResponderId,
        rating: Option<f64>,
    ) -> Result<Responder, StoreError>;

    // ── Risk zones ─────────────────────────────────────────────────────

    /// Number of stored zones.
    async fn count_zones(&self) -> Result<usize, StoreError>;

    /// Inserts zones that do not exist yet. Returns how many were added.
    async fn insert_zones(&self, zones: Vec<RiskZone>) -> Result<usize, StoreError>;

    /// Lists all zones ordered by id.
    async fn list_zones(&self) -> Result<Vec<RiskZone>, StoreError>;

    /// Reads a zone by id.
    async fn get_zone(&self, id: &str) -> Result<RiskZone, StoreError>;

    /// Records a new score on a zone in one write: sets the current score
    /// and rainfall, appends a history sample and prunes samples older than
    /// `retention`. Returns the stored zone.
    ///
    /// Concurrent calls on the same zone each keep their sample.
    async fn record_zone_score(
        &self,
        id: &str,
        score: f64,
        rainfall_mm: f64,
        at: DateTime<Utc>,
        retention: Duration,
    ) -> Result<RiskZone, StoreError>;
}
