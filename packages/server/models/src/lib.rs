#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the floodguard server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the domain types so the API contract can evolve independently.

use chrono::{DateTime, Utc};
use floodguard_models::{
    EmergencyCategory, GeoPoint, Incident, IncidentStatus, Priority, Responder, ResponderStatus,
    RiskLevel, RiskZone, RouteSource, SafeRoute,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
}

/// Error body returned with every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable message.
    pub error: String,
}

/// A latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPoint {
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
}

impl From<GeoPoint> for ApiPoint {
    fn from(point: GeoPoint) -> Self {
        Self {
            latitude: point.latitude,
            longitude: point.longitude,
        }
    }
}

/// `POST /api/incidents` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportIncidentRequest {
    /// Reporting citizen.
    pub reporter_id: String,
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
    /// Emergency category, e.g. `"medical"`.
    pub category: EmergencyCategory,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
}

/// Query parameters for `GET /api/incidents`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentListParams {
    /// Only incidents in this status.
    pub status: Option<IncidentStatus>,
}

/// `POST /api/incidents/{id}/transition` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    /// Target status.
    pub status: IncidentStatus,
    /// Cancellation reason.
    pub reason: Option<String>,
    /// Citizen rating of the responder (0-5), on completion.
    pub rating: Option<f64>,
}

/// A computed route as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRoute {
    /// Ordered waypoints.
    pub waypoints: Vec<ApiPoint>,
    /// Total length.
    pub distance_km: f64,
    /// Average zone risk along the path.
    pub avg_risk_score: f64,
    /// Travel time at emergency speed.
    pub estimated_minutes: f64,
    /// Which routing tier produced it.
    pub source: RouteSource,
}

impl From<SafeRoute> for ApiRoute {
    fn from(route: SafeRoute) -> Self {
        Self {
            waypoints: route.waypoints.into_iter().map(ApiPoint::from).collect(),
            distance_km: route.distance_km,
            avg_risk_score: route.avg_risk_score,
            estimated_minutes: route.estimated_minutes,
            source: route.source,
        }
    }
}

/// An incident as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiIncident {
    /// Incident id.
    pub id: Uuid,
    /// Reporting citizen.
    pub reporter_id: String,
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
    /// Emergency category.
    pub category: EmergencyCategory,
    /// Free-text description.
    pub description: String,
    /// Priority name.
    pub priority: Priority,
    /// Priority numeric value (1-4).
    pub priority_value: u8,
    /// Lifecycle status.
    pub status: IncidentStatus,
    /// Responder currently holding the incident.
    pub assigned_responder: Option<Uuid>,
    /// Responder that last held the incident.
    pub completed_by: Option<Uuid>,
    /// Route computed at assignment.
    pub route: Option<ApiRoute>,
    /// When it was reported.
    pub reported_at: DateTime<Utc>,
    /// When a responder was assigned.
    pub assigned_at: Option<DateTime<Utc>>,
    /// When work started.
    pub started_at: Option<DateTime<Utc>>,
    /// When it was completed.
    pub completed_at: Option<DateTime<Utc>>,
    /// When it was cancelled.
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Why it was cancelled.
    pub cancellation_reason: Option<String>,
}

impl From<Incident> for ApiIncident {
    fn from(incident: Incident) -> Self {
        Self {
            id: incident.id,
            reporter_id: incident.reporter_id,
            latitude: incident.location.latitude,
            longitude: incident.location.longitude,
            category: incident.category,
            description: incident.description,
            priority: incident.priority,
            priority_value: incident.priority.value(),
            status: incident.status,
            assigned_responder: incident.assigned_responder,
            completed_by: incident.completed_by,
            route: incident.route.map(ApiRoute::from),
            reported_at: incident.reported_at,
            assigned_at: incident.assigned_at,
            started_at: incident.started_at,
            completed_at: incident.completed_at,
            cancelled_at: incident.cancelled_at,
            cancellation_reason: incident.cancellation_reason,
        }
    }
}

/// `POST /api/responders` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponderRequest {
    /// Display name.
    pub name: String,
    /// Initial location, if known.
    pub location: Option<ApiPoint>,
    /// Starting rating (0-5). Defaults to 5.
    pub rating: Option<f64>,
}

/// `PUT /api/responders/{id}/status` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponderStatusRequest {
    /// `available` or `offline`.
    pub status: ResponderStatus,
}

/// A responder as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponder {
    /// Responder id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Last known location.
    pub location: Option<ApiPoint>,
    /// Availability.
    pub status: ResponderStatus,
    /// Jobs taken.
    pub total_jobs: u32,
    /// Jobs completed.
    pub completed_jobs: u32,
    /// Completed share of jobs.
    pub completion_rate: f64,
    /// Average rating (0-5).
    pub rating: f64,
    /// Last heartbeat.
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl From<Responder> for ApiResponder {
    fn from(responder: Responder) -> Self {
        Self {
            completion_rate: responder.completion_rate(),
            id: responder.id,
            name: responder.name,
            location: responder.location.map(ApiPoint::from),
            status: responder.status,
            total_jobs: responder.total_jobs,
            completed_jobs: responder.completed_jobs,
            rating: responder.rating,
            last_seen_at: responder.last_seen_at,
        }
    }
}

/// A risk zone as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiZone {
    /// Zone id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Zone center.
    pub center: ApiPoint,
    /// Historical average flood depth.
    pub avg_flood_depth: f64,
    /// Current score (0-10).
    pub risk_score: f64,
    /// Score band.
    pub risk_level: RiskLevel,
    /// Rain expected over the next forecast steps.
    pub predicted_rainfall_mm: f64,
    /// Samples currently retained.
    pub history_samples: usize,
    /// Last refresh.
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<RiskZone> for ApiZone {
    fn from(zone: RiskZone) -> Self {
        Self {
            risk_level: zone.risk_level(),
            history_samples: zone.history.len(),
            id: zone.id,
            name: zone.name,
            center: zone.center.into(),
            avg_flood_depth: zone.avg_flood_depth,
            risk_score: zone.risk_score,
            predicted_rainfall_mm: zone.predicted_rainfall_mm,
            updated_at: zone.updated_at,
        }
    }
}

/// `POST /api/zones/refresh` body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    /// Zones to refresh; all when absent.
    pub zone_ids: Option<Vec<String>>,
}

/// Outcome of queueing background work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiJobStatus {
    /// Queued for a worker.
    Queued,
    /// The same job is already queued or running.
    Duplicate,
}

/// `202` body for `POST /api/zones/refresh` and `POST /api/jobs/full-cycle`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiJobAccepted {
    /// Whether a new job was queued.
    pub status: ApiJobStatus,
}

/// A permanently failed background job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDeadLetter {
    /// Idempotency key, if any.
    pub key: Option<String>,
    /// Payload description.
    pub job: String,
    /// Attempts made.
    pub attempts: u32,
    /// Last error.
    pub error: String,
    /// When the job was given up on.
    pub failed_at: DateTime<Utc>,
}

/// `POST /api/routes` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRequest {
    /// Start point.
    pub from: ApiPoint,
    /// End point.
    pub to: ApiPoint,
}
