//! HTTP handler functions for the dispatch API.

use actix_web::{HttpResponse, web};
use floodguard_dispatch::{DispatchError, NewIncident, TransitionOptions};
use floodguard_jobs::{Enqueued, QueueError};
use floodguard_models::{GeoPoint, IncidentId, ResponderId, ValidationError};
use floodguard_routing::RoutingError;
use floodguard_server_models::{
    ApiDeadLetter, ApiError, ApiHealth, ApiIncident, ApiJobAccepted, ApiJobStatus, ApiPoint,
    ApiResponder, ApiRoute, ApiZone, IncidentListParams, RefreshRequest, RegisterResponderRequest,
    ReportIncidentRequest, ResponderStatusRequest, RouteRequest, TransitionRequest,
};

use crate::AppState;

const DEFAULT_RESPONDER_RATING: f64 = 5.0;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `POST /api/incidents`
///
/// Stores a `pending` incident and answers `201` right away. Matching runs
/// in the background.
pub async fn report_incident(
    state: web::Data<AppState>,
    body: web::Json<ReportIncidentRequest>,
) -> HttpResponse {
    let body = body.into_inner();
    let report = NewIncident {
        reporter_id: body.reporter_id,
        latitude: body.latitude,
        longitude: body.longitude,
        category: body.category,
        description: body.description,
    };

    match state.lifecycle.report(report).await {
        Ok(reported) => HttpResponse::Created().json(ApiIncident::from(reported.incident)),
        Err(e) => dispatch_error(&e),
    }
}

/// `GET /api/incidents?status=pending`
pub async fn list_incidents(
    state: web::Data<AppState>,
    params: web::Query<IncidentListParams>,
) -> HttpResponse {
    match state.lifecycle.list(params.status).await {
        Ok(incidents) => HttpResponse::Ok().json(
            incidents
                .into_iter()
                .map(ApiIncident::from)
                .collect::<Vec<_>>(),
        ),
        Err(e) => dispatch_error(&e),
    }
}

/// `GET /api/incidents/{id}`
pub async fn get_incident(
    state: web::Data<AppState>,
    path: web::Path<IncidentId>,
) -> HttpResponse {
    match state.lifecycle.get(path.into_inner()).await {
        Ok(incident) => HttpResponse::Ok().json(ApiIncident::from(incident)),
        Err(e) => dispatch_error(&e),
    }
}

/// `POST /api/incidents/{id}/transition`
pub async fn transition_incident(
    state: web::Data<AppState>,
    path: web::Path<IncidentId>,
    body: web::Json<TransitionRequest>,
) -> HttpResponse {
    let body = body.into_inner();
    let options = TransitionOptions {
        reason: body.reason,
        rating: body.rating,
    };

    match state
        .lifecycle
        .transition(path.into_inner(), body.status, options)
        .await
    {
        Ok(incident) => HttpResponse::Ok().json(ApiIncident::from(incident)),
        Err(e) => dispatch_error(&e),
    }
}

/// `POST /api/responders`
pub async fn register_responder(
    state: web::Data<AppState>,
    body: web::Json<RegisterResponderRequest>,
) -> HttpResponse {
    let body = body.into_inner();
    let location = match body.location.map(to_point).transpose() {
        Ok(location) => location,
        Err(e) => return dispatch_error(&e.into()),
    };

    match state
        .matcher
        .register(
            &body.name,
            location,
            body.rating.unwrap_or(DEFAULT_RESPONDER_RATING),
        )
        .await
    {
        Ok(responder) => HttpResponse::Created().json(ApiResponder::from(responder)),
        Err(e) => dispatch_error(&e),
    }
}

/// `PUT /api/responders/{id}/location`
///
/// Location heartbeat.
pub async fn update_responder_location(
    state: web::Data<AppState>,
    path: web::Path<ResponderId>,
    body: web::Json<ApiPoint>,
) -> HttpResponse {
    let point = match to_point(body.into_inner()) {
        Ok(point) => point,
        Err(e) => return dispatch_error(&e.into()),
    };

    match state.matcher.heartbeat(path.into_inner(), point).await {
        Ok(responder) => HttpResponse::Ok().json(ApiResponder::from(responder)),
        Err(e) => dispatch_error(&e),
    }
}

/// `PUT /api/responders/{id}/status`
pub async fn update_responder_status(
    state: web::Data<AppState>,
    path: web::Path<ResponderId>,
    body: web::Json<ResponderStatusRequest>,
) -> HttpResponse {
    match state
        .matcher
        .set_availability(path.into_inner(), body.status)
        .await
    {
        Ok(responder) => HttpResponse::Ok().json(ApiResponder::from(responder)),
        Err(e) => dispatch_error(&e),
    }
}

/// `GET /api/zones`
pub async fn zones(state: web::Data<AppState>) -> HttpResponse {
    match state.store.list_zones().await {
        Ok(zones) => {
            HttpResponse::Ok().json(zones.into_iter().map(ApiZone::from).collect::<Vec<_>>())
        }
        Err(e) => {
            log::error!("Failed to list zones: {e}");
            internal_error(&e.to_string())
        }
    }
}

/// `POST /api/zones/refresh`
///
/// Queues a rescore of all zones, or only `zoneIds` when given, and answers
/// `202`. A request matching a refresh that is still queued or running is
/// reported as `duplicate`. The body is optional.
pub async fn refresh_zones(
    state: web::Data<AppState>,
    body: Option<web::Json<RefreshRequest>>,
) -> HttpResponse {
    let request = body.map(web::Json::into_inner).unwrap_or_default();
    job_accepted(state.scheduler.enqueue_refresh(request.zone_ids))
}

/// `POST /api/jobs/full-cycle`
///
/// Queues a refresh of every zone followed by auto-assignment.
pub async fn full_cycle(state: web::Data<AppState>) -> HttpResponse {
    job_accepted(state.scheduler.enqueue_full_cycle())
}

/// `GET /api/jobs/dead-letters`
pub async fn dead_letters(state: web::Data<AppState>) -> HttpResponse {
    let letters: Vec<ApiDeadLetter> = state
        .scheduler
        .dead_letters()
        .into_iter()
        .map(|d| ApiDeadLetter {
            key: d.key,
            job: d.job,
            attempts: d.attempts,
            error: d.error,
            failed_at: d.failed_at,
        })
        .collect();
    HttpResponse::Ok().json(letters)
}

/// `POST /api/routes`
///
/// Resolves the safest route between two points.
pub async fn route(state: web::Data<AppState>, body: web::Json<RouteRequest>) -> HttpResponse {
    let body = body.into_inner();
    let (from, to) = match (to_point(body.from), to_point(body.to)) {
        (Ok(from), Ok(to)) => (from, to),
        (Err(e), _) | (_, Err(e)) => return dispatch_error(&e.into()),
    };

    match state.resolver.resolve(from, to).await {
        Ok(route) => HttpResponse::Ok().json(ApiRoute::from(route)),
        Err(e) => dispatch_error(&e.into()),
    }
}

fn to_point(point: ApiPoint) -> Result<GeoPoint, ValidationError> {
    GeoPoint::new(point.latitude, point.longitude)
}

fn dispatch_error(e: &DispatchError) -> HttpResponse {
    let body = ApiError {
        error: e.to_string(),
    };
    match e {
        DispatchError::Validation(_) => HttpResponse::BadRequest().json(body),
        DispatchError::NotFound { .. } => HttpResponse::NotFound().json(body),
        DispatchError::InvalidTransition { .. } | DispatchError::Conflict { .. } => {
            HttpResponse::Conflict().json(body)
        }
        DispatchError::Routing(RoutingError::NoRouteFound { .. }) => {
            HttpResponse::UnprocessableEntity().json(body)
        }
        DispatchError::Routing(_) | DispatchError::Store(_) => {
            log::error!("Request failed: {e}");
            HttpResponse::InternalServerError().json(body)
        }
    }
}

fn job_accepted(result: Result<Enqueued, QueueError>) -> HttpResponse {
    match result {
        Ok(enqueued) => HttpResponse::Accepted().json(ApiJobAccepted {
            status: match enqueued {
                Enqueued::Queued => ApiJobStatus::Queued,
                Enqueued::Duplicate => ApiJobStatus::Duplicate,
            },
        }),
        Err(e) => {
            log::warn!("Could not queue job: {e}");
            HttpResponse::ServiceUnavailable().json(ApiError {
                error: e.to_string(),
            })
        }
    }
}

fn internal_error(message: &str) -> HttpResponse {
    HttpResponse::InternalServerError().json(ApiError {
        error: message.to_string(),
    })
}
