#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for flood emergency dispatch.
//!
//! Wires the dispatch core (store, risk pipeline, route resolver, matcher,
//! lifecycle manager) to live Open-Meteo and OSRM providers, starts the
//! background job scheduler and serves the REST API under `/api`. Zone
//! refreshes requested over HTTP go through the scheduler's risk queue.

mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use floodguard_config::{ConfigError, FloodguardConfig};
use floodguard_dispatch::sinks::LogBroadcaster;
use floodguard_dispatch::{DriverMatcher, IncidentLifecycleManager};
use floodguard_jobs::{JobScheduler, LogPushDelivery, PushDelivery, RiskJobHandler};
use floodguard_models::{GeoPoint, PresenceBroadcaster};
use floodguard_risk::open_meteo::OpenMeteoClient;
use floodguard_risk::weather::{WeatherError, WeatherProvider};
use floodguard_risk::{RiskError, RiskScoringPipeline};
use floodguard_routing::osrm::OsrmClient;
use floodguard_routing::{RoutingError, RoutingProvider, SafeRouteResolver};
use floodguard_store::{DispatchStore, MemoryStore};
use thiserror::Error;

/// Startup failures.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The weather client could not be built.
    #[error(transparent)]
    Weather(#[from] WeatherError),
    /// The routing client could not be built.
    #[error(transparent)]
    Routing(#[from] RoutingError),
    /// Seeding zones failed.
    #[error(transparent)]
    Risk(#[from] RiskError),
    /// Binding or serving failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Shared application state.
pub struct AppState {
    /// Incident, responder and zone storage.
    pub store: Arc<dyn DispatchStore>,
    /// Zone risk refresh.
    pub pipeline: Arc<RiskScoringPipeline>,
    /// Safe-route resolution.
    pub resolver: Arc<SafeRouteResolver>,
    /// Responder matching.
    pub matcher: Arc<DriverMatcher>,
    /// Incident state machine.
    pub lifecycle: Arc<IncidentLifecycleManager>,
    /// Risk and notification queues.
    pub scheduler: Arc<JobScheduler>,
}

impl AppState {
    /// Builds the dispatch core over the given collaborators.
    ///
    /// Notifications are queued on the scheduler's notification queue and
    /// handed to `delivery`. The risk queue stays closed until
    /// [`Self::start_jobs`].
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn assemble(
        config: &FloodguardConfig,
        store: Arc<dyn DispatchStore>,
        weather: Arc<dyn WeatherProvider>,
        routing: Arc<dyn RoutingProvider>,
        delivery: Arc<dyn PushDelivery>,
        broadcaster: Arc<dyn PresenceBroadcaster>,
    ) -> Self {
        let scheduler = Arc::new(JobScheduler::new(config.jobs.clone(), delivery));
        let notifier = scheduler.notifier();
        let pipeline = Arc::new(RiskScoringPipeline::new(
            Arc::clone(&store),
            weather,
            Arc::clone(&broadcaster),
            config.risk.clone(),
        ));
        let resolver = Arc::new(SafeRouteResolver::new(
            routing,
            Arc::clone(&store),
            config.routing.clone(),
        ));
        let matcher = Arc::new(DriverMatcher::new(
            Arc::clone(&store),
            Arc::clone(&resolver),
            Arc::clone(&notifier),
            Arc::clone(&broadcaster),
            config.matching.clone(),
        ));
        let lifecycle = Arc::new(IncidentLifecycleManager::new(
            Arc::clone(&store),
            Arc::clone(&matcher),
            notifier,
            broadcaster,
        ));

        Self {
            store,
            pipeline,
            resolver,
            matcher,
            lifecycle,
            scheduler,
        }
    }

    /// Starts the risk queue and the recurring full cycle.
    pub fn start_jobs(&self) {
        self.scheduler.start(Arc::new(RiskJobHandler::new(
            Arc::clone(&self.pipeline),
            Arc::clone(&self.matcher),
        )));
    }

    /// In-memory store with Open-Meteo and OSRM clients.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] if an HTTP client cannot be built.
    pub fn with_live_providers(
        config: &FloodguardConfig,
        delivery: Arc<dyn PushDelivery>,
        broadcaster: Arc<dyn PresenceBroadcaster>,
    ) -> Result<Self, ServerError> {
        let weather = OpenMeteoClient::new(
            &config.risk.open_meteo_base_url,
            config.risk.request_timeout(),
        )?;
        let routing = OsrmClient::new(
            &config.routing.osrm_base_url,
            config.routing.request_timeout(),
        )?;

        Ok(Self::assemble(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(weather),
            Arc::new(routing),
            delivery,
            broadcaster,
        ))
    }
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/incidents", web::post().to(handlers::report_incident))
            .route("/incidents", web::get().to(handlers::list_incidents))
            .route("/incidents/{id}", web::get().to(handlers::get_incident))
            .route(
                "/incidents/{id}/transition",
                web::post().to(handlers::transition_incident),
            )
            .route("/responders", web::post().to(handlers::register_responder))
            .route(
                "/responders/{id}/location",
                web::put().to(handlers::update_responder_location),
            )
            .route(
                "/responders/{id}/status",
                web::put().to(handlers::update_responder_status),
            )
            .route("/zones", web::get().to(handlers::zones))
            .route("/zones/refresh", web::post().to(handlers::refresh_zones))
            .route("/routes", web::post().to(handlers::route))
            .route("/jobs/full-cycle", web::post().to(handlers::full_cycle))
            .route("/jobs/dead-letters", web::get().to(handlers::dead_letters)),
    );
}

/// Parses a `"lat,lon"` pair.
///
/// # Errors
///
/// Returns a message if the text is not two comma-separated numbers
/// forming a valid coordinate.
pub fn parse_point(s: &str) -> Result<GeoPoint, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [lat, lon] = parts.as_slice() else {
        return Err(format!("expected \"lat,lon\", got \"{s}\""));
    };
    let lat: f64 = lat.parse().map_err(|e| format!("bad latitude \"{lat}\": {e}"))?;
    let lon: f64 = lon.parse().map_err(|e| format!("bad longitude \"{lon}\": {e}"))?;
    GeoPoint::new(lat, lon).map_err(|e| e.to_string())
}

/// Starts the dispatch API server and background jobs.
///
/// Seeds the zone set, starts the job scheduler (which queues a full risk
/// cycle immediately and then on every refresh interval) and serves until
/// the HTTP server shuts down. The caller provides the async runtime (e.g.
/// via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns [`ServerError`] if a provider client cannot be built, seeding
/// fails, or the HTTP server fails to bind or run.
#[allow(clippy::future_not_send)]
pub async fn run_server(config: FloodguardConfig) -> Result<(), ServerError> {
    let broadcaster: Arc<dyn PresenceBroadcaster> = Arc::new(LogBroadcaster);
    let state = AppState::with_live_providers(&config, Arc::new(LogPushDelivery), broadcaster)?;

    state.pipeline.seed().await?;
    state.start_jobs();

    let scheduler = Arc::clone(&state.scheduler);
    let state = web::Data::new(state);
    let bind_addr = config.server.bind_addr.clone();
    let port = config.server.port;

    log::info!("Starting server on {bind_addr}:{port}");

    let served = HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await;

    scheduler.stop().await;
    Ok(served?)
}
