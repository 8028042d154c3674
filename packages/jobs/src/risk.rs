//! Risk refresh jobs.

use std::sync::Arc;

use async_trait::async_trait;
use floodguard_dispatch::DriverMatcher;
use floodguard_risk::RiskScoringPipeline;

use crate::JobError;
use crate::queue::JobHandler;

/// Work items on the risk queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiskJob {
    /// Recompute the given zones, or all of them.
    Refresh {
        /// Zone ids; `None` means every zone.
        zone_ids: Option<Vec<String>>,
    },
    /// Refresh every zone, then retry pending incidents.
    FullCycle,
}

/// What a full cycle achieved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FullCycleReport {
    /// Zones rescored.
    pub zones_updated: usize,
    /// Pending incidents that got a responder.
    pub incidents_assigned: usize,
}

/// Refreshes every zone, then runs auto-assignment so incidents that had
/// no responder earlier get another chance under the new radii.
///
/// # Errors
///
/// Returns [`JobError::Transient`] if either step fails as a whole.
pub async fn run_full_cycle(
    pipeline: &RiskScoringPipeline,
    matcher: &DriverMatcher,
) -> Result<FullCycleReport, JobError> {
    let zones_updated = pipeline.refresh(None).await.map_err(JobError::transient)?;
    let incidents_assigned = matcher
        .auto_assign_pending()
        .await
        .map_err(JobError::transient)?;

    log::info!(
        "Full cycle: {zones_updated} zones refreshed, {incidents_assigned} incidents assigned"
    );

    Ok(FullCycleReport {
        zones_updated,
        incidents_assigned,
    })
}

/// Runs [`RiskJob`]s against the pipeline and matcher.
pub struct RiskJobHandler {
    pipeline: Arc<RiskScoringPipeline>,
    matcher: Arc<DriverMatcher>,
}

impl RiskJobHandler {
    /// Creates a handler that refreshes zones and reassigns pending incidents.
    #[must_use]
    pub const fn new(pipeline: Arc<RiskScoringPipeline>, matcher: Arc<DriverMatcher>) -> Self {
        Self { pipeline, matcher }
    }
}

#[async_trait]
impl JobHandler<RiskJob> for RiskJobHandler {
    async fn handle(&self, job: &RiskJob) -> Result<(), JobError> {
        match job {
            RiskJob::Refresh { zone_ids } => {
                let updated = self
                    .pipeline
                    .refresh(zone_ids.as_deref())
                    .await
                    .map_err(JobError::transient)?;
                log::info!("Refresh job updated {updated} zones");
            }
            RiskJob::FullCycle => {
                run_full_cycle(&self.pipeline, &self.matcher).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{NaiveDateTime, Utc};
    use floodguard_config::FloodguardConfig;
    use floodguard_dispatch::sinks::{LogBroadcaster, LogNotifier};
    use floodguard_models::{
        EmergencyCategory, GeoPoint, Incident, IncidentStatus, Responder,
    };
    use floodguard_risk::weather::{CurrentWeather, ForecastSample, WeatherError, WeatherProvider};
    use floodguard_routing::{RoutingError, RoutingProvider, SafeRouteResolver};
    use floodguard_store::{DispatchStore, MemoryStore};

    use super::*;

    struct Drizzle;

    #[async_trait]
    impl WeatherProvider for Drizzle {
        async fn current_weather(&self, _: GeoPoint) -> Result<CurrentWeather, WeatherError> {
            Ok(CurrentWeather {
                temperature_c: 27.0,
                humidity_pct: 70.0,
                precipitation_mm: 1.0,
                wind_speed_kmh: 10.0,
            })
        }

        async fn forecast(&self, _: GeoPoint, hours: u32) -> Result<Vec<ForecastSample>, WeatherError> {
            let start = NaiveDateTime::default();
            Ok((0..hours)
                .map(|h| ForecastSample {
                    time: start + chrono::Duration::hours(i64::from(h)),
                    precipitation_mm: 2.0,
                })
                .collect())
        }
    }

    struct StraightLine;

    #[async_trait]
    impl RoutingProvider for StraightLine {
        async fn route(&self, start: GeoPoint, end: GeoPoint) -> Result<Vec<GeoPoint>, RoutingError> {
            Ok(vec![start, end])
        }
    }

    #[tokio::test]
    async fn full_cycle_refreshes_zones_then_assigns_pending() {
        let config = FloodguardConfig::defaults();
        let store = Arc::new(MemoryStore::new());
        let pipeline = RiskScoringPipeline::new(
            store.clone(),
            Arc::new(Drizzle),
            Arc::new(LogBroadcaster),
            config.risk.clone(),
        );
        let resolver = Arc::new(SafeRouteResolver::new(
            Arc::new(StraightLine),
            store.clone(),
            config.routing.clone(),
        ));
        let matcher = DriverMatcher::new(
            store.clone(),
            resolver,
            Arc::new(LogNotifier),
            Arc::new(LogBroadcaster),
            config.matching.clone(),
        );

        let seeded = pipeline.seed().await.unwrap();
        let at = GeoPoint::new(13.04, 80.23).unwrap();
        let incident = Incident::new(
            "citizen".to_string(),
            at,
            EmergencyCategory::Rescue,
            "Family on rooftop".to_string(),
            Utc::now(),
        );
        store.insert_incident(incident.clone()).await.unwrap();
        store
            .insert_responder(Responder::new(
                "Boat 2".to_string(),
                Some(GeoPoint::new(13.03, 80.22).unwrap()),
                4.0,
            ))
            .await
            .unwrap();

        let report = run_full_cycle(&pipeline, &matcher).await.unwrap();

        assert_eq!(report.zones_updated, seeded);
        assert_eq!(report.incidents_assigned, 1);
        let stored = store.get_incident(incident.id).await.unwrap();
        assert_eq!(stored.status, IncidentStatus::Assigned);
    }
}
