use std::sync::Arc;

use floodguard_config::RoutingConfig;
use floodguard_models::{GeoPoint, RiskZone, RouteSource, SafeRoute};
use floodguard_store::DispatchStore;

use crate::analysis::{analyze_route, path_distance_km, risky_zones_on_route};
use crate::detour::detour_point;
use crate::fallback::shortest_safe_path;
use crate::{RoutingError, RoutingProvider};

/// Picks the safest practical route between two points.
pub struct SafeRouteResolver {
    provider: Arc<dyn RoutingProvider>,
    store: Arc<dyn DispatchStore>,
    config: RoutingConfig,
}

impl SafeRouteResolver {
    /// Creates a resolver that scores provider routes against stored zones.
    #[must_use]
    pub fn new(
        provider: Arc<dyn RoutingProvider>,
        store: Arc<dyn DispatchStore>,
        config: RoutingConfig,
    ) -> Self {
        Self {
            provider,
            store,
            config,
        }
    }

    /// Resolves a route from `start` to `end`.
    ///
    /// Provider failures are absorbed by the fallback tier and never
    /// reach the caller.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::NoRouteFound`] only when the fallback graph
    /// cannot connect the two points either.
    pub async fn resolve(&self, start: GeoPoint, end: GeoPoint) -> Result<SafeRoute, RoutingError> {
        let zones = match self.store.list_zones().await {
            Ok(zones) => zones,
            Err(e) => {
                log::warn!("Routing without zone data: {e}");
                Vec::new()
            }
        };

        match self.request(start, end).await {
            Ok(primary) => Ok(self.choose_safest(start, end, primary, &zones).await),
            Err(e) => {
                log::warn!("Routing provider failed for {start} -> {end}: {e}; using fallback graph");
                self.fallback(start, end, &zones)
            }
        }
    }

    async fn choose_safest(
        &self,
        start: GeoPoint,
        end: GeoPoint,
        primary: Vec<GeoPoint>,
        zones: &[RiskZone],
    ) -> SafeRoute {
        let threshold = self.config.high_risk_threshold;
        let proximity = self.config.proximity_threshold_km;
        let primary_analysis = analyze_route(&primary, zones, proximity);

        let primary_route = self.build(primary, primary_analysis.avg_risk_score, RouteSource::Primary);

        if primary_analysis.avg_risk_score <= threshold {
            return primary_route;
        }

        let risky = risky_zones_on_route(&primary_route.waypoints, zones, proximity, threshold);
        let Some(via) = detour_point(&start, &end, &risky, self.config.detour_offset_km) else {
            return primary_route;
        };

        log::debug!(
            "Primary route risk {:.2} exceeds {threshold}; trying detour via {via}",
            primary_analysis.avg_risk_score
        );

        let alternative = match self.detour_legs(start, via, end).await {
            Ok(waypoints) => waypoints,
            Err(e) => {
                log::warn!("Detour via {via} failed: {e}; keeping primary route");
                return primary_route;
            }
        };

        let alt_analysis = analyze_route(&alternative, zones, proximity);
        if alt_analysis.avg_risk_score < primary_analysis.avg_risk_score {
            log::info!(
                "Detour lowers route risk from {:.2} to {:.2}",
                primary_analysis.avg_risk_score,
                alt_analysis.avg_risk_score
            );
            self.build(alternative, alt_analysis.avg_risk_score, RouteSource::Alternative)
        } else {
            primary_route
        }
    }

    async fn detour_legs(
        &self,
        start: GeoPoint,
        via: GeoPoint,
        end: GeoPoint,
    ) -> Result<Vec<GeoPoint>, RoutingError> {
        let (first, second) = tokio::join!(self.request(start, via), self.request(via, end));
        let mut waypoints = first?;
        let second = second?;

        // Both legs contain the detour point; keep it once.
        waypoints.extend(second.into_iter().skip(1));
        Ok(waypoints)
    }

    fn fallback(
        &self,
        start: GeoPoint,
        end: GeoPoint,
        zones: &[RiskZone],
    ) -> Result<SafeRoute, RoutingError> {
        let waypoints = shortest_safe_path(start, end, zones, self.config.max_hop_km).ok_or_else(
            || RoutingError::NoRouteFound {
                message: format!(
                    "No path from {start} to {end} with hops under {} km",
                    self.config.max_hop_km
                ),
            },
        )?;

        let analysis = analyze_route(&waypoints, zones, self.config.proximity_threshold_km);
        Ok(self.build(waypoints, analysis.avg_risk_score, RouteSource::Fallback))
    }

    async fn request(&self, start: GeoPoint, end: GeoPoint) -> Result<Vec<GeoPoint>, RoutingError> {
        let timeout = self.config.request_timeout();
        let waypoints = tokio::time::timeout(timeout, self.provider.route(start, end))
            .await
            .map_err(|_| RoutingError::Timeout {
                seconds: timeout.as_secs(),
            })??;

        if waypoints.len() < 2 {
            return Err(RoutingError::NoRouteFound {
                message: format!("Provider returned {} waypoints", waypoints.len()),
            });
        }

        Ok(waypoints)
    }

    fn build(&self, waypoints: Vec<GeoPoint>, avg_risk_score: f64, source: RouteSource) -> SafeRoute {
        let distance_km = path_distance_km(&waypoints);
        let estimated_minutes = if self.config.emergency_speed_kmh > 0.0 {
            distance_km / self.config.emergency_speed_kmh * 60.0
        } else {
            0.0
        };

        SafeRoute {
            waypoints,
            distance_km,
            avg_risk_score,
            estimated_minutes,
            source,
        }
    }
}
