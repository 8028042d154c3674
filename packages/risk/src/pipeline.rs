//! Periodic zone risk refresh.

use std::future::Future;
use std::sync::Arc;

use chrono::{Duration, Utc};
use floodguard_config::RiskConfig;
use floodguard_models::{BroadcastEvent, PresenceBroadcaster, RiskZone};
use floodguard_store::{DispatchStore, StoreError};
use futures::{StreamExt, stream};
use thiserror::Error;

use crate::RiskError;
use crate::score::compute_risk_score;
use crate::seed::seed_zones;
use crate::weather::{WeatherError, WeatherProvider};

#[derive(Debug, Error)]
enum ZoneRefreshError {
    #[error(transparent)]
    Weather(#[from] WeatherError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Turns live weather into per-zone risk scores.
pub struct RiskScoringPipeline {
    store: Arc<dyn DispatchStore>,
    weather: Arc<dyn WeatherProvider>,
    broadcaster: Arc<dyn PresenceBroadcaster>,
    config: RiskConfig,
}

impl RiskScoringPipeline {
    /// Creates a pipeline over the given store and weather provider.
    #[must_use]
    pub fn new(
        store: Arc<dyn DispatchStore>,
        weather: Arc<dyn WeatherProvider>,
        broadcaster: Arc<dyn PresenceBroadcaster>,
        config: RiskConfig,
    ) -> Self {
        Self {
            store,
            weather,
            broadcaster,
            config,
        }
    }

    /// Inserts the initial zone set if the store has no zones yet.
    ///
    /// Returns the number of zones inserted (0 when already seeded).
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::Store`] if the store fails.
    pub async fn seed(&self) -> Result<usize, RiskError> {
        if self.store.count_zones().await? > 0 {
            log::debug!("Risk zones already present, skipping seed");
            return Ok(0);
        }
        let added = self.store.insert_zones(seed_zones()).await?;
        log::info!("Seeded {added} risk zones");
        Ok(added)
    }

    /// Recomputes the score of every zone, or only of `zone_ids` when given.
    ///
    /// Zones are refreshed concurrently (bounded by `refresh_concurrency`).
    /// A zone whose weather fetch fails or times out is logged and
    /// skipped. Returns how many zones were updated.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::Store`] only if the zone list cannot be read.
    pub async fn refresh(&self, zone_ids: Option<&[String]>) -> Result<usize, RiskError> {
        let mut zones = self.store.list_zones().await?;

        if let Some(ids) = zone_ids {
            for id in ids {
                if !zones.iter().any(|z| &z.id == id) {
                    log::warn!("Refresh requested for unknown zone '{id}'");
                }
            }
            zones.retain(|z| ids.contains(&z.id));
        }

        let total = zones.len();
        let results: Vec<(String, Result<RiskZone, ZoneRefreshError>)> = stream::iter(zones)
            .map(|zone| async move {
                let id = zone.id.clone();
                (id, self.refresh_zone(zone).await)
            })
            .buffer_unordered(self.config.refresh_concurrency.max(1))
            .collect()
            .await;

        let mut updated = 0;
        for (id, result) in results {
            match result {
                Ok(zone) => {
                    updated += 1;
                    self.broadcaster.emit(BroadcastEvent::ZoneUpdated {
                        zone_id: zone.id.clone(),
                        risk_score: zone.risk_score,
                        risk_level: zone.risk_level(),
                    });
                }
                Err(e) => log::warn!("Skipping zone '{id}' this cycle: {e}"),
            }
        }

        log::info!("Risk refresh updated {updated}/{total} zones");
        Ok(updated)
    }

    async fn refresh_zone(&self, zone: RiskZone) -> Result<RiskZone, ZoneRefreshError> {
        let (current, forecast) = tokio::join!(
            self.bounded(self.weather.current_weather(zone.center)),
            self.bounded(self.weather.forecast(zone.center, self.config.forecast_hours)),
        );
        let current = current?;
        let forecast = forecast?;

        let predicted_rainfall: f64 = forecast
            .iter()
            .take(self.config.forecast_steps)
            .map(|s| s.precipitation_mm)
            .sum();

        let score = compute_risk_score(
            predicted_rainfall,
            zone.avg_flood_depth,
            current.wind_speed_kmh,
            current.humidity_pct,
            current.temperature_c,
            &self.config.score,
        );

        let zone = self
            .store
            .record_zone_score(
                &zone.id,
                score,
                predicted_rainfall,
                Utc::now(),
                Duration::days(self.config.retention_days),
            )
            .await?;
        log::debug!(
            "Zone '{}' scored {score:.2} ({predicted_rainfall:.1} mm forecast)",
            zone.id
        );

        Ok(zone)
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, WeatherError>>,
    ) -> Result<T, WeatherError> {
        let timeout = self.config.request_timeout();
        tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| WeatherError::Timeout {
                seconds: timeout.as_secs(),
            })?
    }
}
