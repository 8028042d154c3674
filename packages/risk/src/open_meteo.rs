//! Open-Meteo forecast API client.
//!
//! Free, no API key. Wind speeds are requested in km/h (the API default),
//! precipitation in millimetres.
//!
//! See <https://open-meteo.com/en/docs>

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use floodguard_models::GeoPoint;

use crate::weather::{CurrentWeather, ForecastSample, WeatherError, WeatherProvider};

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,precipitation,wind_speed_10m";

/// Open-Meteo hourly timestamps, e.g. `2025-11-30T14:00`.
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// [`WeatherProvider`] backed by the Open-Meteo forecast endpoint.
pub struct OpenMeteoClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl OpenMeteoClient {
    /// Creates a client with a bounded per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`WeatherError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, WeatherError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            timeout,
        })
    }

    async fn get(&self, query: &[(&str, String)]) -> Result<serde_json::Value, WeatherError> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(query)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        if !resp.status().is_success() {
            return Err(WeatherError::Parse {
                message: format!("Open-Meteo returned HTTP {}", resp.status()),
            });
        }

        resp.json().await.map_err(|e| self.classify(e))
    }

    fn classify(&self, e: reqwest::Error) -> WeatherError {
        if e.is_timeout() {
            WeatherError::Timeout {
                seconds: self.timeout.as_secs(),
            }
        } else {
            WeatherError::Http(e)
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoClient {
    async fn current_weather(&self, point: GeoPoint) -> Result<CurrentWeather, WeatherError> {
        let body = self
            .get(&[
                ("latitude", point.latitude.to_string()),
                ("longitude", point.longitude.to_string()),
                ("current", CURRENT_FIELDS.to_string()),
                ("timezone", "auto".to_string()),
            ])
            .await?;
        parse_current(&body)
    }

    async fn forecast(
        &self,
        point: GeoPoint,
        hours: u32,
    ) -> Result<Vec<ForecastSample>, WeatherError> {
        let body = self
            .get(&[
                ("latitude", point.latitude.to_string()),
                ("longitude", point.longitude.to_string()),
                ("hourly", "precipitation".to_string()),
                ("forecast_hours", hours.to_string()),
                ("timezone", "auto".to_string()),
            ])
            .await?;
        parse_hourly(&body)
    }
}

fn parse_current(body: &serde_json::Value) -> Result<CurrentWeather, WeatherError> {
    let current = body.get("current").ok_or_else(|| WeatherError::Parse {
        message: "Open-Meteo response has no 'current' block".to_string(),
    })?;

    let field = |name: &str| {
        current[name].as_f64().ok_or_else(|| WeatherError::Parse {
            message: format!("Missing current.{name} in Open-Meteo response"),
        })
    };

    Ok(CurrentWeather {
        temperature_c: field("temperature_2m")?,
        humidity_pct: field("relative_humidity_2m")?,
        precipitation_mm: field("precipitation")?,
        wind_speed_kmh: field("wind_speed_10m")?,
    })
}

fn parse_hourly(body: &serde_json::Value) -> Result<Vec<ForecastSample>, WeatherError> {
    let times = body["hourly"]["time"]
        .as_array()
        .ok_or_else(|| WeatherError::Parse {
            message: "Missing hourly.time in Open-Meteo response".to_string(),
        })?;
    let precipitation = body["hourly"]["precipitation"]
        .as_array()
        .ok_or_else(|| WeatherError::Parse {
            message: "Missing hourly.precipitation in Open-Meteo response".to_string(),
        })?;

    let mut samples: Vec<ForecastSample> = times
        .iter()
        .zip(precipitation)
        .filter_map(|(time, mm)| {
            let time = NaiveDateTime::parse_from_str(time.as_str()?, TIME_FORMAT).ok()?;
            // Open-Meteo reports gaps as null; treat them as dry.
            let precipitation_mm = mm.as_f64().unwrap_or(0.0).max(0.0);
            Some(ForecastSample {
                time,
                precipitation_mm,
            })
        })
        .collect();

    samples.sort_by_key(|s| s.time);
    Ok(samples)
}
