//! Weather provider contract.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use floodguard_models::GeoPoint;
use thiserror::Error;

/// Conditions at a point right now.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentWeather {
    /// Air temperature (°C).
    pub temperature_c: f64,
    /// Relative humidity (%).
    pub humidity_pct: f64,
    /// Precipitation in the current interval (mm).
    pub precipitation_mm: f64,
    /// Wind speed (km/h).
    pub wind_speed_kmh: f64,
}

/// One hourly forecast step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastSample {
    /// Local time of the step.
    pub time: NaiveDateTime,
    /// Expected precipitation during the step (mm).
    pub precipitation_mm: f64,
}

/// Errors from weather providers. All of them are treated as transient.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// The provider did not answer in time.
    #[error("Weather request timed out after {seconds}s")]
    Timeout {
        /// Configured timeout.
        seconds: u64,
    },
}

/// Source of current weather and forecasts.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Current conditions at `point`.
    ///
    /// # Errors
    ///
    /// Returns [`WeatherError`] if the provider fails.
    async fn current_weather(&self, point: GeoPoint) -> Result<CurrentWeather, WeatherError>;

    /// Hourly forecast for the next `hours` hours, earliest first.
    ///
    /// # Errors
    ///
    /// Returns [`WeatherError`] if the provider fails.
    async fn forecast(
        &self,
        point: GeoPoint,
        hours: u32,
    ) -> Result<Vec<ForecastSample>, WeatherError>;
}
