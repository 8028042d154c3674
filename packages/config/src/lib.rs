#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Configuration for the floodguard services.
//!
//! Values are resolved in three layers:
//!
//! 1. **Embedded defaults** from `defaults.toml`, compiled into the binary.
//! 2. **User file** named by `FLOODGUARD_CONFIG`, deep-merged over the
//!    defaults so it only needs the keys it changes.
//! 3. **Environment overrides** for the handful of values that differ per
//!    deployment (`BIND_ADDR`, `PORT`, provider base URLs, refresh interval).
//!
//! The risk-score constants live here rather than in code. They were
//! picked empirically and are expected to be tuned per city.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

const DEFAULTS_TOML: &str = include_str!("../defaults.toml");

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// Path that was read.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// TOML syntax or shape error.
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    /// An environment override could not be parsed.
    #[error("Invalid value for {var}: {value}")]
    Env {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },
}

/// Root configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FloodguardConfig {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Responder matching settings.
    pub matching: MatchingConfig,
    /// Safe-route resolution settings.
    pub routing: RoutingConfig,
    /// Risk pipeline settings.
    pub risk: RiskConfig,
    /// Background job settings.
    pub jobs: JobsConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    pub bind_addr: String,
    /// Port to bind.
    pub port: u16,
}

/// Responder matching settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchingConfig {
    /// Matching radius before risk widening.
    pub base_max_distance_km: f64,
    /// Divisor applied to the nearby zone risk when widening the radius.
    pub risk_radius_divisor: f64,
    /// Zones this close to an incident widen its radius.
    pub zone_proximity_km: f64,
}

/// Safe-route resolution settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingConfig {
    /// OSRM server base URL.
    pub osrm_base_url: String,
    /// Per-request timeout for the routing provider.
    pub request_timeout_secs: u64,
    /// A waypoint this close to a zone center counts as passing the zone.
    pub proximity_threshold_km: f64,
    /// Average risk above which a detour is attempted.
    pub high_risk_threshold: f64,
    /// How far the detour point is pushed away from the risky zones.
    pub detour_offset_km: f64,
    /// Longest edge allowed in the fallback graph.
    pub max_hop_km: f64,
    /// Assumed travel speed for time estimates.
    pub emergency_speed_kmh: f64,
}

/// Risk pipeline settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    /// Open-Meteo forecast endpoint.
    pub open_meteo_base_url: String,
    /// Per-request timeout for the weather provider.
    pub request_timeout_secs: u64,
    /// Hours of forecast to request.
    pub forecast_hours: u32,
    /// Leading forecast steps summed into `predicted_rainfall`.
    pub forecast_steps: usize,
    /// History retention window.
    pub retention_days: i64,
    /// Zones refreshed in parallel.
    pub refresh_concurrency: usize,
    /// Score formula constants.
    pub score: RiskScoreConfig,
}

/// Constants of the zone risk formula.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RiskScoreConfig {
    /// Weight of normalised rainfall.
    pub rainfall_weight: f64,
    /// Weight of normalised flood depth.
    pub depth_weight: f64,
    /// Rainfall (mm) at which the rainfall term saturates.
    pub rainfall_saturation_mm: f64,
    /// Depth at which the depth term saturates.
    pub depth_saturation: f64,
    /// Wind speed above which `wind_multiplier` applies.
    pub wind_threshold_kmh: f64,
    /// Multiplier for strong wind.
    pub wind_multiplier: f64,
    /// Humidity above which `humidity_multiplier` applies.
    pub humidity_threshold_pct: f64,
    /// Multiplier for high humidity.
    pub humidity_multiplier: f64,
    /// Temperature below which `cold_multiplier` applies.
    pub cold_threshold_c: f64,
    /// Multiplier for cool temperatures.
    pub cold_multiplier: f64,
}

impl Default for RiskScoreConfig {
    fn default() -> Self {
        Self {
            rainfall_weight: 0.6,
            depth_weight: 0.4,
            rainfall_saturation_mm: 100.0,
            depth_saturation: 10.0,
            wind_threshold_kmh: 40.0,
            wind_multiplier: 1.10,
            humidity_threshold_pct: 85.0,
            humidity_multiplier: 1.05,
            cold_threshold_c: 20.0,
            cold_multiplier: 1.03,
        }
    }
}

/// Background job settings.
#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    /// Workers on the risk-refresh queue.
    pub risk_workers: usize,
    /// Workers on the notification queue.
    pub notification_workers: usize,
    /// Bounded channel capacity per queue.
    pub queue_capacity: usize,
    /// Attempts per job, including the first.
    pub max_attempts: u32,
    /// Upper bound on a single job execution.
    pub job_timeout_secs: u64,
    /// Interval of the recurring risk refresh.
    pub refresh_interval_secs: u64,
    /// Permanently failed jobs kept for inspection.
    pub dead_letter_capacity: usize,
    /// Delay between attempts.
    pub backoff: BackoffConfig,
}

/// Delay policy between job attempts, tagged by `type` in TOML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackoffConfig {
    /// Same delay every time.
    Fixed {
        /// Delay in milliseconds.
        delay_ms: u64,
    },
    /// `base_ms * 2^(attempt - 1)`, capped at `max_ms`.
    Exponential {
        /// First delay in milliseconds.
        base_ms: u64,
        /// Cap in milliseconds.
        max_ms: u64,
    },
}

impl RoutingConfig {
    /// Provider request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl RiskConfig {
    /// Provider request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl FloodguardConfig {
    /// Loads defaults, the optional `FLOODGUARD_CONFIG` file and
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the user file cannot be read or parsed,
    /// or an override has an unparseable value.
    pub fn load() -> Result<Self, ConfigError> {
        let user = match std::env::var("FLOODGUARD_CONFIG") {
            Ok(path) => {
                log::info!("Loading config overrides from {path}");
                Some(read_file(Path::new(&path))?)
            }
            Err(_) => None,
        };

        let mut config = Self::from_toml_layers(user.as_deref())?;
        config.apply_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Embedded defaults only.
    ///
    /// # Panics
    ///
    /// Panics if the embedded defaults are malformed, which is a build-time
    /// development error covered by tests.
    #[must_use]
    pub fn defaults() -> Self {
        Self::from_toml_layers(None)
            .unwrap_or_else(|e| panic!("Embedded defaults.toml is invalid: {e}"))
    }

    /// Parses the embedded defaults with `user` deep-merged on top.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if either layer is invalid.
    pub fn from_toml_layers(user: Option<&str>) -> Result<Self, ConfigError> {
        let mut base: toml::Table = toml::from_str(DEFAULTS_TOML)?;
        if let Some(user) = user {
            let overlay: toml::Table = toml::from_str(user)?;
            merge_tables(&mut base, overlay);
        }
        Ok(toml::Value::Table(base).try_into()?)
    }

    /// Applies environment overrides through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Env`] for unparseable numeric values.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        if let Some(addr) = lookup("BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ConfigError::Env { var: "PORT", value: port })?;
        }
        if let Some(url) = lookup("OSRM_BASE_URL") {
            self.routing.osrm_base_url = url;
        }
        if let Some(url) = lookup("OPEN_METEO_BASE_URL") {
            self.risk.open_meteo_base_url = url;
        }
        if let Some(secs) = lookup("RISK_REFRESH_INTERVAL_SECS") {
            self.jobs.refresh_interval_secs = secs.parse().map_err(|_| ConfigError::Env {
                var: "RISK_REFRESH_INTERVAL_SECS",
                value: secs,
            })?;
        }
        Ok(())
    }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Recursively merges `overlay` into `base`; overlay scalars win.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_defaults_parse() {
        let config = FloodguardConfig::defaults();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.jobs.risk_workers, 1);
        assert_eq!(config.jobs.notification_workers, 5);
        assert_eq!(config.risk.forecast_steps, 3);
        assert_eq!(config.risk.retention_days, 30);
        assert_eq!(config.risk.score, RiskScoreConfig::default());
        assert_eq!(
            config.jobs.backoff,
            BackoffConfig::Exponential {
                base_ms: 1000,
                max_ms: 30000
            }
        );
    }

    #[test]
    fn user_layer_overrides_only_given_keys() {
        let config = FloodguardConfig::from_toml_layers(Some(
            r#"
            [routing]
            max_hop_km = 8.0

            [risk.score]
            wind_threshold_kmh = 55.0

            [jobs.backoff]
            type = "fixed"
            delay_ms = 250
            "#,
        ))
        .unwrap();

        assert!((config.routing.max_hop_km - 8.0).abs() < f64::EPSILON);
        assert!((config.routing.detour_offset_km - 2.0).abs() < f64::EPSILON);
        assert!((config.risk.score.wind_threshold_kmh - 55.0).abs() < f64::EPSILON);
        assert!((config.risk.score.rainfall_weight - 0.6).abs() < f64::EPSILON);
        assert_eq!(config.jobs.backoff, BackoffConfig::Fixed { delay_ms: 250 });
    }

    #[test]
    fn env_overrides_apply_and_validate() {
        let mut config = FloodguardConfig::defaults();
        config
            .apply_env(|var| match var {
                "PORT" => Some("9090".to_string()),
                "OSRM_BASE_URL" => Some("http://localhost:5000".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.routing.osrm_base_url, "http://localhost:5000");

        let err = config
            .apply_env(|var| (var == "PORT").then(|| "not-a-port".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "PORT", .. }));
    }
}
