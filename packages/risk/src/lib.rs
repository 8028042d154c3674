#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Flood risk scoring for the zones the dispatcher routes around.
//!
//! Each refresh cycle asks a [`weather::WeatherProvider`] for current
//! conditions and a short-horizon precipitation forecast at every zone
//! center, turns them into a `0..=10` score with [`score::compute_risk_score`]
//! and stores the result with a bounded history. The default provider is
//! [`open_meteo::OpenMeteoClient`].
//!
//! A zone whose weather cannot be fetched is logged and skipped; it keeps
//! its previous score until the next cycle.

pub mod open_meteo;
pub mod pipeline;
pub mod score;
pub mod seed;
pub mod weather;

pub use pipeline::RiskScoringPipeline;

use floodguard_store::StoreError;
use thiserror::Error;

/// Errors that abort a whole pipeline operation.
///
/// Per-zone weather failures are not in here; they are isolated inside
/// [`RiskScoringPipeline::refresh`].
#[derive(Debug, Error)]
pub enum RiskError {
    /// The store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
