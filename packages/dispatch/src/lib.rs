#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! The dispatch core: taking an incident from report to resolution.
//!
//! [`IncidentLifecycleManager`] owns the incident state machine and
//! [`DriverMatcher`] binds available responders to pending incidents.
//! Both write through [`floodguard_store::DispatchStore`] using
//! conditional updates, so concurrent reports and transitions stay
//! consistent without in-process locks.

pub mod lifecycle;
pub mod matcher;
pub mod score;
pub mod sinks;

#[cfg(test)]
mod test_support;

pub use lifecycle::{IncidentLifecycleManager, NewIncident, Reported, TransitionOptions};
pub use matcher::DriverMatcher;
pub use score::calculate_driver_score;

use floodguard_models::{IncidentStatus, ValidationError};
use floodguard_routing::RoutingError;
use floodguard_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the dispatch core.
///
/// Finding no eligible responder is not an error; [`DriverMatcher::assign`]
/// reports it as `Ok(false)`.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Malformed input, rejected before anything is stored.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Unknown incident, responder or zone.
    #[error("{kind} {id} not found")]
    NotFound {
        /// What was looked up.
        kind: &'static str,
        /// The id that was not found.
        id: String,
    },

    /// Illegal lifecycle move.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: IncidentStatus,
        /// Requested status.
        to: IncidentStatus,
    },

    /// A responder cannot change availability right now.
    #[error("Conflict: {message}")]
    Conflict {
        /// What conflicted.
        message: String,
    },

    /// Route resolution exhausted every tier.
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// Storage failure that could not be recovered locally.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for DispatchError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::IncidentNotFound { id } => Self::NotFound {
                kind: "incident",
                id: id.to_string(),
            },
            StoreError::ResponderNotFound { id } => Self::NotFound {
                kind: "responder",
                id: id.to_string(),
            },
            StoreError::ZoneNotFound { id } => Self::NotFound { kind: "zone", id },
            other => Self::Store(other),
        }
    }
}
