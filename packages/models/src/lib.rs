#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Domain types shared across the floodguard dispatch system.
//!
//! Every other crate in the workspace speaks in these types: the store
//! persists them, the risk pipeline mutates [`RiskZone`]s, the routing
//! resolver produces [`SafeRoute`]s and the dispatcher moves [`Incident`]s
//! and [`Responder`]s through their lifecycles.

mod event;
mod incident;
mod notification;
mod point;
mod responder;
mod route;
mod zone;

pub use event::{BroadcastEvent, PresenceBroadcaster};
pub use incident::{EmergencyCategory, Incident, IncidentStatus, Priority};
pub use notification::{Notification, NotificationDispatcher, NotificationKind};
pub use point::GeoPoint;
pub use responder::{MatchCandidate, Responder, ResponderStatus};
pub use route::{RouteSource, SafeRoute};
pub use zone::{RiskLevel, RiskSample, RiskZone};

use thiserror::Error;

/// Identifier of an [`Incident`].
pub type IncidentId = uuid::Uuid;

/// Identifier of a [`Responder`].
pub type ResponderId = uuid::Uuid;

/// Malformed input rejected before it reaches the dispatch core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Latitude/longitude outside the WGS84 range or not finite.
    #[error("Invalid coordinate: latitude={latitude}, longitude={longitude}")]
    InvalidCoordinate {
        /// Offending latitude.
        latitude: f64,
        /// Offending longitude.
        longitude: f64,
    },

    /// A required text field was empty.
    #[error("Field '{field}' must not be empty")]
    EmptyField {
        /// Name of the field.
        field: &'static str,
    },

    /// A numeric field was outside its accepted range.
    #[error("Field '{field}' out of range: {value}")]
    OutOfRange {
        /// Name of the field.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },
}
