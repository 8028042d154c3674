use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

use crate::GeoPoint;

/// Which resolution tier produced a [`SafeRoute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RouteSource {
    /// Road-network route straight from the routing provider.
    Primary,
    /// Provider route forced through a detour around high-risk zones.
    Alternative,
    /// Local weighted shortest path over zone centers.
    Fallback,
}

/// A risk-annotated path between two points. Immutable once computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafeRoute {
    /// Ordered waypoints from start to end.
    pub waypoints: Vec<GeoPoint>,
    /// Sum of segment lengths.
    pub distance_km: f64,
    /// Mean score of the zones the route passes near, `0` if none.
    pub avg_risk_score: f64,
    /// Travel time at the configured emergency speed.
    pub estimated_minutes: f64,
    /// Tier that produced this route.
    pub source: RouteSource,
}
