#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Safe-route resolution for responders.
//!
//! [`SafeRouteResolver::resolve`] tries three tiers in order:
//!
//! 1. **Primary**: a road-network route from the [`RoutingProvider`]
//!    (OSRM by default), scored against current zone risk by
//!    [`analysis::analyze_route`].
//! 2. **Alternative**: when the primary route is high-risk, the provider
//!    is asked again for two legs through a [`detour`] point pushed away
//!    from the worst zones. The safer of the two routes wins.
//! 3. **Fallback**: when the provider is down or errors, a local
//!    weighted shortest path over zone centers ([`fallback`]).
//!
//! Only a failure of the last tier reaches the caller, as
//! [`RoutingError::NoRouteFound`].

pub mod analysis;
pub mod detour;
pub mod fallback;
pub mod osrm;
pub mod resolver;

pub use resolver::SafeRouteResolver;

use async_trait::async_trait;
use floodguard_models::GeoPoint;
use thiserror::Error;

/// Errors from routing providers and the resolver.
#[derive(Debug, Error)]
pub enum RoutingError {
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
    #[error("Routing request timed out after {seconds}s")]
    Timeout {
        /// Configured timeout.
        seconds: u64,
    },

    /// No path exists between the two points.
    #[error("No route found: {message}")]
    NoRouteFound {
        /// Provider or resolver explanation.
        message: String,
    },
}

/// A road-network routing service.
#[async_trait]
pub trait RoutingProvider: Send + Sync {
    /// Returns the waypoints of a route from `start` to `end`, in order.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::NoRouteFound`] if the network has no path,
    /// or another [`RoutingError`] if the provider fails.
    async fn route(&self, start: GeoPoint, end: GeoPoint) -> Result<Vec<GeoPoint>, RoutingError>;
}
