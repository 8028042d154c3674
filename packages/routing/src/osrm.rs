//! OSRM route service client.
//!
//! Uses the `route/v1/driving` endpoint with full GeoJSON geometry so the
//! resolver gets every road vertex to score against risk zones.
//!
//! See <https://project-osrm.org/docs/v5.24.0/api/#route-service>

use std::time::Duration;

use async_trait::async_trait;
use floodguard_models::GeoPoint;

use crate::{RoutingError, RoutingProvider};

/// [`RoutingProvider`] backed by an OSRM server.
pub struct OsrmClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl OsrmClient {
    /// Creates a client with a bounded per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RoutingError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }
}

#[async_trait]
impl RoutingProvider for OsrmClient {
    async fn route(&self, start: GeoPoint, end: GeoPoint) -> Result<Vec<GeoPoint>, RoutingError> {
        let url = format!(
            "{}/route/v1/driving/{},{};{},{}",
            self.base_url, start.longitude, start.latitude, end.longitude, end.latitude
        );

        let resp = self
            .client
            .get(&url)
            .query(&[("overview", "full"), ("geometries", "geojson")])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RoutingError::Timeout {
                        seconds: self.timeout.as_secs(),
                    }
                } else {
                    RoutingError::Http(e)
                }
            })?;

        // OSRM reports NoRoute with HTTP 400 and a JSON body, so parse the
        // body before looking at the status.
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.map_err(|e| RoutingError::Parse {
            message: format!("OSRM returned HTTP {status} with unreadable body: {e}"),
        })?;
        parse_response(&body)
    }
}

fn parse_response(body: &serde_json::Value) -> Result<Vec<GeoPoint>, RoutingError> {
    let code = body["code"].as_str().unwrap_or("Unknown");
    match code {
        "Ok" => {}
        "NoRoute" | "NoSegment" => {
            return Err(RoutingError::NoRouteFound {
                message: body["message"].as_str().unwrap_or(code).to_string(),
            });
        }
        other => {
            return Err(RoutingError::Parse {
                message: format!("OSRM error code {other}"),
            });
        }
    }

    let coordinates = body["routes"][0]["geometry"]["coordinates"]
        .as_array()
        .ok_or_else(|| RoutingError::Parse {
            message: "Missing routes[0].geometry.coordinates in OSRM response".to_string(),
        })?;

    let waypoints = coordinates
        .iter()
        .map(|pair| {
            let lon = pair[0].as_f64();
            let lat = pair[1].as_f64();
            match (lat, lon) {
                (Some(lat), Some(lon)) => {
                    GeoPoint::new(lat, lon).map_err(|e| RoutingError::Parse {
                        message: e.to_string(),
                    })
                }
                _ => Err(RoutingError::Parse {
                    message: format!("Malformed OSRM coordinate: {pair}"),
                }),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    if waypoints.len() < 2 {
        return Err(RoutingError::NoRouteFound {
            message: "OSRM returned fewer than two waypoints".to_string(),
        });
    }

    Ok(waypoints)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_geojson_geometry_as_lat_lon() {
        let body = serde_json::json!({
            "code": "Ok",
            "routes": [{
                "distance": 2450.3,
                "duration": 312.0,
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[80.2341, 13.0418], [80.2401, 13.0302], [80.2565, 13.0012]]
                }
            }]
        });
        let waypoints = parse_response(&body).unwrap();
        assert_eq!(waypoints.len(), 3);
        assert!((waypoints[0].latitude - 13.0418).abs() < 1e-9);
        assert!((waypoints[0].longitude - 80.2341).abs() < 1e-9);
    }

    #[test]
    fn no_route_code_maps_to_no_route_found() {
        let body = serde_json::json!({ "code": "NoRoute", "message": "Impossible route" });
        assert!(matches!(
            parse_response(&body),
            Err(RoutingError::NoRouteFound { .. })
        ));
    }

    #[test]
    fn other_error_codes_are_provider_failures() {
        let body = serde_json::json!({ "code": "InvalidQuery" });
        assert!(matches!(
            parse_response(&body),
            Err(RoutingError::Parse { .. })
        ));
    }
}
