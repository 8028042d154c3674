use geo::{Bearing, Destination, Distance, Haversine, Point};
use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees, `-90..=90`.
    pub latitude: f64,
    /// Longitude in degrees, `-180..=180`.
    pub longitude: f64,
}

impl GeoPoint {
    /// Creates a validated point.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidCoordinate`] if either component is
    /// not finite or lies outside the WGS84 range.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ValidationError> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);

        if valid {
            Ok(Self {
                latitude,
                longitude,
            })
        } else {
            Err(ValidationError::InvalidCoordinate {
                latitude,
                longitude,
            })
        }
    }

    /// Great-circle distance to `other` in kilometres.
    #[must_use]
    pub fn distance_km(&self, other: &Self) -> f64 {
        Haversine.distance(self.to_geo(), other.to_geo()) / 1000.0
    }

    /// Initial bearing towards `other` in degrees clockwise from north.
    #[must_use]
    pub fn bearing_to(&self, other: &Self) -> f64 {
        Haversine.bearing(self.to_geo(), other.to_geo())
    }

    /// The point reached by travelling `distance_km` along `bearing_deg`.
    #[must_use]
    pub fn destination(&self, bearing_deg: f64, distance_km: f64) -> Self {
        let dest = Haversine.destination(self.to_geo(), bearing_deg, distance_km * 1000.0);
        Self {
            latitude: dest.y(),
            longitude: dest.x(),
        }
    }

    /// Arithmetic midpoint, adequate at city scale.
    #[must_use]
    pub fn midpoint(&self, other: &Self) -> Self {
        Self {
            latitude: f64::midpoint(self.latitude, other.latitude),
            longitude: f64::midpoint(self.longitude, other.longitude),
        }
    }

    fn to_geo(self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.5}, {:.5})", self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(GeoPoint::new(91.0, 0.0).is_err());
        assert!(GeoPoint::new(0.0, -180.5).is_err());
        assert!(GeoPoint::new(f64::NAN, 80.0).is_err());
        assert!(GeoPoint::new(13.04, 80.23).is_ok());
    }

    #[test]
    fn distance_between_chennai_landmarks() {
        let t_nagar = GeoPoint::new(13.0418, 80.2341).unwrap();
        let adyar = GeoPoint::new(13.0012, 80.2565).unwrap();
        let d = t_nagar.distance_km(&adyar);
        assert!((4.5..5.5).contains(&d), "unexpected distance {d}");
        assert!(t_nagar.distance_km(&t_nagar).abs() < 1e-9);
    }

    #[test]
    fn destination_travels_requested_distance() {
        let origin = GeoPoint::new(13.0, 80.2).unwrap();
        let moved = origin.destination(90.0, 2.0);
        assert!((origin.distance_km(&moved) - 2.0).abs() < 1e-3);
        assert!(moved.longitude > origin.longitude);
    }
}
