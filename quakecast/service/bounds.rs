use quakecast_catalog::{validate_coordinate, FilterParams, GeoError, EARTH_RADIUS_KM};

/// Latitude/longitude box enclosing a circle on the sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    /// Southern edge.
    pub min_latitude: f64,
    /// Northern edge.
    pub max_latitude: f64,
    /// Western edge.
    pub min_longitude: f64,
    /// Eastern edge.
    pub max_longitude: f64,
}

impl GeoBounds {
    /// Box containing every point within `radius_km` of the center.
    ///
    /// The longitude span widens with `1 / cos(latitude)`; it becomes the full
    /// range when the circle touches a pole or crosses the antimeridian.
    pub fn around(latitude: f64, longitude: f64, radius_km: f64) -> Result<Self, GeoError> {
        validate_coordinate(latitude, longitude)?;
        let delta = (radius_km.max(0.0) / EARTH_RADIUS_KM).to_degrees();
        let min_latitude = (latitude - delta).max(-90.0);
        let max_latitude = (latitude + delta).min(90.0);
        let touches_pole = min_latitude <= -90.0 || max_latitude >= 90.0;
        let lon_delta = delta / latitude.to_radians().cos();
        let (min_longitude, max_longitude) = if touches_pole
            || !lon_delta.is_finite()
            || longitude - lon_delta < -180.0
            || longitude + lon_delta > 180.0
        {
            (-180.0, 180.0)
        } else {
            (longitude - lon_delta, longitude + lon_delta)
        };
        Ok(Self {
            min_latitude,
            max_latitude,
            min_longitude,
            max_longitude,
        })
    }

    /// Copies the box into filter parameters.
    #[must_use]
    pub fn apply(&self, params: FilterParams) -> FilterParams {
        params.bounds(
            self.min_latitude,
            self.max_latitude,
            self.min_longitude,
            self.max_longitude,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quakecast_catalog::distance;

    #[test]
    fn box_contains_circle_edge() {
        let bounds = GeoBounds::around(35.0, -118.0, 500.0).unwrap();
        assert!(bounds.min_latitude < 35.0 && bounds.max_latitude > 35.0);
        let north_edge = distance(35.0, -118.0, bounds.max_latitude, -118.0, "km").unwrap();
        assert!((north_edge - 500.0).abs() < 1e-6);
        // Longitude span is wider than latitude span away from the equator.
        assert!(bounds.max_longitude - bounds.min_longitude > bounds.max_latitude - bounds.min_latitude);
    }

    #[test]
    fn near_pole_or_antimeridian_spans_all_longitudes() {
        let polar = GeoBounds::around(88.0, 10.0, 500.0).unwrap();
        assert_eq!((polar.min_longitude, polar.max_longitude), (-180.0, 180.0));
        assert!((polar.max_latitude - 90.0).abs() < f64::EPSILON);
        let dateline = GeoBounds::around(0.0, 179.0, 500.0).unwrap();
        assert_eq!((dateline.min_longitude, dateline.max_longitude), (-180.0, 180.0));
    }

    #[test]
    fn rejects_invalid_center() {
        assert!(GeoBounds::around(95.0, 0.0, 10.0).is_err());
    }
}
