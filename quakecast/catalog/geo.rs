use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::GeoError;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

const KM_PER_MILE: f64 = 1.609_344;
const KM_PER_NAUTICAL_MILE: f64 = 1.852;

/// Output unit for [`distance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum DistanceUnit {
    /// Kilometers.
    #[default]
    Kilometers,
    /// Statute miles.
    Miles,
    /// Nautical miles.
    NauticalMiles,
}

impl DistanceUnit {
    fn from_km(self, km: f64) -> f64 {
        match self {
            Self::Kilometers => km,
            Self::Miles => km / KM_PER_MILE,
            Self::NauticalMiles => km / KM_PER_NAUTICAL_MILE,
        }
    }
}

impl fmt::Display for DistanceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Kilometers => "kilometers",
            Self::Miles => "miles",
            Self::NauticalMiles => "nauticalMiles",
        })
    }
}

impl FromStr for DistanceUnit {
    type Err = GeoError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "km" | "kilometers" => Ok(Self::Kilometers),
            "mi" | "miles" => Ok(Self::Miles),
            "nm" | "nauticalmiles" => Ok(Self::NauticalMiles),
            _ => Err(GeoError::InvalidUnit(raw.to_string())),
        }
    }
}

/// Rejects latitudes outside [-90, 90] and longitudes outside [-180, 180] (NaN included).
pub fn validate_coordinate(latitude: f64, longitude: f64) -> Result<(), GeoError> {
    if (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude) {
        Ok(())
    } else {
        Err(GeoError::InvalidCoordinate {
            latitude,
            longitude,
        })
    }
}

/// Great-circle distance between two points, with the unit given as a token.
pub fn distance(
    lat_a: f64,
    lon_a: f64,
    lat_b: f64,
    lon_b: f64,
    unit: &str,
) -> Result<f64, GeoError> {
    validate_coordinate(lat_a, lon_a)?;
    validate_coordinate(lat_b, lon_b)?;
    let unit = unit.parse::<DistanceUnit>()?;
    Ok(unit.from_km(haversine_km(lat_a, lon_a, lat_b, lon_b)))
}

/// Great-circle distance between two points in `unit`.
pub fn distance_in(
    lat_a: f64,
    lon_a: f64,
    lat_b: f64,
    lon_b: f64,
    unit: DistanceUnit,
) -> Result<f64, GeoError> {
    validate_coordinate(lat_a, lon_a)?;
    validate_coordinate(lat_b, lon_b)?;
    Ok(unit.from_km(haversine_km(lat_a, lon_a, lat_b, lon_b)))
}

fn haversine_km(lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> f64 {
    let dlat = (lat_b - lat_a).abs().to_radians();
    let dlon = (lon_b - lon_a).abs().to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat_a.to_radians().cos() * lat_b.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    // Rounding can push `a` a hair above 1 for antipodal points.
    2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
}
