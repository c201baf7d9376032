use chrono::{DateTime, TimeZone, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::geo::validate_coordinate;

/// A validated seismic event. Coordinates are always within range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeismicEvent {
    /// Catalog identifier.
    pub id: String,
    /// Occurrence time in epoch milliseconds.
    pub time: i64,
    /// Reported magnitude.
    pub magnitude: f64,
    /// Latitude in degrees, [-90, 90].
    pub latitude: f64,
    /// Longitude in degrees, [-180, 180].
    pub longitude: f64,
    /// Depth in kilometers, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<f64>,
    /// Remaining upstream properties (place, url, status, ...), in upstream order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, Value>,
}

impl SeismicEvent {
    /// Creates an event, rejecting out-of-range coordinates.
    pub fn new(
        id: impl Into<String>,
        time: i64,
        magnitude: f64,
        latitude: f64,
        longitude: f64,
    ) -> Result<Self, FeatureDefect> {
        validate_coordinate(latitude, longitude).map_err(|_| FeatureDefect::CoordinateOutOfRange {
            latitude,
            longitude,
        })?;
        Ok(Self {
            id: id.into(),
            time,
            magnitude,
            latitude,
            longitude,
            depth: None,
            properties: IndexMap::new(),
        })
    }

    /// Sets the depth.
    #[must_use]
    pub fn with_depth(mut self, depth: f64) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Occurrence time as a UTC timestamp.
    #[must_use]
    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.time).single()
    }
}

/// Reason a raw feature could not become a [`SeismicEvent`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FeatureDefect {
    /// Payload entry was not a feature object at all.
    #[error("entry is not a feature object")]
    NotAFeature,
    /// No identifier.
    #[error("missing id")]
    MissingId,
    /// No geometry, or fewer than two numeric coordinates.
    #[error("missing geometry")]
    MissingGeometry,
    /// Coordinates present but outside valid ranges.
    #[error("coordinate out of range ({latitude}, {longitude})")]
    CoordinateOutOfRange {
        /// Reported latitude.
        latitude: f64,
        /// Reported longitude.
        longitude: f64,
    },
    /// `properties.mag` absent or not numeric.
    #[error("missing magnitude")]
    MissingMagnitude,
    /// `properties.time` absent or not numeric.
    #[error("missing time")]
    MissingTime,
}

/// GeoJSON point geometry as reported upstream: `[longitude, latitude, depth?]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureGeometry {
    /// Raw coordinate entries; non-numeric entries surface as defects.
    #[serde(default)]
    pub coordinates: Vec<Value>,
}

/// Raw catalog feature with every field optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogFeature {
    /// Catalog identifier.
    #[serde(default)]
    pub id: Option<String>,
    /// Point geometry.
    #[serde(default)]
    pub geometry: Option<FeatureGeometry>,
    /// Feature properties (`mag`, `time`, `place`, ...).
    #[serde(default)]
    pub properties: Option<IndexMap<String, Value>>,
}

impl CatalogFeature {
    /// Parses one payload entry.
    pub fn from_value(value: Value) -> Result<Self, FeatureDefect> {
        if !value.is_object() {
            return Err(FeatureDefect::NotAFeature);
        }
        serde_json::from_value(value).map_err(|_| FeatureDefect::NotAFeature)
    }

    fn property(&self, key: &str) -> Option<&Value> {
        self.properties.as_ref().and_then(|props| props.get(key))
    }

    /// Magnitude from `properties.mag`.
    #[must_use]
    pub fn magnitude(&self) -> Option<f64> {
        self.property("mag").and_then(Value::as_f64).filter(|m| m.is_finite())
    }

    /// Occurrence time from `properties.time`, epoch milliseconds.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn time_ms(&self) -> Option<i64> {
        let raw = self.property("time")?;
        raw.as_i64()
            .or_else(|| raw.as_f64().filter(|t| t.is_finite()).map(|t| t.round() as i64))
    }

    /// Returns `(latitude, longitude, depth)` after range validation.
    pub fn location(&self) -> Result<(f64, f64, Option<f64>), FeatureDefect> {
        let coords = self
            .geometry
            .as_ref()
            .map(|geometry| geometry.coordinates.as_slice())
            .unwrap_or_default();
        let (Some(longitude), Some(latitude)) = (
            coords.first().and_then(Value::as_f64),
            coords.get(1).and_then(Value::as_f64),
        ) else {
            return Err(FeatureDefect::MissingGeometry);
        };
        if validate_coordinate(latitude, longitude).is_err() {
            return Err(FeatureDefect::CoordinateOutOfRange {
                latitude,
                longitude,
            });
        }
        let depth = coords.get(2).and_then(Value::as_f64);
        Ok((latitude, longitude, depth))
    }

    /// Normalizes into a validated event.
    pub fn to_event(&self) -> Result<SeismicEvent, FeatureDefect> {
        let id = self
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(FeatureDefect::MissingId)?;
        let (latitude, longitude, depth) = self.location()?;
        let magnitude = self.magnitude().ok_or(FeatureDefect::MissingMagnitude)?;
        let time = self.time_ms().ok_or(FeatureDefect::MissingTime)?;
        let properties = self
            .properties
            .iter()
            .flatten()
            .filter(|(key, _)| !matches!(key.as_str(), "mag" | "time"))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Ok(SeismicEvent {
            id: id.to_string(),
            time,
            magnitude,
            latitude,
            longitude,
            depth,
            properties,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn usgs_feature() -> Value {
        json!({
            "type": "Feature",
            "id": "us7000abcd",
            "properties": { "mag": 4.6, "place": "10 km S of Somewhere", "time": 1_700_000_000_000_i64 },
            "geometry": { "type": "Point", "coordinates": [142.3, 38.1, 10.0] }
        })
    }

    #[test]
    fn normalizes_usgs_feature() {
        let feature = CatalogFeature::from_value(usgs_feature()).unwrap();
        let event = feature.to_event().unwrap();
        assert_eq!(event.id, "us7000abcd");
        assert!((event.latitude - 38.1).abs() < f64::EPSILON);
        assert!((event.longitude - 142.3).abs() < f64::EPSILON);
        assert_eq!(event.depth, Some(10.0));
        assert_eq!(event.time, 1_700_000_000_000);
        assert_eq!(event.properties.len(), 1);
        assert!(event.properties.contains_key("place"));
    }

    #[test]
    fn reports_specific_defects() {
        let mut raw = usgs_feature();
        raw["geometry"] = Value::Null;
        let feature = CatalogFeature::from_value(raw).unwrap();
        assert_eq!(feature.to_event(), Err(FeatureDefect::MissingGeometry));

        let mut raw = usgs_feature();
        raw["properties"]["mag"] = Value::Null;
        let feature = CatalogFeature::from_value(raw).unwrap();
        assert_eq!(feature.to_event(), Err(FeatureDefect::MissingMagnitude));

        let mut raw = usgs_feature();
        raw["geometry"]["coordinates"] = json!([200.0, 10.0]);
        let feature = CatalogFeature::from_value(raw).unwrap();
        assert!(matches!(
            feature.to_event(),
            Err(FeatureDefect::CoordinateOutOfRange { .. })
        ));

        assert_eq!(
            CatalogFeature::from_value(json!("oops")),
            Err(FeatureDefect::NotAFeature)
        );
    }

    #[test]
    fn constructor_rejects_bad_coordinates() {
        assert!(SeismicEvent::new("a", 0, 3.0, 91.0, 0.0).is_err());
        let event = SeismicEvent::new("a", 86_400_000, 3.0, 10.0, 20.0).unwrap();
        assert_eq!(event.occurred_at().unwrap().to_rfc3339(), "1970-01-02T00:00:00+00:00");
    }
}
