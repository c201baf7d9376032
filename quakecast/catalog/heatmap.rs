use serde::{Deserialize, Serialize};
use serde_json::json;
use shared_logging::LogLevel;

use crate::{
    event::{CatalogFeature, FeatureDefect, SeismicEvent},
    telemetry::QuakeTelemetry,
};

/// One heatmap sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatmapPoint {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Magnitude used as the heat weight.
    pub magnitude: f64,
}

/// Anything that may yield a heatmap sample.
pub trait HeatSource {
    /// Projects to a point, or explains why it cannot.
    fn heat_point(&self) -> Result<HeatmapPoint, FeatureDefect>;

    /// Identifier used when recording a skip.
    fn label(&self) -> Option<&str>;
}

impl HeatSource for SeismicEvent {
    fn heat_point(&self) -> Result<HeatmapPoint, FeatureDefect> {
        Ok(HeatmapPoint {
            latitude: self.latitude,
            longitude: self.longitude,
            magnitude: self.magnitude,
        })
    }

    fn label(&self) -> Option<&str> {
        Some(&self.id)
    }
}

impl HeatSource for CatalogFeature {
    fn heat_point(&self) -> Result<HeatmapPoint, FeatureDefect> {
        let (latitude, longitude, _) = self.location()?;
        let magnitude = self.magnitude().ok_or(FeatureDefect::MissingMagnitude)?;
        Ok(HeatmapPoint {
            latitude,
            longitude,
            magnitude,
        })
    }

    fn label(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// Points plus the input positions that were skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeatmapProjection {
    /// Projected points in input order.
    pub points: Vec<HeatmapPoint>,
    /// `(input index, reason)` for every skipped record.
    pub skipped: Vec<(usize, FeatureDefect)>,
}

/// Stateless projector from events to heatmap points.
#[derive(Debug, Clone, Default)]
pub struct HeatmapAggregator {
    telemetry: Option<QuakeTelemetry>,
}

impl HeatmapAggregator {
    /// Creates an aggregator.
    #[must_use]
    pub const fn new(telemetry: Option<QuakeTelemetry>) -> Self {
        Self { telemetry }
    }

    /// Projects every usable record; malformed ones are logged and left out.
    pub fn aggregate<S: HeatSource>(&self, sources: &[S]) -> Vec<HeatmapPoint> {
        self.project(sources).points
    }

    /// Like [`HeatmapAggregator::aggregate`], also returning what was skipped.
    pub fn project<S: HeatSource>(&self, sources: &[S]) -> HeatmapProjection {
        let mut projection = HeatmapProjection {
            points: Vec::with_capacity(sources.len()),
            skipped: Vec::new(),
        };
        for (index, source) in sources.iter().enumerate() {
            match source.heat_point() {
                Ok(point) => projection.points.push(point),
                Err(defect) => {
                    if let Some(tel) = &self.telemetry {
                        let _ = tel.log(
                            LogLevel::Warn,
                            "heatmap.record.skipped",
                            json!({ "index": index, "id": source.label(), "reason": defect.to_string() }),
                        );
                    }
                    projection.skipped.push((index, defect));
                }
            }
        }
        if !projection.skipped.is_empty() {
            if let Some(tel) = &self.telemetry {
                let _ = tel.event(
                    "heatmap.record.skipped",
                    json!({ "skipped": projection.skipped.len(), "points": projection.points.len() }),
                );
            }
        }
        projection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::tempdir;

    fn feature(idx: usize) -> CatalogFeature {
        #[allow(clippy::cast_precision_loss)]
        let offset = idx as f64;
        CatalogFeature::from_value(json!({
            "id": format!("ev{idx}"),
            "properties": { "mag": 2.0 + offset / 10.0, "time": 1_700_000_000_000_i64 },
            "geometry": { "coordinates": [-120.0 + offset, 35.0, 5.0] }
        }))
        .unwrap()
    }

    #[test]
    fn skips_missing_geometry_without_failing() {
        let mut features: Vec<CatalogFeature> = (0..10).map(feature).collect();
        let mut broken = feature(99);
        broken.geometry = None;
        features.insert(4, broken);

        let tmp = tempdir().unwrap();
        let telemetry = QuakeTelemetry::builder("heatmap")
            .log_path(tmp.path().join("heat.log"))
            .build()
            .unwrap();
        let aggregator = HeatmapAggregator::new(Some(telemetry));
        let projection = aggregator.project(&features);

        assert_eq!(projection.points.len(), 10);
        assert_eq!(projection.skipped, vec![(4, FeatureDefect::MissingGeometry)]);
        assert!((projection.points[4].longitude - -116.0).abs() < f64::EPSILON);
        let log = std::fs::read_to_string(tmp.path().join("heat.log")).unwrap();
        assert!(log.contains("ev99"));
    }

    #[test]
    fn skips_missing_magnitude_and_keeps_order() {
        let mut features: Vec<CatalogFeature> = (0..3).map(feature).collect();
        if let Some(props) = features[0].properties.as_mut() {
            props.insert("mag".into(), Value::Null);
        }
        let points = HeatmapAggregator::default().aggregate(&features);
        assert_eq!(points.len(), 2);
        assert!((points[0].longitude - -119.0).abs() < f64::EPSILON);
        assert!((points[1].longitude - -118.0).abs() < f64::EPSILON);
    }

    #[test]
    fn validated_events_always_project() {
        let events = vec![
            SeismicEvent::new("a", 0, 3.1, 10.0, 20.0).unwrap(),
            SeismicEvent::new("b", 1, 4.2, -10.0, -20.0).unwrap(),
        ];
        let points = HeatmapAggregator::default().aggregate(&events);
        assert_eq!(
            points[1],
            HeatmapPoint {
                latitude: -10.0,
                longitude: -20.0,
                magnitude: 4.2
            }
        );
    }
}
