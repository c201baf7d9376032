use std::sync::Arc;

use quakecast_catalog::{
    distance_in, DistanceUnit, FilterParams, HeatmapAggregator, HeatmapPoint, OrderBy,
    QuakeTelemetry, QueryTranslator, SeismicEvent, TimeWindowPolicy,
};
use quakecast_forecast::{ForecastConfig, ForecastResult, SequenceForecaster};
use serde::Serialize;
use serde_json::{json, Value};
use shared_logging::LogLevel;

use crate::{
    bounds::GeoBounds,
    config::{NearbyConfig, ServiceConfig, SummaryConfig},
    error::ServiceError,
};

/// An event with its distance from the requested point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyEvent {
    /// The event itself.
    #[serde(flatten)]
    pub event: SeismicEvent,
    /// Great-circle distance in kilometers.
    pub distance_km: f64,
}

/// Recent activity around a point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// Events in the summary window, upstream order.
    pub earthquakes: Vec<SeismicEvent>,
    /// Largest magnitude among them; 0.0 when there are none.
    pub highest_magnitude: f64,
}

/// The operations the service exposes, independent of any transport.
#[derive(Debug)]
pub struct QuakeService {
    translator: QueryTranslator,
    heatmap: HeatmapAggregator,
    forecaster: Arc<SequenceForecaster>,
    forecast: ForecastConfig,
    nearby: NearbyConfig,
    summary: SummaryConfig,
    telemetry: Option<QuakeTelemetry>,
}

impl QuakeService {
    /// Wires the service from parts.
    #[must_use]
    pub fn new(
        translator: QueryTranslator,
        forecaster: Arc<SequenceForecaster>,
        config: &ServiceConfig,
        telemetry: Option<QuakeTelemetry>,
    ) -> Self {
        Self {
            translator,
            heatmap: HeatmapAggregator::new(telemetry.as_ref().map(|tel| tel.scoped("heatmap"))),
            forecaster,
            forecast: config.forecast.clone(),
            nearby: config.nearby.clone(),
            summary: config.summary.clone(),
            telemetry,
        }
    }

    /// Wires the service against the HTTPS catalog and the configured artifact slot.
    pub fn from_config(
        config: &ServiceConfig,
        telemetry: Option<QuakeTelemetry>,
    ) -> Result<Self, ServiceError> {
        let translator = QueryTranslator::from_config(
            &config.catalog,
            telemetry.as_ref().map(|tel| tel.scoped("catalog")),
        )?;
        let forecaster = SequenceForecaster::from_config(
            &config.forecast,
            telemetry.as_ref().map(|tel| tel.scoped("forecast")),
        )?;
        Ok(Self::new(translator, Arc::new(forecaster), config, telemetry))
    }

    /// Shared forecaster.
    #[must_use]
    pub fn forecaster(&self) -> &Arc<SequenceForecaster> {
        &self.forecaster
    }

    /// Events matching `params`, upstream order.
    pub async fn list_events(&self, params: &FilterParams) -> Result<Vec<SeismicEvent>, ServiceError> {
        let result = self.translator.fetch_with(params).await.map_err(ServiceError::from);
        self.observe("list_events", result)
    }

    /// Heatmap points for events matching `params`; malformed records are skipped.
    pub async fn heatmap(&self, params: &FilterParams) -> Result<Vec<HeatmapPoint>, ServiceError> {
        let result = async {
            let filter = params.build(self.translator.policy())?;
            let features = self.translator.fetch_features(&filter).await?;
            Ok::<_, ServiceError>(self.heatmap.aggregate(&features))
        }
        .await;
        self.observe("heatmap", result)
    }

    /// Events within the configured radius of a point, each with its distance.
    pub async fn nearby(&self, latitude: f64, longitude: f64) -> Result<Vec<NearbyEvent>, ServiceError> {
        let result = async {
            let events = self
                .around(latitude, longitude, self.nearby.lookback_days, None)
                .await?;
            let mut nearby = Vec::with_capacity(events.len());
            for event in events {
                let distance_km = distance_in(
                    latitude,
                    longitude,
                    event.latitude,
                    event.longitude,
                    DistanceUnit::Kilometers,
                )?;
                if distance_km <= self.nearby.radius_km {
                    nearby.push(NearbyEvent { event, distance_km });
                }
            }
            Ok::<_, ServiceError>(nearby)
        }
        .await;
        self.observe("nearby", result)
    }

    /// Forecasts the next event near a point from its history.
    ///
    /// `predicted_time` is an arithmetic estimate, not a model output.
    pub async fn predict(
        &self,
        latitude: f64,
        longitude: f64,
        retrain: bool,
    ) -> Result<ForecastResult, ServiceError> {
        let result = async {
            let mut events = self
                .around(
                    latitude,
                    longitude,
                    self.forecast.lookback_days,
                    Some(OrderBy::TimeAsc),
                )
                .await?;
            events.sort_by_key(|event| event.time);
            let forecast = self
                .forecaster
                .predict_next(&events, self.forecast.sequence_length, retrain)
                .await?;
            Ok::<_, ServiceError>(forecast)
        }
        .await;
        self.observe("predict", result)
    }

    /// Event count and peak magnitude near a point over the summary window.
    pub async fn summary(&self, latitude: f64, longitude: f64) -> Result<Summary, ServiceError> {
        let result = async {
            let earthquakes = self
                .around(latitude, longitude, self.summary.lookback_days, None)
                .await?;
            let highest_magnitude = earthquakes
                .iter()
                .map(|event| event.magnitude)
                .reduce(f64::max)
                .unwrap_or(0.0);
            Ok::<_, ServiceError>(Summary {
                earthquakes,
                highest_magnitude,
            })
        }
        .await;
        self.observe("summary", result)
    }

    async fn around(
        &self,
        latitude: f64,
        longitude: f64,
        lookback_days: u32,
        order: Option<OrderBy>,
    ) -> Result<Vec<SeismicEvent>, ServiceError> {
        let bounds = GeoBounds::around(latitude, longitude, self.nearby.radius_km)?;
        let mut params = bounds.apply(FilterParams::default());
        if let Some(order) = order {
            params = params.order_by(order);
        }
        let filter = params.build(&TimeWindowPolicy::days(lookback_days))?;
        Ok(self.translator.fetch(&filter).await?)
    }

    fn observe<T>(&self, operation: &str, result: Result<T, ServiceError>) -> Result<T, ServiceError> {
        if let (Err(err), Some(tel)) = (&result, &self.telemetry) {
            let level = if err.status_code() >= 500 {
                LogLevel::Error
            } else {
                LogLevel::Warn
            };
            let _ = tel.log(
                level,
                "service.operation.failed",
                json!({ "operation": operation, "status": err.status_code(), "error": err.to_string() }),
            );
        }
        result
    }
}

/// Distance between two points with a unit token.
pub fn distance(
    lat_a: f64,
    lon_a: f64,
    lat_b: f64,
    lon_b: f64,
    unit: &str,
) -> Result<Value, ServiceError> {
    let unit_value: DistanceUnit = unit.parse()?;
    let value = distance_in(lat_a, lon_a, lat_b, lon_b, unit_value)?;
    Ok(json!({ "distance": value, "unit": unit_value }))
}
