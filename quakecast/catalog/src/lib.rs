#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Quakecast catalog layer: upstream query translation, event normalization,
//! geodesic distance, and heatmap projection.

/// Error taxonomy for catalog and geodesic operations.
#[path = "../error.rs"]
pub mod error;

/// Seismic event model and raw catalog features.
#[path = "../event.rs"]
pub mod event;

/// Query filters and the default time-window policy.
#[path = "../filter.rs"]
pub mod filter;

/// Upstream transport and query translation.
#[path = "../translator.rs"]
pub mod translator;

/// Great-circle distance engine.
#[path = "../geo.rs"]
pub mod geo;

/// Heatmap projection over events or raw features.
#[path = "../heatmap.rs"]
pub mod heatmap;

/// Catalog configuration section.
#[path = "../config.rs"]
pub mod config;

/// Structured logging and lifecycle events.
#[path = "../telemetry.rs"]
pub mod telemetry;

pub use config::CatalogConfig;
pub use error::{CatalogError, GeoError};
pub use event::{CatalogFeature, FeatureDefect, FeatureGeometry, SeismicEvent};
pub use filter::{
    parse_iso8601, FilterParams, OrderBy, QueryFilter, TimeWindowPolicy, MAX_WINDOW_DAYS,
};
pub use geo::{distance, distance_in, validate_coordinate, DistanceUnit, EARTH_RADIUS_KM};
pub use heatmap::{HeatSource, HeatmapAggregator, HeatmapPoint, HeatmapProjection};
pub use telemetry::{QuakeTelemetry, QuakeTelemetryBuilder};
pub use translator::{
    CatalogTransport, FetchReport, HttpCatalogTransport, QueryTranslator, SkippedFeature,
};
