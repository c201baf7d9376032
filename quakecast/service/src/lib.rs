#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Quakecast service layer: catalog listing, heatmap, nearby search,
//! forecasting, and summaries with categorized error payloads.

/// Service error taxonomy and payloads.
#[path = "../error.rs"]
pub mod error;

/// Service configuration document.
#[path = "../config.rs"]
pub mod config;

/// Bounding boxes around a point.
#[path = "../bounds.rs"]
pub mod bounds;

/// Transport-agnostic operations.
#[path = "../operations.rs"]
pub mod operations;

pub use bounds::GeoBounds;
pub use config::{LoggingConfig, NearbyConfig, ServiceConfig, SummaryConfig};
pub use error::{ErrorCategory, ErrorPayload, ServiceError};
pub use operations::{distance, NearbyEvent, QuakeService, Summary};
