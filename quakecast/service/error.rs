use quakecast_catalog::{CatalogError, GeoError};
use quakecast_forecast::ForecastError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse failure class used to pick a transport status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The caller sent something unusable.
    ClientInput,
    /// The catalog service failed or broke its contract.
    Upstream,
    /// Model or configuration failure inside the service.
    Internal,
}

/// Body returned for every failed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Human-readable message.
    pub error: String,
}

/// Any failure an operation can report.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ServiceError {
    /// Filter or upstream failure.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// Bad coordinates or unit.
    #[error(transparent)]
    Geo(#[from] GeoError),
    /// Forecasting failure.
    #[error(transparent)]
    Forecast(#[from] ForecastError),
}

impl ServiceError {
    /// Failure class.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Catalog(CatalogError::InvalidFilter(_))
            | Self::Geo(_)
            | Self::Forecast(ForecastError::InsufficientData { .. }) => ErrorCategory::ClientInput,
            Self::Catalog(CatalogError::UpstreamUnavailable(_)) => ErrorCategory::Upstream,
            Self::Forecast(_) => ErrorCategory::Internal,
        }
    }

    /// HTTP-style status for the failure.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match (self, self.category()) {
            (Self::Forecast(ForecastError::InsufficientData { .. }), _) => 422,
            (_, ErrorCategory::ClientInput) => 400,
            (_, ErrorCategory::Upstream) => 502,
            (_, ErrorCategory::Internal) => 500,
        }
    }

    /// `{ "error": message }` body.
    #[must_use]
    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            error: self.to_string(),
        }
    }
}
