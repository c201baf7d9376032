use thiserror::Error;

/// Errors surfaced while building filters or talking to the catalog service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// Caller supplied a malformed or inconsistent filter.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    /// Network failure, non-success status, timeout, or a payload that breaks the contract.
    #[error("upstream catalog unavailable: {0}")]
    UpstreamUnavailable(String),
}

/// Errors surfaced by the distance engine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GeoError {
    /// Latitude outside [-90, 90] or longitude outside [-180, 180].
    #[error("invalid coordinate ({latitude}, {longitude})")]
    InvalidCoordinate {
        /// Offending latitude.
        latitude: f64,
        /// Offending longitude.
        longitude: f64,
    },
    /// Unit token is not one of kilometers, miles, nauticalMiles.
    #[error("invalid distance unit '{0}'")]
    InvalidUnit(String),
}
