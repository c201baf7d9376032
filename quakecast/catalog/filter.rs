use std::{fmt, str::FromStr};

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Largest `limit` the catalog accepts.
pub const MAX_LIMIT: i64 = 20_000;

/// Longest window or lookback, in days, a configuration may ask for.
pub const MAX_WINDOW_DAYS: u32 = 36_500;

const UPSTREAM_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Result ordering passed through to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderBy {
    /// Newest first.
    #[serde(rename = "time")]
    Time,
    /// Oldest first.
    #[serde(rename = "time-asc")]
    TimeAsc,
    /// Largest magnitude first.
    #[serde(rename = "magnitude")]
    Magnitude,
    /// Smallest magnitude first.
    #[serde(rename = "magnitude-asc")]
    MagnitudeAsc,
}

impl OrderBy {
    /// Upstream parameter token.
    #[must_use]
    pub const fn as_param(self) -> &'static str {
        match self {
            Self::Time => "time",
            Self::TimeAsc => "time-asc",
            Self::Magnitude => "magnitude",
            Self::MagnitudeAsc => "magnitude-asc",
        }
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param())
    }
}

impl FromStr for OrderBy {
    type Err = CatalogError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "time" => Ok(Self::Time),
            "time-asc" => Ok(Self::TimeAsc),
            "magnitude" => Ok(Self::Magnitude),
            "magnitude-asc" => Ok(Self::MagnitudeAsc),
            other => Err(CatalogError::InvalidFilter(format!(
                "unknown orderby '{other}'"
            ))),
        }
    }
}

/// Parses the ISO-8601 shapes the service accepts: RFC 3339 with offset,
/// naive date-time (UTC assumed), or a bare date (midnight UTC).
#[must_use]
pub fn parse_iso8601(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Single policy for filling in a missing start or end time.
///
/// Both missing: `[now - window, now]`. Only end missing: end is `now`.
/// Only start missing: start is `end - window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindowPolicy {
    window: Duration,
}

impl TimeWindowPolicy {
    /// Policy with a window of `days` days. Configuration rejects 0 and
    /// anything above [`MAX_WINDOW_DAYS`] before a policy is built.
    #[must_use]
    pub fn days(days: u32) -> Self {
        Self {
            window: Duration::days(i64::from(days)),
        }
    }

    /// Window length.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Resolves optional bounds against `now`.
    ///
    /// Fails when the derived start falls outside the representable range.
    pub fn resolve(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), CatalogError> {
        let window_before = |end: DateTime<Utc>| {
            end.checked_sub_signed(self.window)
                .map(|start| (start, end))
                .ok_or_else(|| invalid(format!("no {}-day window fits before {end}", self.window.num_days())))
        };
        match (start, end) {
            (Some(start), Some(end)) => Ok((start, end)),
            (Some(start), None) => Ok((start, now)),
            (None, Some(end)) => window_before(end),
            (None, None) => window_before(now),
        }
    }
}

impl Default for TimeWindowPolicy {
    fn default() -> Self {
        Self::days(7)
    }
}

/// Raw, unvalidated filter fields named after the upstream parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterParams {
    /// Start time, ISO-8601.
    #[serde(default)]
    pub starttime: Option<String>,
    /// End time, ISO-8601.
    #[serde(default)]
    pub endtime: Option<String>,
    /// Minimum magnitude.
    #[serde(default)]
    pub minmagnitude: Option<f64>,
    /// Maximum magnitude.
    #[serde(default)]
    pub maxmagnitude: Option<f64>,
    /// Southern bound.
    #[serde(default)]
    pub minlatitude: Option<f64>,
    /// Northern bound.
    #[serde(default)]
    pub maxlatitude: Option<f64>,
    /// Western bound.
    #[serde(default)]
    pub minlongitude: Option<f64>,
    /// Eastern bound.
    #[serde(default)]
    pub maxlongitude: Option<f64>,
    /// Result cap.
    #[serde(default)]
    pub limit: Option<i64>,
    /// Ordering token.
    #[serde(default)]
    pub orderby: Option<String>,
}

impl FilterParams {
    /// Sets the time bounds.
    #[must_use]
    pub fn between(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.starttime = Some(start.into());
        self.endtime = Some(end.into());
        self
    }

    /// Sets the magnitude range.
    #[must_use]
    pub fn magnitude(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.minmagnitude = min;
        self.maxmagnitude = max;
        self
    }

    /// Sets the bounding box as `(min_lat, max_lat, min_lon, max_lon)`.
    #[must_use]
    pub fn bounds(mut self, min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        self.minlatitude = Some(min_lat);
        self.maxlatitude = Some(max_lat);
        self.minlongitude = Some(min_lon);
        self.maxlongitude = Some(max_lon);
        self
    }

    /// Sets the result cap.
    #[must_use]
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the ordering token.
    #[must_use]
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.orderby = Some(order.as_param().to_string());
        self
    }

    /// Validates against the current clock.
    pub fn build(&self, policy: &TimeWindowPolicy) -> Result<QueryFilter, CatalogError> {
        self.build_at(policy, Utc::now())
    }

    /// Validates, filling missing times relative to `now`.
    pub fn build_at(
        &self,
        policy: &TimeWindowPolicy,
        now: DateTime<Utc>,
    ) -> Result<QueryFilter, CatalogError> {
        let start = parse_time_field("starttime", self.starttime.as_deref())?;
        let end = parse_time_field("endtime", self.endtime.as_deref())?;
        let (start, end) = policy.resolve(start, end, now)?;
        if start > end {
            return Err(invalid("starttime is after endtime"));
        }

        let min_magnitude = finite("minmagnitude", self.minmagnitude)?;
        let max_magnitude = finite("maxmagnitude", self.maxmagnitude)?;
        if let (Some(min), Some(max)) = (min_magnitude, max_magnitude) {
            if min > max {
                return Err(invalid("minmagnitude exceeds maxmagnitude"));
            }
        }

        let min_latitude = bounded("minlatitude", self.minlatitude, 90.0)?;
        let max_latitude = bounded("maxlatitude", self.maxlatitude, 90.0)?;
        if let (Some(min), Some(max)) = (min_latitude, max_latitude) {
            if min > max {
                return Err(invalid("minlatitude exceeds maxlatitude"));
            }
        }
        let min_longitude = bounded("minlongitude", self.minlongitude, 180.0)?;
        let max_longitude = bounded("maxlongitude", self.maxlongitude, 180.0)?;

        if let Some(limit) = self.limit {
            if !(1..=MAX_LIMIT).contains(&limit) {
                return Err(invalid(format!("limit must be within 1..={MAX_LIMIT}")));
            }
        }
        let order_by = self
            .orderby
            .as_deref()
            .filter(|token| !token.trim().is_empty())
            .map(str::parse::<OrderBy>)
            .transpose()?;

        Ok(QueryFilter {
            start,
            end,
            min_magnitude,
            max_magnitude,
            min_latitude,
            max_latitude,
            min_longitude,
            max_longitude,
            limit: self.limit,
            order_by,
        })
    }
}

fn invalid(message: impl Into<String>) -> CatalogError {
    CatalogError::InvalidFilter(message.into())
}

fn parse_time_field(name: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>, CatalogError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => parse_iso8601(value)
            .map(Some)
            .ok_or_else(|| invalid(format!("{name} '{value}' is not ISO-8601"))),
    }
}

fn finite(name: &str, value: Option<f64>) -> Result<Option<f64>, CatalogError> {
    match value {
        Some(v) if !v.is_finite() => Err(invalid(format!("{name} must be finite"))),
        other => Ok(other),
    }
}

fn bounded(name: &str, value: Option<f64>, limit: f64) -> Result<Option<f64>, CatalogError> {
    match value {
        Some(v) if !(-limit..=limit).contains(&v) => {
            Err(invalid(format!("{name} {v} outside [-{limit}, {limit}]")))
        }
        other => Ok(other),
    }
}

/// Validated, immutable catalog query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFilter {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    min_magnitude: Option<f64>,
    max_magnitude: Option<f64>,
    min_latitude: Option<f64>,
    max_latitude: Option<f64>,
    min_longitude: Option<f64>,
    max_longitude: Option<f64>,
    limit: Option<i64>,
    order_by: Option<OrderBy>,
}

impl QueryFilter {
    /// Inclusive start.
    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Inclusive end.
    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Requested ordering, if any.
    #[must_use]
    pub const fn order_by(&self) -> Option<OrderBy> {
        self.order_by
    }

    /// Result cap, if any.
    #[must_use]
    pub const fn limit(&self) -> Option<i64> {
        self.limit
    }

    /// Upstream request parameters, `format` first and optional fields only when set.
    #[must_use]
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("format", "geojson".to_string()),
            ("starttime", self.start.format(UPSTREAM_TIME_FORMAT).to_string()),
            ("endtime", self.end.format(UPSTREAM_TIME_FORMAT).to_string()),
        ];
        let optional = [
            ("minmagnitude", self.min_magnitude),
            ("maxmagnitude", self.max_magnitude),
            ("minlatitude", self.min_latitude),
            ("maxlatitude", self.max_latitude),
            ("minlongitude", self.min_longitude),
            ("maxlongitude", self.max_longitude),
        ];
        params.extend(
            optional
                .into_iter()
                .filter_map(|(key, value)| value.map(|v| (key, v.to_string()))),
        );
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(order) = self.order_by {
            params.push(("orderby", order.as_param().to_string()));
        }
        params
    }
}
