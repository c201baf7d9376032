use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use quakecast_catalog::{CatalogConfig, QuakeTelemetry, MAX_WINDOW_DAYS};
use quakecast_forecast::ForecastConfig;
use serde::{Deserialize, Serialize};
use shared_event_bus::FileEventPublisher;
use shared_logging::LogLevel;

/// `[nearby]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyConfig {
    /// Search radius around the requested point.
    #[serde(default = "default_radius_km")]
    pub radius_km: f64,
    /// History searched.
    #[serde(default = "default_nearby_days")]
    pub lookback_days: u32,
}

impl Default for NearbyConfig {
    fn default() -> Self {
        Self {
            radius_km: default_radius_km(),
            lookback_days: default_nearby_days(),
        }
    }
}

/// `[summary]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// History summarized.
    #[serde(default = "default_summary_days")]
    pub lookback_days: u32,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_summary_days(),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// JSON-lines log file; logging is off when absent.
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    /// JSON-lines lifecycle event file; events are off when absent.
    #[serde(default)]
    pub event_log: Option<PathBuf>,
    /// Lowest level written.
    #[serde(default)]
    pub min_level: LogLevel,
}

/// Whole service configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Upstream catalog.
    #[serde(default)]
    pub catalog: CatalogConfig,
    /// Forecaster hyperparameters and artifact slot.
    #[serde(default)]
    pub forecast: ForecastConfig,
    /// Nearby search.
    #[serde(default)]
    pub nearby: NearbyConfig,
    /// Summary window.
    #[serde(default)]
    pub summary: SummaryConfig,
    /// Log and event sinks.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Loads a TOML document, resolving relative paths against its directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading service config {}", path.display()))?;
        let mut config: Self =
            toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        let source_dir = path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        config.resolve_paths(&source_dir);
        Ok(config)
    }

    /// Rejects values that cannot drive the service.
    pub fn validate(&self) -> Result<()> {
        if !(self.nearby.radius_km.is_finite() && self.nearby.radius_km > 0.0) {
            bail!("nearby.radius_km must be positive");
        }
        let windows = [
            ("catalog.default_window_days", self.catalog.default_window_days),
            ("nearby.lookback_days", self.nearby.lookback_days),
            ("summary.lookback_days", self.summary.lookback_days),
            ("forecast.lookback_days", self.forecast.lookback_days),
        ];
        for (name, days) in windows {
            if !(1..=MAX_WINDOW_DAYS).contains(&days) {
                bail!("{name} must be within 1..={MAX_WINDOW_DAYS}, got {days}");
            }
        }
        if self.catalog.timeout_ms == 0 {
            bail!("catalog.timeout_ms must be positive");
        }
        self.forecast.validate()?;
        Ok(())
    }

    fn resolve_paths(&mut self, source_dir: &Path) {
        let resolve = |candidate: &mut PathBuf| {
            if candidate.is_relative() {
                *candidate = source_dir.join(&*candidate);
            }
        };
        resolve(&mut self.forecast.artifact_path);
        if let Some(log_path) = self.logging.log_path.as_mut() {
            resolve(log_path);
        }
        if let Some(event_log) = self.logging.event_log.as_mut() {
            resolve(event_log);
        }
    }

    /// Builds telemetry from `[logging]`; `None` when no sink is configured.
    pub fn telemetry(&self) -> Result<Option<QuakeTelemetry>> {
        let logging = &self.logging;
        if logging.log_path.is_none() && logging.event_log.is_none() {
            return Ok(None);
        }
        let mut builder = QuakeTelemetry::builder("service").min_level(logging.min_level);
        if let Some(path) = &logging.log_path {
            builder = builder.log_path(path);
        }
        if let Some(path) = &logging.event_log {
            builder = builder.event_publisher(Arc::new(FileEventPublisher::new(path)?));
        }
        builder.build().map(Some)
    }
}

const fn default_radius_km() -> f64 {
    500.0
}

const fn default_nearby_days() -> u32 {
    30
}

const fn default_summary_days() -> u32 {
    1825
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn loads_document_and_resolves_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("quakecast.toml");
        fs::write(
            &path,
            r#"
[catalog]
timeout_ms = 2500

[forecast]
sequence_length = 12
artifact_path = "model/forecaster.json"
seed = 7

[nearby]
radius_km = 250.0

[logging]
log_path = "logs/quakecast.jsonl"
min_level = "WARN"
"#,
        )
        .unwrap();

        let config = ServiceConfig::load(&path).unwrap();
        assert_eq!(config.catalog.timeout_ms, 2500);
        assert_eq!(config.catalog.default_window_days, 7);
        assert_eq!(config.forecast.sequence_length, 12);
        assert_eq!(config.forecast.hidden_width, 50);
        assert_eq!(config.forecast.seed, Some(7));
        assert_eq!(config.forecast.artifact_path, dir.path().join("model/forecaster.json"));
        assert!((config.nearby.radius_km - 250.0).abs() < f64::EPSILON);
        assert_eq!(config.summary.lookback_days, 1825);
        assert_eq!(config.logging.min_level, LogLevel::Warn);
        assert_eq!(
            config.logging.log_path.as_deref(),
            Some(dir.path().join("logs/quakecast.jsonl").as_path())
        );
        assert!(config.telemetry().unwrap().is_some());
    }

    #[test]
    fn rejects_unusable_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[forecast]\nsequence_length = 0\n").unwrap();
        assert!(ServiceConfig::load(&path).is_err());
        fs::write(&path, "[nearby]\nradius_km = -5.0\n").unwrap();
        assert!(ServiceConfig::load(&path).is_err());
    }

    #[test]
    fn rejects_out_of_range_windows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("windows.toml");
        for document in [
            "[catalog]\ndefault_window_days = 0\n",
            "[summary]\nlookback_days = 0\n",
            "[nearby]\nlookback_days = 4000000000\n",
            "[forecast]\nlookback_days = 36501\n",
        ] {
            fs::write(&path, document).unwrap();
            let err = ServiceConfig::load(&path).unwrap_err();
            assert!(format!("{err:#}").contains("must be within"), "{document}");
        }
        fs::write(&path, "[catalog]\ndefault_window_days = 36500\n").unwrap();
        assert!(ServiceConfig::load(&path).is_ok());
    }

    #[test]
    fn empty_document_is_all_defaults() {
        let config: ServiceConfig = toml::from_str("").unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert!(config.telemetry().unwrap().is_none());
    }
}
