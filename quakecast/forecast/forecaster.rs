use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::RwLock;
use quakecast_catalog::{QuakeTelemetry, SeismicEvent};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared_logging::LogLevel;
use tokio::{sync::Mutex, task};

use crate::{
    artifact::ModelArtifact,
    config::ForecastConfig,
    error::{ForecastError, StoreError},
    recurrent::{Trainer, TrainingConfig},
    store::ModelStore,
    window::{ensure_enough, prepare_windows, SequenceWindows},
};

/// Lifecycle of a [`SequenceForecaster`].
///
/// `Loaded` is transient: a validated artifact read at startup is installed
/// and the forecaster moves on to `Ready` immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecasterState {
    /// Startup load not attempted yet.
    Uninitialized,
    /// No usable artifact.
    Untrained,
    /// Artifact read from storage, being installed.
    Loaded,
    /// A training run holds the writer slot.
    Training,
    /// An artifact is installed and serving.
    Ready,
}

impl ForecasterState {
    /// Lowercase name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Untrained => "untrained",
            Self::Loaded => "loaded",
            Self::Training => "training",
            Self::Ready => "ready",
        }
    }
}

impl fmt::Display for ForecasterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Forecast for the next event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    /// Last event time plus the mean inter-event gap of the input series.
    /// A plain arithmetic estimate, not produced by the model and not authoritative.
    pub predicted_time: DateTime<Utc>,
    /// Model output mapped back to magnitude units.
    pub predicted_magnitude: f64,
}

/// Estimates the next occurrence as `last + mean(consecutive gaps)`, rounded to
/// the millisecond. Needs at least two events.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn estimate_next_time(events: &[SeismicEvent]) -> Result<DateTime<Utc>, ForecastError> {
    let (Some(first), Some(last)) = (events.first(), events.last()) else {
        return Err(ForecastError::InsufficientData {
            required: 1,
            available: 0,
        });
    };
    if events.len() < 2 {
        return Err(ForecastError::InsufficientData {
            required: 1,
            available: events.len(),
        });
    }
    // Consecutive gaps telescope to last - first.
    let span = i128::from(last.time) - i128::from(first.time);
    let mean_gap = (span as f64 / (events.len() - 1) as f64).round() as i64;
    last.time
        .checked_add(mean_gap)
        .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
        .ok_or_else(|| ForecastError::InferenceFailed("predicted time out of range".into()))
}

/// Owns the current artifact and serializes training.
///
/// Readers clone the current `Arc` and never wait on training; a retrain keeps
/// serving the previous artifact until the new one is persisted and swapped in.
#[derive(Debug)]
pub struct SequenceForecaster {
    trainer: Trainer,
    store: Arc<ModelStore>,
    current: RwLock<Option<Arc<ModelArtifact>>>,
    state: RwLock<ForecasterState>,
    training: Mutex<()>,
    training_runs: AtomicU64,
    telemetry: Option<QuakeTelemetry>,
}

impl SequenceForecaster {
    /// Creates an uninitialized forecaster.
    #[must_use]
    pub fn new(
        training: TrainingConfig,
        store: Arc<ModelStore>,
        telemetry: Option<QuakeTelemetry>,
    ) -> Self {
        Self {
            trainer: Trainer::new(training),
            store,
            current: RwLock::new(None),
            state: RwLock::new(ForecasterState::Uninitialized),
            training: Mutex::new(()),
            training_runs: AtomicU64::new(0),
            telemetry,
        }
    }

    /// Creates a forecaster from the `[forecast]` section.
    pub fn from_config(
        config: &ForecastConfig,
        telemetry: Option<QuakeTelemetry>,
    ) -> Result<Self, ForecastError> {
        config.validate()?;
        Ok(Self::new(
            config.training(),
            Arc::new(ModelStore::new(&config.artifact_path)),
            telemetry,
        ))
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ForecasterState {
        *self.state.read()
    }

    /// Artifact currently serving, if any.
    #[must_use]
    pub fn current(&self) -> Option<Arc<ModelArtifact>> {
        self.current.read().clone()
    }

    /// Completed training runs since construction.
    #[must_use]
    pub fn training_runs(&self) -> u64 {
        self.training_runs.load(Ordering::SeqCst)
    }

    /// Backing artifact store.
    #[must_use]
    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// Attempts the startup load. Missing or unusable artifacts leave the
    /// forecaster `Untrained`. Later calls are no-ops.
    pub async fn initialize(&self) -> ForecasterState {
        if self.state() != ForecasterState::Uninitialized {
            return self.state();
        }
        let _guard = self.training.lock().await;
        if self.state() != ForecasterState::Uninitialized {
            return self.state();
        }
        let store = Arc::clone(&self.store);
        match task::spawn_blocking(move || store.load()).await {
            Ok(Ok(artifact)) => {
                self.set_state(ForecasterState::Loaded);
                self.log(
                    LogLevel::Info,
                    "forecast.artifact.loaded",
                    json!({ "id": artifact.id, "sequence_length": artifact.sequence_length }),
                );
                self.install(Arc::new(artifact));
            }
            Ok(Err(StoreError::NotFound(path))) => {
                self.log(
                    LogLevel::Info,
                    "forecast.artifact.absent",
                    json!({ "path": path.display().to_string() }),
                );
                self.set_state(ForecasterState::Untrained);
            }
            Ok(Err(err)) => {
                self.log(
                    LogLevel::Warn,
                    "forecast.artifact.rejected",
                    json!({ "error": err.to_string() }),
                );
                self.set_state(ForecasterState::Untrained);
            }
            Err(err) => {
                self.log(
                    LogLevel::Error,
                    "forecast.artifact.rejected",
                    json!({ "error": err.to_string() }),
                );
                self.set_state(ForecasterState::Untrained);
            }
        }
        self.state()
    }

    /// Trains on prepared windows and installs the result.
    pub async fn train(&self, windows: SequenceWindows) -> Result<Arc<ModelArtifact>, ForecastError> {
        let _guard = self.training.lock().await;
        self.run_training(windows).await
    }

    /// Forecasts the event following `events` (sorted ascending by time).
    ///
    /// Trains first when `retrain` is set or no artifact for `sequence_length`
    /// is installed.
    pub async fn predict_next(
        &self,
        events: &[SeismicEvent],
        sequence_length: usize,
        retrain: bool,
    ) -> Result<ForecastResult, ForecastError> {
        ensure_enough(events.len(), sequence_length)?;
        if self.state() == ForecasterState::Uninitialized {
            self.initialize().await;
        }
        let artifact = match self.matching(sequence_length) {
            Some(artifact) if !retrain => artifact,
            _ => self.train_for(events, sequence_length, retrain).await?,
        };
        let window: Vec<f64> = events[events.len() - sequence_length..]
            .iter()
            .map(|event| event.magnitude)
            .collect();
        let predicted_magnitude = artifact.predict(&window)?;
        let predicted_time = estimate_next_time(events)?;
        self.log(
            LogLevel::Debug,
            "forecast.predicted",
            json!({ "artifact": artifact.id, "magnitude": predicted_magnitude, "time": predicted_time }),
        );
        Ok(ForecastResult {
            predicted_time,
            predicted_magnitude,
        })
    }

    fn matching(&self, sequence_length: usize) -> Option<Arc<ModelArtifact>> {
        self.current()
            .filter(|artifact| artifact.sequence_length == sequence_length)
    }

    async fn train_for(
        &self,
        events: &[SeismicEvent],
        sequence_length: usize,
        force: bool,
    ) -> Result<Arc<ModelArtifact>, ForecastError> {
        let _guard = self.training.lock().await;
        if !force {
            // Another caller may have finished training while we waited.
            if let Some(artifact) = self.matching(sequence_length) {
                return Ok(artifact);
            }
        }
        let windows = prepare_windows(events, sequence_length)?;
        self.run_training(windows).await
    }

    /// Caller holds the training lock.
    async fn run_training(&self, windows: SequenceWindows) -> Result<Arc<ModelArtifact>, ForecastError> {
        self.set_state(ForecasterState::Training);
        self.log(
            LogLevel::Info,
            "forecast.training.started",
            json!({ "windows": windows.len(), "sequence_length": windows.sequence_length }),
        );
        let trainer = self.trainer.clone();
        let store = Arc::clone(&self.store);
        let outcome = task::spawn_blocking(move || -> Result<ModelArtifact, ForecastError> {
            let outcome = trainer.train(&windows).map_err(|err| match err {
                ForecastError::TrainingFailed(_) => err,
                other => ForecastError::TrainingFailed(other.to_string()),
            })?;
            let final_loss = outcome.final_loss();
            let artifact = ModelArtifact::new(
                outcome.weights,
                windows.scaler,
                windows.sequence_length,
                final_loss,
            );
            store.save(&artifact).map_err(|err| {
                ForecastError::TrainingFailed(format!("persisting artifact: {err}"))
            })?;
            Ok(artifact)
        })
        .await
        .map_err(|err| ForecastError::TrainingFailed(format!("training task aborted: {err}")))
        .and_then(|result| result);

        match outcome {
            Ok(artifact) => {
                self.training_runs.fetch_add(1, Ordering::SeqCst);
                let payload = json!({
                    "id": artifact.id,
                    "final_loss": artifact.final_loss,
                    "path": self.store.path().display().to_string(),
                });
                self.log(LogLevel::Info, "forecast.training.completed", payload.clone());
                self.event("forecast.training.completed", payload.clone());
                self.event("forecast.artifact.persisted", payload);
                let artifact = Arc::new(artifact);
                self.install(Arc::clone(&artifact));
                Ok(artifact)
            }
            Err(err) => {
                let fallback = if self.current().is_some() {
                    ForecasterState::Ready
                } else {
                    ForecasterState::Untrained
                };
                self.log(
                    LogLevel::Error,
                    "forecast.training.failed",
                    json!({ "error": err.to_string(), "state": fallback.as_str() }),
                );
                self.event("forecast.training.failed", json!({ "error": err.to_string() }));
                self.set_state(fallback);
                Err(err)
            }
        }
    }

    fn install(&self, artifact: Arc<ModelArtifact>) {
        let id = artifact.id;
        *self.current.write() = Some(artifact);
        self.event("forecast.artifact.swapped", json!({ "id": id }));
        self.set_state(ForecasterState::Ready);
    }

    fn set_state(&self, next: ForecasterState) {
        let previous = std::mem::replace(&mut *self.state.write(), next);
        if previous != next {
            let payload = json!({ "from": previous.as_str(), "to": next.as_str() });
            self.log(LogLevel::Info, "forecast.state.changed", payload.clone());
            self.event("forecast.state.changed", payload);
        }
    }

    fn log(&self, level: LogLevel, message: &str, metadata: Value) {
        if let Some(tel) = &self.telemetry {
            let _ = tel.log(level, message, metadata);
        }
    }

    fn event(&self, event_type: &str, payload: Value) {
        if let Some(tel) = &self.telemetry {
            let _ = tel.event(event_type, payload);
        }
    }
}
