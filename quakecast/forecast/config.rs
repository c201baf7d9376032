use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{error::ForecastError, recurrent::TrainingConfig};

/// `[forecast]` section of the service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Window length fed to the model.
    #[serde(default = "default_sequence_length")]
    pub sequence_length: usize,
    /// Hidden state width.
    #[serde(default = "default_hidden_width")]
    pub hidden_width: usize,
    /// Training epochs.
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    /// Mini-batch size.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Adam step size.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Artifact slot.
    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,
    /// History fetched for a prediction.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    /// Fixed seed for reproducible training.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            sequence_length: default_sequence_length(),
            hidden_width: default_hidden_width(),
            epochs: default_epochs(),
            batch_size: default_batch_size(),
            learning_rate: default_learning_rate(),
            artifact_path: default_artifact_path(),
            lookback_days: default_lookback_days(),
            seed: None,
        }
    }
}

impl ForecastConfig {
    /// Rejects values no model can be built from.
    pub fn validate(&self) -> Result<(), ForecastError> {
        let problem = if self.sequence_length == 0 {
            Some("sequence_length must be at least 1")
        } else if self.hidden_width == 0 {
            Some("hidden_width must be at least 1")
        } else if self.epochs == 0 || self.batch_size == 0 {
            Some("epochs and batch_size must be at least 1")
        } else if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            Some("learning_rate must be positive")
        } else if self.lookback_days == 0 {
            Some("lookback_days must be at least 1")
        } else {
            None
        };
        problem.map_or(Ok(()), |msg| Err(ForecastError::InvalidConfig(msg.into())))
    }

    /// Trainer hyperparameters.
    #[must_use]
    pub const fn training(&self) -> TrainingConfig {
        TrainingConfig {
            hidden_width: self.hidden_width,
            epochs: self.epochs,
            batch_size: self.batch_size,
            learning_rate: self.learning_rate,
            seed: self.seed,
        }
    }
}

const fn default_sequence_length() -> usize {
    30
}

const fn default_hidden_width() -> usize {
    50
}

const fn default_epochs() -> usize {
    10
}

const fn default_batch_size() -> usize {
    32
}

const fn default_learning_rate() -> f64 {
    0.001
}

fn default_artifact_path() -> PathBuf {
    PathBuf::from("data/model/forecaster.json")
}

const fn default_lookback_days() -> u32 {
    365
}
