use chrono::{DateTime, Utc};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::ForecastError, recurrent::RecurrentWeights, scaler::MinMaxScaler};

/// A trained forecaster: weights, the scaler they were trained under, and the
/// window length. Superseded as a whole on retrain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Identifier of the training run.
    pub id: Uuid,
    /// When training finished.
    pub trained_at: DateTime<Utc>,
    /// Window length the weights expect.
    pub sequence_length: usize,
    /// Normalization fit over the training series.
    pub scaler: MinMaxScaler,
    /// Network weights.
    pub weights: RecurrentWeights,
    /// Final-epoch training loss in scaled space.
    pub final_loss: f64,
}

impl ModelArtifact {
    /// Wraps freshly trained weights.
    #[must_use]
    pub fn new(
        weights: RecurrentWeights,
        scaler: MinMaxScaler,
        sequence_length: usize,
        final_loss: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            trained_at: Utc::now(),
            sequence_length,
            scaler,
            weights,
            final_loss,
        }
    }

    /// Structural checks applied to anything read back from storage.
    pub fn validate(&self) -> Result<(), String> {
        if self.sequence_length == 0 {
            return Err("sequence length is zero".into());
        }
        if !self.scaler.is_valid() {
            return Err(format!(
                "scaler bounds [{}, {}] are unusable",
                self.scaler.min, self.scaler.max
            ));
        }
        self.weights.validate()
    }

    /// Predicts the next raw magnitude from the most recent raw magnitudes.
    ///
    /// Uses this artifact's own scaler in both directions.
    pub fn predict(&self, window: &[f64]) -> Result<f64, ForecastError> {
        if window.len() != self.sequence_length {
            return Err(ForecastError::InferenceFailed(format!(
                "window has {} values, model expects {}",
                window.len(),
                self.sequence_length
            )));
        }
        if window.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::InferenceFailed(
                "window contains non-finite magnitudes".into(),
            ));
        }
        let scaled: Vec<f64> = window.iter().map(|&m| self.scaler.transform(m)).collect();
        let output = self.weights.forward(ArrayView1::from(scaled.as_slice()));
        if !output.is_finite() {
            return Err(ForecastError::InferenceFailed("non-finite model output".into()));
        }
        Ok(self.scaler.inverse(output))
    }
}
