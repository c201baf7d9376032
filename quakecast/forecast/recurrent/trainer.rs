use ndarray::Axis;
use rand::{rngs::SmallRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{
    model::{Gradients, RecurrentWeights},
    optimizer::Adam,
};
use crate::{error::ForecastError, window::SequenceWindows};

/// Training hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Hidden state width.
    pub hidden_width: usize,
    /// Passes over the window set.
    pub epochs: usize,
    /// Windows per optimizer step.
    pub batch_size: usize,
    /// Adam step size.
    pub learning_rate: f64,
    /// Seed for weight init and shuffling; entropy when absent.
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            hidden_width: 50,
            epochs: 10,
            batch_size: 32,
            learning_rate: 0.001,
            seed: None,
        }
    }
}

/// Weights plus the loss history they came with.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// Trained weights.
    pub weights: RecurrentWeights,
    /// Mean squared error per epoch, in scaled space.
    pub epoch_losses: Vec<f64>,
}

impl TrainingOutcome {
    /// Loss of the final epoch.
    #[must_use]
    pub fn final_loss(&self) -> f64 {
        self.epoch_losses.last().copied().unwrap_or_default()
    }
}

/// Mini-batch BPTT trainer minimizing mean squared error.
#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    /// Creates a trainer.
    #[must_use]
    pub const fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Hyperparameters in use.
    #[must_use]
    pub const fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Fits fresh weights to `windows`. CPU bound; run off the async executor.
    #[allow(clippy::cast_precision_loss)]
    pub fn train(&self, windows: &SequenceWindows) -> Result<TrainingOutcome, ForecastError> {
        let config = &self.config;
        if config.hidden_width == 0 || config.epochs == 0 || config.batch_size == 0 {
            return Err(ForecastError::InvalidConfig(
                "hidden width, epochs, and batch size must be positive".into(),
            ));
        }
        if windows.is_empty() {
            return Err(ForecastError::TrainingFailed("no training windows".into()));
        }
        let mut rng = config
            .seed
            .map_or_else(SmallRng::from_entropy, SmallRng::seed_from_u64);
        let mut weights = RecurrentWeights::random(config.hidden_width, &mut rng);
        let mut adam = Adam::new(config.hidden_width, config.learning_rate);
        let mut order: Vec<usize> = (0..windows.len()).collect();
        let mut epoch_losses = Vec::with_capacity(config.epochs);

        for epoch in 0..config.epochs {
            order.shuffle(&mut rng);
            let mut squared_error = 0.0;
            for batch in order.chunks(config.batch_size) {
                let scale = 1.0 / batch.len() as f64;
                let mut grads = Gradients::zeros(config.hidden_width);
                for &row in batch {
                    squared_error += weights.accumulate_gradients(
                        windows.inputs.index_axis(Axis(0), row),
                        windows.targets[row],
                        scale,
                        &mut grads,
                    );
                }
                adam.apply(&mut weights, &grads);
            }
            let loss = squared_error / windows.len() as f64;
            if !loss.is_finite() {
                return Err(ForecastError::TrainingFailed(format!(
                    "loss diverged at epoch {epoch}"
                )));
            }
            epoch_losses.push(loss);
        }
        weights.validate().map_err(ForecastError::TrainingFailed)?;
        Ok(TrainingOutcome {
            weights,
            epoch_losses,
        })
    }
}
