#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Quakecast forecasting: magnitude windows, a recurrent regressor, artifact
//! persistence, and the forecaster lifecycle.

/// Forecast and store error types.
#[path = "../error.rs"]
pub mod error;

/// `[forecast]` configuration section.
#[path = "../config.rs"]
pub mod config;

/// Min-max magnitude scaling.
#[path = "../scaler.rs"]
pub mod scaler;

/// Sliding-window preparation.
#[path = "../window.rs"]
pub mod window;

/// Recurrent network, optimizer, and trainer.
#[path = "../recurrent/main.rs"]
pub mod recurrent;

/// Trained model artifact.
#[path = "../artifact.rs"]
pub mod artifact;

/// Single-slot artifact persistence.
#[path = "../store.rs"]
pub mod store;

/// Forecaster state machine and training coordinator.
#[path = "../forecaster.rs"]
pub mod forecaster;

pub use artifact::ModelArtifact;
pub use config::ForecastConfig;
pub use error::{ForecastError, StoreError};
pub use forecaster::{estimate_next_time, ForecastResult, ForecasterState, SequenceForecaster};
pub use recurrent::{RecurrentWeights, Trainer, TrainingConfig, TrainingOutcome};
pub use scaler::MinMaxScaler;
pub use store::ModelStore;
pub use window::{prepare_windows, SequenceWindows};
