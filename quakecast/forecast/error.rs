use std::{io, path::PathBuf};

use thiserror::Error;

/// Failures of the forecasting pipeline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ForecastError {
    /// Not enough events to build a single window.
    #[error("insufficient data: need more than {required} events, got {available}")]
    InsufficientData {
        /// Sequence length that must be exceeded.
        required: usize,
        /// Events supplied.
        available: usize,
    },
    /// Hyperparameters that cannot describe a model.
    #[error("invalid forecast configuration: {0}")]
    InvalidConfig(String),
    /// Training or persisting the trained artifact failed; the prior artifact is intact.
    #[error("training failed: {0}")]
    TrainingFailed(String),
    /// The forward pass could not produce a usable value.
    #[error("inference failed: {0}")]
    InferenceFailed(String),
}

/// Failures of the artifact store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No artifact at the path. Not fatal: the forecaster starts untrained.
    #[error("no model artifact at {0}")]
    NotFound(PathBuf),
    /// Filesystem failure.
    #[error("artifact io at {path}: {source}")]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// Unparseable artifact, or one whose shapes disagree.
    #[error("corrupt artifact at {path}: {reason}")]
    Corrupt {
        /// Offending path.
        path: PathBuf,
        /// What was wrong.
        reason: String,
    },
}
