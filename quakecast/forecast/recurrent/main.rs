//! Recurrent regressor: weights, optimizer, and training loop.

/// Network weights, forward pass, and BPTT gradients.
pub mod model;
/// Adam optimizer state.
pub mod optimizer;
/// Mini-batch training loop.
pub mod trainer;

pub use model::{Gradients, RecurrentWeights};
pub use optimizer::Adam;
pub use trainer::{Trainer, TrainingConfig, TrainingOutcome};
