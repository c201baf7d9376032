use ndarray::{Array, Dimension, Zip};

use super::model::{Gradients, RecurrentWeights};

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPSILON: f64 = 1e-7;

/// Adam with first/second moment estimates per weight.
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f64,
    step: i32,
    first: Gradients,
    second: Gradients,
}

struct StepSize {
    learning_rate: f64,
    first_correction: f64,
    second_correction: f64,
}

impl StepSize {
    fn delta(&self, m: &mut f64, v: &mut f64, g: f64) -> f64 {
        *m = BETA1.mul_add(*m, (1.0 - BETA1) * g);
        *v = BETA2.mul_add(*v, (1.0 - BETA2) * g * g);
        let m_hat = *m / self.first_correction;
        let v_hat = *v / self.second_correction;
        self.learning_rate * m_hat / (v_hat.sqrt() + EPSILON)
    }
}

fn update<D: Dimension>(
    param: &mut Array<f64, D>,
    grad: &Array<f64, D>,
    first: &mut Array<f64, D>,
    second: &mut Array<f64, D>,
    size: &StepSize,
) {
    Zip::from(param)
        .and(grad)
        .and(first)
        .and(second)
        .for_each(|p, &g, m, v| *p -= size.delta(m, v, g));
}

impl Adam {
    /// Fresh optimizer state for a hidden width.
    #[must_use]
    pub fn new(hidden: usize, learning_rate: f64) -> Self {
        Self {
            learning_rate,
            step: 0,
            first: Gradients::zeros(hidden),
            second: Gradients::zeros(hidden),
        }
    }

    /// Applies one bias-corrected update.
    pub fn apply(&mut self, weights: &mut RecurrentWeights, grads: &Gradients) {
        self.step = self.step.saturating_add(1);
        let size = StepSize {
            learning_rate: self.learning_rate,
            first_correction: 1.0 - BETA1.powi(self.step),
            second_correction: 1.0 - BETA2.powi(self.step),
        };
        update(
            &mut weights.input,
            &grads.input,
            &mut self.first.input,
            &mut self.second.input,
            &size,
        );
        update(
            &mut weights.recurrent,
            &grads.recurrent,
            &mut self.first.recurrent,
            &mut self.second.recurrent,
            &size,
        );
        update(
            &mut weights.hidden_bias,
            &grads.hidden_bias,
            &mut self.first.hidden_bias,
            &mut self.second.hidden_bias,
            &size,
        );
        update(
            &mut weights.output,
            &grads.output,
            &mut self.first.output,
            &mut self.second.output,
            &size,
        );
        weights.output_bias -= size.delta(
            &mut self.first.output_bias,
            &mut self.second.output_bias,
            grads.output_bias,
        );
    }
}
