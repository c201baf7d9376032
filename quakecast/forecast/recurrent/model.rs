use ndarray::{Array1, Array2, ArrayView1};
use rand::{rngs::SmallRng, Rng};
use serde::{Deserialize, Serialize};

/// Weights of a single-layer Elman network with a tanh hidden state and one
/// linear output unit. Inputs are scalar per time step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrentWeights {
    /// Input-to-hidden weights, `(hidden,)`.
    pub input: Array1<f64>,
    /// Hidden-to-hidden weights, `(hidden, hidden)`.
    pub recurrent: Array2<f64>,
    /// Hidden bias, `(hidden,)`.
    pub hidden_bias: Array1<f64>,
    /// Hidden-to-output weights, `(hidden,)`.
    pub output: Array1<f64>,
    /// Output bias.
    pub output_bias: f64,
}

/// Gradients with the same layout as [`RecurrentWeights`].
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    /// d loss / d input weights.
    pub input: Array1<f64>,
    /// d loss / d recurrent weights.
    pub recurrent: Array2<f64>,
    /// d loss / d hidden bias.
    pub hidden_bias: Array1<f64>,
    /// d loss / d output weights.
    pub output: Array1<f64>,
    /// d loss / d output bias.
    pub output_bias: f64,
}

impl Gradients {
    /// All-zero gradients for a hidden width.
    #[must_use]
    pub fn zeros(hidden: usize) -> Self {
        Self {
            input: Array1::zeros(hidden),
            recurrent: Array2::zeros((hidden, hidden)),
            hidden_bias: Array1::zeros(hidden),
            output: Array1::zeros(hidden),
            output_bias: 0.0,
        }
    }
}

impl RecurrentWeights {
    /// Glorot-uniform input/output weights, small recurrent weights, zero biases.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn random(hidden: usize, rng: &mut SmallRng) -> Self {
        let glorot = (6.0 / (1.0 + hidden as f64)).sqrt();
        let recurrent_scale = 1.0 / (hidden.max(1) as f64).sqrt();
        Self {
            input: Array1::from_shape_fn(hidden, |_| rng.gen_range(-glorot..glorot)),
            recurrent: Array2::from_shape_fn((hidden, hidden), |_| {
                rng.gen_range(-recurrent_scale..recurrent_scale)
            }),
            hidden_bias: Array1::zeros(hidden),
            output: Array1::from_shape_fn(hidden, |_| rng.gen_range(-glorot..glorot)),
            output_bias: 0.0,
        }
    }

    /// Hidden width.
    #[must_use]
    pub fn hidden_width(&self) -> usize {
        self.input.len()
    }

    /// Checks that every tensor agrees on the hidden width and holds finite values.
    pub fn validate(&self) -> Result<(), String> {
        let hidden = self.hidden_width();
        if hidden == 0 {
            return Err("hidden width is zero".into());
        }
        if self.recurrent.dim() != (hidden, hidden) {
            return Err(format!(
                "recurrent weights {:?} do not match hidden width {hidden}",
                self.recurrent.dim()
            ));
        }
        if self.hidden_bias.len() != hidden || self.output.len() != hidden {
            return Err(format!("bias/output length does not match hidden width {hidden}"));
        }
        let finite = self
            .input
            .iter()
            .chain(self.recurrent.iter())
            .chain(self.hidden_bias.iter())
            .chain(self.output.iter())
            .all(|w| w.is_finite())
            && self.output_bias.is_finite();
        if finite {
            Ok(())
        } else {
            Err("non-finite weight".into())
        }
    }

    /// Hidden states `h_0..=h_T` for one sequence, `h_0` being zero.
    fn hidden_states(&self, sequence: ArrayView1<'_, f64>) -> Vec<Array1<f64>> {
        let mut states = Vec::with_capacity(sequence.len() + 1);
        states.push(Array1::zeros(self.hidden_width()));
        for &x in sequence {
            let previous = &states[states.len() - 1];
            let mut next = self.recurrent.dot(previous) + &self.hidden_bias;
            next.scaled_add(x, &self.input);
            next.mapv_inplace(f64::tanh);
            states.push(next);
        }
        states
    }

    /// One forward pass.
    #[must_use]
    pub fn forward(&self, sequence: ArrayView1<'_, f64>) -> f64 {
        let states = self.hidden_states(sequence);
        let last = &states[states.len() - 1];
        self.output.dot(last) + self.output_bias
    }

    /// Accumulates `scale * d(prediction - target)^2` gradients via BPTT and
    /// returns the squared error.
    pub fn accumulate_gradients(
        &self,
        sequence: ArrayView1<'_, f64>,
        target: f64,
        scale: f64,
        grads: &mut Gradients,
    ) -> f64 {
        let states = self.hidden_states(sequence);
        let last = &states[states.len() - 1];
        let error = self.output.dot(last) + self.output_bias - target;
        let d_out = 2.0 * error * scale;

        grads.output.scaled_add(d_out, last);
        grads.output_bias += d_out;
        let mut d_hidden = &self.output * d_out;

        for step in (1..states.len()).rev() {
            let current = &states[step];
            let previous = &states[step - 1];
            let d_pre = &d_hidden * &current.mapv(|h| h.mul_add(-h, 1.0));
            grads.input.scaled_add(sequence[step - 1], &d_pre);
            grads.hidden_bias += &d_pre;
            let outer = d_pre
                .view()
                .insert_axis(ndarray::Axis(1))
                .dot(&previous.view().insert_axis(ndarray::Axis(0)));
            grads.recurrent += &outer;
            d_hidden = self.recurrent.t().dot(&d_pre);
        }
        error * error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    fn weights() -> RecurrentWeights {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut weights = RecurrentWeights::random(4, &mut rng);
        weights.output_bias = 0.1;
        weights.hidden_bias.fill(0.05);
        weights
    }

    #[test]
    fn zero_input_with_zero_bias_predicts_zero() {
        let mut rng = SmallRng::seed_from_u64(1);
        let weights = RecurrentWeights::random(8, &mut rng);
        assert_eq!(weights.forward(array![0.0, 0.0, 0.0].view()), 0.0);
    }

    fn numeric_gradient(
        weights: &RecurrentWeights,
        sequence: &Array1<f64>,
        target: f64,
        mutate: impl Fn(&mut RecurrentWeights, f64),
    ) -> f64 {
        let eps = 1e-6;
        let loss = |w: &RecurrentWeights| (w.forward(sequence.view()) - target).powi(2);
        let mut plus = weights.clone();
        mutate(&mut plus, eps);
        let mut minus = weights.clone();
        mutate(&mut minus, -eps);
        (loss(&plus) - loss(&minus)) / (2.0 * eps)
    }

    #[test]
    fn gradients_match_finite_differences() {
        let weights = weights();
        let sequence = array![0.2, 0.9, 0.4];
        let target = 0.3;
        let mut grads = Gradients::zeros(4);
        weights.accumulate_gradients(sequence.view(), target, 1.0, &mut grads);

        let d_input = numeric_gradient(&weights, &sequence, target, |w, e| w.input[1] += e);
        assert!((d_input - grads.input[1]).abs() < 1e-6);
        let d_recurrent =
            numeric_gradient(&weights, &sequence, target, |w, e| w.recurrent[[2, 3]] += e);
        assert!((d_recurrent - grads.recurrent[[2, 3]]).abs() < 1e-6);
        let d_bias = numeric_gradient(&weights, &sequence, target, |w, e| w.hidden_bias[0] += e);
        assert!((d_bias - grads.hidden_bias[0]).abs() < 1e-6);
        let d_output = numeric_gradient(&weights, &sequence, target, |w, e| w.output[3] += e);
        assert!((d_output - grads.output[3]).abs() < 1e-6);
        let d_out_bias = numeric_gradient(&weights, &sequence, target, |w, e| w.output_bias += e);
        assert!((d_out_bias - grads.output_bias).abs() < 1e-6);
    }

    #[test]
    fn rejects_mismatched_shapes() {
        let mut broken = weights();
        broken.recurrent = Array2::zeros((3, 4));
        assert!(broken.validate().is_err());
        let mut broken = weights();
        broken.output_bias = f64::NAN;
        assert!(broken.validate().is_err());
        assert!(weights().validate().is_ok());
    }
}
