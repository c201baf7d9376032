use serde::{Deserialize, Serialize};

/// Min-max normalization onto [0, 1].
///
/// The parameters fit during training travel inside the artifact and are the
/// only ones ever applied at inference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    /// Smallest value seen while fitting.
    pub min: f64,
    /// Largest value seen while fitting.
    pub max: f64,
}

impl MinMaxScaler {
    /// Fits over `values`; `None` when empty or containing non-finite values.
    #[must_use]
    pub fn fit(values: &[f64]) -> Option<Self> {
        if values.is_empty() || values.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        Some(Self { min, max })
    }

    fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Maps a raw value into scaled space. A degenerate range maps everything to 0.
    #[must_use]
    pub fn transform(&self, value: f64) -> f64 {
        let span = self.span();
        if span > 0.0 {
            (value - self.min) / span
        } else {
            0.0
        }
    }

    /// Maps a scaled value back. A degenerate range always yields `min`.
    #[must_use]
    pub fn inverse(&self, scaled: f64) -> f64 {
        let span = self.span();
        if span > 0.0 {
            scaled.mul_add(span, self.min)
        } else {
            self.min
        }
    }

    /// True when both bounds are finite and ordered.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_range_onto_unit_interval() {
        let scaler = MinMaxScaler::fit(&[2.0, 6.0, 4.0]).unwrap();
        assert!((scaler.transform(2.0)).abs() < 1e-12);
        assert!((scaler.transform(6.0) - 1.0).abs() < 1e-12);
        assert!((scaler.inverse(scaler.transform(4.5)) - 4.5).abs() < 1e-12);
    }

    #[test]
    fn degenerate_range_is_stable() {
        let scaler = MinMaxScaler::fit(&[4.0; 5]).unwrap();
        assert_eq!(scaler.transform(4.0), 0.0);
        assert_eq!(scaler.inverse(0.37), 4.0);
    }

    #[test]
    fn refuses_empty_or_non_finite() {
        assert!(MinMaxScaler::fit(&[]).is_none());
        assert!(MinMaxScaler::fit(&[1.0, f64::NAN]).is_none());
        assert!(!MinMaxScaler { min: 2.0, max: 1.0 }.is_valid());
    }
}
