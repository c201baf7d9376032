use ndarray::{Array1, Array2};
use quakecast_catalog::SeismicEvent;

use crate::{error::ForecastError, scaler::MinMaxScaler};

/// Scaled sliding windows and their next-step targets.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceWindows {
    /// One row per window, `sequence_length` columns.
    pub inputs: Array2<f64>,
    /// Magnitude following each window, scaled.
    pub targets: Array1<f64>,
    /// Scaler fit over the whole supplied series.
    pub scaler: MinMaxScaler,
    /// Window length.
    pub sequence_length: usize,
}

impl SequenceWindows {
    /// Number of window/target pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Never true for windows built by [`prepare_windows`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Fails unless `available > sequence_length` and the length is usable.
pub fn ensure_enough(available: usize, sequence_length: usize) -> Result<(), ForecastError> {
    if sequence_length == 0 {
        return Err(ForecastError::InvalidConfig(
            "sequence length must be at least 1".into(),
        ));
    }
    if available <= sequence_length {
        return Err(ForecastError::InsufficientData {
            required: sequence_length,
            available,
        });
    }
    Ok(())
}

/// Builds stride-1 windows over the magnitude series in the order given.
///
/// Events must already be sorted ascending by time. N events yield N - L pairs.
pub fn prepare_windows(
    events: &[SeismicEvent],
    sequence_length: usize,
) -> Result<SequenceWindows, ForecastError> {
    ensure_enough(events.len(), sequence_length)?;
    let magnitudes: Vec<f64> = events.iter().map(|event| event.magnitude).collect();
    let scaler = MinMaxScaler::fit(&magnitudes).ok_or_else(|| {
        ForecastError::TrainingFailed("magnitude series contains non-finite values".into())
    })?;
    let scaled: Vec<f64> = magnitudes.iter().map(|&m| scaler.transform(m)).collect();

    let count = scaled.len() - sequence_length;
    let inputs = Array2::from_shape_fn((count, sequence_length), |(row, col)| scaled[row + col]);
    let targets = Array1::from_shape_fn(count, |row| scaled[row + sequence_length]);
    Ok(SequenceWindows {
        inputs,
        targets,
        scaler,
        sequence_length,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(magnitudes: &[f64]) -> Vec<SeismicEvent> {
        magnitudes
            .iter()
            .enumerate()
            .map(|(idx, &mag)| {
                SeismicEvent::new(format!("ev{idx}"), i64::try_from(idx).unwrap() * 1000, mag, 0.0, 0.0)
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn yields_n_minus_l_windows() {
        let series: Vec<f64> = (0..12_u32).map(f64::from).collect();
        let windows = prepare_windows(&events(&series), 5).unwrap();
        assert_eq!(windows.len(), 7);
        assert_eq!(windows.inputs.dim(), (7, 5));
        // Series 0..=11 scales to k / 11.
        assert!((windows.inputs[[2, 0]] - 2.0 / 11.0).abs() < 1e-12);
        assert!((windows.targets[2] - 7.0 / 11.0).abs() < 1e-12);
        assert!((windows.targets[6] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn requires_more_events_than_window() {
        let err = prepare_windows(&events(&[1.0; 5]), 5).unwrap_err();
        assert_eq!(
            err,
            ForecastError::InsufficientData {
                required: 5,
                available: 5
            }
        );
        assert!(prepare_windows(&events(&[1.0; 6]), 5).is_ok());
        assert!(matches!(
            prepare_windows(&events(&[1.0; 6]), 0),
            Err(ForecastError::InvalidConfig(_))
        ));
    }
}
