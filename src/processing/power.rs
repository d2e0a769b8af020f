// src/processing/power.rs
//! Baseline and activation power estimators
//!
//! Each estimator consumes one channel's baseline and activation slices and,
//! together with a [`ReducerKind`], yields that channel's ERD value.

use ndarray::ArrayView1;

use crate::error::{ErdError, ErdErrorBuilder, ErdResult};
use crate::processing::reducer::ReducerKind;
use crate::processing::welch::WelchEstimator;
use crate::utils::stats::nanmean;

/// Baseline/activation power for one channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerPair {
    pub baseline: f64,
    pub activation: f64,
}

impl PowerPair {
    pub fn reduce(&self, reducer: ReducerKind) -> f64 {
        reducer.reduce(self.baseline, self.activation)
    }
}

/// Power estimation strategy
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PowerEstimator {
    /// Mean of squared samples over each window
    SquaredAmplitude,
    /// Mean Welch PSD over `[low_hz, high_hz]`
    Welch {
        estimator: WelchEstimator,
        low_hz: f64,
        high_hz: f64,
    },
    /// Window-by-window squared amplitude at matching offsets from the marker
    SlidingWindow { window: usize },
}

impl PowerEstimator {
    /// Reject estimator parameters that cannot work for the given window lengths
    pub fn validate(&self, baseline_len: usize, activation_len: usize, sample_rate: f64) -> ErdResult<()> {
        match *self {
            PowerEstimator::SquaredAmplitude => Ok(()),
            PowerEstimator::Welch { estimator, low_hz, high_hz } => {
                for len in [baseline_len, activation_len] {
                    let nperseg = estimator.effective_segment_length(len);
                    let resolution = sample_rate / nperseg as f64;
                    let has_bin = (0..=nperseg / 2)
                        .map(|k| k as f64 * resolution)
                        .any(|f| f >= low_hz && f <= high_hz);
                    if !has_bin {
                        return Err(ErdError::EmptyFrequencyBand {
                            low: low_hz,
                            high: high_hz,
                            resolution,
                        });
                    }
                }
                Ok(())
            }
            PowerEstimator::SlidingWindow { window } => {
                let shortest = baseline_len.min(activation_len);
                if window == 0 || window > shortest {
                    return Err(ErdErrorBuilder::new("power_estimator", "sliding_window").configuration(format!(
                        "Moving-average window of {} samples must be in 1..={} (baseline {}, activation {})",
                        window, shortest, baseline_len, activation_len
                    )));
                }
                Ok(())
            }
        }
    }

    /// ERD of a single channel
    pub fn channel_erd(
        &self,
        baseline: ArrayView1<f64>,
        activation: ArrayView1<f64>,
        reducer: ReducerKind,
        sample_rate: f64,
    ) -> ErdResult<f64> {
        match *self {
            PowerEstimator::SquaredAmplitude => Ok(PowerPair {
                baseline: mean_square(baseline),
                activation: mean_square(activation),
            }
            .reduce(reducer)),
            PowerEstimator::Welch { estimator, low_hz, high_hz } => {
                let pre = estimator.band_power(&baseline.to_vec(), sample_rate, low_hz, high_hz)?;
                let post = estimator.band_power(&activation.to_vec(), sample_rate, low_hz, high_hz)?;
                Ok(reducer.reduce(pre, post))
            }
            PowerEstimator::SlidingWindow { window } => {
                let pairs = sliding_window_powers(baseline, activation, window)?;
                // Average the per-window ERDs, not the powers
                Ok(nanmean(pairs.iter().map(|pair| pair.reduce(reducer))).unwrap_or(f64::NAN))
            }
        }
    }
}

/// Mean of squared samples, `NaN` for an empty slice
pub fn mean_square(signal: ArrayView1<f64>) -> f64 {
    if signal.is_empty() {
        return f64::NAN;
    }
    signal.iter().map(|x| x * x).sum::<f64>() / signal.len() as f64
}

/// Overlapping window powers paired by offset from the marker.
///
/// Produces `min(baseline_len, activation_len) - window + 1` pairs where pair `i`
/// covers `baseline[i..i + window]` and `activation[i..i + window]`.
pub fn sliding_window_powers(
    baseline: ArrayView1<f64>,
    activation: ArrayView1<f64>,
    window: usize,
) -> ErdResult<Vec<PowerPair>> {
    PowerEstimator::SlidingWindow { window }.validate(baseline.len(), activation.len(), 1.0)?;

    let num_windows = baseline.len().min(activation.len()) - window + 1;
    Ok((0..num_windows)
        .map(|i| PowerPair {
            baseline: mean_square(baseline.slice(ndarray::s![i..i + window])),
            activation: mean_square(activation.slice(ndarray::s![i..i + window])),
        })
        .collect())
}
