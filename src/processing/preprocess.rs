// src/processing/preprocess.rs
//! Epoch preprocessing: shape validation, zero-phase bandpass, common average reference

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use tracing::warn;

use crate::processing::filters::ButterworthBandpass;

/// Signal conditioning applied before power estimation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preprocessing {
    /// Zero-phase bandpass per channel, then common average reference
    BandpassCar,
    /// Untouched samples. The Welch path selects its band in the frequency
    /// domain instead, and has no CAR step.
    Raw,
}

/// Validates epochs and applies the bandpass + CAR chain
#[derive(Debug, Clone)]
pub struct EpochPreprocessor {
    filter: ButterworthBandpass,
    channels: usize,
    samples: usize,
}

impl EpochPreprocessor {
    pub fn new(filter: ButterworthBandpass, channels: usize, samples: usize) -> Self {
        Self { filter, channels, samples }
    }

    /// Expected `(channels, samples)` shape
    pub fn expected_shape(&self) -> (usize, usize) {
        (self.channels, self.samples)
    }

    pub fn filter(&self) -> &ButterworthBandpass {
        &self.filter
    }

    /// Check the epoch shape, logging a warning on mismatch
    pub fn validate_shape(&self, epoch: ArrayView2<f64>) -> bool {
        if epoch.dim() == self.expected_shape() {
            return true;
        }
        warn!(
            expected_channels = self.channels,
            expected_samples = self.samples,
            actual_channels = epoch.nrows(),
            actual_samples = epoch.ncols(),
            "Epoch shape mismatch, skipping"
        );
        false
    }

    /// Run `mode` on a validated epoch, `None` on shape mismatch
    pub fn apply(&self, epoch: ArrayView2<f64>, mode: Preprocessing) -> Option<Array2<f64>> {
        if !self.validate_shape(epoch) {
            return None;
        }
        Some(match mode {
            Preprocessing::BandpassCar => {
                let mut filtered = self.bandpass(epoch);
                common_average_reference(&mut filtered);
                filtered
            }
            Preprocessing::Raw => epoch.to_owned(),
        })
    }

    /// Bandpass + CAR, `None` on shape mismatch
    pub fn preprocess(&self, epoch: ArrayView2<f64>) -> Option<Array2<f64>> {
        self.apply(epoch, Preprocessing::BandpassCar)
    }

    /// Zero-phase bandpass applied independently to every channel
    pub fn bandpass(&self, epoch: ArrayView2<f64>) -> Array2<f64> {
        let mut filtered = Array2::zeros(epoch.raw_dim());
        for (source, mut target) in epoch.outer_iter().zip(filtered.outer_iter_mut()) {
            let row = self.filter.filtfilt(&source.to_vec());
            target.assign(&ArrayView1::from(&row[..]));
        }
        filtered
    }
}

/// Subtract the across-channel mean from every sample
pub fn common_average_reference(data: &mut Array2<f64>) {
    if let Some(mean) = data.mean_axis(Axis(0)) {
        *data -= &mean;
    }
}
