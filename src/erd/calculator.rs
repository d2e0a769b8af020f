// src/erd/calculator.rs
//! ERD calculator facade
//!
//! Every method runs the same three stages: preprocessing, power estimation
//! and reduction. The calculator holds no mutable state, so a single instance
//! can be shared across threads.

use std::collections::BTreeMap;

use ndarray::{s, Array2, ArrayView2};
use tracing::{debug, warn};

use crate::config::SystemConfig;
use crate::erd::layout::ChannelLayout;
use crate::erd::method::ErdMethod;
use crate::erd::output::{ChannelErd, ErdOutput};
use crate::error::{ErdErrorBuilder, ErdResult};
use crate::processing::{
    mean_square, ButterworthBandpass, EpochPreprocessor, PowerEstimator, ReducerKind, WelchEstimator,
};
use crate::utils::stats::nanmean;

/// Construction parameters for [`ErdCalculator`]
#[derive(Debug, Clone, PartialEq)]
pub struct CalculatorParams {
    pub sampling_rate: f64,
    pub pre_seconds: f64,
    pub post_seconds: f64,
    pub low_cutoff_hz: f64,
    pub high_cutoff_hz: f64,
    pub filter_order: usize,
    pub welch_segment_length: usize,
    /// Clean channel names, in data row order
    pub channel_names: Vec<String>,
    /// Indices into `channel_names`
    pub focus_indices: Vec<usize>,
}

impl CalculatorParams {
    pub fn from_config(config: &SystemConfig, sampling_rate: f64, layout: &ChannelLayout) -> Self {
        Self {
            sampling_rate,
            pre_seconds: config.epoch.pre_seconds,
            post_seconds: config.epoch.post_seconds,
            low_cutoff_hz: config.filter.low_cutoff_hz,
            high_cutoff_hz: config.filter.high_cutoff_hz,
            filter_order: config.filter.order,
            welch_segment_length: config.erd.welch_segment_length,
            channel_names: layout.clean_names().to_vec(),
            focus_indices: layout.focus_indices().to_vec(),
        }
    }
}

/// Computes ERD for epochs of shape `(channels, samples_before + samples_after)`.
///
/// The marker sample is the first sample of the activation window.
#[derive(Debug, Clone)]
pub struct ErdCalculator {
    sampling_rate: f64,
    samples_before: usize,
    samples_after: usize,
    band: (f64, f64),
    channel_names: Vec<String>,
    focus_indices: Vec<usize>,
    preprocessor: EpochPreprocessor,
    welch: WelchEstimator,
}

impl ErdCalculator {
    pub fn new(params: CalculatorParams) -> ErdResult<Self> {
        let builder = || ErdErrorBuilder::new("erd_calculator", "new");

        if !(params.sampling_rate.is_finite() && params.sampling_rate > 0.0) {
            return Err(builder().configuration(format!("Invalid sampling rate: {}", params.sampling_rate)));
        }
        let samples_before = (params.pre_seconds * params.sampling_rate).round();
        let samples_after = (params.post_seconds * params.sampling_rate).round();
        if !(samples_before >= 1.0 && samples_after >= 1.0) {
            return Err(builder().configuration(format!(
                "Epoch windows must span at least one sample each (pre {} s, post {} s at {} Hz)",
                params.pre_seconds, params.post_seconds, params.sampling_rate
            )));
        }
        let samples_before = samples_before as usize;
        let samples_after = samples_after as usize;

        if params.channel_names.is_empty() {
            return Err(builder().configuration("Channel list is empty"));
        }
        if params.focus_indices.is_empty() {
            return Err(builder().configuration("No focus channels"));
        }
        if let Some(&index) = params.focus_indices.iter().find(|&&i| i >= params.channel_names.len()) {
            return Err(builder().configuration(format!(
                "Focus index {} out of range for {} clean channels",
                index,
                params.channel_names.len()
            )));
        }
        if params.welch_segment_length < 2 {
            return Err(builder().configuration("Welch segment length must be at least 2"));
        }

        let filter = ButterworthBandpass::design(
            params.filter_order,
            params.low_cutoff_hz,
            params.high_cutoff_hz,
            params.sampling_rate,
        )?;
        let preprocessor =
            EpochPreprocessor::new(filter, params.channel_names.len(), samples_before + samples_after);

        debug!(
            sampling_rate = params.sampling_rate,
            samples_before,
            samples_after,
            channels = params.channel_names.len(),
            focus = params.focus_indices.len(),
            "ERD calculator ready"
        );

        Ok(Self {
            sampling_rate: params.sampling_rate,
            samples_before,
            samples_after,
            band: (params.low_cutoff_hz, params.high_cutoff_hz),
            channel_names: params.channel_names,
            focus_indices: params.focus_indices,
            preprocessor,
            welch: WelchEstimator::new(params.welch_segment_length),
        })
    }

    pub fn from_config(config: &SystemConfig, sampling_rate: f64, layout: &ChannelLayout) -> ErdResult<Self> {
        Self::new(CalculatorParams::from_config(config, sampling_rate, layout))
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    pub fn samples_before(&self) -> usize {
        self.samples_before
    }

    pub fn samples_after(&self) -> usize {
        self.samples_after
    }

    /// Total epoch length in samples
    pub fn epoch_len(&self) -> usize {
        self.samples_before + self.samples_after
    }

    pub fn channel_names(&self) -> &[String] {
        &self.channel_names
    }

    pub fn focus_indices(&self) -> &[usize] {
        &self.focus_indices
    }

    pub fn preprocessor(&self) -> &EpochPreprocessor {
        &self.preprocessor
    }

    fn estimator_for(&self, method: ErdMethod) -> PowerEstimator {
        match method {
            ErdMethod::Bandpass | ErdMethod::DbCorrection => PowerEstimator::SquaredAmplitude,
            ErdMethod::Welch => PowerEstimator::Welch {
                estimator: self.welch,
                low_hz: self.band.0,
                high_hz: self.band.1,
            },
            ErdMethod::MovingAverage { window_samples, .. } => PowerEstimator::SlidingWindow {
                window: window_samples,
            },
        }
    }

    /// Check that `method` can run with this calculator's window lengths
    pub fn validate_method(&self, method: ErdMethod) -> ErdResult<()> {
        self.estimator_for(method)
            .validate(self.samples_before, self.samples_after, self.sampling_rate)
    }

    /// ERD for every clean channel, `None` if the epoch shape is wrong
    pub fn channel_erds(&self, epoch: ArrayView2<f64>, method: ErdMethod) -> ErdResult<Option<Vec<f64>>> {
        let estimator = self.estimator_for(method);
        estimator.validate(self.samples_before, self.samples_after, self.sampling_rate)?;

        let processed = match self.preprocessor.apply(epoch, method.preprocessing()) {
            Some(processed) => processed,
            None => return Ok(None),
        };

        let reducer = method.reducer();
        let mut values = Vec::with_capacity(processed.nrows());
        for row in processed.outer_iter() {
            let baseline = row.slice(s![..self.samples_before]);
            let activation = row.slice(s![self.samples_before..]);
            values.push(estimator.channel_erd(baseline, activation, reducer, self.sampling_rate)?);
        }
        Ok(Some(values))
    }

    /// Run `method` on one epoch.
    ///
    /// `Err` is a fatal configuration problem. `Ok(None)` means the epoch was
    /// skipped (wrong shape) or, with `return_mean`, every focus channel was `NaN`.
    pub fn calculate(
        &self,
        epoch: ArrayView2<f64>,
        method: ErdMethod,
        return_mean: bool,
    ) -> ErdResult<Option<ErdOutput>> {
        let values = match self.channel_erds(epoch, method)? {
            Some(values) => values,
            None => return Ok(None),
        };

        if return_mean {
            let mean = self.focus_mean(&values);
            if mean.is_none() {
                debug!(method = %method, "All focus channels are NaN");
            }
            Ok(mean.map(ErdOutput::Mean))
        } else {
            Ok(Some(ErdOutput::PerChannel(ChannelErd::new(self.channel_names.clone(), values))))
        }
    }

    pub fn calculate_erd_from_bandpass(
        &self,
        epoch: ArrayView2<f64>,
        return_mean: bool,
    ) -> ErdResult<Option<ErdOutput>> {
        self.calculate(epoch, ErdMethod::Bandpass, return_mean)
    }

    pub fn calculate_erd_from_welch(&self, epoch: ArrayView2<f64>, return_mean: bool) -> ErdResult<Option<ErdOutput>> {
        self.calculate(epoch, ErdMethod::Welch, return_mean)
    }

    pub fn calculate_erd_from_db_correction(
        &self,
        epoch: ArrayView2<f64>,
        return_mean: bool,
    ) -> ErdResult<Option<ErdOutput>> {
        self.calculate(epoch, ErdMethod::DbCorrection, return_mean)
    }

    pub fn calculate_erd_moving_average(
        &self,
        epoch: ArrayView2<f64>,
        window_size_samples: usize,
        return_mean: bool,
        reducer: ReducerKind,
    ) -> ErdResult<Option<ErdOutput>> {
        self.calculate(
            epoch,
            ErdMethod::MovingAverage {
                window_samples: window_size_samples,
                reducer,
            },
            return_mean,
        )
    }

    /// Grand-average ERD per stimulus.
    ///
    /// Baseline and activation powers are averaged over every valid epoch of a
    /// stimulus before a single percentage reduction per channel. The result is
    /// the focus-channel mean, `None` when no epoch was usable.
    pub fn calculate_erd_across_trials(
        &self,
        epochs_by_stimulus: &BTreeMap<String, Vec<Array2<f64>>>,
    ) -> BTreeMap<String, Option<f64>> {
        epochs_by_stimulus
            .iter()
            .map(|(stimulus, epochs)| (stimulus.clone(), self.grand_average(stimulus, epochs)))
            .collect()
    }

    fn grand_average(&self, stimulus: &str, epochs: &[Array2<f64>]) -> Option<f64> {
        let channels = self.channel_names.len();
        let mut baseline = vec![0.0; channels];
        let mut activation = vec![0.0; channels];
        let mut used = 0usize;

        for epoch in epochs {
            let processed = match self.preprocessor.preprocess(epoch.view()) {
                Some(processed) => processed,
                None => continue,
            };
            for (channel, row) in processed.outer_iter().enumerate() {
                baseline[channel] += mean_square(row.slice(s![..self.samples_before]));
                activation[channel] += mean_square(row.slice(s![self.samples_before..]));
            }
            used += 1;
        }

        if used == 0 {
            warn!(stimulus = %stimulus, epochs = epochs.len(), "No valid epochs for grand average");
            return None;
        }

        let values: Vec<f64> = baseline
            .iter()
            .zip(&activation)
            .map(|(pre, post)| ReducerKind::Percentage.reduce(pre / used as f64, post / used as f64))
            .collect();
        debug!(stimulus = %stimulus, epochs = used, "Grand-average ERD computed");
        self.focus_mean(&values)
    }

    fn focus_mean(&self, values: &[f64]) -> Option<f64> {
        nanmean(self.focus_indices.iter().map(|&i| values[i]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use std::f64::consts::PI;

    fn params(channels: usize) -> CalculatorParams {
        CalculatorParams {
            sampling_rate: 250.0,
            pre_seconds: 2.0,
            post_seconds: 2.0,
            low_cutoff_hz: 8.0,
            high_cutoff_hz: 30.0,
            filter_order: 5,
            welch_segment_length: 256,
            channel_names: (0..channels).map(|i| format!("Ch{}", i)).collect(),
            focus_indices: vec![0, 1],
        }
    }

    /// 12 Hz tone whose amplitude drops to `ratio` at the marker
    fn modulated_epoch(channels: usize, ratio: f64) -> Array2<f64> {
        Array2::from_shape_fn((channels, 1000), |(ch, t)| {
            let amplitude = if t < 500 { 1.0 } else { ratio };
            let phase = 2.0 * PI * ch as f64 / channels as f64;
            amplitude * (2.0 * PI * 12.0 * t as f64 / 250.0 + phase).sin()
        })
    }

    #[test]
    fn test_window_lengths() {
        let calculator = ErdCalculator::new(params(3)).unwrap();
        assert_eq!(calculator.samples_before(), 500);
        assert_eq!(calculator.samples_after(), 500);
        assert_eq!(calculator.epoch_len(), 1000);
    }

    #[test]
    fn test_invalid_construction() {
        let mut bad_rate = params(3);
        bad_rate.sampling_rate = 0.0;
        assert!(ErdCalculator::new(bad_rate).unwrap_err().is_fatal());

        let mut bad_focus = params(3);
        bad_focus.focus_indices = vec![3];
        assert!(ErdCalculator::new(bad_focus).is_err());

        let mut bad_band = params(3);
        bad_band.high_cutoff_hz = 200.0;
        assert!(ErdCalculator::new(bad_band).is_err());
    }

    #[test]
    fn test_shape_mismatch_is_soft() {
        let calculator = ErdCalculator::new(params(3)).unwrap();
        let epoch = Array2::<f64>::zeros((3, 999));
        assert_eq!(calculator.calculate_erd_from_bandpass(epoch.view(), true).unwrap(), None);
        assert_eq!(calculator.calculate_erd_from_welch(epoch.view(), false).unwrap(), None);
    }

    #[test]
    fn test_moving_average_window_is_fatal_before_shape() {
        let calculator = ErdCalculator::new(params(3)).unwrap();
        let epoch = Array2::<f64>::zeros((3, 999));
        for window in [0, 501] {
            let err = calculator
                .calculate_erd_moving_average(epoch.view(), window, true, ReducerKind::Percentage)
                .unwrap_err();
            assert!(err.is_fatal());
        }
    }

    #[test]
    fn test_attenuated_rhythm_gives_negative_erd() {
        let calculator = ErdCalculator::new(params(3)).unwrap();
        let epoch = modulated_epoch(3, 0.5);

        for method in [ErdMethod::Bandpass, ErdMethod::Welch, ErdMethod::DbCorrection] {
            let erd = calculator
                .calculate(epoch.view(), method, true)
                .unwrap()
                .and_then(|output| output.as_mean())
                .unwrap();
            assert!(erd < 0.0, "{} gave {}", method, erd);
        }
    }

    #[test]
    fn test_per_channel_output_covers_clean_channels() {
        let calculator = ErdCalculator::new(params(3)).unwrap();
        let epoch = modulated_epoch(3, 1.0);
        let output = calculator.calculate_erd_from_bandpass(epoch.view(), false).unwrap().unwrap();
        let channels = output.as_channels().unwrap();
        assert_eq!(channels.names(), calculator.channel_names());
        for (_, value) in channels.iter() {
            assert!(value.abs() < 10.0, "unexpected ERD {}", value);
        }
    }

    #[test]
    fn test_grand_average() {
        let calculator = ErdCalculator::new(params(3)).unwrap();
        let mut epochs = BTreeMap::new();
        epochs.insert("S  1".to_string(), vec![modulated_epoch(3, 0.5), modulated_epoch(3, 0.5)]);
        epochs.insert("S  7".to_string(), vec![Array2::zeros((3, 10))]);

        let result = calculator.calculate_erd_across_trials(&epochs);
        assert!(result["S  1"].unwrap() < -50.0);
        assert_eq!(result["S  7"], None);
    }

    #[test]
    fn test_calculator_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ErdCalculator>();
    }
}
