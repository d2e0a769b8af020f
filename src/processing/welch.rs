// src/processing/welch.rs
//! Welch power spectral density estimation
//!
//! Matches the common library defaults: periodic Hann taper, 50 % overlap,
//! per-segment mean removal, one-sided density scaling.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::config::constants::erd::WELCH_OVERLAP_FRACTION;
use crate::error::{ErdError, ErdResult};
use crate::processing::windowing::{window_function, window_power, WindowSymmetry, WindowType};

/// One-sided power spectral density
#[derive(Debug, Clone, PartialEq)]
pub struct PowerSpectrum {
    pub frequencies: Vec<f64>,
    pub density: Vec<f64>,
}

impl PowerSpectrum {
    /// Frequency spacing between bins
    pub fn resolution(&self) -> f64 {
        match self.frequencies.as_slice() {
            [_, second, ..] => *second,
            _ => f64::INFINITY,
        }
    }

    /// Mean density over bins with `low <= f <= high`
    pub fn band_mean(&self, low: f64, high: f64) -> ErdResult<f64> {
        let (sum, count) = self
            .frequencies
            .iter()
            .zip(&self.density)
            .filter(|(f, _)| **f >= low && **f <= high)
            .fold((0.0, 0usize), |(sum, count), (_, p)| (sum + p, count + 1));

        if count == 0 {
            return Err(ErdError::EmptyFrequencyBand {
                low,
                high,
                resolution: self.resolution(),
            });
        }
        Ok(sum / count as f64)
    }
}

/// Welch estimator configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WelchEstimator {
    segment_length: usize,
    overlap_fraction: f64,
    window_type: WindowType,
}

impl WelchEstimator {
    pub fn new(segment_length: usize) -> Self {
        Self {
            segment_length: segment_length.max(1),
            overlap_fraction: WELCH_OVERLAP_FRACTION,
            window_type: WindowType::Hann,
        }
    }

    pub fn segment_length(&self) -> usize {
        self.segment_length
    }

    /// Segment length actually used for a signal of `len` samples
    pub fn effective_segment_length(&self, len: usize) -> usize {
        self.segment_length.min(len).max(1)
    }

    /// Estimate the PSD of `signal` sampled at `sample_rate`
    pub fn psd(&self, signal: &[f64], sample_rate: f64) -> PowerSpectrum {
        let nperseg = self.effective_segment_length(signal.len());
        let noverlap = (nperseg as f64 * self.overlap_fraction) as usize;
        let step = (nperseg - noverlap).max(1);
        let bins = nperseg / 2 + 1;

        let window = window_function(self.window_type, nperseg, WindowSymmetry::Periodic);
        let scale = 1.0 / (sample_rate * window_power(&window));

        let fft = FftPlanner::<f64>::new().plan_fft_forward(nperseg);
        let mut buffer = vec![Complex::new(0.0, 0.0); nperseg];
        let mut accumulated = vec![0.0; bins];
        let mut segments = 0usize;

        let mut start = 0;
        while start + nperseg <= signal.len() {
            let segment = &signal[start..start + nperseg];
            let mean = segment.iter().sum::<f64>() / nperseg as f64;
            for ((slot, &x), &w) in buffer.iter_mut().zip(segment).zip(&window) {
                *slot = Complex::new((x - mean) * w, 0.0);
            }
            fft.process(&mut buffer);

            for (acc, value) in accumulated.iter_mut().zip(&buffer) {
                *acc += value.norm_sqr();
            }
            segments += 1;
            start += step;
        }

        let last_doubled = if nperseg % 2 == 0 { bins - 1 } else { bins };
        let density = accumulated
            .iter()
            .enumerate()
            .map(|(k, &power)| {
                let one_sided = if k > 0 && k < last_doubled { 2.0 } else { 1.0 };
                one_sided * scale * power / segments.max(1) as f64
            })
            .collect();

        let frequencies = (0..bins)
            .map(|k| k as f64 * sample_rate / nperseg as f64)
            .collect();

        PowerSpectrum { frequencies, density }
    }

    /// Mean PSD of `signal` over `[low, high]` Hz
    pub fn band_power(&self, signal: &[f64], sample_rate: f64, low: f64, high: f64) -> ErdResult<f64> {
        self.psd(signal, sample_rate).band_mean(low, high)
    }
}
