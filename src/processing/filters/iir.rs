// src/processing/filters/iir.rs
//! Butterworth bandpass design and zero-phase filtering
//!
//! The design follows the classic analog-prototype route: Butterworth lowpass
//! poles, lowpass-to-bandpass transform around the prewarped band edges, then the
//! bilinear transform. Poles are grouped into second-order sections so that
//! order-5 and higher designs stay numerically stable in `f64`.

use rustfft::num_complex::Complex;

use super::{FilterError, SosSection};
use crate::config::constants::filters::{MAX_FILTER_ORDER, MIN_FILTER_ORDER};

const IMAG_EPSILON: f64 = 1e-10;

/// Butterworth bandpass filter stored as cascaded second-order sections
#[derive(Debug, Clone)]
pub struct ButterworthBandpass {
    sections: Vec<SosSection>,
    order: usize,
    low_hz: f64,
    high_hz: f64,
    sample_rate: f64,
}

impl ButterworthBandpass {
    /// Design an order-`order` bandpass with -3 dB points at `low_hz` and `high_hz`
    pub fn design(order: usize, low_hz: f64, high_hz: f64, sample_rate: f64) -> Result<Self, FilterError> {
        if !(MIN_FILTER_ORDER..=MAX_FILTER_ORDER).contains(&order) {
            return Err(FilterError::InvalidParameters(format!(
                "Order must be {}-{}, got {}",
                MIN_FILTER_ORDER, MAX_FILTER_ORDER, order
            )));
        }
        if !(sample_rate > 0.0 && sample_rate.is_finite()) {
            return Err(FilterError::InvalidParameters(format!("Invalid sample rate {}", sample_rate)));
        }
        let nyquist = sample_rate / 2.0;
        if !(low_hz > 0.0 && low_hz < high_hz && high_hz < nyquist) {
            return Err(FilterError::InvalidParameters(format!(
                "Band {}-{} Hz must satisfy 0 < low < high < Nyquist ({} Hz)",
                low_hz, high_hz, nyquist
            )));
        }

        // Pre-warp band edges for the bilinear transform
        let fs2 = 2.0 * sample_rate;
        let w1 = fs2 * (std::f64::consts::PI * low_hz / sample_rate).tan();
        let w2 = fs2 * (std::f64::consts::PI * high_hz / sample_rate).tan();
        let bandwidth = w2 - w1;
        let centre = (w1 * w2).sqrt();

        let mut complex_poles = Vec::with_capacity(order);
        let mut real_poles = Vec::new();
        for k in 0..order {
            let m = 2.0 * k as f64 - order as f64 + 1.0;
            let prototype = -Complex::from_polar(1.0, std::f64::consts::PI * m / (2.0 * order as f64));

            let half = prototype * (bandwidth / 2.0);
            let offset = (half * half - Complex::new(centre * centre, 0.0)).sqrt();
            for s in [half + offset, half - offset] {
                let z = (Complex::new(fs2, 0.0) + s) / (Complex::new(fs2, 0.0) - s);
                if z.im > IMAG_EPSILON {
                    complex_poles.push(z);
                } else if z.im.abs() <= IMAG_EPSILON {
                    real_poles.push(z.re);
                }
            }
        }
        real_poles.sort_by(|a, b| a.total_cmp(b));

        let mut sections: Vec<SosSection> = complex_poles
            .iter()
            .map(|z| SosSection {
                b: [1.0, 0.0, -1.0],
                a: [1.0, -2.0 * z.re, z.norm_sqr()],
            })
            .collect();
        for pair in real_poles.chunks(2) {
            if let [r1, r2] = pair {
                sections.push(SosSection {
                    b: [1.0, 0.0, -1.0],
                    a: [1.0, -(r1 + r2), r1 * r2],
                });
            }
        }

        if sections.len() != order {
            return Err(FilterError::Unstable(format!(
                "Expected {} sections, pole pairing produced {}",
                order,
                sections.len()
            )));
        }
        if sections.iter().any(|s| s.a[2].abs() >= 1.0) {
            return Err(FilterError::Unstable("Pole outside the unit circle".to_string()));
        }

        // Unit gain at the digital image of the geometric centre frequency
        let centre_digital = 2.0 * (centre / fs2).atan();
        let gain = Self::response(&sections, centre_digital).norm();
        let per_section = gain.powf(-1.0 / sections.len() as f64);
        for section in &mut sections {
            for b in &mut section.b {
                *b *= per_section;
            }
        }

        Ok(Self {
            sections,
            order,
            low_hz,
            high_hz,
            sample_rate,
        })
    }

    /// Second-order sections of the design
    pub fn sections(&self) -> &[SosSection] {
        &self.sections
    }

    /// Filter order (number of sections)
    pub fn order(&self) -> usize {
        self.order
    }

    /// Pass band edges in Hz
    pub fn band(&self) -> (f64, f64) {
        (self.low_hz, self.high_hz)
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Magnitude response at `frequency_hz`
    pub fn magnitude_at(&self, frequency_hz: f64) -> f64 {
        let omega = 2.0 * std::f64::consts::PI * frequency_hz / self.sample_rate;
        Self::response(&self.sections, omega).norm()
    }

    /// Steady-state section states for a unit step input
    pub fn steady_state(&self) -> Vec<[f64; 2]> {
        let mut scale = 1.0;
        self.sections
            .iter()
            .map(|section| {
                let dc = section.dc_gain();
                let zi = [
                    (dc - section.b[0]) * scale,
                    (section.b[2] - section.a[2] * dc) * scale,
                ];
                scale *= dc;
                zi
            })
            .collect()
    }

    /// Causal filtering with transposed direct form II sections
    pub fn sosfilt(&self, input: &[f64], initial: Option<&[[f64; 2]]>) -> Vec<f64> {
        let mut state: Vec<[f64; 2]> = match initial {
            Some(zi) => zi.to_vec(),
            None => vec![[0.0; 2]; self.sections.len()],
        };

        input
            .iter()
            .map(|&x| {
                let mut value = x;
                for (section, z) in self.sections.iter().zip(state.iter_mut()) {
                    let out = section.b[0] * value + z[0];
                    z[0] = section.b[1] * value - section.a[1] * out + z[1];
                    z[1] = section.b[2] * value - section.a[2] * out;
                    value = out;
                }
                value
            })
            .collect()
    }

    /// Zero-phase forward-backward filtering.
    ///
    /// The signal is padded with an odd extension of `3 * (2 * sections + 1)`
    /// samples (clamped to `len - 1`) and each pass starts from the steady state
    /// of its first sample, so edges do not ring.
    pub fn filtfilt(&self, input: &[f64]) -> Vec<f64> {
        let n = input.len();
        if n < 2 {
            return input.to_vec();
        }

        let padlen = (3 * (2 * self.sections.len() + 1)).min(n - 1);
        let first = input[0];
        let last = input[n - 1];

        let mut extended = Vec::with_capacity(n + 2 * padlen);
        extended.extend((1..=padlen).rev().map(|i| 2.0 * first - input[i]));
        extended.extend_from_slice(input);
        extended.extend((0..padlen).map(|i| 2.0 * last - input[n - 2 - i]));

        let zi = self.steady_state();
        let scaled = |level: f64| -> Vec<[f64; 2]> { zi.iter().map(|z| [z[0] * level, z[1] * level]).collect() };

        let mut forward = self.sosfilt(&extended, Some(&scaled(extended[0])));
        forward.reverse();
        let mut backward = self.sosfilt(&forward, Some(&scaled(forward[0])));
        backward.reverse();

        backward[padlen..padlen + n].to_vec()
    }

    fn response(sections: &[SosSection], omega: f64) -> Complex<f64> {
        let z_inv = Complex::from_polar(1.0, -omega);
        let z_inv2 = z_inv * z_inv;
        sections.iter().fold(Complex::new(1.0, 0.0), |acc, s| {
            let num = s.b[0] + z_inv * s.b[1] + z_inv2 * s.b[2];
            let den = s.a[0] + z_inv * s.a[1] + z_inv2 * s.a[2];
            acc * num / den
        })
    }
}
