// src/processing/filters/mod.rs
//! Digital filters for EEG epoch preprocessing

pub mod iir;

pub use iir::*;

use thiserror::Error;

use crate::error::ErdError;

/// One biquad in second-order-section form, `a[0]` normalised to 1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SosSection {
    pub b: [f64; 3], // Numerator coefficients
    pub a: [f64; 3], // Denominator coefficients
}

impl SosSection {
    /// Gain of the section at DC
    pub fn dc_gain(&self) -> f64 {
        (self.b[0] + self.b[1] + self.b[2]) / (self.a[0] + self.a[1] + self.a[2])
    }
}

/// Filter design errors
#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("Unstable design: {0}")]
    Unstable(String),
}

impl From<FilterError> for ErdError {
    fn from(err: FilterError) -> Self {
        ErdError::Configuration {
            reason: err.to_string(),
            context: crate::error_context!("filter_design", "butterworth_bandpass"),
        }
    }
}
