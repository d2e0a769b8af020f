// src/processing/windowing.rs
//! Window functions for spectral estimation

use serde::{Deserialize, Serialize};

/// Supported tapers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowType {
    Rectangular,
    Hann,
    Hamming,
}

/// Symmetric windows suit filter design; periodic windows suit DFT analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSymmetry {
    Symmetric,
    Periodic,
}

/// Generate `size` window coefficients
pub fn window_function(window_type: WindowType, size: usize, symmetry: WindowSymmetry) -> Vec<f64> {
    if size == 0 {
        return Vec::new();
    }
    if size == 1 {
        return vec![1.0];
    }

    let denominator = match symmetry {
        WindowSymmetry::Symmetric => (size - 1) as f64,
        WindowSymmetry::Periodic => size as f64,
    };
    let phase = |i: usize| 2.0 * std::f64::consts::PI * i as f64 / denominator;

    match window_type {
        WindowType::Rectangular => vec![1.0; size],
        WindowType::Hann => (0..size).map(|i| 0.5 - 0.5 * phase(i).cos()).collect(),
        WindowType::Hamming => (0..size).map(|i| 0.54 - 0.46 * phase(i).cos()).collect(),
    }
}

/// Sum of squared coefficients, the density normaliser for periodograms
pub fn window_power(window: &[f64]) -> f64 {
    window.iter().map(|w| w * w).sum()
}
