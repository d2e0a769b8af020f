// src/acquisition/batch.rs
//! Epoch extraction from a fully loaded recording

use ndarray::{s, Array2, ArrayView2};
use tracing::warn;

use crate::acquisition::marker::Marker;

/// Epoch cut from a recording around one marker
#[derive(Debug, Clone)]
pub struct ExtractedEpoch {
    pub marker: Marker,
    pub data: Array2<f64>,
}

/// Slices `[position - samples_before, position + samples_after)` around markers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchEpochExtractor {
    samples_before: usize,
    samples_after: usize,
}

impl BatchEpochExtractor {
    pub fn new(samples_before: usize, samples_after: usize) -> Self {
        Self {
            samples_before,
            samples_after,
        }
    }

    pub fn epoch_len(&self) -> usize {
        self.samples_before + self.samples_after
    }

    /// Epoch around `position`, `None` (logged) when it runs off either end
    pub fn extract(&self, data: ArrayView2<f64>, position: u64) -> Option<Array2<f64>> {
        let position = position as usize;
        let end = position.checked_add(self.samples_after)?;
        if position < self.samples_before || end > data.ncols() {
            warn!(
                position,
                samples_before = self.samples_before,
                samples_after = self.samples_after,
                recording_samples = data.ncols(),
                "Epoch out of bounds, skipping"
            );
            return None;
        }
        Some(data.slice(s![.., position - self.samples_before..end]).to_owned())
    }

    /// Epochs for every marker accepted by `select`, in marker order
    pub fn extract_all<F>(&self, data: ArrayView2<f64>, markers: &[Marker], select: F) -> Vec<ExtractedEpoch>
    where
        F: Fn(&Marker) -> bool,
    {
        markers
            .iter()
            .filter(|marker| select(marker))
            .filter_map(|marker| {
                self.extract(data, marker.position).map(|epoch| ExtractedEpoch {
                    marker: marker.clone(),
                    data: epoch,
                })
            })
            .collect()
    }
}
