// src/hal/types.rs
//! Core types shared by all data sources

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::acquisition::Marker;

/// Stream properties announced when a source connects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub channel_names: Vec<String>,
    pub sampling_rate: f64,
    /// Physical units (µV) per raw count, one per channel
    pub resolutions: Vec<f64>,
}

impl StreamInfo {
    pub fn channel_count(&self) -> usize {
        self.channel_names.len()
    }

    /// Sampling interval in microseconds, as carried on the wire
    pub fn sampling_interval_us(&self) -> f64 {
        1_000_000.0 / self.sampling_rate
    }
}

/// `(channels, n)` block of samples with markers relative to its first sample
#[derive(Debug, Clone, PartialEq)]
pub struct DataChunk {
    pub data: Array2<f64>,
    pub markers: Vec<Marker>,
    /// Block counter, when the source provides one
    pub block: Option<u32>,
}

impl DataChunk {
    pub fn new(data: Array2<f64>, markers: Vec<Marker>) -> Self {
        Self {
            data,
            markers,
            block: None,
        }
    }

    pub fn samples(&self) -> usize {
        self.data.ncols()
    }

    pub fn channels(&self) -> usize {
        self.data.nrows()
    }
}

/// Outcome of polling a source once
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkPoll {
    Data(DataChunk),
    /// Nothing arrived before the poll timed out
    Pending,
    /// The source has no more data
    Finished,
}

/// Source variants selectable from configuration or the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Rda,
    Replay,
    Simulated,
}
