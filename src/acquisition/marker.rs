// src/acquisition/marker.rs
//! Stimulus markers

use serde::{Deserialize, Serialize};

/// Event annotation attached to a sample position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    /// Sample offset. Relative to the chunk start for streamed chunks,
    /// absolute (0-based) for recordings.
    pub position: u64,
    /// Duration in samples
    pub points: u32,
    /// Channel the marker refers to, `-1` or `0` for all channels
    pub channel: i32,
    /// Marker type, e.g. `Stimulus`
    pub kind: String,
    /// Marker description, e.g. `S  7`
    pub description: String,
}

impl Marker {
    pub fn stimulus(position: u64, description: impl Into<String>) -> Self {
        Self {
            position,
            points: 1,
            channel: -1,
            kind: "Stimulus".to_string(),
            description: description.into(),
        }
    }

    /// Copy with the position shifted by `offset` samples
    pub fn shifted(&self, offset: i64) -> Self {
        let position = (self.position as i64 + offset).max(0) as u64;
        Self { position, ..self.clone() }
    }

    pub fn stimulus_code(&self) -> Option<u32> {
        parse_stimulus_code(&self.description)
    }
}

/// Numeric code of a stimulus description.
///
/// Accepts `S  7`, `S 12`, `Stimulus/S  7` and bare `7`.
pub fn parse_stimulus_code(description: &str) -> Option<u32> {
    let trimmed = description.trim();
    let trimmed = trimmed.rsplit('/').next().unwrap_or(trimmed).trim();
    let digits = trimmed
        .strip_prefix('S')
        .or_else(|| trimmed.strip_prefix('s'))
        .unwrap_or(trimmed)
        .trim();
    digits.parse().ok()
}
