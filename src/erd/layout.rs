// src/erd/layout.rs
//! Channel layout resolution
//!
//! Focus indices always refer to the clean (bad-channel-excluded) ordering.
//! The layout is resolved once per session and shared by every code path that
//! slices channel data.

use std::collections::HashSet;

use ndarray::{Array2, ArrayView2, Axis};
use tracing::debug;

use crate::error::{ErdErrorBuilder, ErdResult};

/// Hardware, clean and focus channel orderings for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLayout {
    hardware_names: Vec<String>,
    clean_indices: Vec<usize>,
    clean_names: Vec<String>,
    focus_indices: Vec<usize>,
}

impl ChannelLayout {
    /// Resolve bad and focus channel names against the hardware channel list.
    ///
    /// Bad names missing from the hardware list are ignored. Unknown or bad
    /// focus names are configuration errors.
    pub fn resolve<H, B, F>(hardware: &[H], bad: &[B], focus: &[F]) -> ErdResult<Self>
    where
        H: AsRef<str>,
        B: AsRef<str>,
        F: AsRef<str>,
    {
        let builder = || ErdErrorBuilder::new("channel_layout", "resolve");
        if hardware.is_empty() {
            return Err(builder().configuration("Recording has no channels"));
        }
        if focus.is_empty() {
            return Err(builder().configuration("At least one focus channel is required"));
        }

        let hardware_names: Vec<String> = hardware.iter().map(|n| n.as_ref().to_string()).collect();
        let bad: HashSet<&str> = bad.iter().map(|n| n.as_ref()).collect();
        for name in &bad {
            if !hardware_names.iter().any(|h| h == name) {
                debug!(channel = %name, "Bad channel not present in recording");
            }
        }

        let clean_indices: Vec<usize> = hardware_names
            .iter()
            .enumerate()
            .filter(|(_, name)| !bad.contains(name.as_str()))
            .map(|(i, _)| i)
            .collect();
        if clean_indices.is_empty() {
            return Err(builder().configuration("Every channel is marked bad"));
        }
        let clean_names: Vec<String> = clean_indices.iter().map(|&i| hardware_names[i].clone()).collect();

        let mut focus_indices = Vec::with_capacity(focus.len());
        for name in focus {
            let name = name.as_ref();
            if bad.contains(name) {
                return Err(builder().configuration(format!("Focus channel {} is marked bad", name)));
            }
            let index = clean_names
                .iter()
                .position(|clean| clean == name)
                .ok_or_else(|| builder().configuration(format!("Focus channel {} not found in recording", name)))?;
            if !focus_indices.contains(&index) {
                focus_indices.push(index);
            }
        }

        Ok(Self {
            hardware_names,
            clean_indices,
            clean_names,
            focus_indices,
        })
    }

    /// Layout for data that is already clean
    pub fn from_clean<H: AsRef<str>, F: AsRef<str>>(channels: &[H], focus: &[F]) -> ErdResult<Self> {
        Self::resolve::<H, &str, F>(channels, &[], focus)
    }

    pub fn hardware_names(&self) -> &[String] {
        &self.hardware_names
    }

    pub fn clean_names(&self) -> &[String] {
        &self.clean_names
    }

    pub fn clean_count(&self) -> usize {
        self.clean_names.len()
    }

    /// Indices of the clean channels in hardware order
    pub fn clean_indices(&self) -> &[usize] {
        &self.clean_indices
    }

    /// Focus channel indices into the clean ordering
    pub fn focus_indices(&self) -> &[usize] {
        &self.focus_indices
    }

    pub fn focus_names(&self) -> Vec<String> {
        self.focus_indices.iter().map(|&i| self.clean_names[i].clone()).collect()
    }

    /// Drop bad channel rows from hardware-ordered data
    pub fn select_clean(&self, data: ArrayView2<f64>) -> ErdResult<Array2<f64>> {
        if data.nrows() != self.hardware_names.len() {
            return Err(ErdErrorBuilder::new("channel_layout", "select_clean").invalid_data(
                "channel data",
                format!("expected {} hardware channels, got {}", self.hardware_names.len(), data.nrows()),
            ));
        }
        Ok(data.select(Axis(0), &self.clean_indices))
    }
}
