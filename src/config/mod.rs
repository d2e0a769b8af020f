// src/config/mod.rs
//! Configuration management for live and offline ERD runs
//!
//! Sampling rate is deliberately absent: it always comes from the recording
//! header or the stream start message.

pub mod constants;
pub mod loader;

pub use constants::*;
pub use loader::ConfigLoader;

use std::collections::HashSet;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::erd::{ErdMethod, ErdMethodKind};
use crate::processing::reducer::ReducerKind;
use crate::summary::{BoundaryPolicy, StimulusCategory};

/// Complete system configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct SystemConfig {
    #[serde(default)]
    pub epoch: EpochConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub channels: ChannelConfig,
    #[serde(default)]
    pub erd: ErdConfig,
    #[serde(default)]
    pub markers: MarkerConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
    #[serde(default)]
    pub live: LiveConfig,
}

/// Baseline and activation window lengths
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EpochConfig {
    #[serde(default = "defaults::pre_seconds")]
    pub pre_seconds: f64,

    #[serde(default = "defaults::post_seconds")]
    pub post_seconds: f64,
}

/// Zero-phase Butterworth bandpass settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FilterConfig {
    #[serde(default = "defaults::low_cutoff_hz")]
    pub low_cutoff_hz: f64,

    #[serde(default = "defaults::high_cutoff_hz")]
    pub high_cutoff_hz: f64,

    #[serde(default = "defaults::filter_order")]
    pub order: usize,
}

/// Focus and bad channel names, matched against the recording's channel list
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ChannelConfig {
    #[serde(default = "defaults::focus_channels")]
    pub focus: Vec<String>,

    #[serde(default = "defaults::bad_channels")]
    pub bad: Vec<String>,
}

/// Estimator selection
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ErdConfig {
    #[serde(default = "defaults::method")]
    pub method: ErdMethodKind,

    /// Sliding window length in samples
    #[serde(default = "defaults::moving_average_window")]
    pub moving_average_window: usize,

    #[serde(default = "defaults::moving_average_reducer")]
    pub moving_average_reducer: ReducerKind,

    /// Welch segment length, clamped to the window being analysed
    #[serde(default = "defaults::welch_segment_length")]
    pub welch_segment_length: usize,
}

/// Marker descriptions and stimulus code groups
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MarkerConfig {
    /// Descriptions the live assembler registers, e.g. `"S  1"`
    #[serde(default = "defaults::focus_markers")]
    pub focus: Vec<String>,

    #[serde(default = "defaults::normal_finger_codes")]
    pub normal_finger: Vec<u32>,

    #[serde(default = "defaults::sixth_finger_codes")]
    pub sixth_finger: Vec<u32>,

    #[serde(default = "defaults::rest_codes")]
    pub rest: Vec<u32>,
}

/// Summary table settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SummaryConfig {
    /// Inclusive range of rest ERDs that contribute to the dynamic boundary
    #[serde(default = "defaults::rest_outlier_range")]
    pub rest_outlier_range: (f64, f64),

    #[serde(default = "defaults::boundaries")]
    pub boundaries: Vec<BoundaryPolicy>,
}

/// Live streaming settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LiveConfig {
    #[serde(default = "defaults::min_buffer_seconds")]
    pub min_buffer_seconds: f64,

    #[serde(default = "defaults::buffer_safety_factor")]
    pub buffer_safety_factor: f64,

    #[serde(default = "defaults::latency_target_ms")]
    pub latency_target_ms: u64,

    #[serde(default = "defaults::poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "defaults::chunk_timeout_ms")]
    pub chunk_timeout_ms: u64,

    #[serde(default = "defaults::receiver_address")]
    pub receiver_address: String,

    #[serde(default = "defaults::broadcast_address")]
    pub broadcast_address: String,

    #[serde(default = "defaults::broadcast_enabled")]
    pub broadcast_enabled: bool,
}

/// Default value providers using constants
mod defaults {
    use crate::config::constants::*;
    use crate::erd::ErdMethodKind;
    use crate::processing::reducer::ReducerKind;
    use crate::summary::BoundaryPolicy;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    pub fn pre_seconds() -> f64 { epoch::DEFAULT_PRE_SECONDS }
    pub fn post_seconds() -> f64 { epoch::DEFAULT_POST_SECONDS }

    pub fn low_cutoff_hz() -> f64 { filters::DEFAULT_LOW_CUTOFF_HZ }
    pub fn high_cutoff_hz() -> f64 { filters::DEFAULT_HIGH_CUTOFF_HZ }
    pub fn filter_order() -> usize { filters::DEFAULT_FILTER_ORDER }

    pub fn focus_channels() -> Vec<String> { strings(channels::DEFAULT_FOCUS_CHANNELS) }
    pub fn bad_channels() -> Vec<String> { strings(channels::DEFAULT_BAD_CHANNELS) }

    pub fn method() -> ErdMethodKind { ErdMethodKind::Bandpass }
    pub fn moving_average_window() -> usize { erd::DEFAULT_MOVING_AVERAGE_WINDOW }
    pub fn moving_average_reducer() -> ReducerKind { ReducerKind::Percentage }
    pub fn welch_segment_length() -> usize { erd::DEFAULT_WELCH_SEGMENT_LENGTH }

    pub fn focus_markers() -> Vec<String> { strings(markers::DEFAULT_FOCUS_MARKERS) }
    pub fn normal_finger_codes() -> Vec<u32> { markers::NORMAL_FINGER_CODES.to_vec() }
    pub fn sixth_finger_codes() -> Vec<u32> { markers::SIXTH_FINGER_CODES.to_vec() }
    pub fn rest_codes() -> Vec<u32> { markers::REST_CODES.to_vec() }

    pub fn rest_outlier_range() -> (f64, f64) { summary::DEFAULT_REST_OUTLIER_RANGE }
    pub fn boundaries() -> Vec<BoundaryPolicy> { vec![BoundaryPolicy::Static, BoundaryPolicy::Dynamic] }

    pub fn min_buffer_seconds() -> f64 { live::MIN_BUFFER_SECONDS }
    pub fn buffer_safety_factor() -> f64 { live::BUFFER_SAFETY_FACTOR }
    pub fn latency_target_ms() -> u64 { live::DEFAULT_LATENCY_TARGET_MS }
    pub fn poll_interval_ms() -> u64 { live::DEFAULT_POLL_INTERVAL_MS }
    pub fn chunk_timeout_ms() -> u64 { live::DEFAULT_CHUNK_TIMEOUT_MS }
    pub fn receiver_address() -> String { live::DEFAULT_RECEIVER_ADDRESS.to_string() }
    pub fn broadcast_address() -> String { live::DEFAULT_BROADCAST_ADDRESS.to_string() }
    pub fn broadcast_enabled() -> bool { true }
}

impl Default for EpochConfig {
    fn default() -> Self {
        Self {
            pre_seconds: defaults::pre_seconds(),
            post_seconds: defaults::post_seconds(),
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            low_cutoff_hz: defaults::low_cutoff_hz(),
            high_cutoff_hz: defaults::high_cutoff_hz(),
            order: defaults::filter_order(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            focus: defaults::focus_channels(),
            bad: defaults::bad_channels(),
        }
    }
}

impl Default for ErdConfig {
    fn default() -> Self {
        Self {
            method: defaults::method(),
            moving_average_window: defaults::moving_average_window(),
            moving_average_reducer: defaults::moving_average_reducer(),
            welch_segment_length: defaults::welch_segment_length(),
        }
    }
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            focus: defaults::focus_markers(),
            normal_finger: defaults::normal_finger_codes(),
            sixth_finger: defaults::sixth_finger_codes(),
            rest: defaults::rest_codes(),
        }
    }
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            rest_outlier_range: defaults::rest_outlier_range(),
            boundaries: defaults::boundaries(),
        }
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            min_buffer_seconds: defaults::min_buffer_seconds(),
            buffer_safety_factor: defaults::buffer_safety_factor(),
            latency_target_ms: defaults::latency_target_ms(),
            poll_interval_ms: defaults::poll_interval_ms(),
            chunk_timeout_ms: defaults::chunk_timeout_ms(),
            receiver_address: defaults::receiver_address(),
            broadcast_address: defaults::broadcast_address(),
            broadcast_enabled: defaults::broadcast_enabled(),
        }
    }
}

impl ErdConfig {
    /// Resolve the configured method into a dispatchable [`ErdMethod`]
    pub fn method(&self) -> ErdMethod {
        self.method
            .with_moving_average(self.moving_average_window, self.moving_average_reducer)
    }
}

impl MarkerConfig {
    /// Category a stimulus code belongs to, if any
    pub fn category_of(&self, code: u32) -> Option<StimulusCategory> {
        if self.normal_finger.contains(&code) {
            Some(StimulusCategory::NormalFinger)
        } else if self.sixth_finger.contains(&code) {
            Some(StimulusCategory::SixthFinger)
        } else if self.rest.contains(&code) {
            Some(StimulusCategory::Rest)
        } else {
            None
        }
    }
}

impl LiveConfig {
    /// Circular buffer length for an epoch of `epoch_seconds` at `sampling_rate`.
    ///
    /// At least `min_buffer_seconds`, and always strictly more than
    /// `buffer_safety_factor` epochs so that no valid epoch is overwritten before
    /// it becomes extractable.
    pub fn buffer_samples(&self, sampling_rate: f64, epoch_seconds: f64) -> usize {
        let seconds = self
            .min_buffer_seconds
            .max(epoch_seconds * self.buffer_safety_factor);
        (seconds * sampling_rate).ceil() as usize + 1
    }
}

/// Configuration utility functions
impl SystemConfig {
    /// Validate configuration consistency
    pub fn validate_consistency(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for (name, value) in [("pre_seconds", self.epoch.pre_seconds), ("post_seconds", self.epoch.post_seconds)] {
            if !(value > 0.0 && value <= epoch::MAX_EPOCH_SECONDS) {
                errors.push(format!(
                    "epoch.{} must be in (0, {}], got {}",
                    name,
                    epoch::MAX_EPOCH_SECONDS,
                    value
                ));
            }
        }

        if !(self.filter.low_cutoff_hz > 0.0 && self.filter.low_cutoff_hz < self.filter.high_cutoff_hz) {
            errors.push(format!(
                "Bandpass cutoffs must satisfy 0 < low < high, got {}-{} Hz",
                self.filter.low_cutoff_hz, self.filter.high_cutoff_hz
            ));
        }

        if !(filters::MIN_FILTER_ORDER..=filters::MAX_FILTER_ORDER).contains(&self.filter.order) {
            errors.push(format!(
                "Filter order must be {}-{}, got {}",
                filters::MIN_FILTER_ORDER,
                filters::MAX_FILTER_ORDER,
                self.filter.order
            ));
        }

        if self.channels.focus.is_empty() {
            errors.push("At least one focus channel is required".to_string());
        }

        let bad: HashSet<&str> = self.channels.bad.iter().map(String::as_str).collect();
        for name in &self.channels.focus {
            if bad.contains(name.as_str()) {
                errors.push(format!("Focus channel {} is also listed as bad", name));
            }
        }

        if self.erd.moving_average_window == 0 {
            errors.push("erd.moving_average_window must be positive".to_string());
        }

        if self.erd.welch_segment_length < 2 {
            errors.push("erd.welch_segment_length must be at least 2".to_string());
        }

        let groups = [
            ("normal_finger", &self.markers.normal_finger),
            ("sixth_finger", &self.markers.sixth_finger),
            ("rest", &self.markers.rest),
        ];
        let mut seen = HashSet::new();
        for (group, codes) in groups {
            for code in codes.iter() {
                if !seen.insert(*code) {
                    errors.push(format!("Stimulus code {} appears in more than one group ({})", code, group));
                }
            }
        }

        let (low, high) = self.summary.rest_outlier_range;
        if !(low < high) {
            errors.push(format!("summary.rest_outlier_range must be ordered, got ({}, {})", low, high));
        }

        if self.summary.boundaries.is_empty() {
            errors.push("summary.boundaries must name at least one policy".to_string());
        }

        if self.live.buffer_safety_factor < live::BUFFER_SAFETY_FACTOR {
            errors.push(format!(
                "live.buffer_safety_factor must be at least {}, got {}",
                live::BUFFER_SAFETY_FACTOR,
                self.live.buffer_safety_factor
            ));
        }

        for (name, address) in [
            ("receiver_address", &self.live.receiver_address),
            ("broadcast_address", &self.live.broadcast_address),
        ] {
            if address.parse::<SocketAddr>().is_err() {
                errors.push(format!("live.{} is not a socket address: {}", name, address));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Total epoch duration in seconds
    pub fn epoch_seconds(&self) -> f64 {
        self.epoch.pre_seconds + self.epoch.post_seconds
    }
}
