// src/hal/simulator.rs
//! Synthetic EEG source
//!
//! Every channel carries a mu rhythm with its own phase plus uniform noise.
//! Stimulus markers are emitted on a fixed schedule; during the activation
//! window that follows, imagery codes attenuate and rest codes enhance the
//! rhythm on the modulated channels.

use std::f64::consts::PI;
use std::thread;
use std::time::{Duration, Instant};

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::acquisition::Marker;
use crate::error::{ErdErrorBuilder, ErdResult};
use crate::hal::traits::ChunkSource;
use crate::hal::types::{ChunkPoll, DataChunk, StreamInfo};

/// Simulator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    pub channel_names: Vec<String>,
    pub sampling_rate: f64,
    pub chunk_samples: usize,
    pub mu_frequency_hz: f64,
    /// Rhythm amplitude in µV
    pub mu_amplitude: f64,
    /// Half-width of the uniform noise in µV
    pub noise_amplitude: f64,
    /// Channels whose rhythm follows the stimulus
    pub modulated_channels: Vec<String>,
    pub first_stimulus_seconds: f64,
    pub trial_interval_seconds: f64,
    pub activation_seconds: f64,
    /// Codes cycled through in order, rendered as `S{code:>3}`
    pub stimulus_codes: Vec<u32>,
    pub rest_codes: Vec<u32>,
    pub imagery_gain: f64,
    pub rest_gain: f64,
    /// Stop after this much signal, run forever if `None`
    pub duration_seconds: Option<f64>,
    pub realtime: bool,
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            channel_names: ["FC3", "FC1", "C3", "C1", "Cz", "C2", "C4", "CP3", "CP1", "CP2"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            sampling_rate: 250.0,
            chunk_samples: 5,
            mu_frequency_hz: 10.0,
            mu_amplitude: 10.0,
            noise_amplitude: 2.0,
            modulated_channels: ["C3", "C1", "CP3", "CP1"].iter().map(|s| s.to_string()).collect(),
            first_stimulus_seconds: 3.0,
            trial_interval_seconds: 6.0,
            activation_seconds: 2.0,
            stimulus_codes: (1..=7).collect(),
            rest_codes: vec![7],
            imagery_gain: 0.5,
            rest_gain: 1.5,
            duration_seconds: None,
            realtime: false,
            seed: 42,
        }
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> ErdResult<()> {
        let builder = || ErdErrorBuilder::new("simulator", "validate");
        if self.channel_names.is_empty() {
            return Err(builder().configuration("Simulator needs at least one channel"));
        }
        if !(self.sampling_rate > 0.0) || self.chunk_samples == 0 {
            return Err(builder().configuration("Sampling rate and chunk size must be positive"));
        }
        if self.stimulus_codes.is_empty() || !(self.trial_interval_seconds > self.activation_seconds) {
            return Err(builder().configuration("Trial interval must exceed the activation window"));
        }
        if !(self.mu_frequency_hz > 0.0 && self.mu_frequency_hz < self.sampling_rate / 2.0) {
            return Err(builder().configuration("Mu frequency must be below Nyquist"));
        }
        Ok(())
    }
}

/// Deterministic synthetic EEG stream
pub struct EegSimulator {
    config: SimulatorConfig,
    info: StreamInfo,
    modulated: Vec<bool>,
    rng: StdRng,
    sample_index: u64,
    trial_index: usize,
    /// Active stimulus: (marker sample, gain)
    active: Option<(u64, f64)>,
    started: Option<Instant>,
    connected: bool,
}

impl EegSimulator {
    pub fn new(config: SimulatorConfig) -> ErdResult<Self> {
        config.validate()?;
        let info = StreamInfo {
            channel_names: config.channel_names.clone(),
            sampling_rate: config.sampling_rate,
            resolutions: vec![1.0; config.channel_names.len()],
        };
        let modulated = config
            .channel_names
            .iter()
            .map(|name| config.modulated_channels.contains(name))
            .collect();
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            info,
            modulated,
            rng,
            sample_index: 0,
            trial_index: 0,
            active: None,
            started: None,
            connected: false,
        })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    fn seconds_to_samples(&self, seconds: f64) -> u64 {
        (seconds * self.config.sampling_rate).round() as u64
    }

    fn stimulus_sample(&self, trial: usize) -> u64 {
        self.seconds_to_samples(self.config.first_stimulus_seconds + trial as f64 * self.config.trial_interval_seconds)
    }

    fn total_samples(&self) -> Option<u64> {
        self.config.duration_seconds.map(|s| self.seconds_to_samples(s))
    }

    fn generate(&mut self, samples: usize) -> DataChunk {
        let channels = self.info.channel_count();
        let fs = self.config.sampling_rate;
        let activation = self.seconds_to_samples(self.config.activation_seconds);
        let mut data = Array2::zeros((channels, samples));
        let mut markers = Vec::new();

        for offset in 0..samples {
            let n = self.sample_index + offset as u64;
            if n == self.stimulus_sample(self.trial_index) {
                let codes = &self.config.stimulus_codes;
                let code = codes[self.trial_index % codes.len()];
                let gain = if self.config.rest_codes.contains(&code) {
                    self.config.rest_gain
                } else {
                    self.config.imagery_gain
                };
                markers.push(Marker::stimulus(offset as u64, format!("S{:>3}", code)));
                debug!(code, stream_position = n, "Simulated stimulus");
                self.active = Some((n, gain));
                self.trial_index += 1;
            }
            let gain = match self.active {
                Some((start, gain)) if n < start + activation => gain,
                _ => 1.0,
            };

            let t = n as f64 / fs;
            for ch in 0..channels {
                let phase = 2.0 * PI * ch as f64 / channels as f64;
                let amplitude = if self.modulated[ch] {
                    self.config.mu_amplitude * gain
                } else {
                    self.config.mu_amplitude
                };
                let noise = if self.config.noise_amplitude > 0.0 {
                    self.rng.gen_range(-self.config.noise_amplitude..self.config.noise_amplitude)
                } else {
                    0.0
                };
                data[[ch, offset]] = amplitude * (2.0 * PI * self.config.mu_frequency_hz * t + phase).sin() + noise;
            }
        }

        self.sample_index += samples as u64;
        DataChunk::new(data, markers)
    }
}

impl ChunkSource for EegSimulator {
    fn connect(&mut self) -> ErdResult<StreamInfo> {
        self.connected = true;
        self.started = None;
        info!(
            channels = self.info.channel_count(),
            sampling_rate = self.info.sampling_rate,
            seed = self.config.seed,
            "Simulator started"
        );
        Ok(self.info.clone())
    }

    fn next_chunk(&mut self) -> ErdResult<ChunkPoll> {
        if !self.connected {
            return Err(ErdErrorBuilder::new("simulator", "next_chunk").configuration("Simulator is not connected"));
        }
        let mut samples = self.config.chunk_samples;
        if let Some(total) = self.total_samples() {
            if self.sample_index >= total {
                return Ok(ChunkPoll::Finished);
            }
            samples = samples.min((total - self.sample_index) as usize);
        }

        if self.config.realtime {
            let started = *self.started.get_or_insert_with(Instant::now);
            let end = self.sample_index + samples as u64;
            let due = started + Duration::from_secs_f64(end as f64 / self.config.sampling_rate);
            let now = Instant::now();
            if due > now {
                thread::sleep(due - now);
            }
        }

        Ok(ChunkPoll::Data(self.generate(samples)))
    }

    fn disconnect(&mut self) -> ErdResult<()> {
        self.connected = false;
        Ok(())
    }

    fn stream_info(&self) -> Option<&StreamInfo> {
        self.connected.then_some(&self.info)
    }
}
