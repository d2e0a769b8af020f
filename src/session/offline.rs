// src/session/offline.rs
//! Offline assessment of a loaded recording across ERD methods

use std::collections::BTreeMap;

use ndarray::Array2;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::acquisition::{BatchEpochExtractor, ExtractedEpoch, Marker};
use crate::config::SystemConfig;
use crate::erd::{ChannelLayout, ErdCalculator, ErdMethod};
use crate::error::ErdResult;
use crate::hal::Recording;
use crate::summary::{StimulusCategory, SummaryTable, TrialRecord};

/// Outcome of one method over every extracted epoch
#[derive(Debug, Clone, Serialize)]
pub struct MethodReport {
    pub method: String,
    pub processed: usize,
    pub skipped: usize,
    pub trials: Vec<TrialRecord>,
    /// One table per configured boundary policy
    pub summaries: Vec<SummaryTable>,
    /// Set when the method was rejected for this recording
    pub error: Option<String>,
}

impl MethodReport {
    fn failed(method: &str, reason: String) -> Self {
        Self {
            method: method.to_string(),
            processed: 0,
            skipped: 0,
            trials: Vec::new(),
            summaries: Vec::new(),
            error: Some(reason),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AssessmentReport {
    pub sampling_rate: f64,
    pub recording_samples: usize,
    pub clean_channels: Vec<String>,
    pub focus_channels: Vec<String>,
    /// Markers that mapped to a stimulus category
    pub candidate_markers: usize,
    pub extracted_epochs: usize,
    pub methods: Vec<MethodReport>,
    /// Bandpass grand-average ERD per stimulus description
    pub grand_average: BTreeMap<String, Option<f64>>,
}

impl AssessmentReport {
    pub fn method(&self, label: &str) -> Option<&MethodReport> {
        self.methods.iter().find(|m| m.method == label)
    }

    /// One record per epoch carrying the value of every successful method
    pub fn trial_records(&self) -> Vec<TrialRecord> {
        let mut merged: Vec<TrialRecord> = Vec::new();
        for report in self.methods.iter().filter(|m| m.is_ok()) {
            for trial in &report.trials {
                match merged.get_mut(trial.trial_index) {
                    Some(existing) => existing.erd.extend(trial.erd.clone()),
                    None => merged.push(trial.clone()),
                }
            }
        }
        merged
    }
}

/// Runs a set of ERD methods over every categorised epoch of a recording
pub struct OfflineAssessment {
    config: SystemConfig,
    methods: Vec<ErdMethod>,
}

impl OfflineAssessment {
    pub fn new(config: SystemConfig, methods: Vec<ErdMethod>) -> Self {
        Self { config, methods }
    }

    /// Assess with the configured method only
    pub fn from_config(config: SystemConfig) -> Self {
        let method = config.erd.method();
        Self::new(config, vec![method])
    }

    pub fn methods(&self) -> &[ErdMethod] {
        &self.methods
    }

    pub fn run(&self, recording: &Recording) -> ErdResult<AssessmentReport> {
        let fs = recording.info.sampling_rate;
        let layout = ChannelLayout::resolve(
            &recording.info.channel_names,
            &self.config.channels.bad,
            &self.config.channels.focus,
        )?;
        let calculator = ErdCalculator::from_config(&self.config, fs, &layout)?;
        let clean = layout.select_clean(recording.data.view())?;

        let markers = &self.config.markers;
        let category_of = |marker: &Marker| marker.stimulus_code().and_then(|c| markers.category_of(c));
        let candidate_markers = recording.markers.iter().filter(|m| category_of(m).is_some()).count();

        let extractor = BatchEpochExtractor::new(calculator.samples_before(), calculator.samples_after());
        let epochs = extractor.extract_all(clean.view(), &recording.markers, |m| category_of(m).is_some());
        if epochs.len() < candidate_markers {
            warn!(
                skipped = candidate_markers - epochs.len(),
                "Some stimulus epochs fall outside the recording"
            );
        }
        info!(
            candidates = candidate_markers,
            epochs = epochs.len(),
            methods = self.methods.len(),
            "Starting offline assessment"
        );

        let methods = self
            .methods
            .iter()
            .map(|&method| self.run_method(&calculator, method, &epochs, fs))
            .collect();

        let mut by_stimulus: BTreeMap<String, Vec<Array2<f64>>> = BTreeMap::new();
        for epoch in &epochs {
            by_stimulus
                .entry(epoch.marker.description.clone())
                .or_default()
                .push(epoch.data.clone());
        }
        let grand_average = calculator.calculate_erd_across_trials(&by_stimulus);

        Ok(AssessmentReport {
            sampling_rate: fs,
            recording_samples: recording.samples(),
            clean_channels: layout.clean_names().to_vec(),
            focus_channels: layout.focus_names(),
            candidate_markers,
            extracted_epochs: epochs.len(),
            methods,
            grand_average,
        })
    }

    fn run_method(&self, calculator: &ErdCalculator, method: ErdMethod, epochs: &[ExtractedEpoch], fs: f64) -> MethodReport {
        let label = method.to_string();
        if let Err(e) = calculator.validate_method(method) {
            error!(method = %label, error = %e, "Method rejected");
            return MethodReport::failed(&label, e.to_string());
        }

        let results: Vec<_> = epochs
            .par_iter()
            .map(|epoch| calculator.calculate(epoch.data.view(), method, true))
            .collect();

        let mut trials = Vec::with_capacity(epochs.len());
        let mut processed = 0;
        let mut skipped = 0;
        for (index, (epoch, result)) in epochs.iter().zip(results).enumerate() {
            let value = match result {
                Ok(output) => output.and_then(|o| o.as_mean()),
                Err(e) if e.is_fatal() => {
                    error!(method = %label, error = %e, "Method aborted");
                    return MethodReport::failed(&label, e.to_string());
                }
                Err(e) => {
                    warn!(method = %label, marker = %epoch.marker.description, error = %e, "Epoch failed");
                    None
                }
            };
            if value.is_some() {
                processed += 1;
            } else {
                skipped += 1;
            }

            let code = epoch.marker.stimulus_code();
            let mut erd = BTreeMap::new();
            erd.insert(label.clone(), value);
            trials.push(TrialRecord {
                trial_index: index,
                description: epoch.marker.description.clone(),
                code,
                category: code.and_then(|c| self.config.markers.category_of(c)),
                erd,
                timestamp: epoch.marker.position as f64 / fs,
            });
        }

        let values: Vec<(StimulusCategory, f64)> = trials
            .iter()
            .filter_map(|t| Some((t.category?, t.erd.get(&label).copied().flatten()?)))
            .collect();
        let summaries = self
            .config
            .summary
            .boundaries
            .iter()
            .map(|&policy| SummaryTable::build(&label, policy, &values, self.config.summary.rest_outlier_range))
            .collect();

        info!(method = %label, processed, skipped, "Method complete");
        MethodReport {
            method: label,
            processed,
            skipped,
            trials,
            summaries,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{ChunkPoll, ChunkSource, EegSimulator, SimulatorConfig};
    use crate::processing::ReducerKind;
    use ndarray::{concatenate, Axis};

    /// Drain a finite simulator into an in-memory recording
    fn simulated_recording(seconds: f64) -> Recording {
        let mut sim = EegSimulator::new(SimulatorConfig {
            duration_seconds: Some(seconds),
            chunk_samples: 250,
            ..SimulatorConfig::default()
        })
        .unwrap();
        let info = sim.connect().unwrap();
        let mut chunks = Vec::new();
        let mut markers = Vec::new();
        let mut offset = 0u64;
        while let ChunkPoll::Data(chunk) = sim.next_chunk().unwrap() {
            markers.extend(chunk.markers.iter().map(|m: &Marker| m.shifted(offset as i64)));
            offset += chunk.samples() as u64;
            chunks.push(chunk.data);
        }
        let views: Vec<_> = chunks.iter().map(|c| c.view()).collect();
        Recording {
            info,
            data: concatenate(Axis(1), &views).unwrap(),
            markers,
        }
    }

    #[test]
    fn test_assessment_runs_every_method() {
        let recording = simulated_recording(45.0);
        let methods = vec![
            ErdMethod::Bandpass,
            ErdMethod::Welch,
            ErdMethod::MovingAverage {
                window_samples: 75,
                reducer: ReducerKind::Percentage,
            },
        ];
        let report = OfflineAssessment::new(SystemConfig::default(), methods).run(&recording).unwrap();

        // Stimuli at 3, 9, ..., 39 s; the one at 45 s is past the end
        assert_eq!(report.extracted_epochs, 7);
        assert_eq!(report.methods.len(), 3);
        let bandpass = report.method("bandpass").unwrap();
        assert_eq!(bandpass.processed, 7);
        assert_eq!(bandpass.summaries.len(), 2);

        let rest = bandpass.trials.iter().find(|t| t.category == Some(StimulusCategory::Rest)).unwrap();
        assert!(rest.erd["bandpass"].unwrap() > 0.0);

        let merged = report.trial_records();
        assert_eq!(merged.len(), 7);
        assert_eq!(merged[0].erd.len(), 3);
    }

    #[test]
    fn test_rejected_method_does_not_stop_others() {
        let recording = simulated_recording(20.0);
        let methods = vec![
            ErdMethod::MovingAverage {
                window_samples: 10_000,
                reducer: ReducerKind::Percentage,
            },
            ErdMethod::Bandpass,
        ];
        let report = OfflineAssessment::new(SystemConfig::default(), methods).run(&recording).unwrap();
        assert!(!report.methods[0].is_ok());
        assert!(report.methods[1].is_ok());
        assert_eq!(report.trial_records().len(), report.extracted_epochs);
    }
}
