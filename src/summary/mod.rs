// src/summary/mod.rs
//! Per-category trial summaries
//!
//! Imagery trials (normal and sixth finger) pass when their ERD is below the
//! boundary. Rest trials pass when their ERD is above zero, whatever the
//! boundary. Mean and standard deviation are taken over the passing trials.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::constants::summary::STATIC_BOUNDARY;
use crate::utils::stats::{nanmean, sample_std};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StimulusCategory {
    NormalFinger,
    SixthFinger,
    Rest,
}

impl StimulusCategory {
    pub const ALL: [StimulusCategory; 3] = [
        StimulusCategory::NormalFinger,
        StimulusCategory::SixthFinger,
        StimulusCategory::Rest,
    ];

    /// Row label in summary tables
    pub fn label(self) -> &'static str {
        match self {
            StimulusCategory::NormalFinger => "NT",
            StimulusCategory::SixthFinger => "ST",
            StimulusCategory::Rest => "Rest",
        }
    }

    /// Pass test for one trial
    pub fn passes(self, erd: f64, boundary: f64) -> bool {
        match self {
            StimulusCategory::Rest => erd > 0.0,
            _ => erd < boundary,
        }
    }
}

/// How the imagery boundary is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Fixed at zero
    Static,
    /// Mean of the participant's rest ERDs inside the outlier range
    Dynamic,
}

impl fmt::Display for BoundaryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryPolicy::Static => f.write_str("static"),
            BoundaryPolicy::Dynamic => f.write_str("dynamic"),
        }
    }
}

/// One presented stimulus and the ERD values computed for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub trial_index: usize,
    pub description: String,
    pub code: Option<u32>,
    pub category: Option<StimulusCategory>,
    /// ERD by method label, `None` when the method produced no value
    pub erd: BTreeMap<String, Option<f64>>,
    /// Seconds since the Unix epoch for live trials, seconds into the
    /// recording for offline ones
    pub timestamp: f64,
}

/// Mean ERD of rest trials inside the inclusive `range`, or zero with a
/// warning if none qualify
pub fn dynamic_boundary(rest_values: &[f64], range: (f64, f64)) -> f64 {
    let (low, high) = range;
    let kept = rest_values.iter().copied().filter(|v| *v >= low && *v <= high);
    match nanmean(kept) {
        Some(boundary) => boundary,
        None => {
            warn!(
                rest_trials = rest_values.len(),
                low, high, "No rest trial inside the outlier range, using a zero boundary"
            );
            STATIC_BOUNDARY
        }
    }
}

/// Boundary for `policy` given every (category, ERD) pair of a run
pub fn resolve_boundary(policy: BoundaryPolicy, values: &[(StimulusCategory, f64)], range: (f64, f64)) -> f64 {
    match policy {
        BoundaryPolicy::Static => STATIC_BOUNDARY,
        BoundaryPolicy::Dynamic => {
            let rest: Vec<f64> = values
                .iter()
                .filter(|(category, _)| *category == StimulusCategory::Rest)
                .map(|(_, value)| *value)
                .collect();
            dynamic_boundary(&rest, range)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub label: String,
    /// Mean over passing trials, `NaN` if none passed
    pub mean: f64,
    pub std: f64,
    pub passed: usize,
    /// Trials with a defined ERD
    pub total: usize,
}

impl SummaryRow {
    fn from_values<I>(label: &str, values: I, boundary: f64) -> Self
    where
        I: IntoIterator<Item = (StimulusCategory, f64)>,
    {
        let mut total = 0;
        let mut passing = Vec::new();
        for (category, value) in values {
            if value.is_nan() {
                continue;
            }
            total += 1;
            if category.passes(value, boundary) {
                passing.push(value);
            }
        }
        Self {
            label: label.to_string(),
            mean: nanmean(passing.iter().copied()).unwrap_or(f64::NAN),
            std: sample_std(passing.iter().copied()),
            passed: passing.len(),
            total,
        }
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 / self.total as f64 * 100.0
        }
    }

    /// `passed/total (percent%)`
    pub fn count_string(&self) -> String {
        format!("{}/{} ({:.2}%)", self.passed, self.total, self.percent())
    }
}

/// Category rows plus a total over every category for one method and boundary policy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryTable {
    pub method: String,
    pub policy: BoundaryPolicy,
    pub boundary: f64,
    pub rows: Vec<SummaryRow>,
    pub total: SummaryRow,
}

impl SummaryTable {
    pub fn build(
        method: &str,
        policy: BoundaryPolicy,
        values: &[(StimulusCategory, f64)],
        rest_outlier_range: (f64, f64),
    ) -> Self {
        let boundary = resolve_boundary(policy, values, rest_outlier_range);
        let rows = StimulusCategory::ALL
            .iter()
            .map(|&category| {
                SummaryRow::from_values(
                    category.label(),
                    values.iter().copied().filter(|(c, _)| *c == category),
                    boundary,
                )
            })
            .collect();
        // Each trial passes by its own category's rule
        let total = SummaryRow::from_values("Total", values.iter().copied(), boundary);

        Self {
            method: method.to_string(),
            policy,
            boundary,
            rows,
            total,
        }
    }

    /// Build from trial records, reading the ERD stored under `method`
    pub fn from_trials(
        method: &str,
        policy: BoundaryPolicy,
        trials: &[TrialRecord],
        rest_outlier_range: (f64, f64),
    ) -> Self {
        let values: Vec<(StimulusCategory, f64)> = trials
            .iter()
            .filter_map(|trial| {
                let category = trial.category?;
                let value = trial.erd.get(method).copied().flatten()?;
                Some((category, value))
            })
            .collect();
        Self::build(method, policy, &values, rest_outlier_range)
    }

    pub fn row(&self, label: &str) -> Option<&SummaryRow> {
        self.rows.iter().chain(std::iter::once(&self.total)).find(|row| row.label == label)
    }
}

impl fmt::Display for SummaryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Method: {} | boundary: {} ({:.2})", self.method, self.policy, self.boundary)?;
        writeln!(f, "{:<8} {:>10} {:>10}   {}", "Category", "Mean", "Std", "Passed")?;
        for row in self.rows.iter().chain(std::iter::once(&self.total)) {
            writeln!(f, "{:<8} {:>10.2} {:>10.2}   {}", row.label, row.mean, row.std, row.count_string())?;
        }
        Ok(())
    }
}
