// src/processing/reducer.rs
//! Baseline/activation power pair to ERD value conventions
//!
//! Both reducers propagate `NaN` where the ratio or logarithm is undefined.
//! Callers exclude `NaN` from aggregates; nothing here coerces it to zero.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ErdError;

/// ERD reduction convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReducerKind {
    /// `(post - pre) / pre * 100`
    #[serde(rename = "percentage")]
    Percentage,
    /// `10 * log10(post / pre)`
    #[serde(rename = "db", alias = "decibel")]
    Decibel,
}

impl ReducerKind {
    /// Reduce one power pair
    #[inline]
    pub fn reduce(self, pre: f64, post: f64) -> f64 {
        match self {
            ReducerKind::Percentage => percentage_change(pre, post),
            ReducerKind::Decibel => decibel_ratio(pre, post),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReducerKind::Percentage => "percentage",
            ReducerKind::Decibel => "db",
        }
    }
}

impl fmt::Display for ReducerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReducerKind {
    type Err = ErdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(ReducerKind::Percentage),
            "db" | "decibel" => Ok(ReducerKind::Decibel),
            other => Err(ErdError::UnknownMethod {
                name: other.to_string(),
                expected: "percentage, db".to_string(),
            }),
        }
    }
}

/// Percentage change from baseline, `NaN` when the baseline is zero
#[inline]
pub fn percentage_change(pre: f64, post: f64) -> f64 {
    if pre == 0.0 {
        f64::NAN
    } else {
        (post - pre) / pre * 100.0
    }
}

/// Decibel ratio, `NaN` unless both powers are strictly positive
#[inline]
pub fn decibel_ratio(pre: f64, post: f64) -> f64 {
    if pre > 0.0 && post > 0.0 {
        10.0 * (post / pre).log10()
    } else {
        f64::NAN
    }
}
