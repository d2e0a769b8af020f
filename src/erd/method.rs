// src/erd/method.rs
//! ERD method selection

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ErdError;
use crate::processing::{Preprocessing, ReducerKind};

/// Method names as they appear in configuration and on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErdMethodKind {
    Bandpass,
    Welch,
    DbCorrection,
    MovingAverage,
}

impl ErdMethodKind {
    pub const ALL: [ErdMethodKind; 4] = [
        ErdMethodKind::Bandpass,
        ErdMethodKind::Welch,
        ErdMethodKind::DbCorrection,
        ErdMethodKind::MovingAverage,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ErdMethodKind::Bandpass => "bandpass",
            ErdMethodKind::Welch => "welch",
            ErdMethodKind::DbCorrection => "db_correction",
            ErdMethodKind::MovingAverage => "moving_average",
        }
    }

    /// Fully parameterized method. The moving-average settings are ignored by
    /// the other kinds.
    pub fn with_moving_average(self, window_samples: usize, reducer: ReducerKind) -> ErdMethod {
        match self {
            ErdMethodKind::Bandpass => ErdMethod::Bandpass,
            ErdMethodKind::Welch => ErdMethod::Welch,
            ErdMethodKind::DbCorrection => ErdMethod::DbCorrection,
            ErdMethodKind::MovingAverage => ErdMethod::MovingAverage { window_samples, reducer },
        }
    }
}

impl fmt::Display for ErdMethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErdMethodKind {
    type Err = ErdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErdMethodKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| ErdError::UnknownMethod {
                name: s.to_string(),
                expected: ErdMethodKind::ALL.map(ErdMethodKind::as_str).join(", "),
            })
    }
}

/// A method together with its parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErdMethod {
    /// Bandpass + CAR, mean squared amplitude, percentage change
    Bandpass,
    /// Raw signal, mean Welch PSD over the band, percentage change
    Welch,
    /// Bandpass + CAR, mean squared amplitude, decibel ratio
    DbCorrection,
    /// Bandpass + CAR, averaged ERD over paired sliding windows
    MovingAverage {
        window_samples: usize,
        reducer: ReducerKind,
    },
}

impl ErdMethod {
    pub fn kind(&self) -> ErdMethodKind {
        match self {
            ErdMethod::Bandpass => ErdMethodKind::Bandpass,
            ErdMethod::Welch => ErdMethodKind::Welch,
            ErdMethod::DbCorrection => ErdMethodKind::DbCorrection,
            ErdMethod::MovingAverage { .. } => ErdMethodKind::MovingAverage,
        }
    }

    pub fn preprocessing(&self) -> Preprocessing {
        match self {
            ErdMethod::Welch => Preprocessing::Raw,
            _ => Preprocessing::BandpassCar,
        }
    }

    pub fn reducer(&self) -> ReducerKind {
        match *self {
            ErdMethod::DbCorrection => ReducerKind::Decibel,
            ErdMethod::MovingAverage { reducer, .. } => reducer,
            ErdMethod::Bandpass | ErdMethod::Welch => ReducerKind::Percentage,
        }
    }
}

impl fmt::Display for ErdMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErdMethod::MovingAverage { window_samples, reducer } => {
                write!(f, "moving_average(window={}, reducer={})", window_samples, reducer)
            }
            other => f.write_str(other.kind().as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method_names() {
        for kind in ErdMethodKind::ALL {
            assert_eq!(kind.as_str().parse::<ErdMethodKind>().unwrap(), kind);
        }
        let err = "wavelet".parse::<ErdMethodKind>().unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("wavelet"));
    }

    #[test]
    fn test_method_pipelines() {
        assert_eq!(ErdMethod::Welch.preprocessing(), Preprocessing::Raw);
        assert_eq!(ErdMethod::Bandpass.preprocessing(), Preprocessing::BandpassCar);
        assert_eq!(ErdMethod::DbCorrection.reducer(), ReducerKind::Decibel);

        let moving = ErdMethodKind::MovingAverage.with_moving_average(50, ReducerKind::Decibel);
        assert_eq!(moving.reducer(), ReducerKind::Decibel);
        assert_eq!(moving.kind(), ErdMethodKind::MovingAverage);
        assert_eq!(ErdMethodKind::Welch.with_moving_average(50, ReducerKind::Decibel), ErdMethod::Welch);
    }

    #[test]
    fn test_display() {
        assert_eq!(ErdMethod::DbCorrection.to_string(), "db_correction");
        let moving = ErdMethod::MovingAverage {
            window_samples: 75,
            reducer: ReducerKind::Percentage,
        };
        assert_eq!(moving.to_string(), "moving_average(window=75, reducer=percentage)");
    }
}
