// src/session/mod.rs
//! Live and offline ERD sessions

pub mod live;
pub mod offline;

pub use live::{LiveReport, LiveSession, SessionStep};
pub use offline::{AssessmentReport, MethodReport, OfflineAssessment};
