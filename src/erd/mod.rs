// src/erd/mod.rs
//! Event-related desynchronization estimation
//!
//! [`ErdCalculator`] is the entry point: it is built once per session from the
//! sampling rate, epoch windows, bandpass settings and a resolved
//! [`ChannelLayout`], then applied to individual epochs with one of the
//! [`ErdMethod`] variants.

pub mod calculator;
pub mod layout;
pub mod method;
pub mod output;

pub use calculator::{CalculatorParams, ErdCalculator};
pub use layout::ChannelLayout;
pub use method::{ErdMethod, ErdMethodKind};
pub use output::{ChannelErd, ErdOutput};
