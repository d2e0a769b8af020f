//! Common utility functions for ERD Core
//!
//! - Wall-clock timestamps behind an injectable provider
//! - NaN-aware statistics shared by the calculator and the summary layer

pub mod stats;
pub mod time;

pub use stats::{nanmean, sample_std};
pub use time::{current_timestamp_nanos, current_timestamp_secs, MockTimeProvider, SystemTimeProvider, TimeProvider};
