// src/utils/time.rs
//! Wall clock used to stamp live trials
//!
//! Sessions hold the clock as a trait object so tests can pin trial
//! timestamps to known values.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub trait TimeProvider: Send + Sync {
    /// Nanoseconds since the Unix epoch
    fn now_nanos(&self) -> u64;

    fn now_secs(&self) -> f64 {
        Duration::from_nanos(self.now_nanos()).as_secs_f64()
    }
}

/// The host clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_nanos(&self) -> u64 {
        current_timestamp_nanos()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct MockTimeProvider {
    nanos: AtomicU64,
}

impl MockTimeProvider {
    pub fn new(start_nanos: u64) -> Self {
        Self {
            nanos: AtomicU64::new(start_nanos),
        }
    }

    pub fn from_secs(secs: f64) -> Self {
        Self::new(Duration::from_secs_f64(secs).as_nanos() as u64)
    }

    pub fn advance(&self, step: Duration) {
        self.nanos.fetch_add(step.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn set_secs(&self, secs: f64) {
        self.nanos
            .store(Duration::from_secs_f64(secs).as_nanos() as u64, Ordering::Relaxed);
    }
}

impl TimeProvider for MockTimeProvider {
    fn now_nanos(&self) -> u64 {
        self.nanos.load(Ordering::Relaxed)
    }
}

fn since_epoch() -> Duration {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default()
}

pub fn current_timestamp_nanos() -> u64 {
    since_epoch().as_nanos() as u64
}

pub fn current_timestamp_secs() -> f64 {
    since_epoch().as_secs_f64()
}
