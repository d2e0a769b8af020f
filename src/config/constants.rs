// src/config/constants.rs
//! System-wide configuration constants

/// Epoch layout constants
pub mod epoch {
    pub const DEFAULT_PRE_SECONDS: f64 = 2.0;
    pub const DEFAULT_POST_SECONDS: f64 = 2.0;
    pub const MAX_EPOCH_SECONDS: f64 = 60.0;
}

/// Bandpass filter constants
pub mod filters {
    pub const DEFAULT_LOW_CUTOFF_HZ: f64 = 8.0;
    pub const DEFAULT_HIGH_CUTOFF_HZ: f64 = 30.0;
    pub const DEFAULT_FILTER_ORDER: usize = 5;
    pub const MIN_FILTER_ORDER: usize = 1;
    pub const MAX_FILTER_ORDER: usize = 10;
}

/// Channel selection constants
pub mod channels {
    pub const DEFAULT_FOCUS_CHANNELS: &[&str] = &["C3", "C1", "CP3", "CP1"];
    pub const DEFAULT_BAD_CHANNELS: &[&str] = &["FT9", "TP9", "FT10", "TP10"];
}

/// ERD estimator constants
pub mod erd {
    pub const DEFAULT_MOVING_AVERAGE_WINDOW: usize = 75;
    pub const DEFAULT_WELCH_SEGMENT_LENGTH: usize = 256;
    pub const WELCH_OVERLAP_FRACTION: f64 = 0.5;
}

/// Stimulus marker constants
pub mod markers {
    pub const DEFAULT_FOCUS_MARKERS: &[&str] = &["S  1", "S  2", "S  3", "S  4", "S  5", "S  6", "S  7"];
    pub const NORMAL_FINGER_CODES: &[u32] = &[1, 2, 3, 4, 5];
    pub const SIXTH_FINGER_CODES: &[u32] = &[6];
    pub const REST_CODES: &[u32] = &[7];
}

/// Summary layer constants
pub mod summary {
    pub const DEFAULT_REST_OUTLIER_RANGE: (f64, f64) = (-100.0, 100.0);
    pub const STATIC_BOUNDARY: f64 = 0.0;
}

/// Live streaming constants
pub mod live {
    pub const MIN_BUFFER_SECONDS: f64 = 10.0;
    pub const BUFFER_SAFETY_FACTOR: f64 = 1.5;
    pub const DEFAULT_LATENCY_TARGET_MS: u64 = 200;
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1;
    pub const DEFAULT_CHUNK_TIMEOUT_MS: u64 = 500;
    pub const DEFAULT_RECEIVER_ADDRESS: &str = "127.0.0.1:51244";
    pub const DEFAULT_BROADCAST_ADDRESS: &str = "127.0.0.1:50000";
    /// Chunks per second emitted by the replay source
    pub const REPLAY_CHUNKS_PER_SECOND: usize = 50;
}

/// BrainVision Remote Data Access wire constants
pub mod rda {
    pub const HEADER_SIZE: usize = 24;
    pub const MSG_START: u32 = 1;
    pub const MSG_DATA16: u32 = 2;
    pub const MSG_STOP: u32 = 3;
    pub const MSG_DATA32: u32 = 4;
    /// Upper bound on a single message, protects against corrupt size fields
    pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;
    pub const GUID: [u8; 16] = [
        0x8E, 0x45, 0x58, 0x43, 0x96, 0xC9, 0x86, 0x4C, 0xAF, 0x4A, 0x98, 0xBB, 0xF6, 0xC9, 0x14, 0x50,
    ];
}

/// Configuration file locations
pub mod paths {
    pub const DEFAULT_CONFIG_FILE: &str = "config/erd.toml";
    pub const LOCAL_CONFIG_FILE: &str = "erd.toml";
    pub const ENV_PREFIX: &str = "ERD";
}
