//! ERD-Core: event-related desynchronization engine for motor-imagery EEG
//!
//! This library turns multichannel EEG epochs around stimulus markers into ERD
//! values, either live from a streaming receiver or offline from a recorded
//! session. It features:
//!
//! - Four ERD estimators: bandpass power, Welch spectral density, decibel
//!   baseline correction and sliding-window moving average
//! - Streaming epoch assembly over a bounded circular buffer
//! - BrainVision RDA client, `.vhdr` recording reader and an EEG simulator
//! - Per-category trial summaries with static and dynamic pass boundaries
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use erd_core::config::SystemConfig;
//! use erd_core::hal::Recording;
//! use erd_core::session::OfflineAssessment;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let recording = Recording::from_vhdr("session.vhdr")?;
//!     let report = OfflineAssessment::from_config(SystemConfig::default()).run(&recording)?;
//!
//!     for method in &report.methods {
//!         for table in &method.summaries {
//!             println!("{}", table);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod acquisition;
pub mod communication;
pub mod config;
pub mod erd;
pub mod error;
pub mod hal;
pub mod processing;
pub mod session;
pub mod summary;
pub mod utils;

// Re-export commonly used types for convenience
pub use acquisition::{Marker, StreamingEpochAssembler};
pub use config::SystemConfig;
pub use erd::{ChannelLayout, ErdCalculator, ErdMethod, ErdMethodKind, ErdOutput};
pub use error::{ErdError, ErdResult};
pub use hal::{ChunkSource, DataSource, Recording};
pub use session::{LiveSession, OfflineAssessment};
pub use summary::{BoundaryPolicy, StimulusCategory, SummaryTable};

pub use utils::time::{current_timestamp_nanos, TimeProvider};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: "Event-related desynchronization engine for motor-imagery EEG".to_string(),
        methods: ErdMethodKind::ALL.iter().map(|m| m.as_str().to_string()).collect(),
    }
}

/// Library version information
#[derive(Debug, Clone)]
pub struct VersionInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    /// Names accepted wherever an ERD method is configured
    pub methods: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        let info = version_info();
        assert_eq!(info.name, NAME);
        assert_eq!(info.version, VERSION);
        assert_eq!(info.methods, ["bandpass", "welch", "db_correction", "moving_average"]);
    }

    #[test]
    fn test_constants() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "erd-core");
    }
}
