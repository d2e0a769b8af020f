// src/error.rs
//! Unified error handling for ERD Core
//!
//! Every fallible operation in the crate returns [`ErdResult`]. The variants split
//! into two families:
//!
//! - fatal configuration errors ([`ErdError::is_fatal`]) that halt a run: unknown
//!   method names, impossible moving-average windows, Welch bands without bins,
//!   cutoffs at or above Nyquist;
//! - data, protocol and transport errors that the live and offline sessions log
//!   and survive.
//!
//! Per-epoch soft failures (shape mismatch, out-of-bounds epochs, pruned markers)
//! are not errors at all. They surface as `Ok(None)` plus a `warn!` line.

use std::collections::HashMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the ERD engine
#[derive(Debug, Error)]
pub enum ErdError {
    /// Invalid or inconsistent configuration
    #[error("[CONFIG] Configuration error in {}: {reason} ({})", .context.component, .context.operation)]
    Configuration {
        reason: String,
        context: ErrorContext,
    },

    /// ERD method name that does not map to a known estimator
    #[error("[CONFIG] Unknown ERD method '{name}' (expected one of: {expected})")]
    UnknownMethod { name: String, expected: String },

    /// Welch band that does not contain a single resolvable PSD bin
    #[error("[CONFIG] Frequency band {low}-{high} Hz has no PSD bins at {resolution:.3} Hz resolution")]
    EmptyFrequencyBand { low: f64, high: f64, resolution: f64 },

    /// Malformed samples, chunks or recordings
    #[error("[DATA] Invalid {data_type}: {reason} ({})", .context.operation)]
    InvalidData {
        data_type: String,
        reason: String,
        context: ErrorContext,
    },

    /// Wire-format violation on a streaming source
    #[error("[PROTOCOL] {reason} ({})", .context.operation)]
    Protocol { reason: String, context: ErrorContext },

    /// Receiver or broadcaster failure
    #[error("[COMM] {protocol:?} error: {reason} ({})", .context.operation)]
    Communication {
        protocol: CommunicationProtocol,
        reason: String,
        context: ErrorContext,
    },

    /// Underlying I/O failure
    #[error("[IO] {source} ({}::{})", .context.component, .context.operation)]
    Io {
        #[source]
        source: std::io::Error,
        context: ErrorContext,
    },

    /// Encoding or decoding of TOML/JSON documents
    #[error("[SERDE] {reason} ({})", .context.operation)]
    Serialization { reason: String, context: ErrorContext },
}

/// Transports that can fail at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommunicationProtocol {
    /// BrainVision Remote Data Access receiver
    Rda,
    /// Newline-delimited JSON result broadcaster
    Tcp,
    /// In-process channel hand-off
    Channel,
}

/// Error context for debugging and analysis
#[derive(Debug, Clone, Serialize)]
pub struct ErrorContext {
    pub timestamp: SystemTime,
    pub component: String,
    pub operation: String,
    pub file: Option<&'static str>,
    pub line: Option<u32>,
    pub additional_info: HashMap<String, String>,
}

impl ErrorContext {
    /// Create a new error context
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            timestamp: SystemTime::now(),
            component: component.to_string(),
            operation: operation.to_string(),
            file: None,
            line: None,
            additional_info: HashMap::new(),
        }
    }

    /// Create error context with file and line information
    pub fn with_location(component: &str, operation: &str, file: &'static str, line: u32) -> Self {
        let mut context = Self::new(component, operation);
        context.file = Some(file);
        context.line = Some(line);
        context
    }

    /// Add additional information to the context
    pub fn add_info<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.additional_info.insert(key.into(), value.into());
        self
    }
}

/// Macro for creating error context with file and line info
#[macro_export]
macro_rules! error_context {
    ($component:expr, $operation:expr) => {
        $crate::error::ErrorContext::with_location($component, $operation, file!(), line!())
    };
}

impl ErdError {
    /// Configuration-class errors halt a run; everything else is survivable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ErdError::Configuration { .. }
                | ErdError::UnknownMethod { .. }
                | ErdError::EmptyFrequencyBand { .. }
        )
    }

    /// Component the error originated from, if recorded
    pub fn component(&self) -> Option<&str> {
        match self {
            ErdError::Configuration { context, .. }
            | ErdError::InvalidData { context, .. }
            | ErdError::Protocol { context, .. }
            | ErdError::Communication { context, .. }
            | ErdError::Io { context, .. }
            | ErdError::Serialization { context, .. } => Some(&context.component),
            ErdError::UnknownMethod { .. } | ErdError::EmptyFrequencyBand { .. } => None,
        }
    }
}

impl From<std::io::Error> for ErdError {
    fn from(source: std::io::Error) -> Self {
        ErdError::Io {
            source,
            context: error_context!("io", "unspecified"),
        }
    }
}

impl From<serde_json::Error> for ErdError {
    fn from(err: serde_json::Error) -> Self {
        ErdError::Serialization {
            reason: err.to_string(),
            context: error_context!("serde_json", "encode_or_decode"),
        }
    }
}

impl From<toml::de::Error> for ErdError {
    fn from(err: toml::de::Error) -> Self {
        ErdError::Serialization {
            reason: err.to_string(),
            context: error_context!("toml", "deserialize"),
        }
    }
}

impl From<toml::ser::Error> for ErdError {
    fn from(err: toml::ser::Error) -> Self {
        ErdError::Serialization {
            reason: err.to_string(),
            context: error_context!("toml", "serialize"),
        }
    }
}

impl From<config::ConfigError> for ErdError {
    fn from(err: config::ConfigError) -> Self {
        ErdError::Configuration {
            reason: err.to_string(),
            context: error_context!("config_loader", "layered_load"),
        }
    }
}

/// Result type alias for ERD operations
pub type ErdResult<T> = Result<T, ErdError>;

/// Error builder for convenient error construction
pub struct ErdErrorBuilder {
    component: String,
    operation: String,
}

impl ErdErrorBuilder {
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            component: component.to_string(),
            operation: operation.to_string(),
        }
    }

    fn context(&self) -> ErrorContext {
        ErrorContext::new(&self.component, &self.operation)
    }

    pub fn configuration(self, reason: impl Into<String>) -> ErdError {
        ErdError::Configuration {
            reason: reason.into(),
            context: self.context(),
        }
    }

    pub fn invalid_data(self, data_type: &str, reason: impl Into<String>) -> ErdError {
        ErdError::InvalidData {
            data_type: data_type.to_string(),
            reason: reason.into(),
            context: self.context(),
        }
    }

    pub fn protocol(self, reason: impl Into<String>) -> ErdError {
        ErdError::Protocol {
            reason: reason.into(),
            context: self.context(),
        }
    }

    pub fn communication(self, protocol: CommunicationProtocol, reason: impl Into<String>) -> ErdError {
        ErdError::Communication {
            protocol,
            reason: reason.into(),
            context: self.context(),
        }
    }

    pub fn io(self, source: std::io::Error) -> ErdError {
        ErdError::Io {
            source,
            context: self.context(),
        }
    }
}

/// Attach component/operation context to I/O results
pub trait IntoErdError<T> {
    fn erd_err(self, component: &str, operation: &str) -> ErdResult<T>;
}

impl<T> IntoErdError<T> for Result<T, std::io::Error> {
    fn erd_err(self, component: &str, operation: &str) -> ErdResult<T> {
        self.map_err(|err| ErdErrorBuilder::new(component, operation).io(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_context_creation() {
        let context = ErrorContext::new("assembler", "push_chunk").add_info("marker", "S  1");
        assert_eq!(context.component, "assembler");
        assert_eq!(context.operation, "push_chunk");
        assert_eq!(context.additional_info.get("marker").map(String::as_str), Some("S  1"));
        assert!(context.timestamp <= SystemTime::now());
    }

    #[test]
    fn test_error_builder() {
        let err = ErdErrorBuilder::new("calculator", "moving_average").configuration("window too large");

        match &err {
            ErdError::Configuration { reason, context } => {
                assert_eq!(reason, "window too large");
                assert_eq!(context.component, "calculator");
            }
            _ => panic!("Expected configuration error"),
        }
        assert!(err.is_fatal());
        assert_eq!(err.component(), Some("calculator"));
    }

    #[test]
    fn test_error_display() {
        let err = ErdError::EmptyFrequencyBand { low: 8.0, high: 9.0, resolution: 1.953125 };
        let display = err.to_string();
        assert!(display.contains("8-9 Hz"));
        assert!(display.contains("1.953"));

        let err = ErdErrorBuilder::new("rda", "read_header").protocol("bad message size");
        assert!(err.to_string().contains("bad message size"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_error_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ErdError>();
    }

    #[test]
    fn test_io_conversion_keeps_source() {
        let result: Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "missing.vhdr"));
        let err = result.erd_err("brainvision", "read_header").unwrap_err();

        assert_eq!(err.component(), Some("brainvision"));
        assert!(err.source().is_some());
        assert!(err.to_string().contains("missing.vhdr"));
    }

    #[test]
    fn test_error_context_macro_records_location() {
        let context = error_context!("summary", "dynamic_boundary");
        assert!(context.file.is_some());
        assert!(context.line.is_some());
    }
}
