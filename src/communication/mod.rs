// src/communication/mod.rs
//! Result sinks for per-trial ERD output
//!
//! A session publishes every computed trial to one [`Sink`], chosen when the
//! session is built. Sink failures are reported to the caller, which logs
//! them and keeps processing.

pub mod tcp;

use crossbeam::channel::Sender;
use serde::Serialize;

use crate::erd::{ErdMethod, ErdOutput};
use crate::error::{CommunicationProtocol, ErdErrorBuilder, ErdResult};

pub use tcp::TcpBroadcaster;

/// Per-trial ERD result as sent to downstream consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialResult {
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    pub marker_description: String,
    pub stream_position: u64,
    pub method: String,
    /// Number, per-channel object, or `null` when no value could be computed
    pub erd_value: Option<ErdOutput>,
    pub channel_names: Vec<String>,
}

impl TrialResult {
    pub fn new(
        timestamp: f64,
        marker_description: impl Into<String>,
        stream_position: u64,
        method: ErdMethod,
        erd_value: Option<ErdOutput>,
        channel_names: Vec<String>,
    ) -> Self {
        Self {
            timestamp,
            marker_description: marker_description.into(),
            stream_position,
            method: method.to_string(),
            erd_value,
            channel_names,
        }
    }

    /// One newline-terminated JSON document
    pub fn to_json_line(&self) -> ErdResult<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Destination for trial results
pub trait ResultSink: Send {
    fn publish(&mut self, result: &TrialResult) -> ErdResult<()>;

    fn close(&mut self) -> ErdResult<()>;
}

/// The sink variants a session can publish to
pub enum Sink {
    Tcp(TcpBroadcaster),
    /// Hand-off to a consumer thread
    Channel(Sender<TrialResult>),
    /// Discard everything
    Null,
}

impl ResultSink for Sink {
    fn publish(&mut self, result: &TrialResult) -> ErdResult<()> {
        match self {
            Sink::Tcp(broadcaster) => broadcaster.publish(result),
            Sink::Channel(sender) => sender.send(result.clone()).map_err(|_| {
                ErdErrorBuilder::new("channel_sink", "publish")
                    .communication(CommunicationProtocol::Channel, "Receiver dropped")
            }),
            Sink::Null => Ok(()),
        }
    }

    fn close(&mut self) -> ErdResult<()> {
        match self {
            Sink::Tcp(broadcaster) => broadcaster.close(),
            Sink::Channel(_) | Sink::Null => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::erd::ChannelErd;
    use crossbeam::channel::unbounded;

    fn result(erd_value: Option<ErdOutput>) -> TrialResult {
        TrialResult::new(
            1_700_000_000.5,
            "S  1",
            1234,
            ErdMethod::Bandpass,
            erd_value,
            vec!["C3".into(), "C4".into()],
        )
    }

    #[test]
    fn test_json_line_shape() {
        let line = result(Some(ErdOutput::Mean(-25.0))).to_json_line().unwrap();
        assert!(line.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(value["marker_description"], "S  1");
        assert_eq!(value["stream_position"], 1234);
        assert_eq!(value["method"], "bandpass");
        assert_eq!(value["erd_value"], -25.0);

        let missing: serde_json::Value = serde_json::from_str(&result(None).to_json_line().unwrap()).unwrap();
        assert!(missing["erd_value"].is_null());

        let channels = ErdOutput::PerChannel(ChannelErd::new(vec!["C3".into()], vec![-3.0]));
        let per_channel: serde_json::Value =
            serde_json::from_str(&result(Some(channels)).to_json_line().unwrap()).unwrap();
        assert_eq!(per_channel["erd_value"]["C3"], -3.0);
    }

    #[test]
    fn test_channel_sink() {
        let (tx, rx) = unbounded();
        let mut sink = Sink::Channel(tx);
        sink.publish(&result(None)).unwrap();
        assert_eq!(rx.try_recv().unwrap().stream_position, 1234);

        drop(rx);
        let err = sink.publish(&result(None)).unwrap_err();
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_null_sink() {
        let mut sink = Sink::Null;
        assert!(sink.publish(&result(None)).is_ok());
        assert!(sink.close().is_ok());
    }
}
