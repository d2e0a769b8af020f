// tests/error_propagation_tests.rs
//! Error classification across layers
//!
//! Configuration-class errors must stop a run before any data is processed.
//! Data, protocol and transport errors stay recoverable.

use erd_core::acquisition::{Marker, StreamingEpochAssembler};
use erd_core::communication::{ResultSink, Sink, TrialResult};
use erd_core::config::{ConfigLoader, SystemConfig};
use erd_core::erd::{ChannelLayout, ErdMethod, ErdMethodKind};
use erd_core::error::{CommunicationProtocol, ErdError};
use erd_core::hal::rda::encode_start;
use erd_core::hal::{DataSource, EegSimulator, RdaDecoder, RdaMessage, SimulatorConfig, StreamInfo};
use erd_core::session::LiveSession;
use ndarray::Array2;

fn simulator() -> DataSource {
    DataSource::from(
        EegSimulator::new(SimulatorConfig {
            duration_seconds: Some(5.0),
            ..SimulatorConfig::default()
        })
        .unwrap(),
    )
}

#[test]
fn test_unknown_method_name() {
    let err = "wavelet".parse::<ErdMethodKind>().unwrap_err();
    assert!(err.is_fatal());
    match &err {
        ErdError::UnknownMethod { name, expected } => {
            assert_eq!(name, "wavelet");
            assert!(expected.contains("moving_average"));
        }
        other => panic!("Expected unknown method, got {:?}", other),
    }
    assert!(err.to_string().contains("[CONFIG]"));
}

#[test]
fn test_invalid_configuration_document() {
    let err = ConfigLoader::load_from_str("[epoch]\npre_seconds = -1.0\n").unwrap_err();
    assert!(err.is_fatal());
    assert!(err.to_string().contains("pre_seconds"));

    let err = ConfigLoader::load_from_str("[erd]\nmethod = \"wavelet\"\n").unwrap_err();
    assert!(matches!(err, ErdError::Serialization { .. }));

    let config = ConfigLoader::load_from_str("[erd]\nmethod = \"welch\"\n").unwrap();
    assert_eq!(config.erd.method(), ErdMethod::Welch);
}

#[test]
fn test_unknown_focus_channel_stops_session() {
    let mut config = SystemConfig::default();
    config.channels.focus = vec!["C3".to_string(), "Oz".to_string()];
    let err = LiveSession::connect(&config, simulator(), Sink::Null).err().unwrap();
    assert!(err.is_fatal());
    assert!(err.to_string().contains("Oz"));

    let err = ChannelLayout::resolve(&["C3", "C4"], &["C3"], &["C3"]).unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn test_welch_band_without_bins_stops_session() {
    let mut config = SystemConfig::default();
    config.erd.method = ErdMethodKind::Welch;
    config.filter.low_cutoff_hz = 10.1;
    config.filter.high_cutoff_hz = 10.2;
    let err = LiveSession::connect(&config, simulator(), Sink::Null).err().unwrap();
    assert!(matches!(err, ErdError::EmptyFrequencyBand { .. }));
}

#[test]
fn test_oversized_moving_average_window_stops_session() {
    let mut config = SystemConfig::default();
    config.erd.method = ErdMethodKind::MovingAverage;
    config.erd.moving_average_window = 501;
    let err = LiveSession::connect(&config, simulator(), Sink::Null).err().unwrap();
    assert!(err.is_fatal());
}

#[test]
fn test_malformed_chunk_is_recoverable() {
    let mut assembler = StreamingEpochAssembler::new(3, 100, 10, 10, &["S  1"]).unwrap();
    let err = assembler
        .push_chunk(Array2::zeros((2, 5)).view(), &[Marker::stimulus(0, "S  1")])
        .unwrap_err();
    assert!(matches!(err, ErdError::InvalidData { .. }));
    assert!(!err.is_fatal());
    assert!(assembler.pending().is_empty());

    // The assembler keeps working afterwards
    assert!(assembler.push_chunk(Array2::zeros((3, 5)).view(), &[]).is_ok());
}

#[test]
fn test_protocol_errors_are_recoverable() {
    let info = StreamInfo {
        channel_names: vec!["C3".into(), "C4".into()],
        sampling_rate: 500.0,
        resolutions: vec![0.1, 0.1],
    };
    let mut message = encode_start(&info).unwrap();
    // Keep the channel count, interval and only one of two resolutions
    message.truncate(24 + 4 + 8 + 8);
    let size = message.len() as u32;
    message[16..20].copy_from_slice(&size.to_le_bytes());

    let mut decoder = RdaDecoder::new();
    decoder.feed(&message);
    let err = decoder.next_message().unwrap_err();
    assert!(matches!(err, ErdError::Protocol { .. }));
    assert!(!err.is_fatal());

    // Decoding resumes with the next message
    decoder.feed(&encode_start(&info).unwrap());
    assert!(matches!(decoder.next_message().unwrap(), Some(RdaMessage::Start(_))));
}

#[test]
fn test_dropped_channel_consumer_is_a_communication_error() {
    let (tx, rx) = crossbeam::channel::unbounded();
    drop(rx);
    let mut sink = Sink::Channel(tx);
    let result = TrialResult::new(0.0, "S  1", 0, ErdMethod::Bandpass, None, Vec::new());
    match sink.publish(&result).unwrap_err() {
        ErdError::Communication { protocol, .. } => assert_eq!(protocol, CommunicationProtocol::Channel),
        other => panic!("Expected communication error, got {:?}", other),
    }
}
