// tests/live_session_tests.rs
//! Live sessions end to end: RDA over a local socket, simulator, TCP broadcast

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::unbounded;
use erd_core::communication::{Sink, TcpBroadcaster, TrialResult};
use erd_core::config::SystemConfig;
use erd_core::hal::rda::{encode_data32, encode_start, encode_stop};
use erd_core::hal::{ChunkPoll, ChunkSource, DataSource, EegSimulator, RdaClient, SimulatorConfig};
use erd_core::session::LiveSession;
use erd_core::summary::StimulusCategory;

fn simulator(seconds: f64) -> EegSimulator {
    EegSimulator::new(SimulatorConfig {
        duration_seconds: Some(seconds),
        chunk_samples: 25,
        ..SimulatorConfig::default()
    })
    .unwrap()
}

/// Serve one client with the simulator's stream encoded as RDA messages
fn spawn_recorder(seconds: f64) -> (String, thread::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut source = simulator(seconds);
        let info = source.connect().unwrap();
        stream.write_all(&encode_start(&info).unwrap()).unwrap();
        let mut block = 0;
        while let ChunkPoll::Data(chunk) = source.next_chunk().unwrap() {
            let message = encode_data32(block, chunk.data.view(), &chunk.markers, &info.resolutions).unwrap();
            stream.write_all(&message).unwrap();
            block += 1;
        }
        stream.write_all(&encode_stop().unwrap()).unwrap();
    });
    (address, handle)
}

#[test]
fn test_rda_stream_produces_trials() {
    let (address, recorder) = spawn_recorder(22.0);
    let mut config = SystemConfig::default();
    config.live.receiver_address = address.clone();

    let source = DataSource::from(RdaClient::new(address, Duration::from_millis(500)));
    let (tx, rx) = unbounded();
    let mut session = LiveSession::connect(&config, source, Sink::Channel(tx)).unwrap();
    assert_eq!(session.stream_info().channel_names.len(), 10);

    let report = session.run(&AtomicBool::new(false)).unwrap();
    recorder.join().unwrap();

    // Stimuli at 3, 9 and 15 s are complete; 21 s is not
    assert_eq!(report.processed, 3);
    assert_eq!(report.failed, 0);
    let results: Vec<TrialResult> = rx.try_iter().collect();
    let positions: Vec<u64> = results.iter().map(|r| r.stream_position).collect();
    assert_eq!(positions, [750, 2250, 3750]);
    assert!(results.iter().all(|r| r.method == "bandpass"));
    assert!(report.trials.iter().all(|t| t.category == Some(StimulusCategory::NormalFinger)));
}

#[test]
fn test_rest_and_imagery_separate_in_simulated_session() {
    // Seven trials cover codes 1..=7, the last being rest
    let mut session =
        LiveSession::connect(&SystemConfig::default(), DataSource::from(simulator(46.0)), Sink::Null).unwrap();
    let report = session.run(&AtomicBool::new(false)).unwrap();

    assert_eq!(report.trials.len(), 7);
    for trial in &report.trials {
        let value = trial.erd["bandpass"].unwrap();
        if trial.category == Some(StimulusCategory::Rest) {
            assert!(value > 0.0, "rest gave {}", value);
        } else {
            assert!(value < 0.0, "{} gave {}", trial.description, value);
        }
    }
    assert_eq!(report.pruned, 0);
}

#[test]
fn test_results_are_broadcast_as_json_lines() {
    let broadcaster = TcpBroadcaster::bind("127.0.0.1:0").unwrap();
    let client = TcpStream::connect(broadcaster.local_addr()).unwrap();
    client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while broadcaster.client_count() == 0 {
        assert!(Instant::now() < deadline, "broadcast client never registered");
        thread::sleep(Duration::from_millis(10));
    }

    let mut session = LiveSession::connect(
        &SystemConfig::default(),
        DataSource::from(simulator(16.0)),
        Sink::Tcp(broadcaster),
    )
    .unwrap();
    let report = session.run(&AtomicBool::new(false)).unwrap();
    assert_eq!(report.sink_errors, 0);

    // Closing the sink drops the client, so the reader sees end of stream
    let lines: Vec<String> = BufReader::new(client).lines().map(|l| l.unwrap()).collect();
    assert_eq!(lines.len(), 2);
    let first: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(first["marker_description"], "S  1");
    assert_eq!(first["stream_position"], 750);
    assert!(first["erd_value"].as_f64().unwrap() < 0.0);
    assert_eq!(first["channel_names"].as_array().unwrap().len(), 10);
}

#[test]
fn test_unreachable_receiver_is_reported() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);

    let source = DataSource::from(RdaClient::new(address, Duration::from_millis(200)));
    let err = LiveSession::connect(&SystemConfig::default(), source, Sink::Null).err().unwrap();
    assert!(!err.is_fatal());
}
