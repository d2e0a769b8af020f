// tests/streaming_assembler_tests.rs
//! Streaming epoch assembly across chunk boundaries and buffer wraparound

use erd_core::acquisition::{CircularSampleBuffer, Marker, RingBufferError, StreamingEpochAssembler};
use ndarray::Array2;

const FOCUS: [&str; 2] = ["S  1", "S  2"];

/// Chunk whose every sample holds its absolute stream position (channel 1 negated)
fn ramp(start: u64, samples: usize) -> Array2<f64> {
    Array2::from_shape_fn((2, samples), |(ch, t)| {
        let value = (start + t as u64) as f64;
        if ch == 0 {
            value
        } else {
            -value
        }
    })
}

#[test]
fn test_marker_waits_until_epoch_is_complete() {
    let mut assembler = StreamingEpochAssembler::new(2, 100, 10, 10, &FOCUS).unwrap();

    let report = assembler.push_chunk(ramp(0, 20).view(), &[Marker::stimulus(15, "S  1")]).unwrap();
    assert_eq!(report.registered, 1);
    assert!(report.epochs.is_empty());
    assert_eq!(assembler.pending().len(), 1);
    assert_eq!(assembler.pending()[0].stream_position, 15);

    // 25 streamed: the epoch end (25) is not yet strictly behind the write head
    let report = assembler.push_chunk(ramp(20, 5).view(), &[]).unwrap();
    assert!(report.epochs.is_empty());
    assert_eq!(assembler.pending().len(), 1);

    let report = assembler.push_chunk(ramp(25, 1).view(), &[]).unwrap();
    assert_eq!(report.epochs.len(), 1);
    assert!(assembler.pending().is_empty());

    let epoch = &report.epochs[0];
    assert_eq!(epoch.marker.description, "S  1");
    assert_eq!(epoch.data.dim(), (2, 20));
    assert_eq!(epoch.data[[0, 0]], 5.0);
    // Marker sample opens the activation window
    assert_eq!(epoch.data[[0, 10]], 15.0);
    assert_eq!(epoch.data[[1, 19]], -24.0);

    for start in [26, 36, 46] {
        let report = assembler.push_chunk(ramp(start, 10).view(), &[]).unwrap();
        assert!(report.epochs.is_empty());
    }
    assert_eq!(assembler.stats().extracted, 1);
}

#[test]
fn test_unrecoverable_marker_is_pruned() {
    let mut assembler = StreamingEpochAssembler::new(2, 30, 10, 10, &FOCUS).unwrap();

    // Too close to the stream start for a full baseline
    let report = assembler.push_chunk(ramp(0, 10).view(), &[Marker::stimulus(5, "S  2")]).unwrap();
    assert_eq!(report.registered, 1);

    let mut pruned = Vec::new();
    let mut start = 10;
    while start < 60 {
        let report = assembler.push_chunk(ramp(start, 10).view(), &[]).unwrap();
        assert!(report.epochs.is_empty());
        pruned.extend(report.pruned);
        start += 10;
    }

    assert_eq!(pruned.len(), 1);
    assert_eq!(pruned[0].stream_position, 5);
    assert!(assembler.pending().is_empty());
    assert_eq!(assembler.stats().pruned, 1);
}

#[test]
fn test_non_focus_markers_are_ignored() {
    let mut assembler = StreamingEpochAssembler::new(2, 100, 10, 10, &FOCUS).unwrap();
    let markers = [Marker::stimulus(12, "S  9"), Marker::stimulus(14, "S  1")];
    let report = assembler.push_chunk(ramp(0, 20).view(), &markers).unwrap();
    assert_eq!(report.registered, 1);
    assert_eq!(report.ignored, 1);
}

#[test]
fn test_epochs_survive_buffer_wraparound() {
    let (before, after, capacity) = (8, 8, 24);
    let mut assembler = StreamingEpochAssembler::new(2, capacity, before, after, &FOCUS).unwrap();

    let mut extracted = Vec::new();
    let mut start = 0u64;
    for chunk in 0..40u64 {
        let samples = 3 + (chunk % 5) as usize;
        // One marker in every other chunk, at its last sample
        let markers = if chunk % 2 == 0 {
            vec![Marker::stimulus(samples as u64 - 1, "S  1")]
        } else {
            Vec::new()
        };
        let report = assembler.push_chunk(ramp(start, samples).view(), &markers).unwrap();
        extracted.extend(report.epochs);
        start += samples as u64;
    }

    assert!(extracted.len() > 10);
    for epoch in &extracted {
        let position = epoch.marker.stream_position as f64;
        for t in 0..before + after {
            let expected = position - before as f64 + t as f64;
            assert_eq!(epoch.data[[0, t]], expected);
            assert_eq!(epoch.data[[1, t]], -expected);
        }
    }
    assert_eq!(assembler.total_samples_streamed(), start);
    assert_eq!(assembler.oldest_recoverable_position(), start - capacity as u64);
}

#[test]
fn test_buffer_must_exceed_epoch() {
    let err = StreamingEpochAssembler::new(2, 20, 10, 10, &FOCUS).unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn test_ring_buffer_reports_lost_and_future_ranges() {
    let mut buffer = CircularSampleBuffer::new(2, 16).unwrap();
    buffer.push(ramp(0, 40).view()).unwrap();
    assert_eq!(buffer.oldest_position(), 24);

    let tail = buffer.read(30, 10).unwrap();
    assert_eq!(tail[[0, 0]], 30.0);
    assert_eq!(tail[[0, 9]], 39.0);

    assert!(matches!(buffer.read(20, 4), Err(RingBufferError::Overwritten { .. })));
    assert!(matches!(buffer.read(35, 10), Err(RingBufferError::NotYetAvailable { .. })));
    assert!(matches!(buffer.read(24, 17), Err(RingBufferError::TooLong { .. })));
}
