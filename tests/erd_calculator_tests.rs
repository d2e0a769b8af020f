// tests/erd_calculator_tests.rs
//! ERD calculator behaviour through the public API

use std::f64::consts::PI;

use erd_core::erd::{CalculatorParams, ErdCalculator, ErdMethod};
use erd_core::processing::{PowerEstimator, ReducerKind};
use ndarray::Array2;
use proptest::prelude::*;

fn params(channels: usize, focus: Vec<usize>) -> CalculatorParams {
    CalculatorParams {
        sampling_rate: 250.0,
        pre_seconds: 2.0,
        post_seconds: 2.0,
        low_cutoff_hz: 8.0,
        high_cutoff_hz: 30.0,
        filter_order: 5,
        welch_segment_length: 256,
        channel_names: (0..channels).map(|i| format!("Ch{}", i)).collect(),
        focus_indices: focus,
    }
}

/// 12 Hz tone scaled by `activation_gain` from the marker sample on.
/// 500 samples hold exactly 24 cycles, so both windows start in phase.
fn epoch(channels: usize, activation_gain: f64) -> Array2<f64> {
    Array2::from_shape_fn((channels, 1000), |(ch, t)| {
        let gain = if t < 500 { 1.0 } else { activation_gain };
        let phase = 2.0 * PI * ch as f64 / channels as f64;
        gain * (2.0 * PI * 12.0 * t as f64 / 250.0 + phase).sin()
    })
}

#[test]
fn test_epoch_of_wrong_length_is_skipped_by_every_method() {
    let calculator = ErdCalculator::new(params(4, vec![0, 1])).unwrap();
    assert_eq!(calculator.epoch_len(), 1000);

    let short = Array2::<f64>::zeros((4, 999));
    let methods = [
        ErdMethod::Bandpass,
        ErdMethod::Welch,
        ErdMethod::DbCorrection,
        ErdMethod::MovingAverage {
            window_samples: 75,
            reducer: ReducerKind::Percentage,
        },
    ];
    for method in methods {
        assert_eq!(calculator.calculate(short.view(), method, true).unwrap(), None, "{}", method);
        assert_eq!(calculator.calculate(short.view(), method, false).unwrap(), None, "{}", method);
    }
}

#[test]
fn test_half_power_gives_minus_fifty_percent() {
    let calculator = ErdCalculator::new(params(4, vec![0, 1])).unwrap();
    let data = epoch(4, 0.5f64.sqrt());

    let output = calculator.calculate_erd_from_welch(data.view(), false).unwrap().unwrap();
    for (name, value) in output.as_channels().unwrap().iter() {
        assert!((value + 50.0).abs() < 1e-6, "{} gave {}", name, value);
    }
    let mean = calculator.calculate_erd_from_welch(data.view(), true).unwrap().unwrap();
    assert!((mean.as_mean().unwrap() + 50.0).abs() < 1e-6);

    // Filter edges smear the step slightly
    let bandpass = calculator
        .calculate_erd_from_bandpass(data.view(), true)
        .unwrap()
        .and_then(|o| o.as_mean())
        .unwrap();
    assert!((bandpass + 50.0).abs() < 12.0, "bandpass gave {}", bandpass);
}

#[test]
fn test_half_power_in_decibels() {
    assert!((ReducerKind::Decibel.reduce(2.0, 1.0) + 3.0103).abs() < 1e-3);

    let calculator = ErdCalculator::new(params(4, vec![0, 1])).unwrap();
    let data = epoch(4, 0.5f64.sqrt());
    let db = calculator
        .calculate_erd_from_db_correction(data.view(), true)
        .unwrap()
        .and_then(|o| o.as_mean())
        .unwrap();
    assert!((db + 3.01).abs() < 1.0, "db correction gave {}", db);
}

#[test]
fn test_half_power_rows_per_channel() {
    // Whole periods on both sides, so squared amplitude is exact per channel
    let data = epoch(4, 0.5f64.sqrt());
    for (ch, row) in data.outer_iter().enumerate() {
        let (baseline, activation) = row.split_at(ndarray::Axis(0), 500);
        let percent = PowerEstimator::SquaredAmplitude
            .channel_erd(baseline, activation, ReducerKind::Percentage, 250.0)
            .unwrap();
        let db = PowerEstimator::SquaredAmplitude
            .channel_erd(baseline, activation, ReducerKind::Decibel, 250.0)
            .unwrap();
        assert!((percent + 50.0).abs() < 1e-9, "channel {} gave {}%", ch, percent);
        assert!((db + 3.0103).abs() < 1e-3, "channel {} gave {} dB", ch, db);
    }
}

#[test]
fn test_filtered_paths_stay_near_half_power_on_every_channel() {
    let calculator = ErdCalculator::new(params(4, vec![0, 1])).unwrap();
    let data = epoch(4, 0.5f64.sqrt());

    let bandpass = calculator.calculate_erd_from_bandpass(data.view(), false).unwrap().unwrap();
    for (name, value) in bandpass.as_channels().unwrap().iter() {
        assert!((value + 50.0).abs() < 12.0, "{} gave {}%", name, value);
    }
    let db = calculator.calculate_erd_from_db_correction(data.view(), false).unwrap().unwrap();
    for (name, value) in db.as_channels().unwrap().iter() {
        assert!((value + 3.01).abs() < 1.0, "{} gave {} dB", name, value);
    }
}

#[test]
fn test_nan_focus_channel_is_left_out_of_the_mean() {
    let calculator = ErdCalculator::new(params(4, vec![0, 1])).unwrap();
    let mut data = epoch(4, 0.5f64.sqrt());
    data.row_mut(0).fill(f64::NAN);

    let mean = calculator
        .calculate_erd_from_welch(data.view(), true)
        .unwrap()
        .and_then(|o| o.as_mean())
        .unwrap();
    assert!((mean + 50.0).abs() < 1e-6);

    let channels = calculator.calculate_erd_from_welch(data.view(), false).unwrap().unwrap();
    assert!(channels.as_channels().unwrap().get("Ch0").unwrap().is_nan());
}

#[test]
fn test_all_focus_channels_nan_gives_none() {
    let calculator = ErdCalculator::new(params(4, vec![0, 1])).unwrap();
    let mut data = epoch(4, 0.5);
    data.row_mut(0).fill(f64::NAN);
    data.row_mut(1).fill(f64::NAN);
    assert_eq!(calculator.calculate_erd_from_welch(data.view(), true).unwrap(), None);
}

#[test]
fn test_welch_band_without_bins_is_fatal() {
    let mut narrow = params(4, vec![0]);
    narrow.low_cutoff_hz = 10.1;
    narrow.high_cutoff_hz = 10.2;
    let calculator = ErdCalculator::new(narrow).unwrap();
    let err = calculator.validate_method(ErdMethod::Welch).unwrap_err();
    assert!(err.is_fatal());
    assert!(calculator.validate_method(ErdMethod::Bandpass).is_ok());
}

#[test]
fn test_moving_average_tracks_attenuation() {
    let calculator = ErdCalculator::new(params(4, vec![0, 1])).unwrap();
    let data = epoch(4, 0.5);
    for reducer in [ReducerKind::Percentage, ReducerKind::Decibel] {
        let value = calculator
            .calculate_erd_moving_average(data.view(), 75, true, reducer)
            .unwrap()
            .and_then(|o| o.as_mean())
            .unwrap();
        assert!(value < 0.0, "{:?} gave {}", reducer, value);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_welch_erd_follows_amplitude_ratio(gain in 0.1f64..2.0) {
        let calculator = ErdCalculator::new(params(3, vec![0, 1, 2])).unwrap();
        let data = epoch(3, gain);
        let erd = calculator
            .calculate(data.view(), ErdMethod::Welch, true)
            .unwrap()
            .and_then(|o| o.as_mean())
            .unwrap();
        let expected = (gain * gain - 1.0) * 100.0;
        prop_assert!((erd - expected).abs() < 1e-6 * expected.abs().max(1.0));
    }

    #[test]
    fn prop_percentage_sign_matches_power_change(pre in 0.01f64..1e3, post in 0.01f64..1e3) {
        let erd = ReducerKind::Percentage.reduce(pre, post);
        prop_assert_eq!(erd < 0.0, post < pre);
        prop_assert!(erd > -100.0);
    }
}
