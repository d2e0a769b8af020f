
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use erd_core::acquisition::{Marker, StreamingEpochAssembler};
use erd_core::erd::{CalculatorParams, ErdCalculator, ErdMethod};
use erd_core::processing::{ButterworthBandpass, ReducerKind, WelchEstimator};
use ndarray::Array2;
use std::f64::consts::PI;

const SAMPLING_RATE: f64 = 250.0;
const CHANNEL_COUNTS: &[usize] = &[8, 32, 64];
const CHUNK_SIZES: &[usize] = &[5, 25, 125];

fn epoch(channels: usize, samples: usize) -> Array2<f64> {
    Array2::from_shape_fn((channels, samples), |(ch, t)| {
        let gain = if t < samples / 2 { 1.0 } else { 0.6 };
        gain * (2.0 * PI * 11.0 * t as f64 / SAMPLING_RATE + ch as f64).sin() + 0.1 * ((t * 7 + ch) % 13) as f64
    })
}

fn calculator(channels: usize) -> ErdCalculator {
    ErdCalculator::new(CalculatorParams {
        sampling_rate: SAMPLING_RATE,
        pre_seconds: 2.0,
        post_seconds: 2.0,
        low_cutoff_hz: 8.0,
        high_cutoff_hz: 30.0,
        filter_order: 5,
        welch_segment_length: 256,
        channel_names: (0..channels).map(|i| format!("Ch{}", i)).collect(),
        focus_indices: (0..channels.min(4)).collect(),
    })
    .unwrap()
}

fn benchmark_erd_methods(c: &mut Criterion) {
    let mut group = c.benchmark_group("erd_method");
    let methods = [
        ErdMethod::Bandpass,
        ErdMethod::Welch,
        ErdMethod::DbCorrection,
        ErdMethod::MovingAverage {
            window_samples: 75,
            reducer: ReducerKind::Percentage,
        },
    ];

    for &channels in CHANNEL_COUNTS {
        let calculator = calculator(channels);
        let data = epoch(channels, calculator.epoch_len());
        group.throughput(Throughput::Elements(channels as u64));

        for method in methods {
            group.bench_with_input(
                BenchmarkId::new(method.kind().as_str(), format!("{}ch", channels)),
                &data,
                |b, data| b.iter(|| calculator.calculate(black_box(data.view()), method, true)),
            );
        }
    }
    group.finish();
}

fn benchmark_filters(c: &mut Criterion) {
    let mut group = c.benchmark_group("spectral");
    let signal: Vec<f64> = epoch(1, 1000).row(0).to_vec();

    let filter = ButterworthBandpass::design(5, 8.0, 30.0, SAMPLING_RATE).unwrap();
    group.bench_function("filtfilt_1000", |b| b.iter(|| filter.filtfilt(black_box(&signal))));

    let welch = WelchEstimator::new(256);
    group.bench_function("welch_psd_500", |b| {
        b.iter(|| welch.psd(black_box(&signal[..500]), SAMPLING_RATE))
    });
    group.finish();
}

fn benchmark_assembler(c: &mut Criterion) {
    let mut group = c.benchmark_group("assembler");

    for &chunk in CHUNK_SIZES {
        group.throughput(Throughput::Elements(chunk as u64));
        group.bench_with_input(BenchmarkId::new("push_chunk", format!("32ch_{}", chunk)), &chunk, |b, &chunk| {
            let mut assembler = StreamingEpochAssembler::new(32, 2500, 500, 500, &["S  1"]).unwrap();
            let data = Array2::<f64>::zeros((32, chunk));
            let marker = [Marker::stimulus(0, "S  1")];
            let mut pushed = 0usize;
            b.iter(|| {
                // A marker roughly every six seconds of stream
                let markers: &[Marker] = if pushed % 1500 < chunk { &marker } else { &[] };
                pushed += chunk;
                assembler.push_chunk(black_box(data.view()), markers)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_erd_methods, benchmark_filters, benchmark_assembler);
criterion_main!(benches);
