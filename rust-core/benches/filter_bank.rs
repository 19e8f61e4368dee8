//! Criterion benchmarks for the playback hot path
//!
//! Measures:
//! - Filter bank throughput with 0 to 4 filters in the cascade
//! - Tap count sensitivity
//! - Coefficient design cost
//! - Spectrum analyzer block throughput

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use spectral_edit::filters::{design_fir, FilterBand, FilterBank, FilterBankConfig, FilterKind, WindowType};
use spectral_edit::spectrum::{AnalyzerConfig, SpectrumAnalyzer};
use std::f32::consts::PI;

const SAMPLE_RATE: f64 = 44100.0;

fn generate_test_buffer(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            0.5 * (2.0 * PI * 440.0 * t).sin() + 0.25 * (2.0 * PI * 5000.0 * t).sin()
        })
        .collect()
}

fn bank_with(active: usize, taps: usize) -> FilterBank {
    let mut bank = FilterBank::new(
        FilterBankConfig {
            taps,
            window: WindowType::Blackman,
        },
        SAMPLE_RATE,
    );
    bank.set_bandpass(100.0, 15000.0);
    bank.set_bandstop(2000.0, 3000.0);
    bank.set_highpass(80.0);
    bank.set_lowpass(12000.0);

    let order = [FilterKind::LowPass, FilterKind::HighPass, FilterKind::BandStop, FilterKind::BandPass];
    for kind in order.iter().take(active) {
        bank.set_enabled(*kind, true);
    }
    bank
}

/// Per-sample cascade cost, as run inside the device callback
fn bench_cascade(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_bank_cascade");

    for active in [0usize, 1, 2, 4].iter() {
        let mut bank = bank_with(*active, 257);
        let mut buffer = generate_test_buffer(512);

        group.bench_with_input(BenchmarkId::from_parameter(active), active, |b, _| {
            b.iter(|| {
                for sample in buffer.iter_mut() {
                    *sample = bank.process_sample(black_box(*sample));
                }
                black_box(&mut buffer)
            })
        });
    }

    group.finish();
}

fn bench_tap_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_taps");

    for taps in [63usize, 127, 257, 511].iter() {
        let mut bank = bank_with(1, *taps);
        let mut buffer = generate_test_buffer(512);

        group.bench_with_input(BenchmarkId::from_parameter(taps), taps, |b, _| {
            b.iter(|| {
                bank.process_block_inplace(black_box(&mut buffer));
                black_box(&mut buffer)
            })
        });
    }

    group.finish();
}

/// Regeneration cost paid on the control thread for each cutoff change
fn bench_design(c: &mut Criterion) {
    c.bench_function("design_bandpass_257", |b| {
        b.iter(|| {
            design_fir(
                black_box(FilterBand::BandPass { low: 2000.0, high: 6000.0 }),
                SAMPLE_RATE,
                257,
                WindowType::Blackman,
            )
        })
    });
}

fn bench_analyzer(c: &mut Criterion) {
    let mut group = c.benchmark_group("spectrum_analyzer");

    for fft_size in [512usize, 1024, 2048].iter() {
        let mut analyzer = SpectrumAnalyzer::new(AnalyzerConfig { fft_size: *fft_size });
        let buffer = generate_test_buffer(*fft_size);

        group.bench_with_input(BenchmarkId::from_parameter(fft_size), fft_size, |b, _| {
            b.iter(|| {
                for &sample in &buffer {
                    black_box(analyzer.add_sample(sample));
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_cascade, bench_tap_count, bench_design, bench_analyzer);
criterion_main!(benches);
