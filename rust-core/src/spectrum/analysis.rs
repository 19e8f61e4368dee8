//! Streaming spectrum analyzer
//!
//! Accumulates rectangular, non-overlapping blocks of `fft_size` samples and
//! publishes a magnitude spectrum each time a block completes. The complex
//! bins of the last transform are kept so they can be edited and turned back
//! into audio.

use super::fft::FftEngine;
use num_complex::Complex;
use serde::{Deserialize, Serialize};

/// Default analysis window length
pub const DEFAULT_FFT_SIZE: usize = 1024;

/// Spectrum analyzer configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Window length W in samples
    pub fft_size: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
        }
    }
}

/// Streaming spectrum analyzer
///
/// Not synchronized; share it behind a `Mutex` and copy frames out under
/// the lock.
#[derive(Debug)]
pub struct SpectrumAnalyzer {
    config: AnalyzerConfig,
    engine: FftEngine,

    /// Samples of the block being accumulated
    window: Vec<f64>,

    /// Number of valid samples in `window`
    sample_count: usize,

    /// Transform input; realfft clobbers it
    fft_input: Vec<f64>,

    /// Complex bins of the last forward transform
    spectrum: Vec<Complex<f64>>,

    /// Inverse transform buffers
    inverse_bins: Vec<Complex<f64>>,
    inverse_output: Vec<f64>,

    /// |X[k]| of the last forward transform
    magnitudes: Vec<f32>,

    ready: bool,
}

impl SpectrumAnalyzer {
    /// Create new spectrum analyzer
    ///
    /// # Panics
    /// If `config.fft_size` is zero
    pub fn new(config: AnalyzerConfig) -> Self {
        assert!(config.fft_size > 0, "fft_size must be non-zero");

        let fft_size = config.fft_size;
        let num_bins = fft_size / 2 + 1;

        Self {
            config,
            engine: FftEngine::new(fft_size),
            window: vec![0.0; fft_size],
            sample_count: 0,
            fft_input: vec![0.0; fft_size],
            spectrum: vec![Complex::new(0.0, 0.0); num_bins],
            inverse_bins: vec![Complex::new(0.0, 0.0); num_bins],
            inverse_output: vec![0.0; fft_size],
            magnitudes: vec![0.0; num_bins],
            ready: false,
        }
    }

    /// Append one sample to the current block
    ///
    /// # Returns
    /// True exactly when this sample completes a block; the magnitudes and
    /// complex bins then hold its spectrum and a new block starts.
    #[inline]
    pub fn add_sample(&mut self, sample: f32) -> bool {
        self.window[self.sample_count] = sample as f64;
        self.sample_count += 1;
        self.ready = false;

        if self.sample_count < self.config.fft_size {
            return false;
        }

        self.sample_count = 0;
        self.fft_input.copy_from_slice(&self.window);
        self.ready = self.transform();
        self.ready
    }

    /// One-shot analysis of `buffer`, zero-padded or truncated to fft_size.
    ///
    /// The streaming block in progress is left untouched.
    pub fn compute_from_buffer(&mut self, buffer: &[f32]) {
        let copy_len = buffer.len().min(self.config.fft_size);

        for (dst, &src) in self.fft_input.iter_mut().zip(&buffer[..copy_len]) {
            *dst = src as f64;
        }
        self.fft_input[copy_len..].fill(0.0);

        self.transform();
    }

    /// Forward transform of `fft_input` into the cached bins and magnitudes
    fn transform(&mut self) -> bool {
        if self.engine.forward(&mut self.fft_input, &mut self.spectrum).is_err() {
            return false;
        }

        for (magnitude, bin) in self.magnitudes.iter_mut().zip(&self.spectrum) {
            *magnitude = bin.norm() as f32;
        }
        true
    }

    /// Inverse transform of the current complex bins, scaled by 1/W
    pub fn inverse_transform(&mut self) -> Vec<f32> {
        let mut output = vec![0.0; self.config.fft_size];
        self.inverse_transform_into(&mut output);
        output
    }

    /// Allocation-free variant of [`inverse_transform`](Self::inverse_transform)
    ///
    /// Writes up to `output.len()` samples and returns how many were written.
    pub fn inverse_transform_into(&mut self, output: &mut [f32]) -> usize {
        self.inverse_bins.copy_from_slice(&self.spectrum);
        if self
            .engine
            .inverse(&mut self.inverse_bins, &mut self.inverse_output)
            .is_err()
        {
            return 0;
        }

        let scale = 1.0 / self.config.fft_size as f64;
        let written = output.len().min(self.inverse_output.len());
        for (dst, &src) in output.iter_mut().zip(&self.inverse_output[..written]) {
            *dst = (src * scale) as f32;
        }
        written
    }

    /// Zero the block, the counter, the magnitudes and the complex bins
    pub fn reset(&mut self) {
        self.window.fill(0.0);
        self.sample_count = 0;
        self.spectrum.fill(Complex::new(0.0, 0.0));
        self.magnitudes.fill(0.0);
        self.ready = false;
    }

    /// Magnitudes of the last transform (all zero before the first one)
    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    pub fn complex_bins(&self) -> &[Complex<f64>] {
        &self.spectrum
    }

    /// Bins to edit before [`inverse_transform`](Self::inverse_transform)
    pub fn complex_bins_mut(&mut self) -> &mut [Complex<f64>] {
        &mut self.spectrum
    }

    /// True right after `add_sample` completed a block
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Samples accumulated towards the next block
    pub fn pending_samples(&self) -> usize {
        self.sample_count
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn fft_size(&self) -> usize {
        self.config.fft_size
    }

    pub fn num_bins(&self) -> usize {
        self.engine.num_bins()
    }

    /// Centre frequency of `bin` in Hz
    pub fn bin_frequency(&self, bin: usize, sample_rate: f64) -> f64 {
        self.engine.bin_to_hz(bin, sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{FilterBank, FilterBankConfig, FilterKind};
    use proptest::prelude::*;
    use std::f64::consts::PI;

    fn analyzer(fft_size: usize) -> SpectrumAnalyzer {
        SpectrumAnalyzer::new(AnalyzerConfig { fft_size })
    }

    fn tone(bin: f64, len: usize, fft_size: usize) -> Vec<f32> {
        (0..len)
            .map(|n| (2.0 * PI * bin * n as f64 / fft_size as f64).sin() as f32)
            .collect()
    }

    #[test]
    fn test_partial_window_is_never_ready() {
        let mut analyzer = analyzer(1024);

        for n in 0..1023 {
            assert!(!analyzer.add_sample((n as f32 * 0.01).sin()));
        }
        assert!(!analyzer.is_ready());
        assert_eq!(analyzer.magnitudes().len(), 513);
        assert!(analyzer.magnitudes().iter().all(|&m| m == 0.0));
    }

    #[test]
    fn test_full_window_is_ready_exactly_once() {
        let mut analyzer = analyzer(1024);
        let signal = tone(32.0, 1024 * 3, 1024);

        let ready_at: Vec<usize> = signal
            .iter()
            .enumerate()
            .filter_map(|(n, &x)| analyzer.add_sample(x).then_some(n))
            .collect();

        assert_eq!(ready_at, vec![1023, 2047, 3071]);
        assert_eq!(analyzer.pending_samples(), 0);

        let peak = analyzer
            .magnitudes()
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
            .map(|(bin, _)| bin);
        assert_eq!(peak, Some(32));
    }

    #[test]
    fn test_compute_from_buffer_overrides_streaming_result() {
        let mut analyzer = analyzer(256);
        for x in tone(10.0, 256, 256) {
            analyzer.add_sample(x);
        }
        for x in tone(10.0, 100, 256) {
            analyzer.add_sample(x);
        }

        analyzer.compute_from_buffer(&[1.0; 256]);

        assert!((analyzer.magnitudes()[0] - 256.0).abs() < 1e-3);
        assert!(analyzer.magnitudes()[10] < 1e-3);
        // The partial block is still there
        assert_eq!(analyzer.pending_samples(), 100);
    }

    #[test]
    fn test_compute_from_buffer_pads_and_truncates() {
        let mut analyzer = analyzer(64);

        analyzer.compute_from_buffer(&[1.0; 16]);
        assert!((analyzer.magnitudes()[0] - 16.0).abs() < 1e-4);

        analyzer.compute_from_buffer(&[1.0; 1000]);
        assert!((analyzer.magnitudes()[0] - 64.0).abs() < 1e-4);
    }

    #[test]
    fn test_round_trip_reconstructs_buffer() {
        let mut analyzer = analyzer(1024);
        let buffer: Vec<f32> = (0..1024)
            .map(|n| (0.3 * (n as f32 * 0.05).sin() - 0.2 * (n as f32 * 0.31).cos()))
            .collect();

        analyzer.compute_from_buffer(&buffer);
        let output = analyzer.inverse_transform();

        assert_eq!(output.len(), 1024);
        for (a, b) in buffer.iter().zip(&output) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_inverse_after_complex_filtering() {
        let fft_size = 1024;
        let sample_rate = 1024.0;
        let mut analyzer = analyzer(fft_size);

        // Bins 20 and 200 at 1 Hz per bin
        let buffer: Vec<f32> = tone(20.0, fft_size, fft_size)
            .iter()
            .zip(tone(200.0, fft_size, fft_size))
            .map(|(a, b)| a + b)
            .collect();
        analyzer.compute_from_buffer(&buffer);

        let mut bank = FilterBank::new(FilterBankConfig::default(), sample_rate);
        assert!(bank.set_lowpass(100.0));
        bank.set_enabled(FilterKind::LowPass, true);
        bank.process_complex_spectrum(analyzer.complex_bins_mut(), fft_size, sample_rate);

        let output = analyzer.inverse_transform();
        let expected = tone(20.0, fft_size, fft_size);
        for (a, b) in expected.iter().zip(&output) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut analyzer = analyzer(128);
        for x in tone(3.0, 200, 128) {
            analyzer.add_sample(x);
        }

        analyzer.reset();

        assert_eq!(analyzer.pending_samples(), 0);
        assert!(analyzer.magnitudes().iter().all(|&m| m == 0.0));
        assert!(analyzer.complex_bins().iter().all(|c| c.norm() == 0.0));
        assert!(!analyzer.is_ready());
    }

    #[test]
    fn test_bin_frequency() {
        let analyzer = analyzer(1024);
        assert!((analyzer.bin_frequency(1, 44100.0) - 43.066_406_25).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn short_feeds_never_ready(samples in proptest::collection::vec(-1.0f32..=1.0, 0..512)) {
            let mut analyzer = analyzer(512);
            for &x in &samples {
                prop_assert!(!analyzer.add_sample(x));
            }
            prop_assert!(analyzer.magnitudes().iter().all(|&m| m == 0.0));
        }

        #[test]
        fn ready_count_matches_full_blocks(len in 0usize..2000, fft_pow in 4u32..9) {
            let fft_size = 1usize << fft_pow;
            let mut analyzer = analyzer(fft_size);
            let ready = (0..len).filter(|&n| analyzer.add_sample((n as f32).sin())).count();
            prop_assert_eq!(ready, len / fft_size);
        }
    }
}
