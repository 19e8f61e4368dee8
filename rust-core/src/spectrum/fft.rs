//! FFT engine using realfft for real-valued signals
//!
//! Forward transforms are unnormalized; the inverse leaves the 1/N scaling
//! to the caller.

use num_complex::Complex;
use realfft::{ComplexToReal, FftError, RealFftPlanner, RealToComplex};
use std::fmt;
use std::sync::Arc;

/// Forward and inverse real FFT of a fixed size
pub struct FftEngine {
    /// FFT size (number of samples)
    fft_size: usize,

    r2c: Arc<dyn RealToComplex<f64>>,
    c2r: Arc<dyn ComplexToReal<f64>>,

    /// Scratch buffers so neither direction allocates
    forward_scratch: Vec<Complex<f64>>,
    inverse_scratch: Vec<Complex<f64>>,
}

impl fmt::Debug for FftEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftEngine").field("fft_size", &self.fft_size).finish()
    }
}

impl FftEngine {
    /// Create new FFT engine
    ///
    /// # Arguments
    /// * `fft_size` - FFT size (number of samples)
    pub fn new(fft_size: usize) -> Self {
        let mut planner = RealFftPlanner::<f64>::new();
        let r2c = planner.plan_fft_forward(fft_size);
        let c2r = planner.plan_fft_inverse(fft_size);

        let forward_scratch = r2c.make_scratch_vec();
        let inverse_scratch = c2r.make_scratch_vec();

        Self {
            fft_size,
            r2c,
            c2r,
            forward_scratch,
            inverse_scratch,
        }
    }

    /// Real-to-complex transform
    ///
    /// # Arguments
    /// * `input` - fft_size samples, used as scratch and left unspecified
    /// * `spectrum` - fft_size/2 + 1 output bins
    pub fn forward(&mut self, input: &mut [f64], spectrum: &mut [Complex<f64>]) -> Result<(), FftError> {
        self.r2c
            .process_with_scratch(input, spectrum, &mut self.forward_scratch)
    }

    /// Complex-to-real transform, unnormalized
    ///
    /// # Arguments
    /// * `spectrum` - fft_size/2 + 1 bins, used as scratch and left unspecified
    /// * `output` - fft_size samples
    pub fn inverse(&mut self, spectrum: &mut [Complex<f64>], output: &mut [f64]) -> Result<(), FftError> {
        // A real signal has no imaginary DC (or Nyquist) component
        if let Some(dc) = spectrum.first_mut() {
            dc.im = 0.0;
        }
        if self.fft_size % 2 == 0 {
            if let Some(nyquist) = spectrum.last_mut() {
                nyquist.im = 0.0;
            }
        }

        self.c2r
            .process_with_scratch(spectrum, output, &mut self.inverse_scratch)
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of frequency bins (fft_size/2 + 1 for real FFT)
    pub fn num_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Centre frequency of `bin` in Hz
    pub fn bin_to_hz(&self, bin: usize, sample_rate: f64) -> f64 {
        bin as f64 * sample_rate / self.fft_size as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn magnitudes(fft: &mut FftEngine, signal: &[f64]) -> Vec<f64> {
        let mut input = vec![0.0; fft.fft_size()];
        input[..signal.len()].copy_from_slice(signal);

        let mut spectrum = vec![Complex::new(0.0, 0.0); fft.num_bins()];
        fft.forward(&mut input, &mut spectrum).unwrap();
        spectrum.iter().map(|c| c.norm()).collect()
    }

    #[test]
    fn test_fft_zero_padded_dc() {
        let mut fft = FftEngine::new(1024);

        let spectrum = magnitudes(&mut fft, &[1.0; 100]);

        // ~100 for 100 samples
        assert!((spectrum[0] - 100.0).abs() < 1e-9);
        assert!(spectrum[10] < 100.0);
        assert_eq!(spectrum.len(), 513);
    }

    #[test]
    fn test_fft_sine_wave() {
        let mut fft = FftEngine::new(1024);

        // Exactly 64 cycles in the window
        let signal: Vec<f64> = (0..1024)
            .map(|n| (2.0 * PI * 64.0 * n as f64 / 1024.0).sin())
            .collect();

        let spectrum = magnitudes(&mut fft, &signal);

        let (peak_bin, &peak_mag) = spectrum
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
            .unwrap();

        assert_eq!(peak_bin, 64);
        // N/2 for a unit sine on a bin centre
        assert!((peak_mag - 512.0).abs() < 1e-6);
    }

    #[test]
    fn test_forward_inverse_round_trip() {
        let mut fft = FftEngine::new(256);
        let signal: Vec<f64> = (0..256).map(|n| ((n * 7919) % 101) as f64 / 50.0 - 1.0).collect();

        let mut input = signal.clone();
        let mut spectrum = vec![Complex::new(0.0, 0.0); fft.num_bins()];
        fft.forward(&mut input, &mut spectrum).unwrap();

        let mut output = vec![0.0; 256];
        fft.inverse(&mut spectrum, &mut output).unwrap();

        for (a, b) in signal.iter().zip(&output) {
            assert!((a - b / 256.0).abs() < 1e-10);
        }
    }

    #[test]
    fn test_bin_to_hz() {
        let fft = FftEngine::new(1024);
        assert_eq!(fft.bin_to_hz(0, 44100.0), 0.0);
        assert!((fft.bin_to_hz(512, 44100.0) - 22050.0).abs() < 1e-9);
    }
}
