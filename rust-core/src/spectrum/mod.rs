//! Spectral analysis with FFT

pub mod fft;
pub mod analysis;
pub mod mailbox;

pub use fft::FftEngine;
pub use analysis::{AnalyzerConfig, SpectrumAnalyzer, DEFAULT_FFT_SIZE};
pub use mailbox::{SpectrumMailbox, DEFAULT_SPECTRUM_RATE_HZ};
