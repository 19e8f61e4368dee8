//! Spectral Edit - audio playback with live FIR filtering and spectrum analysis
//!
//! Decoded audio is played through a four-filter FIR bank while a streaming
//! FFT analyzer publishes magnitude spectra for display. The same filter
//! settings can be rendered offline to a WAV file.

pub mod audio;
pub mod config;
pub mod export;
pub mod filters;
pub mod spectrum;

pub use audio::{AudioSource, PlaybackEngine, PlaybackState};
pub use config::EngineConfig;
pub use export::{export_wav, ExportError, ExportSummary};
pub use filters::{FilterBank, FilterKind, FilterSettings, WindowType, FirFilter};
pub use spectrum::{SpectrumAnalyzer, SpectrumMailbox};
