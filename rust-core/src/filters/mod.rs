//! FIR filter design and real-time filtering

pub mod windows;
pub mod design;
pub mod fir;
pub mod bank;

pub use windows::{WindowType, generate_window};
pub use design::{FilterBand, FilterError, FilterKind, design_fir, DEFAULT_FILTER_TAPS};
pub use fir::FirFilter;
pub use bank::{FilterBank, FilterBankConfig, FilterSettings, CutoffSettings, BandSettings};
