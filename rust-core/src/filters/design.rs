//! Windowed-sinc FIR design for the four editing filters
//!
//! Every design evaluates the ideal (infinite) impulse response around the
//! centre tap, tapers it with a window and normalizes the passband gain.
//! Cutoffs enter the sinc terms in cycles per sample (`cutoff / sample_rate`),
//! which puts the -6 dB point of `2*fc*sinc(2*fc*n)` exactly at the cutoff.

use super::windows::{generate_window, WindowType};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use thiserror::Error;

/// Default number of taps for every filter in the bank
pub const DEFAULT_FILTER_TAPS: usize = 257;

/// Below this |x| the sinc is taken as exactly 1
const SINC_EPSILON: f64 = 1e-6;

/// Reference gains smaller than this are left unnormalized
const NORMALIZE_EPSILON: f64 = 1e-12;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("sample rate must be positive and finite (got {0} Hz)")]
    InvalidSampleRate(f64),

    #[error("cutoff {cutoff} Hz is outside (0, {nyquist}) Hz")]
    InvalidCutoff { cutoff: f64, nyquist: f64 },

    #[error("band edges must satisfy low < high (got {low} Hz..{high} Hz)")]
    InvalidBand { low: f64, high: f64 },

    #[error("filter length must be odd and non-zero (got {0})")]
    InvalidLength(usize),
}

/// The four filter slots of the bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    LowPass,
    HighPass,
    BandStop,
    BandPass,
}

impl FilterKind {
    pub const ALL: [FilterKind; 4] = [
        FilterKind::LowPass,
        FilterKind::HighPass,
        FilterKind::BandStop,
        FilterKind::BandPass,
    ];
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterKind::LowPass => "low-pass",
            FilterKind::HighPass => "high-pass",
            FilterKind::BandStop => "band-stop",
            FilterKind::BandPass => "band-pass",
        };
        f.write_str(name)
    }
}

/// A filter type together with its cutoff(s) in Hz
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterBand {
    LowPass { cutoff: f64 },
    HighPass { cutoff: f64 },
    BandStop { low: f64, high: f64 },
    BandPass { low: f64, high: f64 },
}

impl FilterBand {
    pub fn kind(&self) -> FilterKind {
        match self {
            FilterBand::LowPass { .. } => FilterKind::LowPass,
            FilterBand::HighPass { .. } => FilterKind::HighPass,
            FilterBand::BandStop { .. } => FilterKind::BandStop,
            FilterBand::BandPass { .. } => FilterKind::BandPass,
        }
    }

    /// Check the cutoffs against the open interval (0, Nyquist)
    pub fn validate(&self, sample_rate: f64) -> Result<(), FilterError> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(FilterError::InvalidSampleRate(sample_rate));
        }
        let nyquist = sample_rate / 2.0;

        let check = |cutoff: f64| {
            if cutoff.is_finite() && cutoff > 0.0 && cutoff < nyquist {
                Ok(())
            } else {
                Err(FilterError::InvalidCutoff { cutoff, nyquist })
            }
        };

        match *self {
            FilterBand::LowPass { cutoff } | FilterBand::HighPass { cutoff } => check(cutoff),
            FilterBand::BandStop { low, high } | FilterBand::BandPass { low, high } => {
                check(low)?;
                check(high)?;
                if low >= high {
                    return Err(FilterError::InvalidBand { low, high });
                }
                Ok(())
            }
        }
    }

    /// Whether a component at `freq_hz` is removed by this band.
    ///
    /// Band edges themselves are kept for band-pass and removed for band-stop.
    pub fn rejects(&self, freq_hz: f64) -> bool {
        match *self {
            FilterBand::LowPass { cutoff } => freq_hz > cutoff,
            FilterBand::HighPass { cutoff } => freq_hz < cutoff,
            FilterBand::BandStop { low, high } => freq_hz >= low && freq_hz <= high,
            FilterBand::BandPass { low, high } => freq_hz < low || freq_hz > high,
        }
    }
}

/// Normalized sinc: sin(πx)/(πx)
#[inline]
pub fn sinc(x: f64) -> f64 {
    if x.abs() < SINC_EPSILON {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

/// Ideal low-pass response at offset n for cutoff fc in cycles per sample
#[inline]
fn lowpass_term(fc: f64, n: f64) -> f64 {
    2.0 * fc * sinc(2.0 * fc * n)
}

/// Design FIR coefficients for `band`
///
/// # Arguments
/// * `band` - Filter type and cutoff(s) in Hz
/// * `sample_rate` - Sample rate in Hz
/// * `taps` - Filter length, odd
/// * `window` - Window applied to the ideal response
///
/// # Returns
/// Coefficients h[i] for i = 0..taps, symmetric about taps/2
pub fn design_fir(
    band: FilterBand,
    sample_rate: f64,
    taps: usize,
    window: WindowType,
) -> Result<Vec<f64>, FilterError> {
    if taps == 0 || taps % 2 == 0 {
        return Err(FilterError::InvalidLength(taps));
    }
    band.validate(sample_rate)?;

    let nyquist = sample_rate / 2.0;
    let center = (taps / 2) as i64;
    let normalize = |hz: f64| hz / sample_rate;
    let weights = generate_window(window, taps);

    let mut h: Vec<f64> = (0..taps)
        .zip(&weights)
        .map(|(i, &weight)| {
            let n = i as i64 - center;
            let nf = n as f64;

            let ideal = match band {
                FilterBand::LowPass { cutoff } => {
                    let fc = normalize(cutoff);
                    if n == 0 {
                        2.0 * fc
                    } else {
                        lowpass_term(fc, nf)
                    }
                }
                FilterBand::HighPass { cutoff } => {
                    // Impulse minus low-pass
                    let fc = normalize(cutoff);
                    if n == 0 {
                        1.0 - 2.0 * fc
                    } else {
                        -lowpass_term(fc, nf)
                    }
                }
                FilterBand::BandStop { low, high } => {
                    let (fl, fh) = (normalize(low), normalize(high));
                    if n == 0 {
                        1.0 - 2.0 * (fh - fl)
                    } else {
                        lowpass_term(fl, nf) - lowpass_term(fh, nf)
                    }
                }
                FilterBand::BandPass { low, high } => {
                    let (fl, fh) = (normalize(low), normalize(high));
                    if n == 0 {
                        2.0 * (fh - fl)
                    } else {
                        lowpass_term(fh, nf) - lowpass_term(fl, nf)
                    }
                }
            };

            ideal * weight
        })
        .collect();

    let reference = reference_gain(&h, band, nyquist);
    if reference.abs() > NORMALIZE_EPSILON {
        for coeff in h.iter_mut() {
            *coeff /= reference;
        }
    }

    Ok(h)
}

/// Gain at the frequency that should pass with unity gain.
///
/// DC for low-pass and band-stop (the tap sum), Nyquist for high-pass and
/// the band centre for band-pass, where the tap sum is close to zero.
fn reference_gain(h: &[f64], band: FilterBand, nyquist: f64) -> f64 {
    match band {
        FilterBand::LowPass { .. } | FilterBand::BandStop { .. } => h.iter().sum(),
        FilterBand::HighPass { .. } => {
            let center = h.len() / 2;
            h.iter()
                .enumerate()
                .map(|(i, &c)| if (i + center) % 2 == 0 { c } else { -c })
                .sum()
        }
        FilterBand::BandPass { low, high } => {
            let omega = (low + high) / 2.0 / nyquist;
            frequency_response(h, &[omega])[0].norm()
        }
    }
}

/// Calculate frequency response at given frequencies
///
/// # Arguments
/// * `h` - Filter coefficients
/// * `frequencies` - Normalized frequencies (units of π rad/sample, 1.0 = Nyquist)
///
/// # Returns
/// Complex frequency response H(e^jω)
pub fn frequency_response(h: &[f64], frequencies: &[f64]) -> Vec<Complex64> {
    frequencies
        .iter()
        .map(|&omega| {
            let omega_rad = omega * PI;
            h.iter()
                .enumerate()
                .fold(Complex64::new(0.0, 0.0), |acc, (n, &h_n)| {
                    acc + h_n * Complex64::from_polar(1.0, -(omega_rad * n as f64))
                })
        })
        .collect()
}

/// Magnitude response in dB
pub fn magnitude_response_db(h: &[f64], frequencies: &[f64]) -> Vec<f64> {
    frequency_response(h, frequencies)
        .iter()
        .map(|c| 20.0 * c.norm().max(1e-20).log10())
        .collect()
}
