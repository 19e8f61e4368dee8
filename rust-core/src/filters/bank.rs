//! Four-slot FIR filter bank used for playback and export
//!
//! The slots run as a fixed cascade: band-pass, band-stop, high-pass, then
//! low-pass. The same band settings drive the spectrum masks so the display
//! matches what is heard.

use super::design::{design_fir, FilterBand, FilterError, FilterKind, DEFAULT_FILTER_TAPS};
use super::fir::FirFilter;
use super::windows::WindowType;
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Processing order of the cascade
pub const CASCADE_ORDER: [FilterKind; 4] = [
    FilterKind::BandPass,
    FilterKind::BandStop,
    FilterKind::HighPass,
    FilterKind::LowPass,
];

/// Design parameters shared by every slot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterBankConfig {
    /// Number of taps per filter (odd)
    pub taps: usize,

    /// Window applied to the ideal response
    pub window: WindowType,
}

impl Default for FilterBankConfig {
    fn default() -> Self {
        Self {
            taps: DEFAULT_FILTER_TAPS,
            window: WindowType::Blackman,
        }
    }
}

/// Enable flag and cutoff of a single-edge filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CutoffSettings {
    pub enabled: bool,
    pub cutoff_hz: Option<f64>,
}

/// Enable flag and edges of a two-edge filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandSettings {
    pub enabled: bool,
    pub low_hz: Option<f64>,
    pub high_hz: Option<f64>,
}

/// Snapshot of every slot's user-facing state
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub lowpass: CutoffSettings,
    pub highpass: CutoffSettings,
    pub bandstop: BandSettings,
    pub bandpass: BandSettings,
}

impl FilterSettings {
    pub fn is_enabled(&self, kind: FilterKind) -> bool {
        match kind {
            FilterKind::LowPass => self.lowpass.enabled,
            FilterKind::HighPass => self.highpass.enabled,
            FilterKind::BandStop => self.bandstop.enabled,
            FilterKind::BandPass => self.bandpass.enabled,
        }
    }

    /// Band described by the slot, if its cutoffs are set
    pub fn band(&self, kind: FilterKind) -> Option<FilterBand> {
        match kind {
            FilterKind::LowPass => self.lowpass.cutoff_hz.map(|cutoff| FilterBand::LowPass { cutoff }),
            FilterKind::HighPass => self.highpass.cutoff_hz.map(|cutoff| FilterBand::HighPass { cutoff }),
            FilterKind::BandStop => match (self.bandstop.low_hz, self.bandstop.high_hz) {
                (Some(low), Some(high)) => Some(FilterBand::BandStop { low, high }),
                _ => None,
            },
            FilterKind::BandPass => match (self.bandpass.low_hz, self.bandpass.high_hz) {
                (Some(low), Some(high)) => Some(FilterBand::BandPass { low, high }),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
struct FilterSlot {
    enabled: bool,
    /// Band the current coefficients were designed for
    band: Option<FilterBand>,
    fir: FirFilter,
}

impl FilterSlot {
    /// Enabled and configured; unconfigured slots pass through
    fn is_applied(&self) -> bool {
        self.enabled && !self.fir.is_empty()
    }

    fn active_band(&self) -> Option<FilterBand> {
        if self.enabled {
            self.band
        } else {
            None
        }
    }
}

/// Low-pass, high-pass, band-stop and band-pass FIR filters in cascade
#[derive(Debug, Clone)]
pub struct FilterBank {
    config: FilterBankConfig,
    /// 0.0 while no source is loaded
    sample_rate: f64,
    lowpass: FilterSlot,
    highpass: FilterSlot,
    bandstop: FilterSlot,
    bandpass: FilterSlot,
}

impl FilterBank {
    /// Create a bank with every slot disabled and unconfigured
    pub fn new(config: FilterBankConfig, sample_rate: f64) -> Self {
        Self {
            config,
            sample_rate,
            lowpass: FilterSlot::default(),
            highpass: FilterSlot::default(),
            bandstop: FilterSlot::default(),
            bandpass: FilterSlot::default(),
        }
    }

    /// Build a fresh bank (zeroed delay lines) reproducing `settings`
    pub fn from_settings(config: FilterBankConfig, sample_rate: f64, settings: &FilterSettings) -> Self {
        let mut bank = Self::new(config, sample_rate);
        bank.apply_settings(settings);
        bank
    }

    fn slot(&self, kind: FilterKind) -> &FilterSlot {
        match kind {
            FilterKind::LowPass => &self.lowpass,
            FilterKind::HighPass => &self.highpass,
            FilterKind::BandStop => &self.bandstop,
            FilterKind::BandPass => &self.bandpass,
        }
    }

    fn slot_mut(&mut self, kind: FilterKind) -> &mut FilterSlot {
        match kind {
            FilterKind::LowPass => &mut self.lowpass,
            FilterKind::HighPass => &mut self.highpass,
            FilterKind::BandStop => &mut self.bandstop,
            FilterKind::BandPass => &mut self.bandpass,
        }
    }

    pub fn config(&self) -> FilterBankConfig {
        self.config
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Retune the bank for a new source.
    ///
    /// Configured bands are redesigned at the new rate; bands that no longer
    /// fit below the new Nyquist are dropped.
    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        if sample_rate == self.sample_rate {
            return;
        }
        self.sample_rate = sample_rate;

        for kind in FilterKind::ALL {
            let Some(band) = self.slot(kind).band else {
                continue;
            };
            if let Err(err) = self.configure(band) {
                warn!("Dropping {} filter after sample rate change: {}", kind, err);
                let slot = self.slot_mut(kind);
                slot.band = None;
                slot.fir = FirFilter::empty();
            }
        }
    }

    /// Design and install coefficients for `band`.
    ///
    /// On error the slot keeps its previous coefficients and cutoffs.
    pub fn configure(&mut self, band: FilterBand) -> Result<(), FilterError> {
        let coefficients = design_fir(band, self.sample_rate, self.config.taps, self.config.window)?;

        let slot = self.slot_mut(band.kind());
        slot.fir.set_coefficients(coefficients);
        slot.band = Some(band);
        Ok(())
    }

    fn configure_or_ignore(&mut self, band: FilterBand) -> bool {
        match self.configure(band) {
            Ok(()) => true,
            Err(err) => {
                debug!("Ignoring {} update: {}", band.kind(), err);
                false
            }
        }
    }

    /// Set the low-pass cutoff; returns false (state unchanged) if invalid
    pub fn set_lowpass(&mut self, cutoff_hz: f64) -> bool {
        self.configure_or_ignore(FilterBand::LowPass { cutoff: cutoff_hz })
    }

    /// Set the high-pass cutoff; returns false (state unchanged) if invalid
    pub fn set_highpass(&mut self, cutoff_hz: f64) -> bool {
        self.configure_or_ignore(FilterBand::HighPass { cutoff: cutoff_hz })
    }

    /// Set the band-stop edges; returns false (state unchanged) if invalid
    pub fn set_bandstop(&mut self, low_hz: f64, high_hz: f64) -> bool {
        self.configure_or_ignore(FilterBand::BandStop { low: low_hz, high: high_hz })
    }

    /// Set the band-pass edges; returns false (state unchanged) if invalid
    pub fn set_bandpass(&mut self, low_hz: f64, high_hz: f64) -> bool {
        self.configure_or_ignore(FilterBand::BandPass { low: low_hz, high: high_hz })
    }

    /// Forget a slot's coefficients (it passes through even when enabled)
    pub fn clear(&mut self, kind: FilterKind) {
        let slot = self.slot_mut(kind);
        slot.band = None;
        slot.fir = FirFilter::empty();
    }

    pub fn set_enabled(&mut self, kind: FilterKind, enabled: bool) {
        self.slot_mut(kind).enabled = enabled;
    }

    pub fn is_enabled(&self, kind: FilterKind) -> bool {
        self.slot(kind).enabled
    }

    /// Band the slot is currently designed for
    pub fn band(&self, kind: FilterKind) -> Option<FilterBand> {
        self.slot(kind).band
    }

    pub fn coefficients(&self, kind: FilterKind) -> &[f64] {
        self.slot(kind).fir.coefficients()
    }

    /// True if any of the four filters is enabled
    pub fn is_active(&self) -> bool {
        FilterKind::ALL.iter().any(|&kind| self.slot(kind).enabled)
    }

    /// Run one sample through the cascade
    #[inline]
    pub fn process_sample(&mut self, sample: f32) -> f32 {
        let mut output = sample as f64;

        for kind in CASCADE_ORDER {
            let slot = self.slot_mut(kind);
            if slot.is_applied() {
                output = slot.fir.process_sample(output);
            }
        }

        output as f32
    }

    pub fn process_block_inplace(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    /// Whether the bin centred at `freq_hz` is removed by any enabled band
    fn rejects(&self, freq_hz: f64) -> bool {
        CASCADE_ORDER
            .iter()
            .filter_map(|&kind| self.slot(kind).active_band())
            .any(|band| band.rejects(freq_hz))
    }

    /// Zero magnitude bins removed by the enabled filters (display only)
    ///
    /// # Arguments
    /// * `magnitudes` - fft_size/2 + 1 bins
    /// * `sample_rate` - Sample rate the spectrum was taken at
    pub fn process_spectrum(&self, magnitudes: &mut [f32], sample_rate: f64) {
        if magnitudes.len() < 2 {
            return;
        }
        let fft_size = (magnitudes.len() - 1) * 2;

        for (bin, magnitude) in magnitudes.iter_mut().enumerate() {
            if self.rejects(bin_to_hz(bin, fft_size, sample_rate)) {
                *magnitude = 0.0;
            }
        }
    }

    /// Zero complex bins removed by the enabled filters, real and imaginary
    /// parts, ready for an inverse transform
    pub fn process_complex_spectrum(&self, bins: &mut [Complex<f64>], fft_size: usize, sample_rate: f64) {
        if fft_size == 0 {
            return;
        }
        let num_bins = (fft_size / 2 + 1).min(bins.len());

        for (bin, value) in bins[..num_bins].iter_mut().enumerate() {
            if self.rejects(bin_to_hz(bin, fft_size, sample_rate)) {
                *value = Complex::new(0.0, 0.0);
            }
        }
    }

    /// Zero every delay line; coefficients and enable flags are kept
    pub fn reset(&mut self) {
        for kind in FilterKind::ALL {
            self.slot_mut(kind).fir.reset();
        }
    }

    /// Snapshot enable flags and the cutoffs currently in effect
    pub fn settings(&self) -> FilterSettings {
        let cutoff = |slot: &FilterSlot| CutoffSettings {
            enabled: slot.enabled,
            cutoff_hz: match slot.band {
                Some(FilterBand::LowPass { cutoff }) | Some(FilterBand::HighPass { cutoff }) => Some(cutoff),
                _ => None,
            },
        };
        let band = |slot: &FilterSlot| {
            let (low_hz, high_hz) = match slot.band {
                Some(FilterBand::BandStop { low, high }) | Some(FilterBand::BandPass { low, high }) => {
                    (Some(low), Some(high))
                }
                _ => (None, None),
            };
            BandSettings {
                enabled: slot.enabled,
                low_hz,
                high_hz,
            }
        };

        FilterSettings {
            lowpass: cutoff(&self.lowpass),
            highpass: cutoff(&self.highpass),
            bandstop: band(&self.bandstop),
            bandpass: band(&self.bandpass),
        }
    }

    /// Bring every slot in line with `settings`.
    ///
    /// Invalid cutoffs are ignored like the individual setters; slots without
    /// cutoffs are cleared.
    pub fn apply_settings(&mut self, settings: &FilterSettings) {
        for kind in FilterKind::ALL {
            self.set_enabled(kind, settings.is_enabled(kind));

            match settings.band(kind) {
                Some(band) if self.slot(kind).band == Some(band) => {}
                Some(band) => {
                    self.configure_or_ignore(band);
                }
                None => self.clear(kind),
            }
        }
    }
}

/// Centre frequency of `bin` in Hz
#[inline]
pub fn bin_to_hz(bin: usize, fft_size: usize, sample_rate: f64) -> f64 {
    bin as f64 * sample_rate / fft_size as f64
}
