//! Engine configuration
//!
//! Analysis and filter design parameters plus the startup filter settings,
//! stored as TOML.

use crate::filters::{FilterBankConfig, FilterSettings, WindowType, DEFAULT_FILTER_TAPS};
use crate::spectrum::{AnalyzerConfig, DEFAULT_FFT_SIZE, DEFAULT_SPECTRUM_RATE_HZ};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Playback engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Analysis window length in samples
    pub fft_size: usize,

    /// Taps per FIR filter (odd)
    pub filter_taps: usize,

    /// Window used for coefficient design
    pub window: WindowType,

    /// Maximum spectrum frames delivered per second (0 = unlimited)
    pub spectrum_rate_hz: f64,

    /// Initial output gain, 0.0 to 1.0
    pub volume: f32,

    /// Filters applied when a source is loaded
    pub filters: FilterSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
            filter_taps: DEFAULT_FILTER_TAPS,
            window: WindowType::Blackman,
            spectrum_rate_hz: DEFAULT_SPECTRUM_RATE_HZ,
            volume: 1.0,
            filters: FilterSettings::default(),
        }
    }
}

impl EngineConfig {
    pub fn analyzer_config(&self) -> AnalyzerConfig {
        AnalyzerConfig {
            fft_size: self.fft_size,
        }
    }

    pub fn filter_bank_config(&self) -> FilterBankConfig {
        FilterBankConfig {
            taps: self.filter_taps,
            window: self.window,
        }
    }

    /// Check the structural parameters.
    ///
    /// Cutoffs in `filters` are not checked here; they depend on the source's
    /// sample rate and invalid ones are ignored when applied.
    pub fn validate(&self) -> Result<()> {
        if self.fft_size < 2 || self.fft_size % 2 != 0 {
            return Err(ConfigError::Invalid(format!(
                "fft_size must be even and at least 2, got {}",
                self.fft_size
            )));
        }
        if self.filter_taps == 0 || self.filter_taps % 2 == 0 {
            return Err(ConfigError::Invalid(format!(
                "filter_taps must be odd, got {}",
                self.filter_taps
            )));
        }
        if !self.spectrum_rate_hz.is_finite() || self.spectrum_rate_hz < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "spectrum_rate_hz must be a non-negative number, got {}",
                self.spectrum_rate_hz
            )));
        }
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(ConfigError::Invalid(format!(
                "volume must be within 0.0..=1.0, got {}",
                self.volume
            )));
        }
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        fs::write(path, self.to_toml_string()?)?;

        debug!("Configuration saved successfully");
        Ok(())
    }
}
