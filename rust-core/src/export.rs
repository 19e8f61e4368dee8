//! Offline render of a whole source to a 16-bit PCM WAV file

use crate::audio::AudioSource;
use crate::filters::{FilterBank, FilterBankConfig, FilterSettings};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Nothing to export: the source has no samples")]
    EmptySource,

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("Invalid channel count: {0}")]
    InvalidChannels(u16),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV encoding error: {0}")]
    Wav(#[from] hound::Error),
}

/// What was written by [`export_wav`]
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub frames: usize,
    pub channels: u16,
    pub sample_rate: u32,
    /// Filtered samples that fell outside [-1, 1] and were clamped
    pub clipped: usize,
}

impl ExportSummary {
    pub fn duration_secs(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }

    /// Size of the WAV data chunk in bytes
    pub fn data_bytes(&self) -> usize {
        self.frames * self.channels as usize * 2
    }
}

/// Run every sample of `source` through `bank`, in order
pub fn render_offline(source: &AudioSource, bank: &mut FilterBank) -> Vec<f32> {
    source
        .samples()
        .iter()
        .map(|&sample| bank.process_sample(sample))
        .collect()
}

/// Convert a sample to 16-bit PCM: clamp, scale by 32767, truncate toward zero
#[inline]
pub fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Render `source` through a fresh filter bank built from `settings` and
/// write it as 16-bit PCM, the mono signal duplicated to every channel.
///
/// The source is validated before the file is created.
pub fn export_wav(
    path: &Path,
    source: &AudioSource,
    settings: &FilterSettings,
    config: FilterBankConfig,
) -> Result<ExportSummary, ExportError> {
    if source.is_empty() {
        return Err(ExportError::EmptySource);
    }
    if source.sample_rate() == 0 {
        return Err(ExportError::InvalidSampleRate(source.sample_rate()));
    }
    if source.channels() == 0 {
        return Err(ExportError::InvalidChannels(source.channels()));
    }

    let mut bank = FilterBank::from_settings(config, source.sample_rate() as f64, settings);
    debug!("Export filter settings: {:?}", bank.settings());

    let rendered = render_offline(source, &mut bank);

    let spec = WavSpec {
        channels: source.channels(),
        sample_rate: source.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;

    let mut clipped = 0;
    for &sample in &rendered {
        if !(-1.0..=1.0).contains(&sample) {
            clipped += 1;
        }
        let pcm = to_pcm16(sample);
        for _ in 0..source.channels() {
            writer.write_sample(pcm)?;
        }
    }
    writer.finalize()?;

    let summary = ExportSummary {
        path: path.to_path_buf(),
        frames: rendered.len(),
        channels: source.channels(),
        sample_rate: source.sample_rate(),
        clipped,
    };

    info!(
        "Exported {:.2}s ({} frames, {} channel(s)) to {}",
        summary.duration_secs(),
        summary.frames,
        summary.channels,
        path.display()
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::CutoffSettings;
    use std::f32::consts::PI;
    use tempfile::TempDir;

    #[test]
    fn test_pcm_conversion_truncates() {
        assert_eq!(to_pcm16(0.5), 16383);
        assert_eq!(to_pcm16(-0.5), -16383);
        assert_eq!(to_pcm16(1.0), 32767);
        assert_eq!(to_pcm16(2.0), 32767);
        assert_eq!(to_pcm16(-3.0), -32767);
        assert_eq!(to_pcm16(0.0), 0);
    }

    #[test]
    fn test_unfiltered_constant_export() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("half.wav");
        let source = AudioSource::new(vec![0.5; 44100], 44100, 2);

        let summary = export_wav(&path, &source, &FilterSettings::default(), FilterBankConfig::default()).unwrap();
        assert_eq!(summary.frames, 44100);
        assert_eq!(summary.data_bytes(), 44100 * 2 * 2);
        assert_eq!(summary.clipped, 0);

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 44100);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len(), 88200);

        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert!(samples.iter().all(|&s| s == 16383));

        let file_len = std::fs::metadata(&path).unwrap().len();
        assert_eq!(file_len, 44 + 88200 * 2);
    }

    #[test]
    fn test_validation_happens_before_file_creation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("never.wav");
        let settings = FilterSettings::default();
        let config = FilterBankConfig::default();

        let empty = AudioSource::new(Vec::new(), 44100, 1);
        assert!(matches!(
            export_wav(&path, &empty, &settings, config),
            Err(ExportError::EmptySource)
        ));

        let no_rate = AudioSource::new(vec![0.1; 10], 0, 1);
        assert!(matches!(
            export_wav(&path, &no_rate, &settings, config),
            Err(ExportError::InvalidSampleRate(0))
        ));

        let no_channels = AudioSource::new(vec![0.1; 10], 44100, 0);
        assert!(matches!(
            export_wav(&path, &no_channels, &settings, config),
            Err(ExportError::InvalidChannels(0))
        ));

        assert!(!path.exists());
    }

    #[test]
    fn test_unwritable_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing-dir").join("out.wav");
        let source = AudioSource::new(vec![0.1; 10], 8000, 1);

        let result = export_wav(&path, &source, &FilterSettings::default(), FilterBankConfig::default());
        assert!(matches!(result, Err(ExportError::Io(_)) | Err(ExportError::Wav(_))));
    }

    #[test]
    fn test_filtered_export_attenuates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lowpassed.wav");
        let sample_rate = 44100;
        let samples: Vec<f32> = (0..sample_rate)
            .map(|n| 0.8 * (2.0 * PI * 1000.0 * n as f32 / sample_rate as f32).sin())
            .collect();
        let source = AudioSource::new(samples, sample_rate as u32, 1);

        let settings = FilterSettings {
            lowpass: CutoffSettings {
                enabled: true,
                cutoff_hz: Some(500.0),
            },
            ..FilterSettings::default()
        };
        export_wav(&path, &source, &settings, FilterBankConfig::default()).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        let peak = samples[1000..].iter().map(|s| s.unsigned_abs()).max().unwrap();
        // 0.8 full scale would be ~26200
        assert!(peak < 100, "peak {peak}");
    }

    #[test]
    fn test_render_offline_uses_bank_state() {
        let source = AudioSource::new(vec![1.0, 0.0, 0.0], 8000, 1);
        let mut bank = FilterBank::new(FilterBankConfig::default(), 8000.0);
        assert_eq!(render_offline(&source, &mut bank), vec![1.0, 0.0, 0.0]);
    }
}
