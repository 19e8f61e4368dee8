//! Spectral Edit command line front-end

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use spectral_edit::audio::{decode_file, list_output_devices, CpalBackend};
use spectral_edit::config::EngineConfig;
use spectral_edit::export::export_wav;
use spectral_edit::filters::design::magnitude_response_db;
use spectral_edit::filters::{design_fir, BandSettings, CutoffSettings, FilterBank, FilterKind};
use spectral_edit::spectrum::SpectrumAnalyzer;
use spectral_edit::{PlaybackEngine, PlaybackState};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "spectral-edit", about = "Play, filter and export audio with live spectrum analysis")]
struct Cli {
    /// Enable verbose logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play a file through the filter bank, printing the spectrum peak
    Play {
        input: PathBuf,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Render a file through the filter bank to a 16-bit WAV
    Export {
        input: PathBuf,
        output: PathBuf,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Print the strongest frequencies of a file
    Spectrum {
        input: PathBuf,

        /// Number of peaks to list
        #[arg(long, default_value_t = 10)]
        peaks: usize,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Print the gain of each configured filter at the given frequencies
    Response {
        /// Sample rate the filters are designed for
        #[arg(long, default_value_t = 44100)]
        sample_rate: u32,

        /// Frequencies in Hz
        #[arg(long, value_delimiter = ',', default_values_t = [100.0, 500.0, 1000.0, 2000.0, 5000.0, 10000.0])]
        at: Vec<f64>,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// List output devices
    Devices,
}

#[derive(Args, Debug, Clone, Default)]
struct FilterArgs {
    /// Engine configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Low-pass cutoff in Hz
    #[arg(long)]
    lowpass: Option<f64>,

    /// High-pass cutoff in Hz
    #[arg(long)]
    highpass: Option<f64>,

    /// Band-stop range, LOW:HIGH in Hz
    #[arg(long, value_parser = parse_band)]
    bandstop: Option<(f64, f64)>,

    /// Band-pass range, LOW:HIGH in Hz
    #[arg(long, value_parser = parse_band)]
    bandpass: Option<(f64, f64)>,

    /// Output volume, 0.0 to 1.0
    #[arg(long)]
    volume: Option<f32>,
}

impl FilterArgs {
    /// Load the configuration file if given and layer the flags on top
    fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::load_from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => EngineConfig::default(),
        };

        if let Some(cutoff) = self.lowpass {
            config.filters.lowpass = CutoffSettings {
                enabled: true,
                cutoff_hz: Some(cutoff),
            };
        }
        if let Some(cutoff) = self.highpass {
            config.filters.highpass = CutoffSettings {
                enabled: true,
                cutoff_hz: Some(cutoff),
            };
        }
        if let Some((low, high)) = self.bandstop {
            config.filters.bandstop = band(low, high);
        }
        if let Some((low, high)) = self.bandpass {
            config.filters.bandpass = band(low, high);
        }
        if let Some(volume) = self.volume {
            config.volume = volume;
        }

        config.validate()?;
        Ok(config)
    }
}

fn band(low: f64, high: f64) -> BandSettings {
    BandSettings {
        enabled: true,
        low_hz: Some(low),
        high_hz: Some(high),
    }
}

fn parse_band(value: &str) -> std::result::Result<(f64, f64), String> {
    let (low, high) = value
        .split_once(':')
        .ok_or_else(|| format!("expected LOW:HIGH, got '{value}'"))?;
    let low = low.trim().parse::<f64>().map_err(|e| format!("invalid low edge: {e}"))?;
    let high = high.trim().parse::<f64>().map_err(|e| format!("invalid high edge: {e}"))?;
    Ok((low, high))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match cli.command {
        Command::Play { input, filters } => play(input, &filters),
        Command::Export { input, output, filters } => export(input, output, &filters),
        Command::Spectrum { input, peaks, filters } => spectrum(input, peaks, &filters),
        Command::Response { sample_rate, at, filters } => response(sample_rate, &at, &filters),
        Command::Devices => devices(),
    }
}

fn play(input: PathBuf, args: &FilterArgs) -> Result<()> {
    let config = args.engine_config()?;
    let source = decode_file(&input).with_context(|| format!("Failed to decode {}", input.display()))?;
    let sample_rate = source.sample_rate() as f64;

    let mut engine = PlaybackEngine::new(CpalBackend, config)?;
    engine.load(source);
    engine.play().context("Failed to start playback")?;

    let mut frame = Vec::new();
    while engine.state() == PlaybackState::Playing {
        if engine.poll_spectrum(&mut frame) {
            engine.mask_spectrum(&mut frame);
            if let Some((bin, magnitude)) = strongest_bin(&frame) {
                let fft_size = (frame.len() - 1) * 2;
                println!(
                    "{:7.2}s / {:.2}s  peak {:8.1} Hz  ({:.1})",
                    engine.position_secs(),
                    engine.duration_secs(),
                    bin as f64 * sample_rate / fft_size as f64,
                    magnitude
                );
            }
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    if engine.take_finished() {
        info!("Playback finished");
    }
    Ok(())
}

fn export(input: PathBuf, output: PathBuf, args: &FilterArgs) -> Result<()> {
    let config = args.engine_config()?;
    let source = decode_file(&input).with_context(|| format!("Failed to decode {}", input.display()))?;

    let summary = export_wav(&output, &source, &config.filters, config.filter_bank_config())
        .with_context(|| format!("Failed to export {}", output.display()))?;

    if summary.clipped > 0 {
        warn!("{} samples clipped", summary.clipped);
    }
    println!(
        "Wrote {} ({:.2}s, {} Hz, {} channel(s))",
        summary.path.display(),
        summary.duration_secs(),
        summary.sample_rate,
        summary.channels
    );
    Ok(())
}

/// Average the magnitude spectra of every full block and list the peaks
fn spectrum(input: PathBuf, peaks: usize, args: &FilterArgs) -> Result<()> {
    let config = args.engine_config()?;
    let source = decode_file(&input).with_context(|| format!("Failed to decode {}", input.display()))?;
    let sample_rate = source.sample_rate() as f64;

    let mut analyzer = SpectrumAnalyzer::new(config.analyzer_config());
    let mut average = vec![0.0f32; analyzer.num_bins()];
    let mut blocks = 0usize;

    for &sample in source.samples() {
        if analyzer.add_sample(sample) {
            for (sum, &magnitude) in average.iter_mut().zip(analyzer.magnitudes()) {
                *sum += magnitude;
            }
            blocks += 1;
        }
    }

    if blocks == 0 {
        bail!(
            "{} is shorter than one {}-sample analysis window",
            input.display(),
            analyzer.fft_size()
        );
    }
    for value in average.iter_mut() {
        *value /= blocks as f32;
    }

    let bank = FilterBank::from_settings(config.filter_bank_config(), sample_rate, &config.filters);
    bank.process_spectrum(&mut average, sample_rate);

    let mut ranked: Vec<(usize, f32)> = average.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    println!("{} blocks of {} samples", blocks, analyzer.fft_size());
    for (bin, magnitude) in ranked.into_iter().take(peaks) {
        println!(
            "{:10.1} Hz  {:10.3}",
            analyzer.bin_frequency(bin, sample_rate),
            magnitude
        );
    }
    Ok(())
}

fn response(sample_rate: u32, frequencies: &[f64], args: &FilterArgs) -> Result<()> {
    if sample_rate == 0 {
        bail!("Sample rate must be positive");
    }
    let config = args.engine_config()?;
    let bank_config = config.filter_bank_config();
    let sample_rate = sample_rate as f64;
    let nyquist = sample_rate / 2.0;

    // Normalized to Nyquist
    let omegas: Vec<f64> = frequencies.iter().map(|hz| hz / nyquist).collect();

    let mut shown = 0;
    for kind in FilterKind::ALL {
        let Some(band) = config.filters.band(kind) else {
            continue;
        };
        if !config.filters.is_enabled(kind) {
            continue;
        }

        let taps = design_fir(band, sample_rate, bank_config.taps, bank_config.window)
            .with_context(|| format!("Failed to design the {kind} filter"))?;

        println!("{kind} ({} taps, {:?} window)", taps.len(), bank_config.window);
        for (hz, db) in frequencies.iter().zip(magnitude_response_db(&taps, &omegas)) {
            println!("{:10.1} Hz  {:8.2} dB", hz, db);
        }
        shown += 1;
    }

    if shown == 0 {
        warn!("No filter is enabled");
    }
    Ok(())
}

fn devices() -> Result<()> {
    for device in list_output_devices()? {
        println!("{} ({} Hz, {} channel(s))", device.name, device.sample_rate, device.channels);
    }
    Ok(())
}

fn strongest_bin(frame: &[f32]) -> Option<(usize, f32)> {
    if frame.len() < 2 {
        return None;
    }
    frame
        .iter()
        .copied()
        .enumerate()
        .skip(1)
        .max_by(|a, b| a.1.total_cmp(&b.1))
}
