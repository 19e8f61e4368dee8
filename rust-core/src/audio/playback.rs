//! Playback engine
//!
//! Owns the output stream and the control-side state machine. Everything the
//! device callback touches lives in [`PlaybackShared`] behind an `Arc`.

use super::output::{AudioError, OutputBackend, OutputStream};
use super::source::AudioSource;
use crate::config::{ConfigError, EngineConfig};
use crate::export::{export_wav, ExportError, ExportSummary};
use crate::filters::{FilterBank, FilterKind, FilterSettings};
use crate::spectrum::{SpectrumAnalyzer, SpectrumMailbox};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// State shared between the control thread and the device callback
#[derive(Debug)]
pub struct PlaybackShared {
    source: RwLock<Option<AudioSource>>,

    /// Next sample to play, 0..=len
    cursor: AtomicUsize,

    /// f32 gain bits
    volume: AtomicU32,

    /// Callback renders audio only while set
    running: AtomicBool,

    /// Cursor reached the end during the current play cycle
    ended: AtomicBool,

    /// End-of-source notice, consumed by `take_finished`
    finished: AtomicBool,

    filters: Mutex<FilterBank>,
    analyzer: Mutex<SpectrumAnalyzer>,
    mailbox: SpectrumMailbox,
}

impl PlaybackShared {
    fn new(config: &EngineConfig) -> Self {
        let analyzer = SpectrumAnalyzer::new(config.analyzer_config());
        let mailbox = SpectrumMailbox::new(analyzer.num_bins(), config.spectrum_rate_hz);

        let mut filters = FilterBank::new(config.filter_bank_config(), 0.0);
        for kind in FilterKind::ALL {
            filters.set_enabled(kind, config.filters.is_enabled(kind));
        }

        Self {
            source: RwLock::new(None),
            cursor: AtomicUsize::new(0),
            volume: AtomicU32::new(config.volume.clamp(0.0, 1.0).to_bits()),
            running: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            filters: Mutex::new(filters),
            analyzer: Mutex::new(analyzer),
            mailbox,
        }
    }

    /// Fill one interleaved device buffer
    ///
    /// The frame count is `out.len() / channels` of the loaded source.
    /// Writes silence when not running, when nothing is loaded, or when the
    /// source is being replaced.
    pub fn render(&self, out: &mut [f32]) {
        if !self.running.load(Ordering::SeqCst) {
            out.fill(0.0);
            return;
        }

        let Ok(guard) = self.source.try_read() else {
            out.fill(0.0);
            return;
        };
        let Some(source) = guard.as_ref() else {
            out.fill(0.0);
            return;
        };

        let samples = source.samples();
        let channels = source.channels().max(1) as usize;
        let volume = f32::from_bits(self.volume.load(Ordering::SeqCst));

        let start = self.cursor.load(Ordering::SeqCst);
        let mut position = start;

        let mut frames = out.chunks_exact_mut(channels);
        for frame in &mut frames {
            let Some(&sample) = samples.get(position) else {
                frame.fill(0.0);
                continue;
            };

            if let Ok(mut analyzer) = self.analyzer.lock() {
                if analyzer.add_sample(sample) {
                    self.mailbox.publish(analyzer.magnitudes());
                }
            }

            let filtered = match self.filters.lock() {
                Ok(mut filters) => filters.process_sample(sample),
                Err(_) => sample,
            };

            frame.fill(filtered * volume);
            position += 1;
        }
        frames.into_remainder().fill(0.0);

        // A seek during this callback wins over our advance
        let _ = self
            .cursor
            .compare_exchange(start, position, Ordering::SeqCst, Ordering::SeqCst);

        if position >= samples.len() {
            // Only play() restarts output once the source has run out
            self.running.store(false, Ordering::SeqCst);
            if !self.ended.swap(true, Ordering::SeqCst) {
                self.finished.store(true, Ordering::SeqCst);
            }
        }
    }

    /// Zero filter delay lines, the analyzer and any pending frame
    fn reset_dsp(&self) {
        if let Ok(mut filters) = self.filters.lock() {
            filters.reset();
        }
        if let Ok(mut analyzer) = self.analyzer.lock() {
            analyzer.reset();
        }
        self.mailbox.clear();
    }

    fn source(&self) -> Option<AudioSource> {
        self.source.read().ok().and_then(|guard| guard.clone())
    }
}

/// Playback engine
///
/// States: `Stopped → Playing ↔ Paused → Stopped`. Playing past the end of
/// the source drops back to `Stopped`.
pub struct PlaybackEngine {
    backend: Box<dyn OutputBackend>,
    config: EngineConfig,
    shared: Arc<PlaybackShared>,
    stream: Option<Box<dyn OutputStream>>,
    state: PlaybackState,

    /// Filter cutoffs from the config, designed once the first source
    /// gives them a sample rate
    startup_filters: Option<FilterSettings>,
}

impl PlaybackEngine {
    pub fn new<B>(backend: B, config: EngineConfig) -> Result<Self, ConfigError>
    where
        B: OutputBackend + 'static,
    {
        config.validate()?;

        Ok(Self {
            backend: Box::new(backend),
            shared: Arc::new(PlaybackShared::new(&config)),
            startup_filters: Some(config.filters),
            config,
            stream: None,
            state: PlaybackState::Stopped,
        })
    }

    /// Replace the source; stops playback and rewinds
    pub fn load(&mut self, source: AudioSource) {
        self.stop();

        let sample_rate = source.sample_rate() as f64;
        info!(
            "Loaded {:.2}s of audio at {} Hz, {} channel(s)",
            source.duration_secs(),
            source.sample_rate(),
            source.channels()
        );

        match self.shared.source.write() {
            Ok(mut slot) => *slot = Some(source),
            Err(poisoned) => *poisoned.into_inner() = Some(source),
        }
        self.shared.cursor.store(0, Ordering::SeqCst);

        if let Ok(mut filters) = self.shared.filters.lock() {
            filters.set_sample_rate(sample_rate);
            if let Some(settings) = self.startup_filters.take() {
                filters.apply_settings(&settings);
            }
        }
    }

    /// Start or resume playback
    ///
    /// From `Stopped`, a cursor at the end rewinds to 0 first. On failure
    /// the engine stays `Stopped`.
    pub fn play(&mut self) -> Result<(), AudioError> {
        self.sync_finished();

        match self.state {
            PlaybackState::Playing => return Ok(()),
            PlaybackState::Paused => return self.resume(),
            PlaybackState::Stopped => {}
        }

        let source = self.shared.source().ok_or(AudioError::NoSource)?;

        if self.shared.cursor.load(Ordering::SeqCst) >= source.len() {
            self.shared.cursor.store(0, Ordering::SeqCst);
        }
        self.shared.reset_dsp();
        self.shared.ended.store(false, Ordering::SeqCst);
        self.shared.finished.store(false, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let stream = self.backend.open(
            source.sample_rate(),
            source.channels(),
            Box::new(move |out: &mut [f32]| shared.render(out)),
        )?;

        self.shared.running.store(true, Ordering::SeqCst);
        if let Err(err) = stream.start() {
            self.shared.running.store(false, Ordering::SeqCst);
            return Err(err);
        }

        debug!("Playback started at sample {}", self.position());
        self.stream = Some(stream);
        self.state = PlaybackState::Playing;
        Ok(())
    }

    /// Pause, keeping the cursor and filter state
    pub fn pause(&mut self) -> Result<(), AudioError> {
        self.sync_finished();
        if self.state != PlaybackState::Playing {
            return Ok(());
        }

        if let Some(stream) = &self.stream {
            stream.pause()?;
        }
        self.shared.running.store(false, Ordering::SeqCst);
        self.state = PlaybackState::Paused;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), AudioError> {
        self.sync_finished();
        if self.state != PlaybackState::Paused {
            return Ok(());
        }

        let Some(stream) = &self.stream else {
            self.state = PlaybackState::Stopped;
            return Err(AudioError::NoSource);
        };

        self.shared.running.store(true, Ordering::SeqCst);
        if let Err(err) = stream.start() {
            self.shared.running.store(false, Ordering::SeqCst);
            return Err(err);
        }
        self.state = PlaybackState::Playing;
        Ok(())
    }

    /// Drop the stream, rewind and clear filter and analyzer history
    pub fn stop(&mut self) {
        // Silence from the next callback on, even before the stream is gone
        self.shared.running.store(false, Ordering::SeqCst);
        self.stream = None;
        self.state = PlaybackState::Stopped;

        self.shared.cursor.store(0, Ordering::SeqCst);
        self.shared.reset_dsp();
    }

    /// Move the cursor, clamped to `[0, length]`; filter history is kept
    pub fn seek(&mut self, position: usize) {
        let position = position.min(self.length());
        self.shared.cursor.store(position, Ordering::SeqCst);
    }

    pub fn seek_secs(&mut self, seconds: f64) {
        let sample_rate = self.sample_rate();
        if sample_rate == 0 || !seconds.is_finite() {
            return;
        }
        let position = (seconds.max(0.0) * sample_rate as f64) as usize;
        self.seek(position);
    }

    /// Set output gain, clamped to [0, 1]
    pub fn set_volume(&self, volume: f32) {
        if volume.is_nan() {
            warn!("Ignoring NaN volume");
            return;
        }
        self.shared
            .volume
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::SeqCst);
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.shared.volume.load(Ordering::SeqCst))
    }

    pub fn set_lowpass(&self, cutoff_hz: f64) -> bool {
        self.with_filters(|filters| filters.set_lowpass(cutoff_hz))
    }

    pub fn set_highpass(&self, cutoff_hz: f64) -> bool {
        self.with_filters(|filters| filters.set_highpass(cutoff_hz))
    }

    pub fn set_bandstop(&self, low_hz: f64, high_hz: f64) -> bool {
        self.with_filters(|filters| filters.set_bandstop(low_hz, high_hz))
    }

    pub fn set_bandpass(&self, low_hz: f64, high_hz: f64) -> bool {
        self.with_filters(|filters| filters.set_bandpass(low_hz, high_hz))
    }

    pub fn set_filter_enabled(&self, kind: FilterKind, enabled: bool) {
        self.with_filters(|filters| filters.set_enabled(kind, enabled));
    }

    pub fn apply_filter_settings(&self, settings: &FilterSettings) {
        self.with_filters(|filters| filters.apply_settings(settings));
    }

    pub fn filter_settings(&self) -> FilterSettings {
        self.with_filters(|filters| filters.settings())
    }

    /// Zero the bins the enabled filters remove, so a displayed frame
    /// matches what is heard
    pub fn mask_spectrum(&self, magnitudes: &mut [f32]) {
        let sample_rate = self.sample_rate() as f64;
        self.with_filters(|filters| filters.process_spectrum(magnitudes, sample_rate));
    }

    fn with_filters<R>(&self, f: impl FnOnce(&mut FilterBank) -> R) -> R {
        let mut filters = match self.shared.filters.lock() {
            Ok(filters) => filters,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut filters)
    }

    /// Copy the latest spectrum frame into `out`, at most once per
    /// configured interval
    pub fn poll_spectrum(&self, out: &mut Vec<f32>) -> bool {
        self.shared.mailbox.poll(out)
    }

    /// True once after each play cycle that reached the end of the source
    pub fn take_finished(&self) -> bool {
        self.shared.finished.swap(false, Ordering::SeqCst)
    }

    /// Current state, reporting `Stopped` once the source has run out
    pub fn state(&self) -> PlaybackState {
        if self.state == PlaybackState::Playing && self.shared.ended.load(Ordering::SeqCst) {
            PlaybackState::Stopped
        } else {
            self.state
        }
    }

    pub fn position(&self) -> usize {
        self.shared.cursor.load(Ordering::SeqCst)
    }

    /// Source length in samples (0 when nothing is loaded)
    pub fn length(&self) -> usize {
        self.shared.source().map_or(0, |source| source.len())
    }

    pub fn sample_rate(&self) -> u32 {
        self.shared.source().map_or(0, |source| source.sample_rate())
    }

    pub fn duration_secs(&self) -> f64 {
        self.shared.source().map_or(0.0, |source| source.duration_secs())
    }

    pub fn position_secs(&self) -> f64 {
        match self.sample_rate() {
            0 => 0.0,
            rate => self.position() as f64 / rate as f64,
        }
    }

    pub fn source(&self) -> Option<AudioSource> {
        self.shared.source()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// State shared with the device callback
    pub fn shared(&self) -> &Arc<PlaybackShared> {
        &self.shared
    }

    /// Render the loaded source through the current filter settings to a
    /// WAV file. The live filter bank is only locked for the snapshot.
    pub fn export(&self, path: &Path) -> Result<ExportSummary, ExportError> {
        let source = self.shared.source().ok_or(ExportError::EmptySource)?;
        let settings = self.filter_settings();

        export_wav(path, &source, &settings, self.config.filter_bank_config())
    }

    /// Release the stream of a play cycle that ran to the end
    fn sync_finished(&mut self) {
        if self.state == PlaybackState::Playing && self.shared.ended.load(Ordering::SeqCst) {
            debug!("Playback reached the end of the source");
            self.shared.running.store(false, Ordering::SeqCst);
            self.stream = None;
            self.state = PlaybackState::Stopped;
        }
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
