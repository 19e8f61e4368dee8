//! Decoded PCM held in memory for playback and export

use std::sync::Arc;

/// Immutable mono sample buffer plus its stream format
///
/// `channels` is the channel count the source was decoded from; audio is
/// kept mono and duplicated to every output channel.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSource {
    samples: Arc<[f32]>,
    sample_rate: u32,
    channels: u16,
}

impl AudioSource {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
            channels,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Length in samples (frames)
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}
