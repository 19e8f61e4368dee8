//! Audio output playback using cpal
//!
//! The playback engine talks to the device through [`OutputBackend`] so it
//! can be driven without hardware in tests.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleRate, Stream, StreamConfig};
use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No audio output device found")]
    NoDevice,

    #[error("Failed to get device name: {0}")]
    DeviceName(String),

    #[error("Failed to build stream: {0}")]
    BuildStream(String),

    #[error("Failed to play stream: {0}")]
    PlayStream(String),

    #[error("Failed to pause stream: {0}")]
    PauseStream(String),

    #[error("No audio loaded")]
    NoSource,

    #[error("Invalid stream format: {sample_rate} Hz, {channels} channel(s)")]
    InvalidFormat { sample_rate: u32, channels: u16 },
}

/// Output device information
#[derive(Debug, Clone)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Fills one interleaved block of output samples; runs on the device thread
pub type RenderCallback = Box<dyn FnMut(&mut [f32]) + Send + 'static>;

/// An open output stream
pub trait OutputStream {
    fn start(&self) -> Result<(), AudioError>;
    fn pause(&self) -> Result<(), AudioError>;
}

/// Opens output streams that pull audio from a render callback
pub trait OutputBackend {
    fn open(
        &self,
        sample_rate: u32,
        channels: u16,
        render: RenderCallback,
    ) -> Result<Box<dyn OutputStream>, AudioError>;
}

/// Backend for the default cpal host and output device
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

impl OutputBackend for CpalBackend {
    fn open(
        &self,
        sample_rate: u32,
        channels: u16,
        render: RenderCallback,
    ) -> Result<Box<dyn OutputStream>, AudioError> {
        let output = AudioOutput::from_default_device(sample_rate, channels, render)?;
        Ok(Box::new(output))
    }
}

/// Audio output stream
pub struct AudioOutput {
    stream: Stream,
}

impl AudioOutput {
    /// Create audio output on the default device
    ///
    /// # Arguments
    /// * `sample_rate` - Stream rate, the source's rate
    /// * `channels` - Interleaved output channels
    /// * `render` - Called for every device buffer
    pub fn from_default_device(
        sample_rate: u32,
        channels: u16,
        render: RenderCallback,
    ) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        Self::from_device(device, sample_rate, channels, render)
    }

    /// Create audio output on a specific device
    pub fn from_device(
        device: Device,
        sample_rate: u32,
        channels: u16,
        mut render: RenderCallback,
    ) -> Result<Self, AudioError> {
        if sample_rate == 0 || channels == 0 {
            return Err(AudioError::InvalidFormat { sample_rate, channels });
        }

        let name = device
            .name()
            .map_err(|e| AudioError::DeviceName(e.to_string()))?;

        let stream_config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: BufferSize::Default,
        };

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| render(data),
                move |err| {
                    error!("Audio output error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::BuildStream(e.to_string()))?;

        info!("Opened output on {} at {} Hz, {} channel(s)", name, sample_rate, channels);

        Ok(Self { stream })
    }
}

impl OutputStream for AudioOutput {
    fn start(&self) -> Result<(), AudioError> {
        self.stream
            .play()
            .map_err(|e| AudioError::PlayStream(e.to_string()))
    }

    fn pause(&self) -> Result<(), AudioError> {
        self.stream
            .pause()
            .map_err(|e| AudioError::PauseStream(e.to_string()))
    }
}

/// List available audio output devices
pub fn list_output_devices() -> Result<Vec<AudioDeviceInfo>, AudioError> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    let device_iter = host
        .output_devices()
        .map_err(|e| AudioError::DeviceName(e.to_string()))?;

    for device in device_iter {
        if let Ok(name) = device.name() {
            if let Ok(config) = device.default_output_config() {
                devices.push(AudioDeviceInfo {
                    name,
                    sample_rate: config.sample_rate().0,
                    channels: config.channels(),
                });
            }
        }
    }

    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_devices() {
        // Just ensure it doesn't crash on machines without audio
        let _ = list_output_devices();
    }

    #[test]
    fn test_zero_format_is_rejected_before_touching_the_device() {
        let host = cpal::default_host();
        if let Some(device) = host.default_output_device() {
            let result = AudioOutput::from_device(device, 0, 2, Box::new(|_| {}));
            assert!(matches!(result, Err(AudioError::InvalidFormat { .. })));
        }
    }
}
